//! Versioned, range-checked persistent configuration.
//!
//! [`ConfigStore`] keeps an in-memory mirror of every variable in
//! [`VARIABLES`] and moves values between that mirror and a [`Storage`]
//! backend. Values outside a variable's bounds are corrected toward the
//! nearest bound on every load and every write; the correction is reported
//! through [`Checked::clamped`] and never fails the operation.

use core::fmt;

pub mod storage;
pub mod table;

pub use storage::{MemoryStorage, Storage};
pub use table::{
    CODE_VERSION, MAX_MEASURABLE_RPM, MIN_MEASURABLE_RPM, VARIABLE_COUNT, VARIABLES, VarId,
    VarKind, VarSpec,
};

/// Widest variable the slot layout supports, in bytes.
pub const MAX_VAR_SIZE: usize = 4;

/// Bytes of non-volatile storage reserved for the table.
pub const STORAGE_BUDGET: usize = 1024;

/// Layout errors raised when a variable cannot be addressed.
///
/// None of these occur with the built-in table; they indicate a broken build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The identity is not part of the active table.
    UnknownVariable(VarId),
    /// The variable is wider than a storage slot.
    SizeTooLarge { id: VarId, size: usize },
    /// The variable's slot extends past the storage budget.
    AddressOutOfRange { id: VarId, offset: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownVariable(id) => write!(f, "unknown variable {}", id.name()),
            ConfigError::SizeTooLarge { id, size } => {
                write!(f, "{} is {size} bytes (max {MAX_VAR_SIZE})", id.name())
            }
            ConfigError::AddressOutOfRange { id, offset } => {
                write!(
                    f,
                    "{} at offset {offset} exceeds {STORAGE_BUDGET}-byte budget",
                    id.name()
                )
            }
        }
    }
}

/// Value produced by a load or write together with its clamp status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checked {
    pub value: i64,
    pub clamped: bool,
}

/// Outcome of a bulk load or reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Variables whose stored image was outside its bounds.
    pub clamped: usize,
    /// Variables that could not be addressed.
    pub failed: usize,
    /// First layout error encountered, if any.
    pub first_error: Option<ConfigError>,
    /// Set when a version mismatch forced every variable back to its default.
    pub reset_to_defaults: bool,
}

impl LoadReport {
    /// Returns `true` when nothing was clamped and nothing failed.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.clamped == 0 && self.failed == 0
    }

    fn absorb(&mut self, result: Result<Checked, ConfigError>) {
        match result {
            Ok(checked) => {
                if checked.clamped {
                    self.clamped += 1;
                }
            }
            Err(error) => {
                self.failed += 1;
                if self.first_error.is_none() {
                    self.first_error = Some(error);
                }
            }
        }
    }
}

/// Resolved storage location of a variable.
#[derive(Clone, Copy, Debug)]
struct Slot {
    position: usize,
    offset: usize,
    spec: VarSpec,
}

/// In-memory mirror of the persisted variables bound to a storage backend.
pub struct ConfigStore<S> {
    storage: S,
    table: &'static [VarSpec],
    budget: usize,
    values: [i64; VARIABLE_COUNT],
}

impl<S: Storage> ConfigStore<S> {
    /// Creates a store over the built-in table with every value at its default.
    ///
    /// Nothing is read from `storage` until [`load_all`](Self::load_all).
    pub fn new(storage: S) -> Self {
        Self::with_layout(storage, &VARIABLES, STORAGE_BUDGET)
    }

    /// Creates a store over an explicit table and storage budget.
    ///
    /// Tables longer than [`VARIABLE_COUNT`] are truncated.
    pub fn with_layout(storage: S, table: &'static [VarSpec], budget: usize) -> Self {
        let table = &table[..table.len().min(VARIABLE_COUNT)];
        let mut values = [0; VARIABLE_COUNT];
        for (value, spec) in values.iter_mut().zip(table) {
            *value = spec.default;
        }
        Self {
            storage,
            table,
            budget,
            values,
        }
    }

    /// Returns the mirrored value of `id`.
    pub fn value(&self, id: VarId) -> Result<i64, ConfigError> {
        let slot = self.resolve(id)?;
        Ok(self.values[slot.position])
    }

    /// Returns the mirrored value of `id` narrowed to `u16`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn u16_value(&self, id: VarId) -> Result<u16, ConfigError> {
        self.value(id)
            .map(|value| value.clamp(0, i64::from(u16::MAX)) as u16)
    }

    /// Returns the mirrored value of `id` narrowed to `i16`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn i16_value(&self, id: VarId) -> Result<i16, ConfigError> {
        self.value(id)
            .map(|value| value.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16)
    }

    /// Returns the mirrored value of `id` narrowed to `u8`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn u8_value(&self, id: VarId) -> Result<u8, ConfigError> {
        self.value(id)
            .map(|value| value.clamp(0, i64::from(u8::MAX)) as u8)
    }

    /// Updates the mirror only, clamping `value` into range.
    pub fn set(&mut self, id: VarId, value: i64) -> Result<Checked, ConfigError> {
        let slot = self.resolve(id)?;
        let (value, clamped) = slot.spec.clamp(value);
        self.values[slot.position] = value;
        Ok(Checked { value, clamped })
    }

    /// Reads `id` from storage into the mirror.
    pub fn load(&mut self, id: VarId) -> Result<Checked, ConfigError> {
        let slot = self.resolve(id)?;
        let mut raw = [0u8; MAX_VAR_SIZE];
        let size = slot.spec.kind.size();
        self.storage.read_block(slot.offset, &mut raw[..size]);

        let (value, clamped) = slot.spec.clamp(slot.spec.kind.decode(&raw));
        self.values[slot.position] = value;
        Ok(Checked { value, clamped })
    }

    /// Clamps the mirrored value of `id` and persists it.
    pub fn save(&mut self, id: VarId) -> Result<Checked, ConfigError> {
        let slot = self.resolve(id)?;
        let (value, clamped) = slot.spec.clamp(self.values[slot.position]);
        self.values[slot.position] = value;

        let raw = slot.spec.kind.encode(value);
        self.storage
            .write_block(slot.offset, &raw[..slot.spec.kind.size()]);
        Ok(Checked { value, clamped })
    }

    /// Sets and persists `id` in one step.
    pub fn write(&mut self, id: VarId, value: i64) -> Result<Checked, ConfigError> {
        let set = self.set(id, value)?;
        let saved = self.save(id)?;
        Ok(Checked {
            value: saved.value,
            clamped: set.clamped || saved.clamped,
        })
    }

    /// Persists `value` only when its clamped form differs from the mirror.
    ///
    /// Returns `None` when the stored value already matches, so repeated
    /// debug frames do not wear the backing store.
    pub fn update(&mut self, id: VarId, value: i64) -> Result<Option<Checked>, ConfigError> {
        let slot = self.resolve(id)?;
        let (target, _) = slot.spec.clamp(value);
        if self.values[slot.position] == target {
            return Ok(None);
        }
        self.write(id, value).map(Some)
    }

    /// Loads every variable, or resets the store when the schema version differs.
    pub fn load_all(&mut self) -> LoadReport {
        let mut report = LoadReport::default();

        let version = self.load(VarId::CodeVersion);
        let matches = matches!(version, Ok(Checked { value, .. }) if value == i64::from(CODE_VERSION));
        if !matches {
            let mut reset = self.save_all_defaults();
            if let Err(error) = version {
                reset.absorb(Err(error));
            }
            reset.reset_to_defaults = true;
            return reset;
        }
        report.absorb(version);

        for spec in self.table {
            if spec.id != VarId::CodeVersion {
                report.absorb(self.load(spec.id));
            }
        }
        report
    }

    /// Restores and persists every default, including the schema version.
    pub fn save_all_defaults(&mut self) -> LoadReport {
        let mut report = LoadReport::default();
        for spec in self.table {
            report.absorb(self.write(spec.id, spec.default));
        }
        report
    }

    /// Descriptor of `id` in the active table.
    pub fn spec(&self, id: VarId) -> Result<VarSpec, ConfigError> {
        self.resolve(id).map(|slot| slot.spec)
    }

    /// Active table in slot order.
    pub fn table(&self) -> &'static [VarSpec] {
        self.table
    }

    /// Shared access to the backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Releases the backend.
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn resolve(&self, id: VarId) -> Result<Slot, ConfigError> {
        let (position, spec) = self
            .table
            .iter()
            .enumerate()
            .find(|(_, spec)| spec.id == id)
            .ok_or(ConfigError::UnknownVariable(id))?;

        let size = spec.kind.size();
        if size > MAX_VAR_SIZE {
            return Err(ConfigError::SizeTooLarge { id, size });
        }

        let offset = position * MAX_VAR_SIZE;
        if offset + size > self.budget {
            return Err(ConfigError::AddressOutOfRange { id, offset });
        }

        Ok(Slot {
            position,
            offset,
            spec: *spec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_holds_defaults_without_touching_storage() {
        let store = ConfigStore::new(MemoryStorage::new());
        assert_eq!(store.value(VarId::Fan1TurnOn), Ok(132));
        assert_eq!(store.u16_value(VarId::MaxRpm2), Ok(2_500));
        assert_eq!(store.storage().write_count(), 0);
    }

    #[test]
    fn erased_storage_triggers_reset() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        let report = store.load_all();

        assert!(report.reset_to_defaults);
        assert_eq!(report.failed, 0);
        assert_eq!(store.storage().write_count(), VARIABLE_COUNT);
        assert_eq!(
            store.storage().slot(VarId::CodeVersion.as_index()),
            &CODE_VERSION.to_le_bytes()
        );
    }

    #[test]
    fn save_writes_only_the_variable_width() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.write(VarId::TempSource1, 1).expect("write");
        assert_eq!(
            store.storage().slot(VarId::TempSource1.as_index()),
            &[1, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn update_skips_unchanged_values() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        assert_eq!(store.update(VarId::Pi1Kp, 400), Ok(None));
        assert_eq!(store.storage().write_count(), 0);

        let written = store.update(VarId::Pi1Kp, 512).expect("update");
        assert_eq!(
            written,
            Some(Checked {
                value: 512,
                clamped: false
            })
        );
        assert_eq!(store.storage().write_count(), 1);
    }

    #[test]
    fn update_compares_after_clamping() {
        let mut store = ConfigStore::new(MemoryStorage::new());
        store.write(VarId::MaxRpm1, MAX_MEASURABLE_RPM).expect("write");
        let writes = store.storage().write_count();

        assert_eq!(store.update(VarId::MaxRpm1, 60_000), Ok(None));
        assert_eq!(store.storage().write_count(), writes);
    }

    #[test]
    fn short_budget_reports_address_error() {
        let mut store = ConfigStore::with_layout(MemoryStorage::new(), &VARIABLES, 8);
        assert_eq!(store.load(VarId::UseFahrenheit).map(|c| c.value), Ok(1));
        assert!(matches!(
            store.save(VarId::Temp1Offset),
            Err(ConfigError::AddressOutOfRange { offset: 8, .. })
        ));
    }

    #[test]
    fn truncated_table_reports_unknown_variable() {
        let mut store = ConfigStore::with_layout(MemoryStorage::new(), &VARIABLES[..4], 1024);
        assert_eq!(
            store.load(VarId::Fan2TableSpeed4),
            Err(ConfigError::UnknownVariable(VarId::Fan2TableSpeed4))
        );
    }
}
