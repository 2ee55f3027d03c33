//! Persisted variable catalog.
//!
//! Slot order is part of the storage layout: inserting, removing, or
//! reordering entries requires bumping [`CODE_VERSION`] so devices in the
//! field reset to defaults instead of misreading each other's slots.

use super::MAX_VAR_SIZE;

/// Schema version stored in slot 0.
pub const CODE_VERSION: u32 = 5;

/// Lowest speed the tachometer can resolve (RPM).
pub const MIN_MEASURABLE_RPM: i64 = 50;
/// Highest speed the tachometer reports (RPM).
pub const MAX_MEASURABLE_RPM: i64 = 9_999;

/// Highest raw ADC count.
const ADC_MAX: i64 = 1_023;

/// Width and signedness of a persisted variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl VarKind {
    /// Storage width in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            VarKind::U8 | VarKind::I8 => 1,
            VarKind::U16 | VarKind::I16 => 2,
            VarKind::U32 | VarKind::I32 => 4,
        }
    }

    /// Returns `true` for two's-complement kinds.
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, VarKind::I8 | VarKind::I16 | VarKind::I32)
    }

    /// Little-endian encoding of `value`, truncated to the kind's width.
    ///
    /// Only the first [`size`](Self::size) bytes of the result are meaningful.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub const fn encode(self, value: i64) -> [u8; MAX_VAR_SIZE] {
        (value as u32).to_le_bytes()
    }

    /// Decodes the little-endian image at the head of `raw`.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn decode(self, raw: &[u8]) -> i64 {
        match self {
            VarKind::U8 => i64::from(raw[0]),
            VarKind::I8 => i64::from(raw[0] as i8),
            VarKind::U16 => i64::from(u16::from_le_bytes([raw[0], raw[1]])),
            VarKind::I16 => i64::from(i16::from_le_bytes([raw[0], raw[1]])),
            VarKind::U32 => i64::from(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
            VarKind::I32 => i64::from(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])),
        }
    }

    /// Interprets a 16-bit debug payload word as a value of this kind.
    ///
    /// Signed kinds read the word as two's complement so negative offsets
    /// and integrator bounds survive the trip over the serial link.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn from_word(self, word: u16) -> i64 {
        if self.is_signed() {
            i64::from(word as i16)
        } else {
            i64::from(word)
        }
    }
}

/// Stable identity of every persisted variable. The discriminant is the slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarId {
    CodeVersion,
    UseFahrenheit,
    Temp1Offset,
    Temp2Offset,
    Temp1Scale,
    Temp2Scale,
    MinRpm1,
    MinRpm2,
    MaxRpm1,
    MaxRpm2,
    Pi1Kp,
    Pi1Ki,
    Pi1IntMax,
    Pi1IntMin,
    Pi2Kp,
    Pi2Ki,
    Pi2IntMax,
    Pi2IntMin,
    Fan1Filter,
    Fan2Filter,
    TempSource1,
    TempSource2,
    Fan1TurnOff,
    Fan1TurnOn,
    Fan1TableTemp1,
    Fan1TableTemp2,
    Fan1TableTemp3,
    Fan1TableTemp4,
    Fan1TableSpeed1,
    Fan1TableSpeed2,
    Fan1TableSpeed3,
    Fan1TableSpeed4,
    Fan2TurnOff,
    Fan2TurnOn,
    Fan2TableTemp1,
    Fan2TableTemp2,
    Fan2TableTemp3,
    Fan2TableTemp4,
    Fan2TableSpeed1,
    Fan2TableSpeed2,
    Fan2TableSpeed3,
    Fan2TableSpeed4,
}

/// Number of persisted variables.
pub const VARIABLE_COUNT: usize = 42;

impl VarId {
    /// Every identity in slot order.
    pub const ALL: [VarId; VARIABLE_COUNT] = [
        VarId::CodeVersion,
        VarId::UseFahrenheit,
        VarId::Temp1Offset,
        VarId::Temp2Offset,
        VarId::Temp1Scale,
        VarId::Temp2Scale,
        VarId::MinRpm1,
        VarId::MinRpm2,
        VarId::MaxRpm1,
        VarId::MaxRpm2,
        VarId::Pi1Kp,
        VarId::Pi1Ki,
        VarId::Pi1IntMax,
        VarId::Pi1IntMin,
        VarId::Pi2Kp,
        VarId::Pi2Ki,
        VarId::Pi2IntMax,
        VarId::Pi2IntMin,
        VarId::Fan1Filter,
        VarId::Fan2Filter,
        VarId::TempSource1,
        VarId::TempSource2,
        VarId::Fan1TurnOff,
        VarId::Fan1TurnOn,
        VarId::Fan1TableTemp1,
        VarId::Fan1TableTemp2,
        VarId::Fan1TableTemp3,
        VarId::Fan1TableTemp4,
        VarId::Fan1TableSpeed1,
        VarId::Fan1TableSpeed2,
        VarId::Fan1TableSpeed3,
        VarId::Fan1TableSpeed4,
        VarId::Fan2TurnOff,
        VarId::Fan2TurnOn,
        VarId::Fan2TableTemp1,
        VarId::Fan2TableTemp2,
        VarId::Fan2TableTemp3,
        VarId::Fan2TableTemp4,
        VarId::Fan2TableSpeed1,
        VarId::Fan2TableSpeed2,
        VarId::Fan2TableSpeed3,
        VarId::Fan2TableSpeed4,
    ];

    /// Slot index of the variable.
    #[must_use]
    pub const fn as_index(self) -> usize {
        self as usize
    }

    /// Resolves a slot index back to its identity.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < VARIABLE_COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Short label used by diagnostics output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            VarId::CodeVersion => "codeVer",
            VarId::UseFahrenheit => "useFtemp",
            VarId::Temp1Offset => "temp1Offset",
            VarId::Temp2Offset => "temp2Offset",
            VarId::Temp1Scale => "temp1DegCPer5V",
            VarId::Temp2Scale => "temp2DegCPer5V",
            VarId::MinRpm1 => "minRpm1",
            VarId::MinRpm2 => "minRpm2",
            VarId::MaxRpm1 => "maxRpm1",
            VarId::MaxRpm2 => "maxRpm2",
            VarId::Pi1Kp => "pi1Kp",
            VarId::Pi1Ki => "pi1Ki",
            VarId::Pi1IntMax => "pi1Imax",
            VarId::Pi1IntMin => "pi1Imin",
            VarId::Pi2Kp => "pi2Kp",
            VarId::Pi2Ki => "pi2Ki",
            VarId::Pi2IntMax => "pi2Imax",
            VarId::Pi2IntMin => "pi2Imin",
            VarId::Fan1Filter => "fan1Filt",
            VarId::Fan2Filter => "fan2Filt",
            VarId::TempSource1 => "tmpsrc1",
            VarId::TempSource2 => "tmpsrc2",
            VarId::Fan1TurnOff => "fan1TurnOffTmp",
            VarId::Fan1TurnOn => "fan1TurnOnTmp",
            VarId::Fan1TableTemp1 => "fan1TblTmp1",
            VarId::Fan1TableTemp2 => "fan1TblTmp2",
            VarId::Fan1TableTemp3 => "fan1TblTmp3",
            VarId::Fan1TableTemp4 => "fan1TblTmp4",
            VarId::Fan1TableSpeed1 => "fan1TblSpd1",
            VarId::Fan1TableSpeed2 => "fan1TblSpd2",
            VarId::Fan1TableSpeed3 => "fan1TblSpd3",
            VarId::Fan1TableSpeed4 => "fan1TblSpd4",
            VarId::Fan2TurnOff => "fan2TurnOffTmp",
            VarId::Fan2TurnOn => "fan2TurnOnTmp",
            VarId::Fan2TableTemp1 => "fan2TblTmp1",
            VarId::Fan2TableTemp2 => "fan2TblTmp2",
            VarId::Fan2TableTemp3 => "fan2TblTmp3",
            VarId::Fan2TableTemp4 => "fan2TblTmp4",
            VarId::Fan2TableSpeed1 => "fan2TblSpd1",
            VarId::Fan2TableSpeed2 => "fan2TblSpd2",
            VarId::Fan2TableSpeed3 => "fan2TblSpd3",
            VarId::Fan2TableSpeed4 => "fan2TblSpd4",
        }
    }
}

/// Static descriptor of one persisted variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarSpec {
    pub id: VarId,
    pub kind: VarKind,
    pub min: i64,
    pub max: i64,
    pub default: i64,
}

impl VarSpec {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(id: VarId, kind: VarKind, min: i64, max: i64, default: i64) -> Self {
        Self {
            id,
            kind,
            min,
            max,
            default,
        }
    }

    /// Forces `value` into `[min, max]`, reporting whether it moved.
    ///
    /// The upper bound is checked first, matching the order the stored image
    /// has always been corrected in.
    #[must_use]
    pub const fn clamp(&self, value: i64) -> (i64, bool) {
        if value > self.max {
            (self.max, true)
        } else if value < self.min {
            (self.min, true)
        } else {
            (value, false)
        }
    }
}

const fn temp(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::U16, 0, ADC_MAX, default)
}

const fn speed(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::U16, 0, MAX_MEASURABLE_RPM, default)
}

const fn rpm_limit(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::U16, MIN_MEASURABLE_RPM, MAX_MEASURABLE_RPM, default)
}

const fn gain(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::I16, 0, i16::MAX as i64, default)
}

const fn integrator_bound(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::I16, i16::MIN as i64, i16::MAX as i64, default)
}

const fn calibration(id: VarId, default: i64) -> VarSpec {
    VarSpec::new(id, VarKind::I16, -5_000, 5_000, default)
}

/// Ordered catalog of every persisted variable. Index equals [`VarId::as_index`].
pub static VARIABLES: [VarSpec; VARIABLE_COUNT] = [
    VarSpec::new(
        VarId::CodeVersion,
        VarKind::U32,
        0,
        u32::MAX as i64,
        CODE_VERSION as i64,
    ),
    VarSpec::new(VarId::UseFahrenheit, VarKind::U8, 0, 1, 0),
    calibration(VarId::Temp1Offset, 0),
    calibration(VarId::Temp2Offset, 0),
    calibration(VarId::Temp1Scale, 250),
    calibration(VarId::Temp2Scale, 250),
    rpm_limit(VarId::MinRpm1, 650),
    rpm_limit(VarId::MinRpm2, 650),
    rpm_limit(VarId::MaxRpm1, 2_500),
    rpm_limit(VarId::MaxRpm2, 2_500),
    gain(VarId::Pi1Kp, 400),
    gain(VarId::Pi1Ki, 1_000),
    integrator_bound(VarId::Pi1IntMax, 30_000),
    integrator_bound(VarId::Pi1IntMin, 0),
    gain(VarId::Pi2Kp, 400),
    gain(VarId::Pi2Ki, 1_000),
    integrator_bound(VarId::Pi2IntMax, 30_000),
    integrator_bound(VarId::Pi2IntMin, 0),
    VarSpec::new(VarId::Fan1Filter, VarKind::U16, 0, 1_023, 768),
    VarSpec::new(VarId::Fan2Filter, VarKind::U16, 0, 1_023, 768),
    VarSpec::new(VarId::TempSource1, VarKind::U8, 0, 3, 2),
    VarSpec::new(VarId::TempSource2, VarKind::U8, 0, 3, 2),
    temp(VarId::Fan1TurnOff, 120),
    temp(VarId::Fan1TurnOn, 132),
    temp(VarId::Fan1TableTemp1, 155),
    temp(VarId::Fan1TableTemp2, 189),
    temp(VarId::Fan1TableTemp3, 223),
    temp(VarId::Fan1TableTemp4, 246),
    speed(VarId::Fan1TableSpeed1, 660),
    speed(VarId::Fan1TableSpeed2, 750),
    speed(VarId::Fan1TableSpeed3, 1_100),
    speed(VarId::Fan1TableSpeed4, 1_100),
    temp(VarId::Fan2TurnOff, 120),
    temp(VarId::Fan2TurnOn, 132),
    temp(VarId::Fan2TableTemp1, 155),
    temp(VarId::Fan2TableTemp2, 189),
    temp(VarId::Fan2TableTemp3, 223),
    temp(VarId::Fan2TableTemp4, 246),
    speed(VarId::Fan2TableSpeed1, 660),
    speed(VarId::Fan2TableSpeed2, 750),
    speed(VarId::Fan2TableSpeed3, 1_100),
    speed(VarId::Fan2TableSpeed4, 1_100),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_identity() {
        for (index, spec) in VARIABLES.iter().enumerate() {
            assert_eq!(spec.id.as_index(), index, "{} out of order", spec.id.name());
            assert_eq!(VarId::from_index(index), Some(spec.id));
        }
        assert_eq!(VarId::from_index(VARIABLE_COUNT), None);
    }

    #[test]
    fn defaults_sit_inside_their_bounds() {
        for spec in &VARIABLES {
            assert!(
                spec.min <= spec.default && spec.default <= spec.max,
                "{} default outside range",
                spec.id.name()
            );
            assert!(spec.kind.size() <= MAX_VAR_SIZE);
        }
    }

    #[test]
    fn decode_respects_signedness() {
        let raw = VarKind::I16.encode(-1200);
        assert_eq!(VarKind::I16.decode(&raw), -1200);
        assert_eq!(VarKind::U16.decode(&raw), 64_336);
        assert_eq!(VarKind::U8.decode(&[0xFF, 0, 0, 0]), 255);
        assert_eq!(VarKind::I8.decode(&[0xFF, 0, 0, 0]), -1);
    }

    #[test]
    fn payload_words_sign_extend_for_signed_kinds() {
        assert_eq!(VarKind::I16.from_word(0xFFFF), -1);
        assert_eq!(VarKind::U16.from_word(0xFFFF), 65_535);
        assert_eq!(VarKind::U8.from_word(300), 300);
    }

    #[test]
    fn clamp_reports_correction() {
        let spec = VARIABLES[VarId::MinRpm1.as_index()];
        assert_eq!(spec.clamp(10), (MIN_MEASURABLE_RPM, true));
        assert_eq!(spec.clamp(20_000), (MAX_MEASURABLE_RPM, true));
        assert_eq!(spec.clamp(700), (700, false));
    }
}
