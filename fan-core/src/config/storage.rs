//! Byte-addressable backing store for persisted variables.

use super::{MAX_VAR_SIZE, STORAGE_BUDGET};

/// Non-volatile byte store addressed by absolute offset.
///
/// Implementations are expected to complete the transfer before returning; the
/// store is only touched from the control tick so no locking is required.
pub trait Storage {
    /// Fills `buf` with the bytes starting at `offset`.
    fn read_block(&mut self, offset: usize, buf: &mut [u8]);

    /// Writes `bytes` starting at `offset`.
    fn write_block(&mut self, offset: usize, bytes: &[u8]);
}

impl<S: Storage + ?Sized> Storage for &mut S {
    fn read_block(&mut self, offset: usize, buf: &mut [u8]) {
        (**self).read_block(offset, buf);
    }

    fn write_block(&mut self, offset: usize, bytes: &[u8]) {
        (**self).write_block(offset, bytes);
    }
}

/// RAM-backed store used by host tooling and tests.
///
/// Fresh instances read as erased EEPROM (`0xFF`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryStorage {
    bytes: [u8; STORAGE_BUDGET],
    writes: usize,
}

impl MemoryStorage {
    /// Value returned by cells that were never written.
    pub const ERASED: u8 = 0xFF;

    /// Creates an erased store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [Self::ERASED; STORAGE_BUDGET],
            writes: 0,
        }
    }

    /// Number of `write_block` calls observed so far.
    #[must_use]
    pub const fn write_count(&self) -> usize {
        self.writes
    }

    /// Raw view of the slot holding variable `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> &[u8] {
        let start = index * MAX_VAR_SIZE;
        &self.bytes[start..start + MAX_VAR_SIZE]
    }

    /// Overwrites raw bytes, bypassing the write counter. Used to stage corrupt images.
    pub fn poke(&mut self, offset: usize, bytes: &[u8]) {
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read_block(&mut self, offset: usize, buf: &mut [u8]) {
        let start = offset.min(STORAGE_BUDGET);
        let end = (offset + buf.len()).min(STORAGE_BUDGET);
        let available = end - start;
        buf[..available].copy_from_slice(&self.bytes[start..end]);
        buf[available..].fill(Self::ERASED);
    }

    fn write_block(&mut self, offset: usize, bytes: &[u8]) {
        let start = offset.min(STORAGE_BUDGET);
        let end = (offset + bytes.len()).min(STORAGE_BUDGET);
        self.bytes[start..end].copy_from_slice(&bytes[..end - start]);
        self.writes += 1;
    }
}
