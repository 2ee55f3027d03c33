//! 24C32-class I²C EEPROM holding the configuration table.
//!
//! - 7-bit address 0x50, 16-bit word address.
//! - Writes never cross a page boundary and wait out the internal write cycle
//!   before the next page.

use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_time::{Duration, block_for};
use fan_core::config::{MemoryStorage, STORAGE_BUDGET, Storage};
use heapless::Vec;

const EEPROM_ADDR_7BIT: u8 = 0x50;
const PAGE_SIZE: usize = 32;
const WRITE_CYCLE: Duration = Duration::from_millis(5);

/// Configuration storage backed by an external EEPROM.
pub struct I2cEeprom {
    i2c: I2c<'static, Blocking>,
}

impl I2cEeprom {
    pub const fn new(i2c: I2c<'static, Blocking>) -> Self {
        Self { i2c }
    }

    fn write_page(&mut self, addr: u16, data: &[u8]) -> bool {
        let mut frame: Vec<u8, { 2 + PAGE_SIZE }> = Vec::new();
        let _ = frame.extend_from_slice(&addr.to_be_bytes());
        let _ = frame.extend_from_slice(data);
        let ok = self.i2c.blocking_write(EEPROM_ADDR_7BIT, &frame).is_ok();
        block_for(WRITE_CYCLE);
        ok
    }
}

impl Storage for I2cEeprom {
    fn read_block(&mut self, offset: usize, buf: &mut [u8]) {
        let Ok(addr) = u16::try_from(offset) else {
            buf.fill(MemoryStorage::ERASED);
            return;
        };
        if self
            .i2c
            .blocking_write_read(EEPROM_ADDR_7BIT, &addr.to_be_bytes(), buf)
            .is_err()
        {
            // Reads as erased, which the store treats as a blank device.
            defmt::warn!("eeprom: read failed at {=usize}", offset);
            buf.fill(MemoryStorage::ERASED);
        }
    }

    fn write_block(&mut self, offset: usize, bytes: &[u8]) {
        let end = (offset + bytes.len()).min(STORAGE_BUDGET);
        let mut cursor = offset;
        while cursor < end {
            let page_remaining = PAGE_SIZE - cursor % PAGE_SIZE;
            let chunk = page_remaining.min(end - cursor);
            let Ok(addr) = u16::try_from(cursor) else {
                return;
            };
            let data = &bytes[cursor - offset..cursor - offset + chunk];
            if !self.write_page(addr, data) {
                defmt::warn!("eeprom: write failed at {=usize}", cursor);
            }
            cursor += chunk;
        }
    }
}
