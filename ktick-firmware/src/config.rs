//! Read-only key/value configuration consulted while devices are being built.

use embassy_time::Duration;
use embedded_storage::nor_flash::ReadNorFlash;

pub mod keys {
    pub const TICK_PERIOD_US: u16 = 0x0001;
    pub const DISPLAY_ROWS: u16 = 0x0100;
    pub const DISPLAY_FLIP: u16 = 0x0101;
    pub const DISPLAY_ADDRESS: u16 = 0x0102;
    pub const DISPLAY_SLEEP_S: u16 = 0x0103;
    pub const ENCODER_RESOLUTION: u16 = 0x0200;
    pub const USB_POLL_MS: u16 = 0x0300;
}

pub const DEFAULT_TICK_PERIOD_US: u32 = 1000;
pub const DEFAULT_DISPLAY_ROWS: u32 = 64;
pub const DEFAULT_DISPLAY_ADDRESS: u32 = 0x3c;
pub const DEFAULT_DISPLAY_SLEEP_S: u32 = 120;
pub const DEFAULT_ENCODER_RESOLUTION: u32 = 2;
pub const DEFAULT_USB_POLL_MS: u32 = 1;

pub trait ConfigStore {
    fn read(&self, key: u16) -> Option<u32>;
}

/// A store backed by a static table.
pub struct MemoryStore<'a>(pub &'a [(u16, u32)]);

impl ConfigStore for MemoryStore<'_> {
    fn read(&self, key: u16) -> Option<u32> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    Flash,
    Corrupt,
    TooManyRecords(u32),
}

const RECORD_MAGIC: u32 = u32::from_le_bytes(*b"KTCF");
const ERASED: u32 = 0xffff_ffff;
const HEADER_SIZE: u32 = 8;
const RECORD_SIZE: u32 = 8;

/// Configuration records loaded once from NOR flash.
///
/// Layout (little endian): magic `"KTCF"`, `u32` record count, then `count` records of
/// `u16 key, u16 reserved, u32 value`. An erased header reads as an empty store.
pub struct RecordStore<const N: usize> {
    records: heapless::Vec<(u16, u32), N>,
}

impl<const N: usize> RecordStore<N> {
    pub const fn empty() -> Self {
        Self {
            records: heapless::Vec::new(),
        }
    }

    pub fn load<F: ReadNorFlash>(flash: &mut F, offset: u32) -> Result<Self, ConfigError> {
        let mut header = [0; HEADER_SIZE as usize];
        flash
            .read(offset, &mut header)
            .map_err(|_| ConfigError::Flash)?;
        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let count = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if magic == ERASED {
            return Ok(Self::empty());
        }
        if magic != RECORD_MAGIC {
            return Err(ConfigError::Corrupt);
        }
        if count as usize > N {
            return Err(ConfigError::TooManyRecords(count));
        }

        let mut records = heapless::Vec::new();
        let mut rec = [0; RECORD_SIZE as usize];
        for i in 0..count {
            flash
                .read(offset + HEADER_SIZE + i * RECORD_SIZE, &mut rec)
                .map_err(|_| ConfigError::Flash)?;
            let key = u16::from_le_bytes([rec[0], rec[1]]);
            let value = u32::from_le_bytes([rec[4], rec[5], rec[6], rec[7]]);
            // capacity was checked against count above
            let _ = records.push((key, value));
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<const N: usize> ConfigStore for RecordStore<N> {
    fn read(&self, key: u16) -> Option<u32> {
        self.records
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

/// Typed view over a [ConfigStore]. Missing keys fall back to the defaults above.
#[derive(Clone, Copy)]
pub struct Configuration<'c> {
    store: &'c dyn ConfigStore,
}

impl<'c> Configuration<'c> {
    pub fn new(store: &'c dyn ConfigStore) -> Self {
        Self { store }
    }

    pub fn get(&self, key: u16, default: u32) -> u32 {
        self.store.read(key).unwrap_or(default)
    }

    pub fn tick_period(&self) -> Duration {
        let us = self.get(keys::TICK_PERIOD_US, DEFAULT_TICK_PERIOD_US).max(1);
        Duration::from_micros(us as u64)
    }

    pub fn display_rows(&self) -> u32 {
        self.get(keys::DISPLAY_ROWS, DEFAULT_DISPLAY_ROWS)
    }

    pub fn display_flip(&self) -> bool {
        self.get(keys::DISPLAY_FLIP, 0) != 0
    }

    pub fn display_address(&self) -> u8 {
        self.get(keys::DISPLAY_ADDRESS, DEFAULT_DISPLAY_ADDRESS) as u8
    }

    pub fn display_sleep(&self) -> Duration {
        Duration::from_secs(self.get(keys::DISPLAY_SLEEP_S, DEFAULT_DISPLAY_SLEEP_S) as u64)
    }

    pub fn encoder_resolution(&self) -> u8 {
        self.get(keys::ENCODER_RESOLUTION, DEFAULT_ENCODER_RESOLUTION)
            .clamp(1, u8::MAX as u32) as u8
    }

    pub fn usb_poll_ms(&self) -> u8 {
        self.get(keys::USB_POLL_MS, DEFAULT_USB_POLL_MS)
            .clamp(1, u8::MAX as u32) as u8
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod test;
