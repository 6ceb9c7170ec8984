//! Indicator bits of the keyboard LED output report.

pub const NUM_LOCK: u8 = 1;
pub const CAPS_LOCK: u8 = 1 << 1;
pub const SCROLL_LOCK: u8 = 1 << 2;
pub const COMPOSE: u8 = 1 << 3;
pub const KANA: u8 = 1 << 4;

/// Only five indicators are defined; the remaining three bits are report padding.
pub const MASK: u8 = 0x1f;
