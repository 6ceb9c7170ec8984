pub mod key_range {
    /// Keycodes below this are error/no-event codes and never appear in a report.
    pub const BASIC_MIN: u8 = 0x04;
    pub const BASIC_A: u8 = 0x04;
    pub const BASIC_B: u8 = 0x05;
    pub const BASIC_1: u8 = 0x1e;
    pub const BASIC_0: u8 = 0x27;
    pub const MODIFIER_MIN: u8 = 0xe0;
    pub const MODIFIER_MAX: u8 = 0xe7;
}

pub mod consumer {
    pub const NONE: u16 = 0;
    pub const SCAN_NEXT: u16 = 0xb5;
    pub const SCAN_PREVIOUS: u16 = 0xb6;
    pub const PLAY_PAUSE: u16 = 0xcd;
    pub const MUTE: u16 = 0xe2;
    pub const VOLUME_INCREMENT: u16 = 0xe9;
    pub const VOLUME_DECREMENT: u16 = 0xea;
    /// Highest usage the consumer report descriptor declares.
    pub const MAX: u16 = 0x2a0;
}

pub mod mouse {
    pub const BUTTON_LEFT: u8 = 0;
    pub const BUTTON_RIGHT: u8 = 1;
    pub const BUTTON_MIDDLE: u8 = 2;
    pub const BUTTON_BACK: u8 = 3;
    pub const BUTTON_FORWARD: u8 = 4;
    pub const BUTTON_MAX: u8 = 7;
}

/// Is `kc` one of the eight modifier keycodes?
///
/// ```
/// use ktick_common::keycodes::is_modifier;
/// assert!(is_modifier(0xe1));
/// assert!(!is_modifier(0x04));
/// ```
pub const fn is_modifier(kc: u8) -> bool {
    kc >= key_range::MODIFIER_MIN && kc <= key_range::MODIFIER_MAX
}

/// Bit of the boot report modifier byte that `kc` sets. `kc` must be a modifier.
pub const fn modifier_bit(kc: u8) -> u8 {
    1 << (kc - key_range::MODIFIER_MIN)
}

/// Button mask bit for a mouse button keycode, or `None` when out of range.
pub const fn mouse_button_bit(code: u8) -> Option<u8> {
    if code <= mouse::BUTTON_MAX {
        Some(1 << code)
    } else {
        None
    }
}

#[cfg(test)]
#[path = "keycodes_test.rs"]
mod test;
