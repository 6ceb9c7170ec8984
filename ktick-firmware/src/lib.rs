#![no_std]
pub mod boot;
pub mod config;
pub mod device;
pub mod double_buffer;
pub mod firmware_functions;
pub mod hid;
pub mod lock;
pub mod registry;
pub mod rotary_encoder;
pub mod runner;
pub mod screen;
pub mod usb;
pub mod usb_output;

#[cfg(any(test, feature = "test-utils"))]
pub mod flash_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod i2c_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod pin_test_stub;
#[cfg(test)]
mod test_devices;
#[cfg(test)]
mod time_driver_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod usb_test_stub;

#[macro_use]
mod macros;

/// Size of the keycode bitmap in bytes; one bit for each 8 bit keycode.
pub(crate) const KEY_BITS_SIZE: usize = 32;

fn add_bit(bits: &mut [u8], kc: u8) -> bool {
    let Some(byte) = bits.get_mut((kc >> 3) as usize) else {
        crate::debug!("keycode out of range {}", kc);
        return false;
    };
    let bp = 1 << (kc & 7);
    let old = *byte;
    *byte |= bp;
    old & bp == 0
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
