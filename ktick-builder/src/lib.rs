#![no_std]

#[cfg(feature = "rp")]
pub mod rp {
    pub use embassy_rp::*;
}

pub mod usb_device;

#[cfg(feature = "defmt")]
use defmt_rtt as _;

pub use ktick_firmware::*;
pub use static_cell::StaticCell;
