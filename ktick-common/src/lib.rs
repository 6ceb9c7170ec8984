#![no_std]
pub mod keycodes;
pub mod led;
