//! Capability interfaces shared by the runner and the concrete devices.
//!
//! A device implements one trait per sink it can act as; a status display that also reacts to
//! layer changes implements both [KeyboardOutput] and [ScreenOutput].

use embassy_time::{Duration, Ticker};

use crate::screen::{DrawMode, Font};

/// Logical device slot, unique per [Category].
pub type Tag = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Category {
    InputDevice,
    KeyboardOutput,
    MouseOutput,
    ScreenOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// The bus or peripheral reported a fault.
    Hardware,
    /// A transfer could not complete; the frame is kept for the next attempt.
    Busy,
    InvalidConfig,
    /// The hardware resource was already handed to another instance.
    Unavailable,
}

pub trait InputDevice: Sync {
    /// Called once after every device is resolved and before the first tick.
    fn start(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn tick(&self, outputs: &Outputs<'_>) -> Result<(), DeviceError>;

    fn set_config_mode(&self, _on: bool) {}
}

pub trait OutputDevice: Sync {
    fn start_of_tick(&self);

    /// Publish the pending frame if this cycle produced one. Returns true when published.
    fn finalize(&self) -> bool;

    fn set_config_mode(&self, _on: bool) {}
}

pub trait KeyboardOutput: OutputDevice {
    fn send_keycode(&self, kc: u8);

    fn send_keycodes(&self, kcs: &[u8]) {
        for kc in kcs {
            self.send_keycode(*kc);
        }
    }

    fn send_consumer_keycode(&self, code: u16);

    fn change_active_layers(&self, _layers: &[bool]) {}
}

pub trait MouseOutput: OutputDevice {
    fn mouse_keycode(&self, code: u8);
    fn mouse_movement(&self, dx: i8, dy: i8);
    fn pan(&self, dx: i8, dy: i8);
}

pub trait ScreenOutput: OutputDevice {
    fn set_pixel(&self, row: i32, col: i32, mode: DrawMode);
    fn draw_line(&self, row0: i32, col0: i32, row1: i32, col1: i32, mode: DrawMode);
    fn draw_rect(&self, row0: i32, col0: i32, row1: i32, col1: i32, fill: bool, mode: DrawMode);
    /// Returns the column following the last glyph.
    fn draw_text(&self, row: i32, col: i32, text: &str, font: &Font<'_>, mode: DrawMode) -> i32;
    fn set_active_layers(&self, layers: &[bool]);
}

/// The output devices an input device may drive during its tick.
pub struct Outputs<'a> {
    pub keyboards: &'a [&'static dyn KeyboardOutput],
    pub mice: &'a [&'static dyn MouseOutput],
    pub screens: &'a [&'static dyn ScreenOutput],
    pub primary_keyboard: Option<&'static dyn KeyboardOutput>,
    pub primary_mouse: Option<&'static dyn MouseOutput>,
    pub primary_screen: Option<&'static dyn ScreenOutput>,
}

impl Outputs<'static> {
    pub const fn none() -> Self {
        Self {
            keyboards: &[],
            mice: &[],
            screens: &[],
            primary_keyboard: None,
            primary_mouse: None,
            primary_screen: None,
        }
    }
}

impl Outputs<'_> {
    /// The primary keyboard, else the first registered one.
    pub fn keyboard(&self) -> Option<&'static dyn KeyboardOutput> {
        self.primary_keyboard.or_else(|| self.keyboards.first().copied())
    }

    pub fn mouse(&self) -> Option<&'static dyn MouseOutput> {
        self.primary_mouse.or_else(|| self.mice.first().copied())
    }

    pub fn screen(&self) -> Option<&'static dyn ScreenOutput> {
        self.primary_screen.or_else(|| self.screens.first().copied())
    }
}

/// The consumer half of an output device: moves published frames to hardware.
#[allow(async_fn_in_trait)]
pub trait Drain {
    async fn drain(&mut self) -> Result<(), DeviceError>;
}

/// Drain `device` every `period`, forever. Failed transfers are retried on the next round.
pub async fn drain_loop<D: Drain>(mut device: D, period: Duration) -> ! {
    let mut ticker = Ticker::every(period);
    loop {
        if let Err(err) = device.drain().await {
            crate::debug!("drain failed {:?}", err);
        }
        ticker.next().await;
    }
}
