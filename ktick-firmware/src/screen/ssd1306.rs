//! SSD1306 status display over I²C.
//!
//! [Ssd1306Display] is the registered output device and only touches its double buffer.
//! [Ssd1306] owns the bus, drains published frames to the panel and runs the idle sleep timer.
//! [Ssd1306Slot] hands the bus over and sets the panel up when the display is first resolved.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::once_lock::OnceLock;
use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c as BlockingI2c;
use embedded_hal_async::i2c::{I2c, Operation};

use super::{Bitmap, DrawMode, Font, PanelRows, COLUMNS};
use crate::config::Configuration;
use crate::device::{DeviceError, Drain, KeyboardOutput, OutputDevice, ScreenOutput};
use crate::double_buffer::SharedBuffer;
use crate::lock::Lock;

pub const I2C_FREQUENCY_HZ: u32 = 400_000;

#[allow(dead_code)]
mod cmd {
    pub const MEMORY_MODE: u8 = 0x20;
    pub const COLUMN_ADDR: u8 = 0x21;
    pub const PAGE_ADDR: u8 = 0x22;
    pub const START_LINE: u8 = 0x40;
    pub const CONTRAST: u8 = 0x81;
    pub const CHARGE_PUMP: u8 = 0x8d;
    pub const SEG_REMAP: u8 = 0xa0;
    pub const DISPLAY_ALL_ON_RESUME: u8 = 0xa4;
    pub const NORMAL_DISPLAY: u8 = 0xa6;
    pub const INVERT_DISPLAY: u8 = 0xa7;
    pub const MULTIPLEX: u8 = 0xa8;
    pub const DISPLAY_OFF: u8 = 0xae;
    pub const DISPLAY_ON: u8 = 0xaf;
    pub const COM_SCAN_INC: u8 = 0xc0;
    pub const COM_SCAN_DEC: u8 = 0xc8;
    pub const DISPLAY_OFFSET: u8 = 0xd3;
    pub const CLOCK_DIV: u8 = 0xd5;
    pub const PRECHARGE: u8 = 0xd9;
    pub const COM_PINS: u8 = 0xda;
    pub const VCOM_DETECT: u8 = 0xdb;
}

/// Control byte prefixes.
const COMMAND: u8 = 0x00;
const DATA: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    Awake,
    Asleep,
}

pub struct Ssd1306Display {
    buffer: SharedBuffer<Bitmap>,
    rows: PanelRows,
    config_mode: AtomicBool,
}

impl Ssd1306Display {
    pub fn new(rows: PanelRows) -> Self {
        Self {
            buffer: SharedBuffer::new(Bitmap::new(rows)),
            rows,
            config_mode: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &Configuration<'_>) -> Result<Self, DeviceError> {
        Ok(Self::new(PanelRows::from_rows(config.display_rows())?))
    }

    pub fn rows(&self) -> PanelRows {
        self.rows
    }

    pub fn buffer(&self) -> &SharedBuffer<Bitmap> {
        &self.buffer
    }

    pub fn is_config_mode(&self) -> bool {
        self.config_mode.load(Ordering::Relaxed)
    }
}

impl OutputDevice for Ssd1306Display {
    fn start_of_tick(&self) {
        self.buffer.start_tick();
    }

    fn finalize(&self) -> bool {
        self.buffer.publish()
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}

impl ScreenOutput for Ssd1306Display {
    fn set_pixel(&self, row: i32, col: i32, mode: DrawMode) {
        self.buffer.update(|bm| bm.set_pixel(row, col, mode));
    }

    fn draw_line(&self, row0: i32, col0: i32, row1: i32, col1: i32, mode: DrawMode) {
        self.buffer.update(|bm| bm.draw_line(row0, col0, row1, col1, mode));
    }

    fn draw_rect(&self, row0: i32, col0: i32, row1: i32, col1: i32, fill: bool, mode: DrawMode) {
        self.buffer
            .update(|bm| bm.draw_rect(row0, col0, row1, col1, fill, mode));
    }

    fn draw_text(&self, row: i32, col: i32, text: &str, font: &Font<'_>, mode: DrawMode) -> i32 {
        self.buffer.update(|bm| bm.draw_text(row, col, text, font, mode))
    }

    fn set_active_layers(&self, layers: &[bool]) {
        self.buffer.update(|bm| bm.set_active_layers(layers));
    }
}

/// The display listens to the keyboard stream for layer changes only.
impl KeyboardOutput for Ssd1306Display {
    fn send_keycode(&self, _kc: u8) {}

    fn send_consumer_keycode(&self, _code: u16) {}

    fn change_active_layers(&self, layers: &[bool]) {
        self.set_active_layers(layers);
    }
}

pub struct Ssd1306<'d, I2C> {
    i2c: I2C,
    address: u8,
    display: &'d Ssd1306Display,
    flip: bool,
    sleep_after: Duration,
    last_transfer: Instant,
    power: PowerState,
    scratch: Bitmap,
}

impl<'d, I2C> Ssd1306<'d, I2C> {
    pub fn new(i2c: I2C, display: &'d Ssd1306Display, config: &Configuration<'_>) -> Self {
        Self {
            i2c,
            address: config.display_address(),
            display,
            flip: config.display_flip(),
            sleep_after: config.display_sleep(),
            last_transfer: Instant::from_ticks(0),
            power: PowerState::Asleep,
            scratch: Bitmap::new(display.rows()),
        }
    }

    pub fn power(&self) -> PowerState {
        self.power
    }
}

/// `(control byte + command, length)` for one command write.
fn command_frame(bytes: &[u8]) -> ([u8; 4], usize) {
    let mut buf = [COMMAND; 4];
    let len = bytes.len().min(3);
    buf[1..=len].copy_from_slice(&bytes[..len]);
    (buf, len + 1)
}

/// Panel setup runs once, while the display is being resolved at startup, so it uses the
/// blocking bus.
impl<I2C: BlockingI2c> Ssd1306<'_, I2C> {
    pub fn init(&mut self) -> Result<(), DeviceError> {
        self.init_at(Instant::now())
    }

    /// Send the panel setup sequence and switch the panel on. The sleep timer starts at `now`.
    pub fn init_at(&mut self, now: Instant) -> Result<(), DeviceError> {
        let rows = self.display.rows();
        let (seg_remap, com_scan) = if self.flip {
            (cmd::SEG_REMAP, cmd::COM_SCAN_INC)
        } else {
            (cmd::SEG_REMAP | 1, cmd::COM_SCAN_DEC)
        };
        let com_pins = match rows {
            PanelRows::R32 => 0x02,
            PanelRows::R64 => 0x12,
        };
        let sequence: [&[u8]; 16] = [
            &[cmd::DISPLAY_OFF],
            &[cmd::MEMORY_MODE, 0x00],
            &[cmd::START_LINE],
            &[seg_remap],
            &[cmd::MULTIPLEX, rows.rows() as u8 - 1],
            &[com_scan],
            &[cmd::DISPLAY_OFFSET, 0x00],
            &[cmd::COM_PINS, com_pins],
            &[cmd::CLOCK_DIV, 0x80],
            &[cmd::PRECHARGE, 0xf1],
            &[cmd::VCOM_DETECT, 0x30],
            &[cmd::CONTRAST, 0xff],
            &[cmd::DISPLAY_ALL_ON_RESUME],
            &[cmd::NORMAL_DISPLAY],
            &[cmd::CHARGE_PUMP, 0x14],
            &[cmd::DISPLAY_ON],
        ];
        for c in sequence {
            let (buf, len) = command_frame(c);
            self.i2c.write(self.address, &buf[..len]).map_err(|_| {
                crate::warn!("display init failed at {:x}", c[0]);
                DeviceError::Hardware
            })?;
        }
        self.power = PowerState::Awake;
        self.last_transfer = now;
        Ok(())
    }
}

impl<I2C: I2c> Ssd1306<'_, I2C> {
    /// Send the latest published frame if there is one; otherwise switch the panel off once it
    /// has been idle for the sleep period.
    pub async fn drain_at(&mut self, now: Instant) -> Result<(), DeviceError> {
        if !self.display.buffer.take_into(&mut self.scratch) {
            if self.power == PowerState::Awake
                && self.sleep_after.as_ticks() != 0
                && now.saturating_duration_since(self.last_transfer) >= self.sleep_after
            {
                self.command(&[cmd::DISPLAY_OFF])
                    .await
                    .map_err(|_| DeviceError::Hardware)?;
                self.power = PowerState::Asleep;
                crate::debug!("display asleep");
            }
            return Ok(());
        }

        match self.transfer().await {
            Ok(()) => {
                if self.power == PowerState::Asleep {
                    crate::debug!("display awake");
                }
                self.power = PowerState::Awake;
                self.last_transfer = now;
                Ok(())
            }
            Err(_) => {
                self.display.buffer.retry();
                Err(DeviceError::Busy)
            }
        }
    }

    async fn transfer(&mut self) -> Result<(), I2C::Error> {
        if self.power == PowerState::Asleep {
            self.command(&[cmd::DISPLAY_ON]).await?;
        }
        let last_page = self.scratch.rows().pages() as u8 - 1;
        self.command(&[cmd::PAGE_ADDR, 0, last_page]).await?;
        self.command(&[cmd::COLUMN_ADDR, 0, COLUMNS as u8 - 1]).await?;
        self.i2c
            .transaction(
                self.address,
                &mut [
                    Operation::Write(&[DATA]),
                    Operation::Write(self.scratch.as_bytes()),
                ],
            )
            .await
    }

    async fn command(&mut self, bytes: &[u8]) -> Result<(), I2C::Error> {
        let (buf, len) = command_frame(bytes);
        self.i2c.write(self.address, &buf[..len]).await
    }
}

/// Where the board parks the panel bus until the display is first resolved.
///
/// The first [Ssd1306Slot::resolve] takes the bus, builds the shared [Ssd1306Display] and
/// initializes the panel. The outcome is kept: a failed init is reported to every later resolver
/// and never retried. The initialized driver waits in the slot for the display task.
pub struct Ssd1306Slot<I2C> {
    bus: Lock<Option<I2C>>,
    display: OnceLock<Ssd1306Display>,
    ready: OnceLock<Result<(), DeviceError>>,
    driver: Lock<Option<Ssd1306<'static, I2C>>>,
}

impl<I2C> Default for Ssd1306Slot<I2C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I2C> Ssd1306Slot<I2C> {
    pub const fn new() -> Self {
        Self {
            bus: Lock::new(None),
            display: OnceLock::new(),
            ready: OnceLock::new(),
            driver: Lock::new(None),
        }
    }

    pub fn provide_bus(&self, i2c: I2C) {
        self.bus.lock(|bus| *bus = Some(i2c));
    }

    /// The display, once resolved successfully.
    pub fn display(&self) -> Option<&Ssd1306Display> {
        match self.ready.try_get() {
            Some(Ok(())) => self.display.try_get(),
            _ => None,
        }
    }

    pub fn take_driver(&self) -> Option<Ssd1306<'static, I2C>> {
        self.driver.lock(|d| d.take())
    }
}

impl<I2C: BlockingI2c> Ssd1306Slot<I2C> {
    pub fn resolve(
        &'static self,
        config: &Configuration<'_>,
    ) -> Result<&'static Ssd1306Display, DeviceError> {
        let rows = PanelRows::from_rows(config.display_rows())?;
        let display = self.display.get_or_init(|| Ssd1306Display::new(rows));
        (*self.ready.get_or_init(|| self.bring_up(display, config)))?;
        Ok(display)
    }

    fn bring_up(
        &self,
        display: &'static Ssd1306Display,
        config: &Configuration<'_>,
    ) -> Result<(), DeviceError> {
        let i2c = self
            .bus
            .lock(|bus| bus.take())
            .ok_or(DeviceError::Unavailable)?;
        let mut driver = Ssd1306::new(i2c, display, config);
        driver.init()?;
        crate::info!("display ready");
        self.driver.lock(|d| *d = Some(driver));
        Ok(())
    }
}

impl<I2C: I2c> Drain for Ssd1306<'_, I2C> {
    async fn drain(&mut self) -> Result<(), DeviceError> {
        self.drain_at(Instant::now()).await
    }
}

#[cfg(test)]
#[path = "ssd1306_test.rs"]
mod test;
