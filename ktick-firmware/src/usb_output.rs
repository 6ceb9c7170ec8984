//! HID keyboard and mouse output devices.
//!
//! Each device keeps its frame in a [SharedBuffer]; the frame is rebuilt every cycle from what
//! the input devices report and published only when it differs from what the host last saw.
//! A frame still waiting for its reporter when the next one is published is merged into it, so
//! presses and motion lasting a single cycle are not lost. The matching reporter drains
//! published frames to the interrupt endpoints.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_usb::driver::Driver;
use ktick_common::keycodes::{self, key_range};

use crate::device::{DeviceError, Drain, KeyboardOutput, MouseOutput, OutputDevice};
use crate::double_buffer::SharedBuffer;
use crate::hid::HidWriter;
use crate::usb::{
    HidProtocol, CONSUMER_REPORT_SIZE, KEYBOARD_BITMAP_OFFSET, KEYBOARD_BOOT_REPORT_SIZE,
    KEYBOARD_REPORT_SIZE, MOUSE_BOOT_REPORT_SIZE, MOUSE_REPORT_SIZE,
};

const BOOT_KEYS: core::ops::Range<usize> = 2..KEYBOARD_BOOT_REPORT_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardFrame {
    report: [u8; KEYBOARD_REPORT_SIZE],
    consumer: u16,
    boot: bool,
}

impl Default for KeyboardFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardFrame {
    pub const fn new() -> Self {
        Self {
            report: [0; KEYBOARD_REPORT_SIZE],
            consumer: 0,
            boot: false,
        }
    }

    pub fn clear(&mut self, boot: bool) {
        self.report.fill(0);
        self.consumer = 0;
        self.boot = boot;
    }

    /// Record `kc` as down in both the boot region and the bitmap. Returns false when the key
    /// could not be placed in the boot region.
    pub fn add_keycode(&mut self, kc: u8) -> bool {
        if kc < key_range::BASIC_MIN {
            return false;
        }
        if !crate::add_bit(&mut self.report[KEYBOARD_BITMAP_OFFSET..], kc) {
            // already down
            return true;
        }
        if keycodes::is_modifier(kc) {
            self.report[0] |= keycodes::modifier_bit(kc);
            return true;
        }
        match self.report[BOOT_KEYS].iter_mut().find(|slot| **slot == 0) {
            Some(slot) => {
                *slot = kc;
                true
            }
            None => {
                crate::debug!("boot rollover full, {} only in bitmap", kc);
                false
            }
        }
    }

    /// Fold the keys and consumer code of a frame the host has not received yet into this one,
    /// so a press lasting a single cycle still reaches the host.
    pub fn merge_unsent(&mut self, unsent: &KeyboardFrame) {
        for kc in key_range::BASIC_MIN..=u8::MAX {
            if unsent.is_down(kc) {
                self.add_keycode(kc);
            }
        }
        if self.consumer == 0 {
            self.consumer = unsent.consumer;
        }
    }

    pub fn set_consumer(&mut self, code: u16) {
        self.consumer = code;
    }

    pub fn consumer(&self) -> u16 {
        self.consumer
    }

    pub fn is_boot(&self) -> bool {
        self.boot
    }

    pub fn is_down(&self, kc: u8) -> bool {
        self.report[KEYBOARD_BITMAP_OFFSET + (kc >> 3) as usize] & (1 << (kc & 7)) != 0
    }

    pub fn boot_report(&self) -> &[u8] {
        &self.report[..KEYBOARD_BOOT_REPORT_SIZE]
    }

    /// The bytes for the keyboard endpoint in the current protocol.
    pub fn report(&self) -> &[u8] {
        if self.boot {
            self.boot_report()
        } else {
            &self.report
        }
    }
}

pub struct UsbKeyboardOutput {
    buffer: SharedBuffer<KeyboardFrame>,
    protocol: &'static HidProtocol,
    config_mode: AtomicBool,
}

impl UsbKeyboardOutput {
    pub fn new(protocol: &'static HidProtocol) -> Self {
        Self {
            buffer: SharedBuffer::new(KeyboardFrame::new()),
            protocol,
            config_mode: AtomicBool::new(false),
        }
    }

    pub fn buffer(&self) -> &SharedBuffer<KeyboardFrame> {
        &self.buffer
    }

    fn is_config_mode(&self) -> bool {
        self.config_mode.load(Ordering::Relaxed)
    }
}

impl OutputDevice for UsbKeyboardOutput {
    fn start_of_tick(&self) {
        let boot = self.protocol.is_boot();
        self.buffer.start_tick();
        self.buffer.rebuild(|f| f.clear(boot));
    }

    fn finalize(&self) -> bool {
        self.buffer
            .publish_merged(KeyboardFrame::merge_unsent, |pending, active| pending != active)
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}

/// While in config mode key events drive configuration and are not sent to the host.
impl KeyboardOutput for UsbKeyboardOutput {
    fn send_keycode(&self, kc: u8) {
        if !self.is_config_mode() {
            self.buffer.update(|f| f.add_keycode(kc));
        }
    }

    fn send_consumer_keycode(&self, code: u16) {
        if !self.is_config_mode() {
            self.buffer.update(|f| f.set_consumer(code));
        }
    }
}

pub struct KeyboardReporter<'d, D: Driver<'d>> {
    keyboard: HidWriter<'d, D, KEYBOARD_REPORT_SIZE>,
    consumer: HidWriter<'d, D, CONSUMER_REPORT_SIZE>,
    device: &'d UsbKeyboardOutput,
    scratch: KeyboardFrame,
    last_consumer: u16,
}

impl<'d, D: Driver<'d>> KeyboardReporter<'d, D> {
    pub fn new(
        keyboard: HidWriter<'d, D, KEYBOARD_REPORT_SIZE>,
        consumer: HidWriter<'d, D, CONSUMER_REPORT_SIZE>,
        device: &'d UsbKeyboardOutput,
    ) -> Self {
        Self {
            keyboard,
            consumer,
            device,
            scratch: KeyboardFrame::new(),
            last_consumer: 0,
        }
    }
}

impl<'d, D: Driver<'d>> Drain for KeyboardReporter<'d, D> {
    async fn drain(&mut self) -> Result<(), DeviceError> {
        if !self.device.buffer.take_into(&mut self.scratch) {
            return Ok(());
        }
        if self.keyboard.write(self.scratch.report()).await.is_err() {
            self.device.buffer.retry();
            return Err(DeviceError::Busy);
        }
        let consumer = self.scratch.consumer();
        if consumer != self.last_consumer {
            if self.consumer.write(&consumer.to_le_bytes()).await.is_err() {
                self.device.buffer.retry();
                return Err(DeviceError::Busy);
            }
            self.last_consumer = consumer;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MouseFrame {
    buttons: u8,
    x: i8,
    y: i8,
    wheel: i8,
    pan: i8,
    boot: bool,
}

impl MouseFrame {
    pub const fn new() -> Self {
        Self {
            buttons: 0,
            x: 0,
            y: 0,
            wheel: 0,
            pan: 0,
            boot: false,
        }
    }

    pub fn clear(&mut self, boot: bool) {
        *self = Self { boot, ..Self::new() };
    }

    pub fn press(&mut self, code: u8) {
        match keycodes::mouse_button_bit(code) {
            Some(bit) => self.buttons |= bit,
            None => crate::debug!("no mouse button {}", code),
        }
    }

    pub fn move_by(&mut self, dx: i8, dy: i8) {
        self.x = self.x.saturating_add(dx);
        self.y = self.y.saturating_add(dy);
    }

    /// Horizontal pan and vertical wheel.
    pub fn scroll_by(&mut self, dx: i8, dy: i8) {
        self.pan = self.pan.saturating_add(dx);
        self.wheel = self.wheel.saturating_add(dy);
    }

    /// Add the motion and buttons of a frame the host has not received yet.
    pub fn merge_unsent(&mut self, unsent: &MouseFrame) {
        self.buttons |= unsent.buttons;
        self.move_by(unsent.x, unsent.y);
        self.scroll_by(unsent.pan, unsent.wheel);
    }

    pub fn has_motion(&self) -> bool {
        self.x != 0 || self.y != 0 || self.wheel != 0 || self.pan != 0
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// Writes the report for the current protocol into `buf` and returns its length.
    pub fn write_report(&self, buf: &mut [u8; MOUSE_REPORT_SIZE]) -> usize {
        *buf = [
            self.buttons,
            self.x as u8,
            self.y as u8,
            self.wheel as u8,
            self.pan as u8,
        ];
        if self.boot {
            MOUSE_BOOT_REPORT_SIZE
        } else {
            MOUSE_REPORT_SIZE
        }
    }
}

pub struct UsbMouseOutput {
    buffer: SharedBuffer<MouseFrame>,
    protocol: &'static HidProtocol,
    config_mode: AtomicBool,
}

impl UsbMouseOutput {
    pub fn new(protocol: &'static HidProtocol) -> Self {
        Self {
            buffer: SharedBuffer::new(MouseFrame::new()),
            protocol,
            config_mode: AtomicBool::new(false),
        }
    }

    pub fn buffer(&self) -> &SharedBuffer<MouseFrame> {
        &self.buffer
    }

    fn update(&self, f: impl FnOnce(&mut MouseFrame)) {
        if !self.config_mode.load(Ordering::Relaxed) {
            self.buffer.update(f);
        }
    }
}

impl OutputDevice for UsbMouseOutput {
    fn start_of_tick(&self) {
        let boot = self.protocol.is_boot();
        self.buffer.start_tick();
        self.buffer.rebuild(|f| f.clear(boot));
    }

    /// Movement is relative so any motion is sent even when it repeats the last frame.
    fn finalize(&self) -> bool {
        self.buffer.publish_merged(MouseFrame::merge_unsent, |pending, active| {
            pending != active || pending.has_motion()
        })
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}

impl MouseOutput for UsbMouseOutput {
    fn mouse_keycode(&self, code: u8) {
        self.update(|f| f.press(code));
    }

    fn mouse_movement(&self, dx: i8, dy: i8) {
        self.update(|f| f.move_by(dx, dy));
    }

    fn pan(&self, dx: i8, dy: i8) {
        self.update(|f| f.scroll_by(dx, dy));
    }
}

pub struct MouseReporter<'d, D: Driver<'d>> {
    writer: HidWriter<'d, D, MOUSE_REPORT_SIZE>,
    device: &'d UsbMouseOutput,
    scratch: MouseFrame,
}

impl<'d, D: Driver<'d>> MouseReporter<'d, D> {
    pub fn new(writer: HidWriter<'d, D, MOUSE_REPORT_SIZE>, device: &'d UsbMouseOutput) -> Self {
        Self {
            writer,
            device,
            scratch: MouseFrame::new(),
        }
    }
}

impl<'d, D: Driver<'d>> Drain for MouseReporter<'d, D> {
    async fn drain(&mut self) -> Result<(), DeviceError> {
        if !self.device.buffer.take_into(&mut self.scratch) {
            return Ok(());
        }
        let mut buf = [0; MOUSE_REPORT_SIZE];
        let len = self.scratch.write_report(&mut buf);
        self.writer.write(&buf[..len]).await.map_err(|_| {
            self.device.buffer.retry();
            DeviceError::Busy
        })
    }
}

#[cfg(test)]
#[path = "usb_output_test.rs"]
mod test;
