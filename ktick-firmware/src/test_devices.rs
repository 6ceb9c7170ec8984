//! Recording devices for host tests.

extern crate std;

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::{boxed::Box, format, string::String, vec::Vec};

use crate::device::{DeviceError, InputDevice, KeyboardOutput, OutputDevice, Outputs};

std::thread_local! {
    static EVENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn record(event: String) {
    EVENTS.with_borrow_mut(|e| e.push(event));
}

pub fn take_events() -> Vec<String> {
    EVENTS.with_borrow_mut(core::mem::take)
}

pub fn leak<T>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

pub struct TestKeyboard {
    pub name: &'static str,
    dirty: AtomicBool,
    pub config_mode: AtomicBool,
}

impl TestKeyboard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            dirty: AtomicBool::new(false),
            config_mode: AtomicBool::new(false),
        }
    }
}

impl OutputDevice for TestKeyboard {
    fn start_of_tick(&self) {
        self.dirty.store(false, Ordering::Relaxed);
        record(format!("{}.start", self.name));
    }

    fn finalize(&self) -> bool {
        let published = self.dirty.swap(false, Ordering::Relaxed);
        record(format!("{}.finalize={}", self.name, published));
        published
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}

impl KeyboardOutput for TestKeyboard {
    fn send_keycode(&self, kc: u8) {
        self.dirty.store(true, Ordering::Relaxed);
        record(format!("{}.kc={}", self.name, kc));
    }

    fn send_consumer_keycode(&self, code: u16) {
        self.dirty.store(true, Ordering::Relaxed);
        record(format!("{}.consumer={}", self.name, code));
    }
}

pub struct TestInput {
    pub name: &'static str,
    pub keycode: AtomicU8,
    pub fail: AtomicBool,
    pub config_mode: AtomicBool,
}

impl TestInput {
    pub fn new(name: &'static str, keycode: u8) -> Self {
        Self {
            name,
            keycode: AtomicU8::new(keycode),
            fail: AtomicBool::new(false),
            config_mode: AtomicBool::new(false),
        }
    }
}

impl InputDevice for TestInput {
    fn start(&self) -> Result<(), DeviceError> {
        record(format!("{}.begin", self.name));
        Ok(())
    }

    fn tick(&self, outputs: &Outputs<'_>) -> Result<(), DeviceError> {
        record(format!("{}.tick", self.name));
        if self.fail.load(Ordering::Relaxed) {
            return Err(DeviceError::Hardware);
        }
        let kc = self.keycode.load(Ordering::Relaxed);
        if kc != 0 {
            if let Some(kb) = outputs.keyboard() {
                kb.send_keycode(kc);
            }
        }
        Ok(())
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}
