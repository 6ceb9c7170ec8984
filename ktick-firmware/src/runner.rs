//! The fixed-rate producer: one cycle snapshots every input device and publishes one frame per
//! output device.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_time::{Duration, Ticker};

use crate::device::{
    Category, DeviceError, InputDevice, KeyboardOutput, MouseOutput, OutputDevice, Outputs,
    ScreenOutput, Tag,
};
use crate::registry::{DeviceRef, DeviceRegistry, ResolveError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StartupError {
    Resolve {
        tag: Tag,
        category: Category,
        error: ResolveError,
    },
    Start {
        tag: Tag,
        error: DeviceError,
    },
    /// More devices are registered than the runner can hold.
    Capacity,
}

/// Config mode request shared between the runner and any other task. The runner applies a
/// change at the next cycle boundary.
pub struct ConfigModeSwitch(AtomicBool);

impl ConfigModeSwitch {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::Relaxed);
    }

    pub fn toggle(&self) {
        self.set(!self.get());
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ConfigModeSwitch {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Runner<const N: usize> {
    inputs: heapless::Vec<(Tag, &'static dyn InputDevice), N>,
    outputs: heapless::Vec<&'static dyn OutputDevice, N>,
    keyboards: heapless::Vec<&'static dyn KeyboardOutput, N>,
    mice: heapless::Vec<&'static dyn MouseOutput, N>,
    screens: heapless::Vec<&'static dyn ScreenOutput, N>,
    primary_keyboard: Option<&'static dyn KeyboardOutput>,
    primary_mouse: Option<&'static dyn MouseOutput>,
    primary_screen: Option<&'static dyn ScreenOutput>,
    period: Duration,
    config_mode: bool,
}

impl<const N: usize> Runner<N> {
    /// Resolve every registered device in registration order.
    pub fn init<const R: usize>(registry: &DeviceRegistry<'_, R>) -> Result<Self, StartupError> {
        let mut runner = Self {
            inputs: heapless::Vec::new(),
            outputs: heapless::Vec::new(),
            keyboards: heapless::Vec::new(),
            mice: heapless::Vec::new(),
            screens: heapless::Vec::new(),
            primary_keyboard: None,
            primary_mouse: None,
            primary_screen: None,
            period: registry.config().tick_period(),
            config_mode: false,
        };

        for entry in registry.entries() {
            let device = registry
                .resolve(entry.tag, entry.category)
                .map_err(|error| StartupError::Resolve {
                    tag: entry.tag,
                    category: entry.category,
                    error,
                })?;
            runner.add(entry.tag, entry.is_primary, device)?;
        }

        crate::info!(
            "runner: {} inputs, {} outputs",
            runner.inputs.len(),
            runner.outputs.len()
        );
        Ok(runner)
    }

    fn add(&mut self, tag: Tag, is_primary: bool, device: DeviceRef) -> Result<(), StartupError> {
        const FULL: StartupError = StartupError::Capacity;
        match device {
            DeviceRef::Input(d) => self.inputs.push((tag, d)).map_err(|_| FULL)?,
            DeviceRef::Keyboard(d) => {
                self.keyboards.push(d).map_err(|_| FULL)?;
                if is_primary && self.primary_keyboard.is_none() {
                    self.primary_keyboard = Some(d);
                }
            }
            DeviceRef::Mouse(d) => {
                self.mice.push(d).map_err(|_| FULL)?;
                if is_primary && self.primary_mouse.is_none() {
                    self.primary_mouse = Some(d);
                }
            }
            DeviceRef::Screen(d) => {
                self.screens.push(d).map_err(|_| FULL)?;
                if is_primary && self.primary_screen.is_none() {
                    self.primary_screen = Some(d);
                }
            }
        }

        // one device may be registered under several categories; it still gets one cycle
        if let Some(out) = device.as_output() {
            let known = self
                .outputs
                .iter()
                .any(|o| core::ptr::addr_eq(*o as *const dyn OutputDevice, out));
            if !known {
                self.outputs.push(out).map_err(|_| FULL)?;
            }
        }
        Ok(())
    }

    /// Run every input device's start hook.
    pub fn start(&mut self) -> Result<(), StartupError> {
        for (tag, input) in self.inputs.iter() {
            input.start().map_err(|error| StartupError::Start { tag: *tag, error })?;
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    pub fn config_mode(&self) -> bool {
        self.config_mode
    }

    pub fn set_config_mode(&mut self, on: bool) {
        if on == self.config_mode {
            return;
        }
        crate::info!("config mode {}", on);
        self.config_mode = on;
        for (_, input) in self.inputs.iter() {
            input.set_config_mode(on);
        }
        for output in self.outputs.iter() {
            output.set_config_mode(on);
        }
    }

    pub fn outputs(&self) -> Outputs<'_> {
        Outputs {
            keyboards: &self.keyboards,
            mice: &self.mice,
            screens: &self.screens,
            primary_keyboard: self.primary_keyboard,
            primary_mouse: self.primary_mouse,
            primary_screen: self.primary_screen,
        }
    }

    /// One cycle. Returns the number of output devices that published a frame.
    pub fn tick(&self) -> usize {
        for output in self.outputs.iter() {
            output.start_of_tick();
        }

        let outputs = self.outputs();
        for (tag, input) in self.inputs.iter() {
            if let Err(err) = input.tick(&outputs) {
                crate::warn!("input {} tick failed: {:?}", tag, err);
            }
        }

        self.outputs.iter().filter(|o| o.finalize()).count()
    }

    /// Tick forever at the configured period, applying config mode changes between cycles.
    pub async fn run(&mut self, switch: &ConfigModeSwitch) -> ! {
        let mut ticker = Ticker::every(self.period);
        loop {
            self.set_config_mode(switch.get());
            self.tick();
            ticker.next().await;
        }
    }
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod test;
