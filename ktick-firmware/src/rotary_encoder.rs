//! Quadrature rotary encoder polled once per runner cycle.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::digital::InputPin;
use ktick_common::keycodes::consumer;

use crate::config::Configuration;
use crate::device::{DeviceError, InputDevice, Outputs};
use crate::lock::Lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    /// Decode a transition of line A given the level of line B after it.
    ///
    /// | A | B | direction        |
    /// |---|---|------------------|
    /// | 1 | 0 | clockwise        |
    /// | 0 | 1 | clockwise        |
    /// | 1 | 1 | counterclockwise |
    /// | 0 | 0 | counterclockwise |
    pub const fn decode(a: bool, b: bool) -> Self {
        if a != b {
            Self::Clockwise
        } else {
            Self::CounterClockwise
        }
    }
}

/// Receives the steps an encoder produces.
pub trait EncoderHandler: Sync {
    fn on_step(&self, dir: Direction, outputs: &Outputs<'_>);

    /// Steps taken while config mode is on.
    fn on_config_step(&self, _dir: Direction, _outputs: &Outputs<'_>) {}
}

/// Turns the encoder into volume up / volume down on the keyboard output.
pub struct VolumeKnob;

impl EncoderHandler for VolumeKnob {
    fn on_step(&self, dir: Direction, outputs: &Outputs<'_>) {
        let code = match dir {
            Direction::Clockwise => consumer::VOLUME_INCREMENT,
            Direction::CounterClockwise => consumer::VOLUME_DECREMENT,
        };
        if let Some(kb) = outputs.keyboard() {
            kb.send_consumer_keycode(code);
        }
    }
}

struct EncoderState<A, B> {
    pin_a: A,
    pin_b: B,
    last_a: bool,
    pulses: u8,
    dir: Direction,
}

impl<A: InputPin, B: InputPin> EncoderState<A, B> {
    fn sample(&mut self, resolution: u8) -> Result<Option<Direction>, DeviceError> {
        let a = self.pin_a.is_high().map_err(|_| DeviceError::Hardware)?;
        if a == self.last_a {
            return Ok(None);
        }
        self.last_a = a;
        let b = self.pin_b.is_high().map_err(|_| DeviceError::Hardware)?;

        let dir = Direction::decode(a, b);
        if dir != self.dir {
            self.dir = dir;
            self.pulses = 0;
        }
        self.pulses += 1;
        if self.pulses >= resolution {
            self.pulses = 0;
            Ok(Some(dir))
        } else {
            Ok(None)
        }
    }
}

/// Encoder on two input lines. `resolution` transitions of line A in the same direction make one
/// step.
pub struct RotaryEncoder<A, B, H = VolumeKnob> {
    state: Lock<EncoderState<A, B>>,
    resolution: u8,
    handler: H,
    config_mode: AtomicBool,
}

impl<A, B, H> RotaryEncoder<A, B, H>
where
    A: InputPin + Send,
    B: InputPin + Send,
    H: EncoderHandler,
{
    pub fn new(pin_a: A, pin_b: B, resolution: u8, handler: H) -> Self {
        Self {
            state: Lock::new(EncoderState {
                pin_a,
                pin_b,
                last_a: false,
                pulses: 0,
                dir: Direction::Clockwise,
            }),
            resolution: resolution.max(1),
            handler,
            config_mode: AtomicBool::new(false),
        }
    }

    pub fn from_config(pin_a: A, pin_b: B, config: &Configuration<'_>, handler: H) -> Self {
        Self::new(pin_a, pin_b, config.encoder_resolution(), handler)
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<A, B, H> InputDevice for RotaryEncoder<A, B, H>
where
    A: InputPin + Send,
    B: InputPin + Send,
    H: EncoderHandler,
{
    fn start(&self) -> Result<(), DeviceError> {
        self.state.lock(|s| {
            s.last_a = s.pin_a.is_high().map_err(|_| DeviceError::Hardware)?;
            s.pulses = 0;
            Ok(())
        })
    }

    fn tick(&self, outputs: &Outputs<'_>) -> Result<(), DeviceError> {
        let step = self.state.lock(|s| s.sample(self.resolution))?;
        if let Some(dir) = step {
            if self.config_mode.load(Ordering::Relaxed) {
                self.handler.on_config_step(dir, outputs);
            } else {
                self.handler.on_step(dir, outputs);
            }
        }
        Ok(())
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "rotary_encoder_test.rs"]
mod test;
