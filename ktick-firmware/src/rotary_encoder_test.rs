extern crate std;

use std::{format, vec};

use super::*;
use crate::config::{keys, MemoryStore};
use crate::device::KeyboardOutput;
use crate::pin_test_stub::Pin;
use crate::test_devices::{leak, record, take_events, TestKeyboard};

struct ConfigRecorder;

impl EncoderHandler for ConfigRecorder {
    fn on_step(&self, dir: Direction, _outputs: &Outputs<'_>) {
        record(format!("step {:?}", dir));
    }

    fn on_config_step(&self, dir: Direction, _outputs: &Outputs<'_>) {
        record(format!("config {:?}", dir));
    }
}

struct Knob<H> {
    a: Pin,
    b: Pin,
    encoder: RotaryEncoder<Pin, Pin, H>,
    keyboards: [&'static dyn KeyboardOutput; 1],
}

impl<H: EncoderHandler> Knob<H> {
    fn new(resolution: u8, handler: H) -> Self {
        let a = Pin::new(false);
        let b = Pin::new(false);
        let encoder = RotaryEncoder::new(a.clone(), b.clone(), resolution, handler);
        encoder.start().unwrap();
        Self {
            a,
            b,
            encoder,
            keyboards: [leak(TestKeyboard::new("kb"))],
        }
    }

    /// Move the lines to `a`, `b` and run one tick.
    fn set(&self, a: bool, b: bool) {
        self.a.set(a);
        self.b.set(b);
        let outputs = Outputs {
            keyboards: &self.keyboards,
            ..Outputs::none()
        };
        self.encoder.tick(&outputs).unwrap();
    }

    fn clockwise(&self) {
        for (a, b) in [(true, false), (true, true), (false, true), (false, false)] {
            self.set(a, b);
        }
    }

    fn counter_clockwise(&self) {
        for (a, b) in [(false, true), (true, true), (true, false), (false, false)] {
            self.set(a, b);
        }
    }
}

#[test]
fn decode_table() {
    assert_eq!(Direction::decode(true, false), Direction::Clockwise);
    assert_eq!(Direction::decode(false, true), Direction::Clockwise);
    assert_eq!(Direction::decode(true, true), Direction::CounterClockwise);
    assert_eq!(Direction::decode(false, false), Direction::CounterClockwise);
}

#[test]
fn clockwise_volume_up() {
    let knob = Knob::new(2, VolumeKnob);

    knob.set(true, false);
    knob.set(true, true);
    assert!(take_events().is_empty());

    knob.set(false, true);
    assert_eq!(take_events(), vec!["kb.consumer=233"]);

    knob.set(false, false);
    knob.clockwise();
    assert_eq!(take_events(), vec!["kb.consumer=233"]);
}

#[test]
fn counter_clockwise_volume_down() {
    let knob = Knob::new(2, VolumeKnob);

    knob.counter_clockwise();
    knob.counter_clockwise();
    assert_eq!(take_events(), vec!["kb.consumer=234", "kb.consumer=234"]);
}

#[test]
fn direction_change_resets_count() {
    let knob = Knob::new(2, ConfigRecorder);

    // one clockwise pulse, then reverse
    knob.set(true, false);
    knob.set(false, false);
    assert!(take_events().is_empty());

    knob.set(false, true);
    knob.set(true, true);
    assert_eq!(take_events(), vec!["step CounterClockwise"]);
}

#[test]
fn resolution_one_steps_every_transition() {
    let knob = Knob::new(1, ConfigRecorder);

    knob.clockwise();
    assert_eq!(take_events(), vec!["step Clockwise", "step Clockwise"]);
}

#[test]
fn config_mode_routes_to_config_hook() {
    let knob = Knob::new(2, ConfigRecorder);

    knob.encoder.set_config_mode(true);
    knob.clockwise();
    assert_eq!(take_events(), vec!["config Clockwise"]);

    knob.encoder.set_config_mode(false);
    knob.counter_clockwise();
    assert_eq!(take_events(), vec!["step CounterClockwise"]);
}

#[test]
fn config_mode_default_hook_is_silent() {
    let knob = Knob::new(2, VolumeKnob);

    knob.encoder.set_config_mode(true);
    knob.clockwise();
    knob.clockwise();
    assert!(take_events().is_empty());
}

#[test]
fn start_samples_line_a() {
    let a = Pin::new(true);
    let b = Pin::new(false);
    let encoder = RotaryEncoder::new(a.clone(), b.clone(), 1, ConfigRecorder);
    encoder.start().unwrap();

    // A already high: no transition
    encoder.tick(&Outputs::none()).unwrap();
    assert!(take_events().is_empty());

    a.set(false);
    encoder.tick(&Outputs::none()).unwrap();
    assert_eq!(take_events(), vec!["step CounterClockwise"]);
}

#[test]
fn pin_failure() {
    let knob = Knob::new(2, VolumeKnob);

    knob.a.fail(true);
    assert_eq!(
        knob.encoder.tick(&Outputs::none()),
        Err(DeviceError::Hardware)
    );
    assert_eq!(knob.encoder.start(), Err(DeviceError::Hardware));
}

#[test]
fn resolution_from_config() {
    let store = MemoryStore(&[(keys::ENCODER_RESOLUTION, 0)]);
    let config = Configuration::new(&store);
    let encoder = RotaryEncoder::from_config(Pin::new(false), Pin::new(false), &config, VolumeKnob);
    assert_eq!(encoder.resolution(), 1);

    let store = MemoryStore(&[]);
    let config = Configuration::new(&store);
    let encoder = RotaryEncoder::from_config(Pin::new(false), Pin::new(false), &config, VolumeKnob);
    assert_eq!(encoder.resolution(), 2);
}
