extern crate std;

use core::sync::atomic::Ordering;
use std::vec::Vec;

use super::*;
use crate::config::{keys, Configuration, MemoryStore};
use crate::test_devices::{leak, take_events, TestInput, TestKeyboard};

std::thread_local! {
    static SHARED_KB: &'static TestKeyboard = leak(TestKeyboard::new("shared"));
    static FAULTY: &'static TestInput = {
        let input = leak(TestInput::new("faulty", 6));
        input.fail.store(true, Ordering::Relaxed);
        input
    };
}

static STORE: MemoryStore = MemoryStore(&[(keys::TICK_PERIOD_US, 250)]);

fn registry() -> DeviceRegistry<'static, 8> {
    DeviceRegistry::new(Configuration::new(&STORE))
}

fn kb1(_: &Configuration<'_>) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Ok(leak(TestKeyboard::new("kb1")))
}

fn kb2(_: &Configuration<'_>) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Ok(leak(TestKeyboard::new("kb2")))
}

fn shared_kb(_: &Configuration<'_>) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Ok(SHARED_KB.with(|kb| *kb))
}

fn broken_kb(_: &Configuration<'_>) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Err(DeviceError::Hardware)
}

fn key4(_: &Configuration<'_>) -> Result<&'static dyn InputDevice, DeviceError> {
    Ok(leak(TestInput::new("key4", 4)))
}

fn key5(_: &Configuration<'_>) -> Result<&'static dyn InputDevice, DeviceError> {
    Ok(leak(TestInput::new("key5", 5)))
}

fn faulty(_: &Configuration<'_>) -> Result<&'static dyn InputDevice, DeviceError> {
    Ok(FAULTY.with(|i| *i))
}

#[test]
fn cycle_phases_in_order() {
    let mut reg = registry();
    reg.register_keyboard_output(1, true, kb1).unwrap();
    reg.register_input_device(1, key4).unwrap();
    let runner = Runner::<4>::init(&reg).unwrap();
    assert_eq!(runner.period(), Duration::from_micros(250));

    assert_eq!(runner.tick(), 1);
    assert_eq!(
        take_events(),
        ["kb1.start", "key4.tick", "kb1.kc=4", "kb1.finalize=true"]
    );
}

#[test]
fn faulting_input_does_not_stop_the_cycle() {
    let mut reg = registry();
    reg.register_keyboard_output(1, true, kb1).unwrap();
    reg.register_input_device(1, faulty).unwrap();
    reg.register_input_device(2, key5).unwrap();
    let runner = Runner::<4>::init(&reg).unwrap();

    assert_eq!(runner.tick(), 1);
    assert_eq!(
        take_events(),
        [
            "kb1.start",
            "faulty.tick",
            "key5.tick",
            "kb1.kc=5",
            "kb1.finalize=true"
        ]
    );
}

#[test]
fn idle_cycle_publishes_nothing() {
    let mut reg = registry();
    reg.register_keyboard_output(1, true, kb1).unwrap();
    let runner = Runner::<4>::init(&reg).unwrap();

    assert_eq!(runner.tick(), 0);
    assert_eq!(take_events(), ["kb1.start", "kb1.finalize=false"]);
}

#[test]
fn inputs_target_the_primary_keyboard() {
    let mut reg = registry();
    reg.register_keyboard_output(1, false, kb1).unwrap();
    reg.register_keyboard_output(2, true, kb2).unwrap();
    reg.register_input_device(1, key4).unwrap();
    let runner = Runner::<4>::init(&reg).unwrap();

    runner.tick();
    let events = take_events();
    assert!(events.iter().any(|e| e == "kb2.kc=4"));
    assert!(!events.iter().any(|e| e == "kb1.kc=4"));
}

#[test]
fn shared_instance_cycles_once() {
    let mut reg = registry();
    reg.register_keyboard_output(1, true, shared_kb).unwrap();
    reg.register_keyboard_output(2, false, shared_kb).unwrap();
    let runner = Runner::<4>::init(&reg).unwrap();

    runner.tick();
    let starts: Vec<_> = take_events()
        .into_iter()
        .filter(|e| e == "shared.start")
        .collect();
    assert_eq!(starts.len(), 1);
}

#[test]
fn start_hooks_run_in_registration_order() {
    let mut reg = registry();
    reg.register_input_device(2, key5).unwrap();
    reg.register_input_device(1, key4).unwrap();
    let mut runner = Runner::<4>::init(&reg).unwrap();

    runner.start().unwrap();
    assert_eq!(take_events(), ["key5.begin", "key4.begin"]);
}

#[test]
fn config_mode_broadcast() {
    let mut reg = registry();
    reg.register_keyboard_output(1, true, shared_kb).unwrap();
    reg.register_input_device(1, faulty).unwrap();
    let mut runner = Runner::<4>::init(&reg).unwrap();
    let kb = SHARED_KB.with(|kb| *kb);
    let input = FAULTY.with(|i| *i);

    let switch = ConfigModeSwitch::new();
    switch.toggle();
    runner.set_config_mode(switch.get());
    assert!(runner.config_mode());
    assert!(kb.config_mode.load(Ordering::Relaxed));
    assert!(input.config_mode.load(Ordering::Relaxed));

    switch.toggle();
    runner.set_config_mode(switch.get());
    assert!(!kb.config_mode.load(Ordering::Relaxed));
    assert!(!input.config_mode.load(Ordering::Relaxed));
}

#[test]
fn startup_failures() {
    let mut reg = registry();
    reg.register_keyboard_output(4, true, broken_kb).unwrap();
    assert_eq!(
        Runner::<4>::init(&reg).err(),
        Some(StartupError::Resolve {
            tag: 4,
            category: Category::KeyboardOutput,
            error: ResolveError::Device(DeviceError::Hardware),
        })
    );

    let mut reg = registry();
    reg.register_input_device(1, key4).unwrap();
    reg.register_input_device(2, key5).unwrap();
    assert_eq!(Runner::<1>::init(&reg).err(), Some(StartupError::Capacity));
}

#[test]
fn run_applies_switch_and_ticks() {
    crate::time_driver_test_stub::set_time(1_000);
    let mut reg = registry();
    reg.register_keyboard_output(1, true, kb1).unwrap();
    reg.register_input_device(1, key4).unwrap();
    let mut runner = Runner::<4>::init(&reg).unwrap();
    let switch = ConfigModeSwitch::new();
    switch.set(true);

    embassy_futures::block_on(embassy_futures::select::select(
        runner.run(&switch),
        embassy_time::Timer::at(embassy_time::Instant::from_micros(2_000)),
    ));

    assert!(runner.config_mode());
    let ticks = take_events()
        .into_iter()
        .filter(|e| e == "key4.tick")
        .count();
    assert!(ticks >= 4, "ticks {}", ticks);
}
