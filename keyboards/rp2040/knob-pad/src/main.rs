#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m_rt::entry;
use embassy_executor::{Executor, InterruptExecutor};
use embassy_sync::once_lock::OnceLock;
use embassy_time::Duration;
use ktick_builder::{
    boot::boot_or_halt,
    config::{Configuration, RecordStore},
    device::{
        drain_loop, DeviceError, InputDevice, KeyboardOutput, MouseOutput, Outputs, ScreenOutput,
    },
    firmware_functions::{self, FatalReason},
    lock::Lock,
    registry::DeviceRegistry,
    rotary_encoder::{RotaryEncoder, VolumeKnob},
    runner::{ConfigModeSwitch, Runner},
    screen::{
        font::FONT_5X8,
        ssd1306::{Ssd1306, Ssd1306Slot},
        DrawMode, COLUMNS,
    },
    usb::{LedState, UsbBuffers},
    usb_device::{ConfigBuilder, HidEndpoints, HidProtocols, HidStates, LedReader},
    usb_output::{KeyboardReporter, MouseReporter, UsbKeyboardOutput, UsbMouseOutput},
    StaticCell,
};
use ktick_builder::rp::{
    bind_interrupts,
    flash::{Blocking, Flash},
    gpio::{Input, Pull},
    i2c::{self, Async, I2c},
    interrupt,
    interrupt::{InterruptExt, Priority},
    peripherals::{FLASH, I2C1, USB},
    usb::{self as rp_usb, Driver},
};

const FLASH_SIZE: usize = 2 * 1024 * 1024;
const CONFIG_OFFSET: u32 = (FLASH_SIZE - 4096) as u32;
const CONFIG_RECORDS: usize = 16;
const REGISTRY_SIZE: usize = 8;
const RUNNER_SIZE: usize = 8;

const TAG_MAIN: u8 = 1;
const TAG_STATUS: u8 = 2;

static CONFIG_BUILDER: ConfigBuilder = ConfigBuilder {
    vendor_id: 0x6e0f,
    product_id: 0x0010,
    manufacturer: "ktick",
    product: "ktick knob pad",
    serial_number: "ktick:0001",
    max_power: 100,
};

type DisplayBus = I2c<'static, I2C1, Async>;
type UsbDriver = Driver<'static, USB>;
type Encoder = RotaryEncoder<Input<'static>, Input<'static>>;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => rp_usb::InterruptHandler<USB>;
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
});

static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_LOW: StaticCell<Executor> = StaticCell::new();

static CONFIG_STORE: StaticCell<RecordStore<CONFIG_RECORDS>> = StaticCell::new();
static CONFIG_SWITCH: ConfigModeSwitch = ConfigModeSwitch::new();

static USB_BUFFERS: StaticCell<UsbBuffers> = StaticCell::new();
static USB_CONFIG: StaticCell<ktick_builder::usb::Configurator<'static>> = StaticCell::new();
static HID_STATES: StaticCell<HidStates<'static>> = StaticCell::new();
static PROTOCOLS: HidProtocols = HidProtocols::new();
static LEDS: LedState = LedState::new();

static DISPLAY: Ssd1306Slot<DisplayBus> = Ssd1306Slot::new();
static KEYBOARD: OnceLock<UsbKeyboardOutput> = OnceLock::new();
static MOUSE: OnceLock<UsbMouseOutput> = OnceLock::new();
static ENCODER: StaticCell<Encoder> = StaticCell::new();
static STATUS: StatusLine = StatusLine::new();

/// Encoder lines, handed to the encoder factory at boot.
static ENCODER_PINS: Lock<Option<(Input<'static>, Input<'static>)>> = Lock::new(None);

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Shows the board name, or the config mode banner, on the top text row.
struct StatusLine {
    shown: AtomicBool,
    config_mode: AtomicBool,
}

impl StatusLine {
    const fn new() -> Self {
        Self {
            shown: AtomicBool::new(false),
            config_mode: AtomicBool::new(false),
        }
    }
}

impl InputDevice for StatusLine {
    fn tick(&self, outputs: &Outputs<'_>) -> Result<(), DeviceError> {
        if self.shown.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        let Some(screen) = outputs.screen() else {
            return Ok(());
        };
        let text = if self.config_mode.load(Ordering::Relaxed) {
            "CONFIG"
        } else {
            "ktick"
        };
        screen.draw_rect(0, 0, 7, COLUMNS as i32 - 1, true, DrawMode::Subtract);
        screen.draw_text(0, 0, text, &FONT_5X8, DrawMode::Add);
        Ok(())
    }

    fn set_config_mode(&self, on: bool) {
        self.config_mode.store(on, Ordering::Relaxed);
        self.shown.store(false, Ordering::Relaxed);
    }
}

fn display_keyboard(
    config: &Configuration<'_>,
) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Ok(DISPLAY.resolve(config)?)
}

fn display_screen(config: &Configuration<'_>) -> Result<&'static dyn ScreenOutput, DeviceError> {
    Ok(DISPLAY.resolve(config)?)
}

fn usb_keyboard(_: &Configuration<'_>) -> Result<&'static dyn KeyboardOutput, DeviceError> {
    Ok(KEYBOARD.get_or_init(|| UsbKeyboardOutput::new(&PROTOCOLS.keyboard)))
}

fn usb_mouse(_: &Configuration<'_>) -> Result<&'static dyn MouseOutput, DeviceError> {
    Ok(MOUSE.get_or_init(|| UsbMouseOutput::new(&PROTOCOLS.mouse)))
}

fn encoder(config: &Configuration<'_>) -> Result<&'static dyn InputDevice, DeviceError> {
    let (a, b) = ENCODER_PINS
        .lock(|pins| pins.take())
        .ok_or(DeviceError::Unavailable)?;
    let encoder: &'static Encoder = ENCODER
        .try_init(RotaryEncoder::from_config(a, b, config, VolumeKnob))
        .ok_or(DeviceError::Unavailable)?;
    Ok(encoder)
}

fn status(_: &Configuration<'_>) -> Result<&'static dyn InputDevice, DeviceError> {
    Ok(&STATUS)
}

fn reset() {
    cortex_m::peripheral::SCB::sys_reset()
}

fn fatal(_reason: FatalReason) {
    // leave the board reflashable
    ktick_builder::rp::rom_data::reset_to_usb_boot(0, 0);
}

#[embassy_executor::task]
async fn runner_task(mut runner: Runner<RUNNER_SIZE>) {
    runner.run(&CONFIG_SWITCH).await
}

#[embassy_executor::task]
async fn keyboard_reporter(reporter: KeyboardReporter<'static, UsbDriver>, period: Duration) {
    drain_loop(reporter, period).await
}

#[embassy_executor::task]
async fn mouse_reporter(reporter: MouseReporter<'static, UsbDriver>, period: Duration) {
    drain_loop(reporter, period).await
}

#[embassy_executor::task]
async fn display_driver(display: Ssd1306<'static, DisplayBus>, period: Duration) {
    drain_loop(display, period).await
}

#[embassy_executor::task]
async fn led_reader(reader: LedReader<'static, UsbDriver>) {
    reader.run(&LEDS).await
}

#[embassy_executor::task]
async fn config_button(mut button: Input<'static>) {
    loop {
        button.wait_for_falling_edge().await;
        CONFIG_SWITCH.toggle();
        button.wait_for_rising_edge().await;
    }
}

#[embassy_executor::task]
async fn usb_task(mut usb: embassy_usb::UsbDevice<'static, UsbDriver>) {
    usb.run().await
}

#[entry]
fn main() -> ! {
    let p = ktick_builder::rp::init(Default::default());

    firmware_functions::handle_reset(Some(&reset));
    firmware_functions::handle_fatal(Some(&fatal));

    let mut flash = Flash::<FLASH, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let store: &'static RecordStore<CONFIG_RECORDS> = CONFIG_STORE.init(
        RecordStore::load(&mut flash, CONFIG_OFFSET).unwrap_or_else(|_| RecordStore::empty()),
    );
    let config = Configuration::new(store);

    ENCODER_PINS.lock(|pins| {
        *pins = Some((Input::new(p.PIN_10, Pull::Up), Input::new(p.PIN_11, Pull::Up)))
    });
    let mut i2c_config = i2c::Config::default();
    i2c_config.frequency = ktick_builder::screen::ssd1306::I2C_FREQUENCY_HZ;
    DISPLAY.provide_bus(I2c::new_async(p.I2C1, p.PIN_3, p.PIN_2, Irqs, i2c_config));

    let mut registry = DeviceRegistry::<REGISTRY_SIZE>::new(config);
    let registered = [
        registry.register_keyboard_output(TAG_MAIN, true, usb_keyboard),
        registry.register_keyboard_output(TAG_STATUS, false, display_keyboard),
        registry.register_screen_output(TAG_MAIN, true, display_screen),
        registry.register_mouse_output(TAG_MAIN, true, usb_mouse),
        registry.register_input_device(TAG_MAIN, encoder),
        registry.register_input_device(TAG_STATUS, status),
    ];
    if registered.iter().any(|r| r.is_err()) {
        firmware_functions::fatal(FatalReason::StartupFailed);
        ktick_builder::boot::halt();
    }

    let runner = boot_or_halt::<RUNNER_SIZE, REGISTRY_SIZE>(&registry);
    let (Some(panel), Some(keyboard), Some(mouse)) =
        (DISPLAY.take_driver(), KEYBOARD.try_get(), MOUSE.try_get())
    else {
        firmware_functions::fatal(FatalReason::StartupFailed);
        ktick_builder::boot::halt();
    };

    let usb_config = USB_CONFIG.init(CONFIG_BUILDER.usb_configurator(&config));
    let poll = Duration::from_millis(usb_config.poll_ms().into());
    let driver = Driver::new(p.USB, Irqs);
    let Some(usb_builder) = usb_config.usb_builder(driver, USB_BUFFERS.init(UsbBuffers::new())) else {
        ktick_builder::boot::halt();
    };
    let Some((endpoints, usb_builder)) = CONFIG_BUILDER.hid_ifaces(
        usb_config,
        HID_STATES.init(HidStates::new()),
        &PROTOCOLS,
        &LEDS,
        usb_builder,
    ) else {
        firmware_functions::fatal(FatalReason::StartupFailed);
        ktick_builder::boot::halt();
    };
    let HidEndpoints {
        keyboard: keyboard_writer,
        mouse: mouse_writer,
        consumer: consumer_writer,
        leds: led_endpoint,
    } = endpoints;
    let usb = usb_builder.build();

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high.must_spawn(runner_task(runner));

    let executor = EXECUTOR_LOW.init(Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(usb_task(usb));
        spawner.must_spawn(keyboard_reporter(
            KeyboardReporter::new(keyboard_writer, consumer_writer, keyboard),
            poll,
        ));
        spawner.must_spawn(mouse_reporter(MouseReporter::new(mouse_writer, mouse), poll));
        spawner.must_spawn(led_reader(led_endpoint));
        spawner.must_spawn(display_driver(panel, Duration::from_millis(20)));
        spawner.must_spawn(config_button(Input::new(p.PIN_12, Pull::Up)));
    })
}
