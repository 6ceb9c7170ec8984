//! Device identity and the composite keyboard / mouse / consumer HID assembly.

use embassy_usb::{driver::Driver, Builder};
use ktick_firmware::{
    config::Configuration,
    hid::{HidReader, HidWriter},
    usb::{
        Configurator, HidProtocol, LedState, State, CONSUMER_INTERFACE, CONSUMER_REPORT_SIZE,
        KEYBOARD_INTERFACE, KEYBOARD_REPORT_SIZE, LED_REPORT_SIZE, MOUSE_INTERFACE,
        MOUSE_REPORT_SIZE,
    },
};

pub type KeyboardWriter<'d, D> = HidWriter<'d, D, KEYBOARD_REPORT_SIZE>;
pub type MouseWriter<'d, D> = HidWriter<'d, D, MOUSE_REPORT_SIZE>;
pub type ConsumerWriter<'d, D> = HidWriter<'d, D, CONSUMER_REPORT_SIZE>;
pub type LedReader<'d, D> = HidReader<'d, D, LED_REPORT_SIZE>;

pub struct ConfigBuilder {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: &'static str,
    pub product: &'static str,
    pub serial_number: &'static str,
    pub max_power: u16,
}

impl ConfigBuilder {
    /// Device descriptor settings; the interrupt poll interval comes from `config`.
    pub fn usb_configurator<'d>(&self, config: &Configuration<'_>) -> Configurator<'d> {
        let mut conf = embassy_usb::Config::new(self.vendor_id, self.product_id);
        conf.manufacturer = Some(self.manufacturer);
        conf.product = Some(self.product);
        conf.serial_number = Some(self.serial_number);
        conf.max_power = self.max_power;
        // class is defined per interface
        conf.device_class = 0;
        conf.device_sub_class = 0;
        conf.device_protocol = 0;
        conf.composite_with_iads = false;
        Configurator::new(conf, config.usb_poll_ms())
    }

    /// Add the keyboard, mouse and consumer interfaces, in that order.
    ///
    /// Returns `None` if the keyboard interface came back without its LED endpoint.
    pub fn hid_ifaces<'d, D: Driver<'d>>(
        &self,
        usb_config: &Configurator<'d>,
        states: &'d mut HidStates<'d>,
        protocols: &'d HidProtocols,
        leds: &'d LedState,
        mut usb_builder: Builder<'d, D>,
    ) -> Option<(HidEndpoints<'d, D>, Builder<'d, D>)> {
        let (keyboard, led_reader) = usb_config
            .add_iface::<_, LED_REPORT_SIZE, KEYBOARD_REPORT_SIZE>(
                &mut usb_builder,
                &KEYBOARD_INTERFACE,
                &mut states.keyboard,
                &protocols.keyboard,
                Some(leds),
            );
        let (mouse, _) = usb_config.add_iface::<_, 0, MOUSE_REPORT_SIZE>(
            &mut usb_builder,
            &MOUSE_INTERFACE,
            &mut states.mouse,
            &protocols.mouse,
            None,
        );
        let (consumer, _) = usb_config.add_iface::<_, 0, CONSUMER_REPORT_SIZE>(
            &mut usb_builder,
            &CONSUMER_INTERFACE,
            &mut states.consumer,
            &protocols.consumer,
            None,
        );

        Some((
            HidEndpoints {
                keyboard,
                mouse,
                consumer,
                leds: led_reader?,
            },
            usb_builder,
        ))
    }
}

/// Control state for each HID interface; must live as long as the USB device.
pub struct HidStates<'d> {
    keyboard: State<'d>,
    mouse: State<'d>,
    consumer: State<'d>,
}

impl Default for HidStates<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl HidStates<'_> {
    pub const fn new() -> Self {
        Self {
            keyboard: State::new(),
            mouse: State::new(),
            consumer: State::new(),
        }
    }
}

/// Protocol selected by the host for each interface. The keyboard and mouse outputs read the
/// boot flag from here.
pub struct HidProtocols {
    pub keyboard: HidProtocol,
    pub mouse: HidProtocol,
    pub consumer: HidProtocol,
}

impl Default for HidProtocols {
    fn default() -> Self {
        Self::new()
    }
}

impl HidProtocols {
    pub const fn new() -> Self {
        Self {
            keyboard: HidProtocol::new(),
            mouse: HidProtocol::new(),
            consumer: HidProtocol::new(),
        }
    }
}

pub struct HidEndpoints<'d, D: Driver<'d>> {
    pub keyboard: KeyboardWriter<'d, D>,
    pub mouse: MouseWriter<'d, D>,
    pub consumer: ConsumerWriter<'d, D>,
    pub leds: LedReader<'d, D>,
}

#[cfg(test)]
#[path = "usb_device_test.rs"]
mod test;
