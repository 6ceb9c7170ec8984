//! Composite USB HID device: keyboard, mouse and consumer control interfaces in one
//! configuration.

use core::{
    mem::MaybeUninit,
    sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
};

use embassy_usb::{
    control::{InResponse, OutResponse, Recipient, Request, RequestType},
    driver::Driver,
    types::{InterfaceNumber, StringIndex},
    Builder, Config, Handler,
};
use ktick_common::led;

use crate::hid::{HidReader, HidWriter};

const HID_CLASS: u8 = 0x03;
const HID_DESC_DESCTYPE_HID: u8 = 0x21;
const HID_DESC_DESCTYPE_HID_REPORT: u8 = 0x22;
const HID_DESC_SPEC_1_11: [u8; 2] = [0x11, 0x01];
const HID_DESC_COUNTRY_UNSPEC: u8 = 0x00;

const HID_REQ_GET_REPORT: u8 = 0x01;
const HID_REQ_GET_IDLE: u8 = 0x02;
const HID_REQ_GET_PROTOCOL: u8 = 0x03;
const HID_REQ_SET_REPORT: u8 = 0x09;
const HID_REQ_SET_IDLE: u8 = 0x0a;
const HID_REQ_SET_PROTOCOL: u8 = 0x0b;

const PROTOCOL_BOOT: u16 = 0;
const PROTOCOL_REPORT: u16 = 1;
const REPORT_TYPE_OUTPUT: u16 = 2;

/// Boot region (modifiers, reserved, six keys) followed by a 256 bit keycode bitmap.
pub const KEYBOARD_REPORT_SIZE: usize = KEYBOARD_BOOT_REPORT_SIZE + crate::KEY_BITS_SIZE;
pub const KEYBOARD_BOOT_REPORT_SIZE: usize = 8;
pub const KEYBOARD_BITMAP_OFFSET: usize = 8;
pub const MOUSE_REPORT_SIZE: usize = 5;
pub const MOUSE_BOOT_REPORT_SIZE: usize = 3;
pub const CONSUMER_REPORT_SIZE: usize = 2;
pub const LED_REPORT_SIZE: usize = 1;

/// The boot region is declared as constant padding so report protocol hosts read keys from the
/// bitmap only, while boot protocol hosts that never send SET_PROTOCOL still find the six key
/// array where they expect it.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESC: [u8; 49] = [
    0x05, 0x01, // (GLOBAL) USAGE_PAGE         0x0001 Generic Desktop Page
    0x09, 0x06, // (LOCAL)  USAGE              0x00010006 Keyboard
    0xA1, 0x01, // (MAIN)   COLLECTION         0x01 Application
    0x95, 0x08, //   (GLOBAL) REPORT_COUNT       8
    0x75, 0x08, //   (GLOBAL) REPORT_SIZE        8
    0x81, 0x01, //   (MAIN)   INPUT              boot region: Constant
    0x05, 0x07, //   (GLOBAL) USAGE_PAGE         0x0007 Keyboard/Keypad Page
    0x19, 0x00, //   (LOCAL)  USAGE_MINIMUM      0x00070000
    0x2A, 0xFF, 0x00, // (LOCAL) USAGE_MAXIMUM   0x000700FF
    0x15, 0x00, //   (GLOBAL) LOGICAL_MINIMUM    0
    0x25, 0x01, //   (GLOBAL) LOGICAL_MAXIMUM    1
    0x75, 0x01, //   (GLOBAL) REPORT_SIZE        1
    0x96, 0x00, 0x01, // (GLOBAL) REPORT_COUNT   256
    0x81, 0x02, //   (MAIN)   INPUT              key bitmap: Data Variable Absolute
    0x05, 0x08, //   (GLOBAL) USAGE_PAGE         0x0008 LED Page
    0x19, 0x01, //   (LOCAL)  USAGE_MINIMUM      0x00080001 Num Lock
    0x29, 0x05, //   (LOCAL)  USAGE_MAXIMUM      0x00080005 Kana
    0x95, 0x05, //   (GLOBAL) REPORT_COUNT       5
    0x75, 0x01, //   (GLOBAL) REPORT_SIZE        1
    0x91, 0x02, //   (MAIN)   OUTPUT             LEDs: Data Variable Absolute
    0x95, 0x01, //   (GLOBAL) REPORT_COUNT       1
    0x75, 0x03, //   (GLOBAL) REPORT_SIZE        3
    0x91, 0x01, //   (MAIN)   OUTPUT             padding: Constant
    0xC0,       // (MAIN)   END_COLLECTION
];

#[rustfmt::skip]
pub const MOUSE_REPORT_DESC: [u8; 71] = [
    0x05, 0x01, // (GLOBAL) USAGE_PAGE         0x0001 Generic Desktop Page
    0x09, 0x02, // (LOCAL)  USAGE              0x00010002 Mouse
    0xA1, 0x01, // (MAIN)   COLLECTION         0x01 Application
    0x09, 0x01, //   (LOCAL)  USAGE              0x00010001 Pointer
    0xA1, 0x00, //   (MAIN)   COLLECTION         0x00 Physical
    0x05, 0x09, //     (GLOBAL) USAGE_PAGE         0x0009 Button Page
    0x19, 0x01, //     (LOCAL)  USAGE_MINIMUM      Button 1
    0x29, 0x08, //     (LOCAL)  USAGE_MAXIMUM      Button 8
    0x15, 0x00, //     (GLOBAL) LOGICAL_MINIMUM    0
    0x25, 0x01, //     (GLOBAL) LOGICAL_MAXIMUM    1
    0x95, 0x08, //     (GLOBAL) REPORT_COUNT       8
    0x75, 0x01, //     (GLOBAL) REPORT_SIZE        1
    0x81, 0x02, //     (MAIN)   INPUT              buttons: Data Variable Absolute
    0x05, 0x01, //     (GLOBAL) USAGE_PAGE         0x0001 Generic Desktop Page
    0x09, 0x30, //     (LOCAL)  USAGE              X
    0x09, 0x31, //     (LOCAL)  USAGE              Y
    0x15, 0x81, //     (GLOBAL) LOGICAL_MINIMUM    -127
    0x25, 0x7F, //     (GLOBAL) LOGICAL_MAXIMUM    127
    0x95, 0x02, //     (GLOBAL) REPORT_COUNT       2
    0x75, 0x08, //     (GLOBAL) REPORT_SIZE        8
    0x81, 0x06, //     (MAIN)   INPUT              Data Variable Relative
    0x09, 0x38, //     (LOCAL)  USAGE              Wheel
    0x15, 0x81, //     (GLOBAL) LOGICAL_MINIMUM    -127
    0x25, 0x7F, //     (GLOBAL) LOGICAL_MAXIMUM    127
    0x95, 0x01, //     (GLOBAL) REPORT_COUNT       1
    0x75, 0x08, //     (GLOBAL) REPORT_SIZE        8
    0x81, 0x06, //     (MAIN)   INPUT              Data Variable Relative
    0x05, 0x0C, //     (GLOBAL) USAGE_PAGE         0x000C Consumer Page
    0x0A, 0x38, 0x02, // (LOCAL) USAGE           0x000C0238 AC Pan
    0x15, 0x81, //     (GLOBAL) LOGICAL_MINIMUM    -127
    0x25, 0x7F, //     (GLOBAL) LOGICAL_MAXIMUM    127
    0x95, 0x01, //     (GLOBAL) REPORT_COUNT       1
    0x75, 0x08, //     (GLOBAL) REPORT_SIZE        8
    0x81, 0x06, //     (MAIN)   INPUT              Data Variable Relative
    0xC0,       //   (MAIN)   END_COLLECTION     Physical
    0xC0,       // (MAIN)   END_COLLECTION     Application
];

#[rustfmt::skip]
pub const CONSUMER_REPORT_DESC: [u8; 23] = [
    0x05, 0x0C, // (GLOBAL) USAGE_PAGE         0x000C Consumer Page
    0x09, 0x01, // (LOCAL)  USAGE              0x000C0001 Consumer Control
    0xA1, 0x01, // (MAIN)   COLLECTION         0x01 Application
    0x19, 0x01, //   (LOCAL)  USAGE_MINIMUM      0x000C0001
    0x2A, 0xA0, 0x02, // (LOCAL) USAGE_MAXIMUM   0x000C02A0
    0x15, 0x01, //   (GLOBAL) LOGICAL_MINIMUM    1
    0x26, 0xA0, 0x02, // (GLOBAL) LOGICAL_MAXIMUM 672
    0x95, 0x01, //   (GLOBAL) REPORT_COUNT       1
    0x75, 0x10, //   (GLOBAL) REPORT_SIZE        16
    0x81, 0x00, //   (MAIN)   INPUT              Data Array Absolute
    0xC0,       // (MAIN)   END_COLLECTION
];

/// One HID interface of the composite device.
pub struct HidInterface {
    pub name: &'static str,
    pub descriptor: &'static [u8],
    pub subclass: u8,
    pub protocol: u8,
    /// Allocate an interrupt OUT endpoint for output reports.
    pub with_reader: bool,
}

pub const KEYBOARD_INTERFACE: HidInterface = HidInterface {
    name: "Keyboard",
    descriptor: &KEYBOARD_REPORT_DESC,
    subclass: 1,
    protocol: 1,
    with_reader: true,
};

pub const MOUSE_INTERFACE: HidInterface = HidInterface {
    name: "Mouse",
    descriptor: &MOUSE_REPORT_DESC,
    subclass: 1,
    protocol: 2,
    with_reader: false,
};

pub const CONSUMER_INTERFACE: HidInterface = HidInterface {
    name: "Consumer",
    descriptor: &CONSUMER_REPORT_DESC,
    subclass: 0,
    protocol: 0,
    with_reader: false,
};

/// Protocol and idle rate the host selected for one interface.
pub struct HidProtocol {
    boot: AtomicBool,
    idle: AtomicU8,
}

impl Default for HidProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl HidProtocol {
    pub const fn new() -> Self {
        Self {
            boot: AtomicBool::new(false),
            idle: AtomicU8::new(0),
        }
    }

    pub fn is_boot(&self) -> bool {
        self.boot.load(Ordering::Relaxed)
    }

    pub fn set_boot(&self, boot: bool) {
        self.boot.store(boot, Ordering::Relaxed);
    }

    /// Idle rate in 4 ms units; 0 means report only on change.
    pub fn idle(&self) -> u8 {
        self.idle.load(Ordering::Relaxed)
    }

    fn set_idle(&self, idle: u8) {
        self.idle.store(idle, Ordering::Relaxed);
    }
}

/// Keyboard indicator bits last sent by the host.
pub struct LedState(AtomicU8);

impl Default for LedState {
    fn default() -> Self {
        Self::new()
    }
}

impl LedState {
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, bits: u8) {
        self.0.store(bits & led::MASK, Ordering::Relaxed);
    }

    pub fn is_on(&self, bit: u8) -> bool {
        self.get() & bit != 0
    }
}

/// Per-interface storage the USB stack borrows for the life of the device.
pub struct State<'d> {
    control: MaybeUninit<Control<'d>>,
    out_report_offset: AtomicUsize,
}

impl Default for State<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl State<'_> {
    pub const fn new() -> Self {
        State {
            control: MaybeUninit::uninit(),
            out_report_offset: AtomicUsize::new(0),
        }
    }
}

const CONFIG_SIZE: usize = 256;
const BOS_SIZE: usize = 32;
const MSOS_SIZE: usize = 0;
const CONTROL_SIZE: usize = 128;

pub struct UsbBuffers {
    config_descriptor_buf: [u8; CONFIG_SIZE],
    bos_descriptor_buf: [u8; BOS_SIZE],
    msos_descriptor_buf: [u8; MSOS_SIZE],
    control_buf: [u8; CONTROL_SIZE],
}

impl Default for UsbBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbBuffers {
    pub const fn new() -> Self {
        Self {
            config_descriptor_buf: [0; CONFIG_SIZE],
            bos_descriptor_buf: [0; BOS_SIZE],
            msos_descriptor_buf: [0; MSOS_SIZE],
            control_buf: [0; CONTROL_SIZE],
        }
    }
}

pub struct Configurator<'d> {
    device_config: Option<Config<'d>>,
    max_packet_size: u16,
    poll_ms: u8,
}

impl<'d> Configurator<'d> {
    pub fn new(device_config: Config<'d>, poll_ms: u8) -> Self {
        let max_packet_size = device_config.max_packet_size_0 as u16;
        Self {
            device_config: Some(device_config),
            max_packet_size,
            poll_ms,
        }
    }

    pub fn poll_ms(&self) -> u8 {
        self.poll_ms
    }

    /// Returns `None` once the builder has been taken.
    pub fn usb_builder<D: Driver<'d>>(
        &mut self,
        driver: D,
        buffers: &'d mut UsbBuffers,
    ) -> Option<Builder<'d, D>> {
        self.device_config.take().map(|device_config| {
            Builder::new(
                driver,
                device_config,
                &mut buffers.config_descriptor_buf,
                &mut buffers.bos_descriptor_buf,
                &mut buffers.msos_descriptor_buf,
                &mut buffers.control_buf,
            )
        })
    }

    pub fn add_iface<D: Driver<'d>, const READ_N: usize, const WRITE_N: usize>(
        &self,
        builder: &mut Builder<'d, D>,
        iface: &HidInterface,
        state: &'d mut State<'d>,
        protocol: &'d HidProtocol,
        leds: Option<&'d LedState>,
    ) -> (HidWriter<'d, D, WRITE_N>, Option<HidReader<'d, D, READ_N>>) {
        let name = builder.string();
        let mut func = builder.function(HID_CLASS, iface.subclass, iface.protocol);
        let mut interface = func.interface();
        let if_num = interface.interface_number();
        let mut alt = interface.alt_setting(HID_CLASS, iface.subclass, iface.protocol, Some(name));

        let control = Control::new(
            if_num,
            iface.name,
            name,
            iface.descriptor,
            protocol,
            leds,
            &state.out_report_offset,
        );
        alt.descriptor(HID_DESC_DESCTYPE_HID, &control.hid_descriptor[2..]);

        let ep_in = alt.endpoint_interrupt_in(self.max_packet_size, self.poll_ms);
        let ep_out = iface
            .with_reader
            .then(|| alt.endpoint_interrupt_out(self.max_packet_size, self.poll_ms));

        drop(func);

        let control = state.control.write(control);
        builder.handler(control);
        (
            HidWriter::new(ep_in),
            ep_out.map(|ep_out| HidReader::new(ep_out, &state.out_report_offset)),
        )
    }
}

struct Control<'d> {
    if_num: InterfaceNumber,
    name: &'static str,
    name_index: StringIndex,
    report_descriptor: &'d [u8],
    protocol: &'d HidProtocol,
    leds: Option<&'d LedState>,
    out_report_offset: &'d AtomicUsize,
    hid_descriptor: [u8; 9],
}

impl<'d> Control<'d> {
    fn new(
        if_num: InterfaceNumber,
        name: &'static str,
        name_index: StringIndex,
        report_descriptor: &'d [u8],
        protocol: &'d HidProtocol,
        leds: Option<&'d LedState>,
        out_report_offset: &'d AtomicUsize,
    ) -> Self {
        let len = report_descriptor.len();
        Control {
            if_num,
            name,
            name_index,
            report_descriptor,
            protocol,
            leds,
            out_report_offset,
            hid_descriptor: [
                9,
                HID_DESC_DESCTYPE_HID,
                HID_DESC_SPEC_1_11[0],
                HID_DESC_SPEC_1_11[1],
                HID_DESC_COUNTRY_UNSPEC,
                1, // one report descriptor follows
                HID_DESC_DESCTYPE_HID_REPORT,
                (len & 0xff) as u8,
                (len >> 8 & 0xff) as u8,
            ],
        }
    }
}

impl Handler for Control<'_> {
    fn reset(&mut self) {
        self.out_report_offset.store(0, Ordering::Release);
        self.protocol.set_boot(false);
        self.protocol.set_idle(0);
    }

    fn get_string(&mut self, index: StringIndex, _lang_id: u16) -> Option<&str> {
        (index == self.name_index).then_some(self.name)
    }

    fn control_out(&mut self, req: Request, data: &[u8]) -> Option<OutResponse> {
        if (req.request_type, req.recipient, req.index)
            != (
                RequestType::Class,
                Recipient::Interface,
                self.if_num.0 as u16,
            )
        {
            return None;
        }

        match req.request {
            HID_REQ_SET_IDLE => {
                self.protocol.set_idle((req.value >> 8) as u8);
                Some(OutResponse::Accepted)
            }
            HID_REQ_SET_REPORT => match (req.value >> 8, self.leds, data.first()) {
                (REPORT_TYPE_OUTPUT, Some(leds), Some(bits)) => {
                    leds.set(*bits);
                    Some(OutResponse::Accepted)
                }
                _ => Some(OutResponse::Rejected),
            },
            HID_REQ_SET_PROTOCOL => match req.value {
                PROTOCOL_BOOT | PROTOCOL_REPORT => {
                    let boot = req.value == PROTOCOL_BOOT;
                    crate::info!("{} boot protocol {}", self.name, boot);
                    self.protocol.set_boot(boot);
                    Some(OutResponse::Accepted)
                }
                _ => Some(OutResponse::Rejected),
            },
            _ => Some(OutResponse::Rejected),
        }
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        if req.index != self.if_num.0 as u16 {
            return None;
        }

        match (req.request_type, req.recipient) {
            (RequestType::Standard, Recipient::Interface) => match req.request {
                Request::GET_DESCRIPTOR => match (req.value >> 8) as u8 {
                    HID_DESC_DESCTYPE_HID_REPORT => {
                        Some(InResponse::Accepted(self.report_descriptor))
                    }
                    HID_DESC_DESCTYPE_HID => Some(InResponse::Accepted(&self.hid_descriptor)),
                    _ => Some(InResponse::Rejected),
                },
                _ => Some(InResponse::Rejected),
            },
            (RequestType::Class, Recipient::Interface) => match req.request {
                HID_REQ_GET_IDLE => {
                    buf[0] = self.protocol.idle();
                    Some(InResponse::Accepted(&buf[..1]))
                }
                HID_REQ_GET_PROTOCOL => {
                    buf[0] = if self.protocol.is_boot() {
                        PROTOCOL_BOOT as u8
                    } else {
                        PROTOCOL_REPORT as u8
                    };
                    Some(InResponse::Accepted(&buf[..1]))
                }
                // no feature or input reports are served over the control pipe
                HID_REQ_GET_REPORT => Some(InResponse::Rejected),
                _ => Some(InResponse::Rejected),
            },
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "usb_test.rs"]
mod test;
