use core::sync::atomic::AtomicUsize;

use super::*;

const CLASS_OUT: u8 = 0x21;
const CLASS_IN: u8 = 0xa1;
const STANDARD_IN: u8 = 0x81;

fn req(request_type: u8, request: u8, value: u16, index: u16) -> Request {
    let v = value.to_le_bytes();
    let i = index.to_le_bytes();
    Request::parse(&[request_type, request, v[0], v[1], i[0], i[1], 1, 0])
}

macro_rules! setup {
    ($control:ident, $protocol:ident, $leds:expr) => {
        let $protocol = HidProtocol::new();
        let offset = AtomicUsize::new(0);
        #[allow(unused_mut)]
        let mut $control = Control::new(
            InterfaceNumber(1),
            "Keyboard",
            StringIndex(4),
            &KEYBOARD_REPORT_DESC,
            &$protocol,
            $leds,
            &offset,
        );
    };
}

#[test]
fn report_sizes_match_descriptors() {
    assert_eq!(KEYBOARD_REPORT_DESC.len(), 49);
    assert_eq!(MOUSE_REPORT_DESC.len(), 71);
    assert_eq!(CONSUMER_REPORT_DESC.len(), 23);
    assert_eq!(KEYBOARD_REPORT_SIZE, 40);
    assert_eq!(KEYBOARD_INTERFACE.descriptor.len(), 49);
    assert!(KEYBOARD_INTERFACE.with_reader);
    assert_eq!(
        (MOUSE_INTERFACE.subclass, MOUSE_INTERFACE.protocol),
        (1, 2)
    );
}

#[test]
fn keyboard_descriptor_reports_keys_once() {
    // the only keyboard page data input is the 256 bit bitmap behind 8 constant bytes
    assert_eq!(&KEYBOARD_REPORT_DESC[6..12], &[0x95, 0x08, 0x75, 0x08, 0x81, 0x01]);
    let data_inputs = KEYBOARD_REPORT_DESC
        .windows(2)
        .filter(|w| w[0] == 0x81 && w[1] != 0x01)
        .count();
    assert_eq!(data_inputs, 1);
    assert_eq!(&KEYBOARD_REPORT_DESC[25..30], &[0x96, 0x00, 0x01, 0x81, 0x02]);
}

#[test]
fn hid_descriptor() {
    setup!(control, _protocol, None);

    assert_eq!(
        control.hid_descriptor,
        [9, 0x21, 0x11, 0x01, 0, 1, 0x22, 49, 0]
    );

    let mut buf = [0; 128];
    let r = control.control_in(req(STANDARD_IN, 0x06, 0x2200, 1), &mut buf);
    assert!(matches!(r, Some(InResponse::Accepted(d)) if d == KEYBOARD_REPORT_DESC));
    let r = control.control_in(req(STANDARD_IN, 0x06, 0x2100, 1), &mut buf);
    assert!(matches!(r, Some(InResponse::Accepted(d)) if d.len() == 9));
}

#[test]
fn protocol_switch() {
    setup!(control, protocol, None);
    let mut buf = [0; 8];

    assert!(!protocol.is_boot());
    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x0b, 0, 1), &[]),
        Some(OutResponse::Accepted)
    );
    assert!(protocol.is_boot());
    let r = control.control_in(req(CLASS_IN, 0x03, 0, 1), &mut buf);
    assert!(matches!(r, Some(InResponse::Accepted(&[0]))));

    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x0b, 1, 1), &[]),
        Some(OutResponse::Accepted)
    );
    assert!(!protocol.is_boot());
    let r = control.control_in(req(CLASS_IN, 0x03, 0, 1), &mut buf);
    assert!(matches!(r, Some(InResponse::Accepted(&[1]))));

    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x0b, 2, 1), &[]),
        Some(OutResponse::Rejected)
    );

    control.control_out(req(CLASS_OUT, 0x0b, 0, 1), &[]);
    control.reset();
    assert!(!protocol.is_boot());
}

#[test]
fn idle_rate() {
    setup!(control, protocol, None);
    let mut buf = [0; 8];

    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x0a, 0x7d00, 1), &[]),
        Some(OutResponse::Accepted)
    );
    assert_eq!(protocol.idle(), 0x7d);
    let r = control.control_in(req(CLASS_IN, 0x02, 0, 1), &mut buf);
    assert!(matches!(r, Some(InResponse::Accepted(&[0x7d]))));
}

#[test]
fn led_report() {
    let leds = LedState::new();
    setup!(control, _protocol, Some(&leds));

    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x09, 0x0200, 1), &[0xff]),
        Some(OutResponse::Accepted)
    );
    assert_eq!(leds.get(), 0x1f);
    assert!(leds.is_on(ktick_common::led::CAPS_LOCK));

    // feature report
    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x09, 0x0300, 1), &[0]),
        Some(OutResponse::Rejected)
    );
    assert_eq!(leds.get(), 0x1f);
}

#[test]
fn led_report_without_sink() {
    setup!(control, _protocol, None);

    assert_eq!(
        control.control_out(req(CLASS_OUT, 0x09, 0x0200, 1), &[1]),
        Some(OutResponse::Rejected)
    );
}

#[test]
fn other_interfaces_ignored() {
    setup!(control, protocol, None);
    let mut buf = [0; 8];

    assert_eq!(control.control_out(req(CLASS_OUT, 0x0b, 0, 2), &[]), None);
    assert!(!protocol.is_boot());
    assert!(control
        .control_in(req(CLASS_IN, 0x03, 0, 2), &mut buf)
        .is_none());
}

#[test]
fn interface_name() {
    setup!(control, _protocol, None);

    assert_eq!(control.get_string(StringIndex(4), 0x0409), Some("Keyboard"));
    assert_eq!(control.get_string(StringIndex(5), 0x0409), None);
}
