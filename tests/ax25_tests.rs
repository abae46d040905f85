//! AX.25 Frame Tests
//!
//! Address encoding, control field layout and frame codec behavior.

use sdr_tnc::ax25::address::ADDRESS_LEN;
use sdr_tnc::ax25::frame::{FCS_LEN, MAX_INFO_LEN};
use sdr_tnc::ax25::{Address, Control, Frame, SupervisoryKind, UnnumberedKind, PID_NO_LAYER3};
use sdr_tnc::fec::ax25_fcs;
use sdr_tnc::Error;

fn aprs_frame() -> Frame {
    Frame::ui(
        Address::new("APRS", 0).unwrap().with_c_bit(true),
        Address::new("N0CALL", 0).unwrap(),
        PID_NO_LAYER3,
        b"!0000.00N/00000.00W-test",
    )
    .unwrap()
}

// ============================================================================
// Address Tests
// ============================================================================

#[test]
fn test_address_encoding() {
    let address = Address::new("N0CALL", 0).unwrap();
    assert_eq!(
        address.encode(true),
        [0x9C, 0x60, 0x86, 0x82, 0x98, 0x98, 0x61]
    );
}

#[test]
fn test_address_padding_and_c_bit() {
    let address = Address::new("APRS", 0).unwrap().with_c_bit(true);
    assert_eq!(
        address.encode(false),
        [0x82, 0xA0, 0xA4, 0xA6, 0x40, 0x40, 0xE0]
    );
}

#[test]
fn test_address_round_trip_with_ssid() {
    let address = Address::new("w1aw", 15).unwrap();
    let bytes = address.encode(false);
    let (decoded, last) = Address::decode(&bytes).unwrap();
    assert_eq!(decoded, address);
    assert_eq!(decoded.callsign(), "W1AW");
    assert_eq!(decoded.ssid(), 15);
    assert!(!last);
}

#[test]
fn test_address_validation() {
    assert!(matches!(Address::new("", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(Address::new("TOOLONG", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(Address::new("N0-CA", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(Address::new("N0CALL", 16), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_address_decode_rejects_embedded_space() {
    let mut bytes = Address::new("AB", 0).unwrap().encode(true);
    bytes[3] = b'C' << 1;
    assert!(matches!(Address::decode(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn test_address_decode_short_input() {
    assert!(matches!(
        Address::decode(&[0x82, 0xA0]),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn test_address_parse_and_display() {
    let address: Address = "N0CALL-7".parse().unwrap();
    assert_eq!(address.ssid(), 7);
    assert_eq!(address.to_string(), "N0CALL-7");
    let plain: Address = "APRS".parse().unwrap();
    assert_eq!(plain.to_string(), "APRS");
}

#[test]
fn test_same_station_ignores_c_bit() {
    let a = Address::new("N0CALL", 1).unwrap();
    let b = a.clone().with_c_bit(true);
    assert!(a.same_station(&b));
    assert_ne!(a, b);
}

// ============================================================================
// Control Field Tests
// ============================================================================

#[test]
fn test_unnumbered_control_bytes() {
    let cases = [
        (UnnumberedKind::Sabm, 0x2F),
        (UnnumberedKind::Disc, 0x43),
        (UnnumberedKind::Dm, 0x0F),
        (UnnumberedKind::Ua, 0x63),
        (UnnumberedKind::Frmr, 0x87),
        (UnnumberedKind::Ui, 0x03),
    ];
    for (kind, byte) in cases {
        let control = Control::Unnumbered { kind, pf: false };
        assert_eq!(control.to_byte(), byte);
        assert_eq!(Control::from_byte(byte), control);
        assert_eq!(control.with_pf(true).to_byte(), byte | 0x10);
    }
}

#[test]
fn test_information_control_byte() {
    let control = Control::Information {
        ns: 3,
        nr: 5,
        pf: true,
    };
    assert_eq!(control.to_byte(), 0b1011_0110);
    assert_eq!(Control::from_byte(0b1011_0110), control);
}

#[test]
fn test_supervisory_control_byte() {
    let control = Control::Supervisory {
        kind: SupervisoryKind::Rej,
        nr: 2,
        pf: false,
    };
    assert_eq!(control.to_byte(), 0x49);
    assert_eq!(Control::from_byte(0x49), control);
}

#[test]
fn test_reserved_control_byte() {
    assert_eq!(Control::from_byte(0xEF), Control::Reserved(0xEF));
}

// ============================================================================
// Frame Tests
// ============================================================================

#[test]
fn test_ui_frame_wire_bytes() {
    let mut out = [0u8; 128];
    let n = aprs_frame().to_hdlc(&mut out).unwrap();
    let expected_head = [
        0x7E, 0x82, 0xA0, 0xA4, 0xA6, 0x40, 0x40, 0xE0, 0x9C, 0x60, 0x86, 0x82, 0x98, 0x98, 0x61,
        0x03, 0xF0,
    ];
    assert_eq!(&out[..expected_head.len()], &expected_head);
    assert_eq!(out[n - 1], 0x7E);

    let body = &out[1..n - 1 - FCS_LEN];
    let fcs = ax25_fcs(body).to_le_bytes();
    assert_eq!(&out[n - 1 - FCS_LEN..n - 1], &fcs);
    assert_eq!(&body[2 * ADDRESS_LEN + 2..], b"!0000.00N/00000.00W-test");
}

#[test]
fn test_frame_round_trip_with_fcs() {
    let frame = aprs_frame();
    let mut out = [0u8; 128];
    let n = frame.encode_with_fcs(&mut out).unwrap();
    let decoded = Frame::decode_with_fcs(&out[..n]).unwrap();
    assert_eq!(decoded, frame);
    assert!(decoded.is_aprs());
    assert!(decoded.is_command());
}

#[test]
fn test_frame_with_digipeaters() {
    let mut frame = aprs_frame();
    frame.via.push(Address::new("WIDE1", 1).unwrap()).unwrap();
    frame.via.push(Address::new("WIDE2", 2).unwrap()).unwrap();
    let mut out = [0u8; 128];
    let n = frame.encode(&mut out).unwrap();
    assert_eq!(n, frame.encoded_len());
    // only the last address carries the end flag
    assert_eq!(out[ADDRESS_LEN - 1] & 0x01, 0);
    assert_eq!(out[2 * ADDRESS_LEN - 1] & 0x01, 0);
    assert_eq!(out[4 * ADDRESS_LEN - 1] & 0x01, 1);
    let decoded = Frame::decode(&out[..n]).unwrap();
    assert_eq!(decoded.via.len(), 2);
    assert_eq!(decoded, frame);
}

#[test]
fn test_supervisory_frame_has_no_pid() {
    let frame = Frame::new(
        Address::new("N0CALL", 1).unwrap(),
        Address::new("W1AW", 0).unwrap(),
        Control::Supervisory {
            kind: SupervisoryKind::Rr,
            nr: 4,
            pf: true,
        },
    );
    let mut out = [0u8; 32];
    let n = frame.encode(&mut out).unwrap();
    assert_eq!(n, 2 * ADDRESS_LEN + 1);
    let decoded = Frame::decode(&out[..n]).unwrap();
    assert_eq!(decoded.pid, None);
    assert_eq!(decoded.control, frame.control);
}

#[test]
fn test_bad_fcs_is_integrity_failure() {
    let mut out = [0u8; 128];
    let n = aprs_frame().encode_with_fcs(&mut out).unwrap();
    out[20] ^= 0x01;
    assert!(matches!(
        Frame::decode_with_fcs(&out[..n]),
        Err(Error::IntegrityFailure(_))
    ));
}

#[test]
fn test_missing_terminator_is_malformed() {
    let mut bytes = [0x40u8; 70];
    bytes[..6].copy_from_slice(&[0x82, 0xA0, 0xA4, 0xA6, 0x40, 0x40]);
    assert!(matches!(Frame::decode(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn test_single_address_is_malformed() {
    let mut bytes = [0u8; 9];
    bytes[..ADDRESS_LEN].copy_from_slice(&Address::new("N0CALL", 0).unwrap().encode(true));
    bytes[ADDRESS_LEN] = 0x03;
    assert!(matches!(Frame::decode(&bytes), Err(Error::Malformed(_))));
}

#[test]
fn test_short_frame_is_malformed() {
    assert!(matches!(
        Frame::decode_with_fcs(&[0x82, 0xA0, 0x00]),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn test_info_length_limit() {
    let mut frame = aprs_frame();
    assert!(frame.set_info(&[b'x'; MAX_INFO_LEN]).is_ok());
    assert!(matches!(
        frame.set_info(&[b'x'; MAX_INFO_LEN + 1]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_output_buffer_too_small() {
    let mut out = [0u8; 10];
    assert!(matches!(
        aprs_frame().encode(&mut out),
        Err(Error::InvalidArgument(_))
    ));
}
