//! Bridge Tests
//!
//! Callsign mapping, APRS rendering and the M17 <-> AX.25 converters.

use sdr_tnc::ax25::{Address, Control, Frame, SupervisoryKind, PID_NO_LAYER3};
use sdr_tnc::bridge::aprs::{render, symbol_for_station, Message, PositionReport, Status};
use sdr_tnc::bridge::{Bridge, MappingTable, APRS_DESTINATION};
use sdr_tnc::config::bridge::{DEFAULT_BEACON, MAX_MAPPINGS, PACKET_INFO_LEN, RELAY_DESTINATION};
use sdr_tnc::m17::lsf::Motion;
use sdr_tnc::m17::packet::packetize;
use sdr_tnc::m17::{Lsf, LsfType, PacketAssembler, Position};
use sdr_tnc::types::Can;
use sdr_tnc::Error;

fn bridge() -> Bridge {
    Bridge::new("N0CALL", 10).unwrap()
}

// ============================================================================
// Mapping Table Tests
// ============================================================================

#[test]
fn test_mapping_add_and_find() {
    let mut table = MappingTable::new();
    table.add("sp5wwp", "SP5WWP", 7).unwrap();
    assert_eq!(table.len(), 1);

    let mapping = table.find("SP5WWP").unwrap();
    assert_eq!(mapping.m17(), "SP5WWP");
    assert_eq!(mapping.ax25(), &Address::new("SP5WWP", 7).unwrap());
    assert!(mapping.active());

    let by_ax25 = table
        .find_by_ax25(&Address::new("SP5WWP", 7).unwrap().with_c_bit(true))
        .unwrap();
    assert_eq!(by_ax25.m17(), "SP5WWP");
    assert!(table.find_by_ax25(&Address::new("SP5WWP", 8).unwrap()).is_none());
}

#[test]
fn test_mapping_m17_callsign_is_unique() {
    let mut table = MappingTable::new();
    table.add("W1AW", "W1AW", 0).unwrap();
    assert!(matches!(
        table.add("w1aw", "K1ABC", 1),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_mapping_table_capacity() {
    let mut table = MappingTable::new();
    for i in 0..MAX_MAPPINGS {
        table.add(&format!("M17N{i:02}"), "N0CALL", (i % 16) as u8).unwrap();
    }
    assert!(matches!(
        table.add("EXTRA", "N0CALL", 0),
        Err(Error::ResourceExhausted(_))
    ));
}

#[test]
fn test_mapping_rejects_bad_callsigns() {
    let mut table = MappingTable::new();
    assert!(matches!(table.add("AB", "N0CALL", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(table.add("W1AW", "TOOLONG", 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(table.add("W1AW", "W1AW", 16), Err(Error::InvalidArgument(_))));
    assert!(table.is_empty());
}

#[test]
fn test_mapping_remove_keeps_order() {
    let mut table = MappingTable::new();
    table.add("AAA1", "AAA1", 0).unwrap();
    table.add("BBB2", "BBB2", 0).unwrap();
    table.add("CCC3", "CCC3", 0).unwrap();
    let removed = table.remove("BBB2").unwrap();
    assert_eq!(removed.m17(), "BBB2");
    let order: Vec<&str> = table.iter().map(|m| m.m17()).collect();
    assert_eq!(order, vec!["AAA1", "CCC3"]);
    assert!(matches!(table.remove("BBB2"), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_inactive_mapping_is_not_found() {
    let mut table = MappingTable::new();
    table.add("W1AW", "W1AW", 0).unwrap();
    table.set_active("W1AW", false).unwrap();
    assert!(table.find("W1AW").is_none());
    assert!(table.find_by_ax25(&Address::new("W1AW", 0).unwrap()).is_none());
    assert_eq!(table.len(), 1);
    table.set_active("W1AW", true).unwrap();
    assert!(table.find("W1AW").is_some());
    assert!(matches!(
        table.set_active("NOPE", true),
        Err(Error::InvalidArgument(_))
    ));
}

// ============================================================================
// APRS Rendering Tests
// ============================================================================

#[test]
fn test_position_report_southern_hemisphere() {
    let report = PositionReport::new(-33.5, -70.25, '[', "");
    assert_eq!(render(&report).unwrap().as_str(), "!3330.00S/07015.00W[");
}

#[test]
fn test_position_report_course_and_speed() {
    let mut report = PositionReport::new(10.0, 20.0, '>', "car");
    report.course_speed = Some((45, 30));
    assert_eq!(
        render(&report).unwrap().as_str(),
        "!1000.00N/02000.00E>045/030car"
    );
}

#[test]
fn test_message_addressee_is_truncated() {
    let msg = Message {
        addressee: "VERYLONGCALL",
        text: "hi",
        id: None,
    };
    assert_eq!(render(&msg).unwrap().as_str(), ":VERYLONGC:hi");
}

#[test]
fn test_render_overflow_is_invalid_argument() {
    let long = "x".repeat(300);
    assert!(matches!(
        render(&Status(&long)),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_station_symbols() {
    assert_eq!(symbol_for_station(0), '-');
    assert_eq!(symbol_for_station(1), '>');
    assert_eq!(symbol_for_station(2), '[');
    assert_eq!(symbol_for_station(200), '-');
}

// ============================================================================
// LSF -> APRS Tests
// ============================================================================

#[test]
fn test_mapped_lsf_source_becomes_ax25_source() {
    let mut bridge = bridge();
    bridge.add_mapping("SP5WWP", "SP5WWP", 0).unwrap();
    let lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(Can::default())).unwrap();

    let frame = bridge.lsf_to_aprs(&lsf).unwrap();
    assert_eq!(frame.src.to_string(), "SP5WWP");
    assert_eq!(frame.src.ssid(), 0);
    assert!(!frame.src.c_bit());
    assert_eq!(frame.dst.callsign(), APRS_DESTINATION);
    assert!(frame.dst.c_bit());
    assert_eq!(frame.control, Control::UI);
    assert_eq!(frame.pid, Some(PID_NO_LAYER3));
    assert_eq!(frame.info.as_slice(), DEFAULT_BEACON.as_bytes());
}

#[test]
fn test_mapping_overrides_ssid() {
    let mut bridge = bridge();
    bridge.add_mapping("SP5WWP", "SP5WWP", 9).unwrap();
    let lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(Can::default())).unwrap();
    let frame = bridge.lsf_to_aprs(&lsf).unwrap();
    assert_eq!(frame.src.to_string(), "SP5WWP-9");
}

#[test]
fn test_unmapped_source_is_truncated() {
    let lsf = Lsf::new("@ALL", "AB1CDE/M", LsfType::voice_stream(Can::default())).unwrap();
    let frame = bridge().lsf_to_aprs(&lsf).unwrap();
    assert_eq!(frame.src.callsign(), "AB1CDE");
    assert_eq!(frame.src.ssid(), 0);
}

#[test]
fn test_lsf_position_becomes_aprs_position() {
    let mut lsf = Lsf::new("@ALL", "W1AW", LsfType::voice_stream(Can::default())).unwrap();
    lsf.set_position(&Position {
        source: 0,
        station: 1,
        latitude: 52.0,
        longitude: 21.0,
        altitude: Some(100),
        motion: Some(Motion {
            bearing: 90,
            speed: 10,
        }),
    });
    let frame = bridge().lsf_to_aprs(&lsf).unwrap();
    // 10 mph is 9 knots
    assert_eq!(
        core::str::from_utf8(&frame.info).unwrap(),
        "!5200.00N/02100.00E>090/009/A=000100M17"
    );
}

#[test]
fn test_configured_beacon_is_used_without_position() {
    let mut bridge = bridge();
    bridge.set_beacon("!4903.50N/07201.75W-Gateway").unwrap();
    let lsf = Lsf::new("@ALL", "W1AW", LsfType::packet(Can::default())).unwrap();
    let frame = bridge.lsf_to_aprs(&lsf).unwrap();
    assert_eq!(frame.info.as_slice(), b"!4903.50N/07201.75W-Gateway");
}

#[test]
fn test_reserved_source_is_malformed() {
    let mut lsf = Lsf::new("@ALL", "W1AW", LsfType::packet(Can::default())).unwrap();
    lsf.src = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE];
    assert!(matches!(bridge().lsf_to_aprs(&lsf), Err(Error::Malformed(_))));
}

// ============================================================================
// Packet <-> UI Tests
// ============================================================================

#[test]
fn test_packet_frame_becomes_relay_ui() {
    let data: Vec<u8> = (b'a'..=b'z').chain(b'A'..=b'Z').collect();
    let frames = packetize(&data).unwrap();
    let frame = bridge().packet_to_ui(&frames[0]).unwrap();
    assert_eq!(frame.dst.callsign(), RELAY_DESTINATION);
    assert_eq!(frame.src.to_string(), "N0CALL-10");
    assert_eq!(frame.info.len(), PACKET_INFO_LEN);
    assert_eq!(frame.info.as_slice(), &data[..PACKET_INFO_LEN]);
}

#[test]
fn test_ui_frame_becomes_m17_packet() {
    let mut bridge = bridge();
    bridge.set_can(Can::new(5).unwrap());
    bridge.add_mapping("M17USER", "N0CALL", 3).unwrap();
    let ui = Frame::ui(
        Address::new("APRS", 0).unwrap().with_c_bit(true),
        Address::new("N0CALL", 3).unwrap(),
        PID_NO_LAYER3,
        b">bridged status text",
    )
    .unwrap();

    let (lsf, frames) = bridge.ui_to_m17(&ui).unwrap();
    assert_eq!(lsf.src_callsign().unwrap().as_str(), "M17USER");
    assert_eq!(lsf.dst_callsign().unwrap().as_str(), "APRS");
    assert!(!lsf.lsf_type.is_stream());
    assert_eq!(lsf.lsf_type.can(), 5);

    let mut assembler = PacketAssembler::new();
    let mut payload = None;
    for frame in &frames {
        payload = assembler.push(frame).unwrap();
    }
    assert_eq!(payload.unwrap().as_slice(), b">bridged status text");
}

#[test]
fn test_unmapped_ui_source_uses_bridge_callsign() {
    let ui = Frame::ui(
        Address::new("APRS", 0).unwrap(),
        Address::new("K1ABC", 0).unwrap(),
        PID_NO_LAYER3,
        b"data",
    )
    .unwrap();
    let (lsf, _) = bridge().ui_to_m17(&ui).unwrap();
    assert_eq!(lsf.src_callsign().unwrap().as_str(), "N0CALL");
}

#[test]
fn test_non_ui_frame_is_not_bridged() {
    let rr = Frame::new(
        Address::new("APRS", 0).unwrap(),
        Address::new("N0CALL", 0).unwrap(),
        Control::Supervisory {
            kind: SupervisoryKind::Rr,
            nr: 0,
            pf: false,
        },
    );
    assert!(matches!(
        bridge().ui_to_m17(&rr),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_empty_ui_is_not_bridged() {
    let ui = Frame::ui(
        Address::new("APRS", 0).unwrap(),
        Address::new("N0CALL", 0).unwrap(),
        PID_NO_LAYER3,
        b"",
    )
    .unwrap();
    assert!(bridge().ui_to_m17(&ui).is_err());
}
