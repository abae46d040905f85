//! Configuration and Constants Tests
//!
//! Tests to verify configuration values are valid and consistent.
//! Run with: cargo test --features std --test config_tests

use sdr_tnc::config::*;
use sdr_tnc::settings::{parse_callsign, ControllerConfig};
use sdr_tnc::types::{Frequency, OperatingMode, TxFec};
use sdr_tnc::{fx25, il2p, Error};

// =============================================================================
// Default Tests
// =============================================================================

#[test]
fn default_frequency_is_2m_aprs() {
    assert_eq!(DEFAULT_FREQUENCY.as_hz(), DEFAULT_FREQUENCY_HZ);
    assert!(Frequency::from_hz(DEFAULT_FREQUENCY_HZ).is_some());
}

#[test]
fn default_callsign_is_valid() {
    assert_eq!(parse_callsign(DEFAULT_CALLSIGN).unwrap().as_str(), DEFAULT_CALLSIGN);
}

#[test]
fn default_config_matches_constants() {
    let config = ControllerConfig::default();
    assert_eq!(config.mode, DEFAULT_MODE);
    assert_eq!(config.m17_frequency, DEFAULT_FREQUENCY);
    assert_eq!(config.ax25_frequency, DEFAULT_FREQUENCY);
    assert_eq!(config.bandwidth, DEFAULT_BANDWIDTH_HZ);
    assert_eq!(config.protocol_timeout_ms, DEFAULT_PROTOCOL_TIMEOUT_MS);
    assert_eq!(config.scan_dwell_ms, DEFAULT_SCAN_DWELL_MS);
    assert_eq!(config.fec, TxFec::None);
    assert!(!config.full_duplex);
    assert!(config.scan_channels.is_empty());
}

// =============================================================================
// Buffer Size Tests
// =============================================================================

#[test]
fn wire_mtu_holds_largest_encodings() {
    assert!(WIRE_MTU >= fx25::encoded_len(fx25::MAX_DATA_LEN, sdr_tnc::fec::RsCode::K239));
    assert!(WIRE_MTU >= il2p::encoded_len(il2p::MAX_PAYLOAD_LEN));
}

#[test]
fn kiss_payload_holds_a_full_frame() {
    assert!(kiss::MAX_PAYLOAD >= sdr_tnc::ax25::frame::MAX_FRAME_LEN);
    assert!(kiss::MAX_PAYLOAD >= MAX_DELIVERY_LEN);
}

#[test]
fn queues_are_not_empty() {
    assert!(INPUT_QUEUE_DEPTH > 0);
    assert!(TX_QUEUE_DEPTH > 0);
    assert!(RX_QUEUE_DEPTH > 0);
    assert!(HOST_QUEUE_DEPTH > 0);
    assert!(ACTION_QUEUE_DEPTH >= link::SEND_QUEUE_DEPTH);
}

// =============================================================================
// Link Timing Tests
// =============================================================================

#[test]
fn link_timers_are_ordered() {
    assert_eq!(link::T1_MS, 3_000);
    assert_eq!(link::T2_MS, 1_000);
    assert_eq!(link::T3_MS, 30_000);
    // responses must go out before the peer retries
    assert!(link::T2_MS < link::T1_MS);
    assert!(link::T1_MS < link::T3_MS);
}

#[test]
fn link_window_fits_modulus() {
    assert!(link::WINDOW > 0);
    assert!(link::WINDOW < link::MODULUS);
    assert_eq!(link::MODULUS, 8);
    assert_eq!(link::MAX_CONNECTIONS, 16);
}

// =============================================================================
// KISS and Bridge Tests
// =============================================================================

#[test]
fn kiss_defaults() {
    assert_eq!(kiss::TXDELAY, 50);
    assert_eq!(kiss::PERSISTENCE, 63);
    assert_eq!(kiss::SLOTTIME, 10);
    assert_eq!(kiss::TXTAIL, 5);
}

#[test]
fn bridge_constants() {
    assert_eq!(bridge::MAX_MAPPINGS, 16);
    assert!(bridge::DEFAULT_BEACON.starts_with('!'));
    assert_eq!(bridge::PACKET_INFO_LEN, 20);
    assert_eq!(bridge::RELAY_DESTINATION.len(), 6);
}

// =============================================================================
// Settings Text Tests
// =============================================================================

#[test]
fn settings_mode_keyword() {
    let config = ControllerConfig::parse("mode=m17\n").unwrap();
    assert_eq!(config.mode, OperatingMode::M17Only);
}

#[test]
fn settings_bridge_survives_enable_flags() {
    let config = ControllerConfig::parse("mode=bridge\nm17_enabled=1\nax25_enabled=on\n").unwrap();
    assert_eq!(config.mode, OperatingMode::Bridge);
}

#[test]
fn settings_line_without_equals() {
    assert_eq!(
        ControllerConfig::parse("ax25_callsign N0CALL"),
        Err(Error::InvalidArgument("setting line without '='"))
    );
}

#[test]
fn settings_frequency_out_of_range() {
    assert_eq!(
        ControllerConfig::parse("m17_frequency=100"),
        Err(Error::InvalidArgument("frequency out of range"))
    );
}

#[test]
fn settings_scan_list_capacity() {
    let list: Vec<String> = (0..=MAX_SCAN_CHANNELS)
        .map(|i| (144_000_000 + i * 25_000).to_string())
        .collect();
    let text = format!("scan_channels={}", list.join(","));
    assert_eq!(
        ControllerConfig::parse(&text),
        Err(Error::InvalidArgument("too many scan channels"))
    );
}

#[test]
fn settings_callsign_rules() {
    assert!(parse_callsign("w1aw").is_ok());
    assert_eq!(parse_callsign(""), Err(Error::InvalidArgument("empty callsign")));
    assert_eq!(parse_callsign("N0-CALL"), Err(Error::InvalidArgument("callsign character")));
    assert_eq!(parse_callsign("TOOLONG"), Err(Error::InvalidArgument("callsign too long")));
}
