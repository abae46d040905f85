//! Types Module Tests
//!
//! Tests for domain types (Frequency, Ssid, Can, OperatingMode, Protocol, TxFec)
//! Run with: cargo test --features std --test types_tests

use sdr_tnc::fec::RsCode;
use sdr_tnc::types::{Can, Frequency, Modulation, OperatingMode, Protocol, Ssid, TxFec};
use sdr_tnc::Error;

// =============================================================================
// Frequency Tests
// =============================================================================

#[test]
fn test_frequency_from_hz_valid() {
    assert!(Frequency::from_hz(144_800_000).is_some());
    assert!(Frequency::from_hz(433_475_000).is_some());
    assert!(Frequency::from_hz(Frequency::MIN_HZ).is_some()); // Min
    assert!(Frequency::from_hz(Frequency::MAX_HZ).is_some()); // Max
}

#[test]
fn test_frequency_from_hz_invalid() {
    // Below minimum
    assert!(Frequency::from_hz(0).is_none());
    assert!(Frequency::from_hz(999_999).is_none());

    // Above maximum
    assert!(Frequency::from_hz(3_000_000_001).is_none());
    assert!(Frequency::from_hz(u32::MAX).is_none());
}

#[test]
fn test_frequency_as_khz() {
    let freq = Frequency::from_hz(144_390_500).unwrap();
    assert_eq!(freq.as_hz(), 144_390_500);
    assert_eq!(freq.as_khz(), 144_390);
}

#[test]
fn test_frequency_debug() {
    let freq = Frequency::from_hz(144_800_000).unwrap();
    assert_eq!(format!("{freq:?}"), "Frequency(144800000 Hz)");
}

#[test]
fn test_frequency_ordering() {
    let low = Frequency::from_hz(144_390_000).unwrap();
    let high = Frequency::from_hz(144_800_000).unwrap();
    assert!(low < high);
}

// =============================================================================
// Ssid / Can Tests
// =============================================================================

#[test]
fn test_ssid_range() {
    assert_eq!(Ssid::new(0).unwrap().value(), 0);
    assert_eq!(Ssid::new(15).unwrap().value(), 15);
    assert!(Ssid::new(16).is_none());
    assert_eq!(Ssid::default().value(), 0);
}

#[test]
fn test_can_range() {
    assert_eq!(Can::new(7).unwrap().value(), 7);
    assert!(Can::new(Can::MAX + 1).is_none());
    assert_eq!(Can::default().value(), 0);
}

// =============================================================================
// OperatingMode Tests
// =============================================================================

#[test]
fn test_mode_protocol_sets() {
    assert!(OperatingMode::M17Only.m17_enabled());
    assert!(!OperatingMode::M17Only.ax25_enabled());
    assert!(!OperatingMode::Ax25Only.m17_enabled());
    assert!(OperatingMode::Ax25Only.ax25_enabled());
    for mode in [OperatingMode::Dual, OperatingMode::Bridge] {
        assert!(mode.m17_enabled());
        assert!(mode.ax25_enabled());
    }
}

#[test]
fn test_mode_from_flags() {
    assert_eq!(OperatingMode::from_flags(true, true), Some(OperatingMode::Dual));
    assert_eq!(OperatingMode::from_flags(true, false), Some(OperatingMode::M17Only));
    assert_eq!(OperatingMode::from_flags(false, true), Some(OperatingMode::Ax25Only));
    assert_eq!(OperatingMode::from_flags(false, false), None);
}

#[test]
fn test_mode_parse_and_display() {
    for mode in [
        OperatingMode::M17Only,
        OperatingMode::Ax25Only,
        OperatingMode::Dual,
        OperatingMode::Bridge,
    ] {
        assert_eq!(mode.to_string().parse::<OperatingMode>().unwrap(), mode);
    }
    assert_eq!(" BRIDGE ".parse::<OperatingMode>().unwrap(), OperatingMode::Bridge);
    assert_eq!(
        "aprs".parse::<OperatingMode>(),
        Err(Error::InvalidArgument("unknown mode"))
    );
}

#[test]
fn test_mode_default_is_dual() {
    assert_eq!(OperatingMode::default(), OperatingMode::Dual);
}

// =============================================================================
// Protocol Tests
// =============================================================================

#[test]
fn test_protocol_flags_are_distinct() {
    let mut mask = 0u8;
    for protocol in Protocol::ALL {
        let flag = protocol.flag();
        assert_eq!(flag.count_ones(), 1, "{protocol}");
        assert_eq!(mask & flag, 0, "{protocol}");
        mask |= flag;
    }
    assert_eq!(Protocol::Unknown.flag(), 0);
}

#[test]
fn test_protocol_modulation() {
    assert_eq!(Protocol::M17.modulation(), Some(Modulation::M17Fsk4));
    for protocol in [Protocol::Ax25, Protocol::Aprs, Protocol::Fx25, Protocol::Il2p] {
        assert_eq!(protocol.modulation(), Some(Modulation::Afsk1200));
    }
    assert_eq!(Protocol::Unknown.modulation(), None);
}

#[test]
fn test_protocol_display_pads() {
    assert_eq!(Protocol::Fx25.to_string(), "fx25");
    assert_eq!(format!("[{:>6}]", Protocol::M17), "[   m17]");
}

// =============================================================================
// TxFec Tests
// =============================================================================

#[test]
fn test_tx_fec_parse() {
    assert_eq!("none".parse::<TxFec>().unwrap(), TxFec::None);
    assert_eq!("il2p".parse::<TxFec>().unwrap(), TxFec::Il2p);
    assert_eq!("fx25".parse::<TxFec>().unwrap(), TxFec::Fx25(RsCode::K239));
    assert_eq!("fx25:63".parse::<TxFec>().unwrap(), TxFec::Fx25(RsCode::K63));
}

#[test]
fn test_tx_fec_parse_invalid() {
    assert!(matches!("fx25:100".parse::<TxFec>(), Err(Error::InvalidArgument(_))));
    assert!(matches!("rs".parse::<TxFec>(), Err(Error::InvalidArgument(_))));
    assert!(matches!("fx25:".parse::<TxFec>(), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_tx_fec_display_round_trip() {
    for fec in RsCode::ALL.into_iter().map(TxFec::Fx25).chain([TxFec::None, TxFec::Il2p]) {
        assert_eq!(fec.to_string().parse::<TxFec>().unwrap(), fec);
    }
}
