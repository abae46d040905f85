//! M17 Tests
//!
//! Base-40 addressing, the Link Setup Frame, frame envelopes, LICH
//! reassembly, packet mode and the symbol-level helpers.

use sdr_tnc::m17::callsign::{self, BROADCAST, BROADCAST_TEXT, HASH_BASE, HASH_LIMIT};
use sdr_tnc::m17::frame::{lich_chunk, is_m17, LICH_COUNT};
use sdr_tnc::m17::lsf::{MetaKind, Motion, LSF_LEN};
use sdr_tnc::m17::packet::{packetize, MAX_PACKET_LEN, PACKET_CHUNK};
use sdr_tnc::m17::phy::{self, Syncword, SYMBOL_LIST, SYMBOL_MAP};
use sdr_tnc::m17::{
    LichCollector, Lsf, LsfType, M17Frame, PacketAssembler, Position, StreamFrame,
};
use sdr_tnc::simd::{Capability, Simd};
use sdr_tnc::{Can, Error};

fn can(value: u8) -> Can {
    Can::new(value).unwrap()
}

// ============================================================================
// Callsign Tests
// ============================================================================

#[test]
fn test_callsign_base40_values() {
    assert_eq!(callsign::encode_value("A").unwrap(), 1);
    assert_eq!(callsign::encode_value("AB").unwrap(), 1 + 2 * 40);
    assert_eq!(callsign::encode_value("").unwrap(), 0);
}

#[test]
fn test_callsign_round_trip() {
    for call in ["SP5WWP", "N0CALL", "W1AW/P", "AB-1.2", "ABCDEFGHI"] {
        let bytes = callsign::encode(call).unwrap();
        assert_eq!(callsign::decode(&bytes).unwrap().as_str(), call);
    }
}

#[test]
fn test_callsign_broadcast() {
    let bytes = callsign::encode(BROADCAST_TEXT).unwrap();
    assert_eq!(bytes, [0xFF; 6]);
    assert_eq!(callsign::decode_value(BROADCAST).unwrap().as_str(), "@ALL");
}

#[test]
fn test_callsign_hash_space() {
    let value = callsign::encode_value("#TALK").unwrap();
    assert!(value >= HASH_BASE && value < HASH_LIMIT);
    assert_eq!(callsign::decode_value(value).unwrap().as_str(), "#TALK");
}

#[test]
fn test_callsign_reserved_values_are_malformed() {
    assert!(matches!(
        callsign::decode_value(HASH_LIMIT),
        Err(Error::Malformed(_))
    ));
    assert!(matches!(
        callsign::decode_value(BROADCAST - 1),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn test_callsign_rejects_bad_input() {
    assert!(matches!(
        callsign::encode("TOOLONGCALL"),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(callsign::encode("ab"), Err(Error::InvalidArgument(_))));
    assert!(matches!(callsign::encode("A*B"), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_callsign_normalize() {
    assert_eq!(callsign::normalize("sp5wwp").unwrap().as_str(), "SP5WWP");
    assert!(callsign::normalize("AB").is_err());
    assert!(callsign::normalize("SP5-WWP").is_err());
}

// ============================================================================
// LSF Tests
// ============================================================================

#[test]
fn test_lsf_type_fields() {
    let packet = LsfType::packet(can(5));
    assert!(!packet.is_stream());
    assert!(packet.has_data());
    assert!(!packet.has_voice());
    assert_eq!(packet.can(), 5);
    assert_eq!(packet.encryption(), 0);

    let voice = LsfType::voice_stream(can(15));
    assert!(voice.is_stream());
    assert!(voice.has_voice());
    assert_eq!(voice.can(), 15);
    assert_eq!(voice.meta_kind(), Some(MetaKind::Text));
}

#[test]
fn test_lsf_round_trip() {
    let lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(can(2))).unwrap();
    let bytes = lsf.to_bytes();
    assert_eq!(bytes.len(), LSF_LEN);
    let decoded = Lsf::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, lsf);
    assert_eq!(decoded.src_callsign().unwrap().as_str(), "SP5WWP");
    assert_eq!(decoded.dst_callsign().unwrap().as_str(), "@ALL");
}

#[test]
fn test_lsf_crc_detects_corruption() {
    let lsf = Lsf::new("N0CALL", "SP5WWP", LsfType::packet(can(0))).unwrap();
    let mut bytes = lsf.to_bytes();
    bytes[7] ^= 0x01;
    assert!(matches!(
        Lsf::from_bytes(&bytes),
        Err(Error::IntegrityFailure(_))
    ));
    assert!(matches!(Lsf::from_bytes(&bytes[..20]), Err(Error::Malformed(_))));
}

#[test]
fn test_lsf_position_meta() {
    let mut lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(can(0))).unwrap();
    assert!(lsf.position().is_none());
    let position = Position {
        source: 0,
        station: 2,
        latitude: 52.25,
        longitude: -21.0,
        altitude: Some(350),
        motion: Some(Motion {
            bearing: 270,
            speed: 30,
        }),
    };
    lsf.set_position(&position);
    let decoded = Lsf::from_bytes(&lsf.to_bytes()).unwrap().position().unwrap();
    assert!((decoded.latitude - 52.25).abs() < 1e-4);
    assert!((decoded.longitude + 21.0).abs() < 1e-4);
    assert_eq!(decoded.altitude, Some(350));
    assert_eq!(decoded.motion, position.motion);
    assert_eq!(decoded.station, 2);
}

#[test]
fn test_lsf_extended_callsign_meta() {
    let mut lsf = Lsf::new("@ALL", "SP5WWP", LsfType::voice_stream(can(0))).unwrap();
    assert_eq!(lsf.extended_callsign().unwrap(), None);
    lsf.set_extended_callsign("N0CALL", "W1AW").unwrap();
    let (first, second) = lsf.extended_callsign().unwrap().unwrap();
    assert_eq!(first.as_str(), "N0CALL");
    assert_eq!(second.as_str(), "W1AW");
    assert!(lsf.position().is_none());
}

// ============================================================================
// Frame Envelope Tests
// ============================================================================

fn round_trip(frame: &M17Frame) -> M17Frame {
    let mut out = [0u8; 64];
    let n = frame.encode(&mut out).unwrap();
    assert_eq!(n, frame.encoded_len());
    assert!(is_m17(&out[..n]));
    M17Frame::decode(&out[..n]).unwrap()
}

#[test]
fn test_envelope_round_trips() {
    let lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(can(1))).unwrap();
    let stream = StreamFrame {
        lich: [1, 2, 3, 4, 5, 0x40],
        frame_number: 0x1234,
        end_of_stream: true,
        payload: [0xAA; 16],
    };
    let frames = [
        M17Frame::Lsf(lsf),
        M17Frame::Stream(stream),
        M17Frame::Packet(packetize(b"hi").unwrap()[0]),
        M17Frame::Eot,
        M17Frame::Bert([0x5A; 25]),
    ];
    for frame in frames {
        assert_eq!(round_trip(&frame), frame, "{}", frame.name());
    }
}

#[test]
fn test_envelope_layout() {
    let mut out = [0u8; 8];
    let n = M17Frame::Eot.encode(&mut out).unwrap();
    assert_eq!(&out[..n], &[0x5D, 0x5F, 0x03]);
}

#[test]
fn test_envelope_errors() {
    assert!(matches!(
        M17Frame::decode(&[0x5D, 0x60, 0x03]),
        Err(Error::Malformed(_))
    ));
    assert!(matches!(
        M17Frame::decode(&[0x5D, 0x5F, 0x09]),
        Err(Error::Malformed(_))
    ));
    assert!(matches!(
        M17Frame::decode(&[0x5D, 0x5F, 0x03, 0x00]),
        Err(Error::Malformed(_))
    ));
    let mut out = [0u8; 2];
    assert!(matches!(
        M17Frame::Eot.encode(&mut out),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_envelope_lsf_crc_failure() {
    let lsf = Lsf::new("@ALL", "SP5WWP", LsfType::packet(can(1))).unwrap();
    let mut out = [0u8; 64];
    let n = M17Frame::Lsf(lsf).encode(&mut out).unwrap();
    out[5] ^= 0x80;
    assert!(matches!(
        M17Frame::decode(&out[..n]),
        Err(Error::IntegrityFailure(_))
    ));
}

// ============================================================================
// LICH Tests
// ============================================================================

#[test]
fn test_lich_reassembles_lsf_in_any_order() {
    let lsf = Lsf::new("N0CALL", "SP5WWP", LsfType::voice_stream(can(3))).unwrap();
    let bytes = lsf.to_bytes();
    let mut collector = LichCollector::new();
    for counter in [3u8, 0, 5, 1, 4] {
        let chunk = lich_chunk(&bytes, counter).unwrap();
        assert_eq!(collector.push(&chunk).unwrap(), None);
    }
    assert_eq!(collector.count(), 5);
    let chunk = lich_chunk(&bytes, 2).unwrap();
    assert_eq!(collector.push(&chunk).unwrap(), Some(lsf));
    assert_eq!(collector.count(), 0);
}

#[test]
fn test_lich_counter_limits() {
    let bytes = [0u8; LSF_LEN];
    assert!(matches!(
        lich_chunk(&bytes, LICH_COUNT as u8),
        Err(Error::InvalidArgument(_))
    ));
    let mut collector = LichCollector::new();
    assert!(matches!(
        collector.push(&[0, 0, 0, 0, 0, 6 << 5]),
        Err(Error::Malformed(_))
    ));
}

#[test]
fn test_lich_bad_crc() {
    let mut bytes = Lsf::new("N0CALL", "SP5WWP", LsfType::voice_stream(can(0)))
        .unwrap()
        .to_bytes();
    bytes[0] ^= 0xFF;
    let mut collector = LichCollector::new();
    let mut result = Ok(None);
    for counter in 0..6u8 {
        result = collector.push(&lich_chunk(&bytes, counter).unwrap());
    }
    assert!(matches!(result, Err(Error::IntegrityFailure(_))));
}

// ============================================================================
// Packet Mode Tests
// ============================================================================

#[test]
fn test_packetize_counters() {
    let data = [0x42u8; 60];
    let frames = packetize(&data).unwrap();
    // 60 data + 2 crc = 62 bytes -> 25 + 25 + 12
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].counter, 0 << 2);
    assert_eq!(frames[1].counter, 1 << 2);
    assert_eq!(frames[2].counter, 0x80 | (12 << 2));
    assert!(frames[2].eof());
    assert_eq!(frames[2].len(), 12);
    assert_eq!(frames[1].index(), Some(1));
}

#[test]
fn test_packet_round_trip() {
    let data: Vec<u8> = (0..200u8).collect();
    let mut assembler = PacketAssembler::new();
    let mut result = None;
    for frame in packetize(&data).unwrap() {
        result = assembler.push(&frame).unwrap();
    }
    assert_eq!(&result.unwrap()[..], &data[..]);
    assert_eq!(assembler.frames(), 0);
}

#[test]
fn test_packet_exact_multiple_of_chunk() {
    let data = [7u8; 2 * PACKET_CHUNK - 2];
    let frames = packetize(&data).unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].len(), PACKET_CHUNK);
    let mut assembler = PacketAssembler::new();
    assert_eq!(assembler.push(&frames[0]).unwrap(), None);
    assert_eq!(&assembler.push(&frames[1]).unwrap().unwrap()[..], &data[..]);
}

#[test]
fn test_packet_size_limits() {
    assert!(matches!(packetize(&[]), Err(Error::InvalidArgument(_))));
    assert!(packetize(&[0u8; MAX_PACKET_LEN]).is_ok());
    assert!(matches!(
        packetize(&[0u8; MAX_PACKET_LEN + 1]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_packet_out_of_order() {
    let frames = packetize(&[1u8; 80]).unwrap();
    let mut assembler = PacketAssembler::new();
    assembler.push(&frames[0]).unwrap();
    assert!(matches!(
        assembler.push(&frames[2]),
        Err(Error::Malformed(_))
    ));
    assert_eq!(assembler.frames(), 0);
}

#[test]
fn test_packet_crc_failure() {
    let mut frames = packetize(b"short").unwrap();
    frames[0].payload[0] ^= 0x01;
    let mut assembler = PacketAssembler::new();
    assert!(matches!(
        assembler.push(&frames[0]),
        Err(Error::IntegrityFailure(_))
    ));
}

// ============================================================================
// Symbol Layer Tests
// ============================================================================

#[test]
fn test_symbol_tables() {
    assert_eq!(SYMBOL_MAP, [1, 3, -1, -3]);
    assert_eq!(SYMBOL_LIST, [-3, -1, 1, 3]);
}

#[test]
fn test_syncword_symbols() {
    assert_eq!(Syncword::Lsf.word(), 0x55F7);
    assert_eq!(Syncword::Stream.symbols(), [-3, -3, -3, -3, 3, 3, -3, 3]);
    assert_eq!(Syncword::Packet.symbols(), [3, -3, 3, 3, -3, -3, -3, -3]);
}

#[test]
fn test_match_syncword_picks_nearest() {
    let simd = Simd::with_capability(Capability::Scalar);
    for sync in Syncword::ALL {
        let noisy: Vec<f32> = sync
            .symbols()
            .iter()
            .map(|&s| f32::from(s) * 0.95 + 0.05)
            .collect();
        let (found, distance) = phy::match_syncword(&simd, &noisy).unwrap();
        assert_eq!(found, sync);
        assert!(distance < 1.0);
    }
    assert!(matches!(
        phy::match_syncword(&simd, &[0.0; 7]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_randomizer_is_involution() {
    let original: Vec<u8> = (0..46u8).collect();
    let mut data = original.clone();
    phy::randomize_bytes(&mut data).unwrap();
    assert_ne!(data, original);
    phy::randomize_bytes(&mut data).unwrap();
    assert_eq!(data, original);
    assert!(phy::randomize_bytes(&mut [0u8; 47]).is_err());
}

#[test]
fn test_bit_and_byte_randomizers_agree() {
    let mut bytes = [0u8; 46];
    phy::randomize_bytes(&mut bytes).unwrap();
    let mut bits = [0u8; 368];
    phy::randomize_bits(&mut bits).unwrap();
    for (i, bit) in bits.iter().enumerate() {
        assert_eq!(*bit, (bytes[i / 8] >> (7 - i % 8)) & 1, "bit {i}");
    }
}

#[test]
fn test_soft_randomizer_inverts_flagged_bits() {
    let mut soft = [0u16; 16];
    phy::randomize_soft_bits(&mut soft).unwrap();
    for (i, value) in soft.iter().enumerate() {
        let expected = if phy::rand_bit(i) { 0xFFFF } else { 0 };
        assert_eq!(*value, expected);
    }
}
