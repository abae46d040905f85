//! Property Tests
//!
//! Invariants that must hold for arbitrary input: integrity checks,
//! Reed-Solomon correction, byte transparency of the framings, address
//! encoding, classification and controller state safety.

use std::collections::HashSet;

use proptest::prelude::*;

use sdr_tnc::ax25::{Address, Frame};
use sdr_tnc::bridge::MappingTable;
use sdr_tnc::classifier::Classifier;
use sdr_tnc::config::bridge::MAX_MAPPINGS;
use sdr_tnc::config::WIRE_MTU;
use sdr_tnc::fec::{ax25_fcs, fcs_register, m17_crc, ReedSolomon, RsCode, FCS_RESIDUE};
use sdr_tnc::hdlc;
use sdr_tnc::kiss::{self, Command, KissDecoder};
use sdr_tnc::m17::M17Frame;
use sdr_tnc::sdr::SdrFault;
use sdr_tnc::{fx25, il2p};
use sdr_tnc::{
    Controller, ControllerConfig, ControllerState, LoopbackSdr, OperatingMode, Protocol,
};

fn callsign() -> impl Strategy<Value = String> {
    "[A-Z0-9]{1,6}"
}

// ============================================================================
// Integrity
// ============================================================================

proptest! {
    #[test]
    fn m17_crc_appended_checks_to_zero(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut buf = data.clone();
        buf.extend_from_slice(&m17_crc(&data).to_be_bytes());
        prop_assert_eq!(m17_crc(&buf), 0);
    }

    #[test]
    fn ax25_fcs_appended_leaves_residue(data in prop::collection::vec(any::<u8>(), 1..256)) {
        let mut buf = data.clone();
        buf.extend_from_slice(&ax25_fcs(&data).to_le_bytes());
        prop_assert_eq!(fcs_register(&buf), FCS_RESIDUE);
    }

    #[test]
    fn m17_crc_detects_any_single_bit_flip(
        data in prop::collection::vec(any::<u8>(), 1..64),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut flipped = data.clone();
        let i = index.index(flipped.len());
        flipped[i] ^= 1 << bit;
        prop_assert_ne!(m17_crc(&flipped), m17_crc(&data));
    }
}

// ============================================================================
// Reed-Solomon
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn rs_corrects_up_to_half_the_roots(
        code in 0usize..8,
        data in prop::collection::vec(any::<u8>(), 1..=31),
        errors in prop::collection::vec((any::<prop::sample::Index>(), 1u8..=255), 0..=8),
    ) {
        let code = RsCode::ALL[code];
        let rs = ReedSolomon::for_code(code);
        let mut parity = vec![0u8; rs.nroots()];
        rs.encode(&data, &mut parity).unwrap();
        let mut block = data.clone();
        block.extend_from_slice(&parity);
        let clean = block.clone();

        let t = rs.nroots() / 2;
        let mut positions = HashSet::new();
        for (index, value) in errors.into_iter().take(t) {
            let pos = index.index(block.len());
            if positions.insert(pos) {
                block[pos] ^= value;
            }
        }

        let corrected = rs.decode(&mut block).unwrap();
        prop_assert_eq!(corrected, positions.len());
        prop_assert_eq!(block, clean);
    }
}

// ============================================================================
// Framing transparency
// ============================================================================

proptest! {
    #[test]
    fn kiss_is_transparent(
        port in 0u8..16,
        payload in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut out = vec![0u8; kiss::encoded_len(0, &payload) + 2 * payload.len() + 4];
        let n = kiss::encode(port, Command::Data, &payload, &mut out).unwrap();
        let encoded = &out[..n];
        prop_assert_eq!(encoded[0], kiss::FEND);
        prop_assert_eq!(encoded[n - 1], kiss::FEND);
        prop_assert!(!encoded[1..n - 1].contains(&kiss::FEND));

        let mut decoder = KissDecoder::new();
        let (used, frame) = decoder.feed_slice(encoded).unwrap();
        prop_assert_eq!(used, n);
        let frame = frame.unwrap();
        prop_assert_eq!(frame.port, port);
        prop_assert_eq!(frame.command, Command::Data);
        prop_assert_eq!(&frame.payload[..], &payload[..]);
    }

    #[test]
    fn bit_stuffing_round_trips(data in prop::collection::vec(any::<u8>(), 0..300)) {
        let mut stuffed = vec![0u8; hdlc::max_stuffed_len(data.len())];
        let n = hdlc::stuff(&data, &mut stuffed).unwrap();
        let mut plain = vec![0u8; data.len() + 1];
        let m = hdlc::unstuff(&stuffed[..n], &mut plain).unwrap();
        prop_assert_eq!(&plain[..m], &data[..]);
    }

    #[test]
    fn hdlc_frame_round_trips(data in prop::collection::vec(any::<u8>(), 1..300)) {
        let mut framed = vec![0u8; hdlc::max_stuffed_len(data.len()) + 2];
        let n = hdlc::frame(&data, &mut framed).unwrap();
        let mut out = vec![0u8; data.len() + 1];
        let m = hdlc::deframe(&framed[..n], &mut out).unwrap();
        prop_assert_eq!(&out[..m], &data[..]);
    }
}

// ============================================================================
// Addresses and frames
// ============================================================================

proptest! {
    #[test]
    fn address_encoding_is_a_bijection(
        call in callsign(),
        ssid in 0u8..16,
        c_bit in any::<bool>(),
        last in any::<bool>(),
    ) {
        let address = Address::new(&call, ssid).unwrap().with_c_bit(c_bit);
        let bytes = address.encode(last);
        let (decoded, is_last) = Address::decode(&bytes).unwrap();
        prop_assert_eq!(&decoded, &address);
        prop_assert_eq!(is_last, last);
        prop_assert_eq!(decoded.callsign(), call.as_str());
    }

    #[test]
    fn ui_frames_survive_the_wire(
        src in callsign(),
        dst in callsign(),
        info in prop::collection::vec(any::<u8>(), 0..=256),
    ) {
        let frame = Frame::ui(
            Address::new(&dst, 0).unwrap().with_c_bit(true),
            Address::new(&src, 1).unwrap(),
            0xF0,
            &info,
        )
        .unwrap();
        let mut wire = [0u8; WIRE_MTU];
        let n = frame.encode_with_fcs(&mut wire).unwrap();
        prop_assert_eq!(Frame::decode_with_fcs(&wire[..n]).unwrap(), frame);
    }

    #[test]
    fn decoders_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..600)) {
        let _ = Frame::decode(&bytes);
        let _ = Frame::decode_with_fcs(&bytes);
        let _ = M17Frame::decode(&bytes);
        let mut out = [0u8; fx25::MAX_DATA_LEN];
        let _ = fx25::decode(&bytes, &mut out);
        let _ = il2p::decode_ax25(&bytes);
        let _ = hdlc::unwrap(&bytes);
    }
}

// ============================================================================
// Classification
// ============================================================================

proptest! {
    #[test]
    fn classification_is_deterministic(
        bytes in prop::collection::vec(any::<u8>(), 0..300),
        mode in 0usize..4,
    ) {
        let mode = [
            OperatingMode::M17Only,
            OperatingMode::Ax25Only,
            OperatingMode::Dual,
            OperatingMode::Bridge,
        ][mode];
        let mut classifier = Classifier::new(mode, 5_000);
        let first = classifier.detect(&bytes);
        prop_assert_eq!(classifier.detect(&bytes), first);
        prop_assert_eq!(classifier.classify(&bytes, 10), first);
        prop_assert_eq!(classifier.classify(&bytes, 20), first);
        if first != Protocol::Unknown {
            prop_assert!(classifier.enabled(first));
        }
    }

    #[test]
    fn hdlc_wrapped_frames_classify_as_ax25(
        src in callsign(),
        info in prop::collection::vec(any::<u8>(), 1..64),
    ) {
        let frame = Frame::ui(
            Address::new("APRS", 0).unwrap(),
            Address::new(&src, 0).unwrap(),
            0xF0,
            &info,
        )
        .unwrap();
        let mut wire = [0u8; WIRE_MTU];
        let n = frame.to_hdlc(&mut wire).unwrap();
        let detected = Classifier::new(OperatingMode::Ax25Only, 0).detect(&wire[..n]);
        prop_assert!(matches!(detected, Protocol::Ax25 | Protocol::Aprs | Protocol::Il2p));
    }
}

// ============================================================================
// Controller state safety
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum Op {
    StartRx,
    StopRx,
    StartTx,
    StopTx,
    StartScan,
    StopScan,
    Reset,
    SendAprs,
    SendM17,
    Tick,
    LoopBack,
    Garbage,
    Fatal,
    Busy,
    ClearFault,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::StartRx),
        Just(Op::StopRx),
        Just(Op::StartTx),
        Just(Op::StopTx),
        Just(Op::StartScan),
        Just(Op::StopScan),
        Just(Op::Reset),
        Just(Op::SendAprs),
        Just(Op::SendM17),
        Just(Op::Tick),
        Just(Op::LoopBack),
        Just(Op::Garbage),
        Just(Op::Fatal),
        Just(Op::Busy),
        Just(Op::ClearFault),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn controller_state_stays_consistent(ops in prop::collection::vec(op(), 1..60)) {
        let mut config = ControllerConfig::default();
        let _ = config.scan_channels.push(sdr_tnc::config::DEFAULT_FREQUENCY);
        let mut c: Controller<LoopbackSdr> = Controller::new(config).unwrap();
        c.bind_sdr(LoopbackSdr::new()).unwrap();

        let mut fault = None;
        let mut fatal_since_reset = false;
        let mut now = 0u64;
        let mut buf = [0u8; WIRE_MTU];

        for op in ops {
            match op {
                Op::StartRx => { let _ = c.start_rx(); }
                Op::StopRx => { let _ = c.stop_rx(); }
                Op::StartTx => { let _ = c.start_tx(); }
                Op::StopTx => { let _ = c.stop_tx(); }
                Op::StartScan => { let _ = c.start_scan(); }
                Op::StopScan => { let _ = c.stop_scan(); }
                Op::Reset => {
                    c.reset();
                    fatal_since_reset = fault == Some(SdrFault::Fatal);
                    prop_assert_eq!(c.state(), ControllerState::Idle);
                    continue;
                }
                Op::SendAprs => { let _ = c.send_aprs("!0000.00N/00000.00W-prop"); }
                Op::SendM17 => { let _ = c.send_m17("@ALL", b"prop"); }
                Op::Tick => {
                    now += 500;
                    c.tick(now);
                }
                Op::LoopBack => {
                    if let Some(sdr) = c.sdr_mut() {
                        sdr.loop_back();
                    }
                    let _ = c.receive(&mut buf);
                }
                Op::Garbage => {
                    if let Some(sdr) = c.sdr_mut() {
                        let _ = sdr.inject(&[0x7E, 0x01, 0x7E]);
                    }
                    let _ = c.receive(&mut buf);
                }
                Op::Fatal | Op::Busy | Op::ClearFault => {
                    fault = match op {
                        Op::Fatal => Some(SdrFault::Fatal),
                        Op::Busy => Some(SdrFault::Busy),
                        _ => None,
                    };
                    if fault == Some(SdrFault::Fatal) {
                        fatal_since_reset = true;
                    }
                    if let Some(sdr) = c.sdr_mut() {
                        sdr.set_fault(fault);
                    }
                }
            }

            let state = c.state();
            if state == ControllerState::Error {
                prop_assert!(fatal_since_reset, "error without a fatal fault");
            }
            if state == ControllerState::Tx {
                prop_assert!(c.sdr().is_some_and(LoopbackSdr::is_transmitting));
            }
            prop_assert!(c.pending_tx() <= sdr_tnc::config::TX_QUEUE_DEPTH);
        }
    }
}

// ============================================================================
// Bridge mapping
// ============================================================================

proptest! {
    #[test]
    fn mapping_table_keeps_m17_callsigns_unique(
        entries in prop::collection::vec(("[A-D][0-9][A-C]{1,3}", callsign(), 0u8..16), 0..40),
    ) {
        let mut table = MappingTable::new();
        for (m17, ax25, ssid) in &entries {
            let _ = table.add(m17, ax25, *ssid);
        }
        prop_assert!(table.len() <= MAX_MAPPINGS);
        let mut seen = HashSet::new();
        for mapping in table.iter() {
            prop_assert!(seen.insert(mapping.m17().to_string()));
        }
    }
}
