//! Dual-mode radio controller
//!
//! The controller owns every piece of protocol state for one radio: the
//! classifier, the AX.25 link table, the bridge, the KISS host side and the
//! statistics. It drives an [`Sdr`] capability and reports to an
//! [`Observer`].
//!
//! # State machine
//!
//! ```text
//!            start_rx             start_tx
//!   Rx <------------- Idle -------------> Tx
//!    \  stop_rx  --->  ^  <---  stop_tx  /
//!                      |
//!         start_scan   |  stop_scan
//!                      v
//!                    Scan
//!
//!   any state --(fatal SDR fault)--> Error --reset--> Idle
//! ```
//!
//! The radio is half-duplex unless configured otherwise. Frames queued by
//! the link layer, the bridge or the host while receiving are sent by an
//! internal turnaround (stop RX, key, send, unkey, resume RX) on the next
//! tick or poll.

use core::iter;

use heapless::{Deque, Vec};
use log::{debug, info, trace, warn};

use crate::ax25::frame::Info;
use crate::ax25::{
    Address, Control, Frame, LinkAction, LinkManager, LinkState, UnnumberedKind, PID_NO_LAYER3,
};
use crate::bridge::{Bridge, APRS_DESTINATION};
use crate::classifier::Classifier;
use crate::config::{
    ACTION_QUEUE_DEPTH, HOST_QUEUE_DEPTH, RX_QUEUE_DEPTH, TX_QUEUE_DEPTH, WIRE_MTU,
};
use crate::error::{Error, Result};
use crate::events::{Chunk, Input, InputQueue, LinkEvent, Observer, Stats};
use crate::fx25;
use crate::hdlc;
use crate::il2p;
use crate::kiss::{self, Command, KissDecoder, KissFrame, KissParams};
use crate::m17::lsf::{Lsf, LsfType};
use crate::m17::packet::{packetize, MAX_PACKET_LEN};
use crate::m17::{LichCollector, M17Frame, PacketAssembler};
use crate::sdr::{Sdr, SdrResult};
use crate::settings::ControllerConfig;
use crate::types::{Direction, Frequency, Modulation, OperatingMode, Protocol, TxFec};

/// Controller state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Radio idle
    #[default]
    Idle,
    /// Receiving
    Rx,
    /// Transmitter keyed
    Tx,
    /// Receiving while hopping over the scan list
    Scan,
    /// Fatal SDR fault; needs `reset`
    Error,
}

impl ControllerState {
    /// Short name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rx => "rx",
            Self::Tx => "tx",
            Self::Scan => "scan",
            Self::Error => "error",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for ControllerState {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// A frame handed back by [`Controller::receive`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Received {
    /// Protocol after decoding
    pub protocol: Protocol,
    /// Bytes written to the caller's buffer
    pub len: usize,
}

/// Frame waiting for the transmitter
#[derive(Clone, Debug, PartialEq, Eq)]
enum Outgoing {
    Ax25(Frame),
    M17(M17Frame),
}

/// How the transmitter gets keyed for a burst
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Keying {
    /// Already in Tx
    Keyed,
    /// From Idle: key, send, unkey
    Burst,
    /// From Rx with full duplex: receiver untouched
    Duplex,
    /// From Rx/Scan half duplex: stop RX, send, resume RX
    Turnaround,
}

/// Radio controller
pub struct Controller<S: Sdr, O: Observer = ()> {
    config: ControllerConfig,
    state: ControllerState,
    sdr: Option<S>,
    observer: O,
    classifier: Classifier,
    links: LinkManager,
    bridge: Bridge,
    stats: Stats,
    kiss_params: KissParams,
    kiss_decoder: KissDecoder,
    input: InputQueue,
    actions: Deque<LinkAction, ACTION_QUEUE_DEPTH>,
    pending_tx: Deque<Outgoing, TX_QUEUE_DEPTH>,
    ready: Deque<(Protocol, Chunk), RX_QUEUE_DEPTH>,
    host_out: Deque<Chunk, HOST_QUEUE_DEPTH>,
    link_rx: Deque<(Address, Info), RX_QUEUE_DEPTH>,
    m17_packets: Deque<Vec<u8, MAX_PACKET_LEN>, 2>,
    lich: LichCollector,
    packets: PacketAssembler,
    stream_lsf: Option<Lsf>,
    stream_open: bool,
    il2p_sequence: u8,
    scan_index: usize,
    scan_deadline: u64,
    now_ms: u64,
    uptime_base: Option<u64>,
}

impl<S: Sdr> Controller<S, ()> {
    /// Controller without an observer
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configured callsign cannot be used.
    pub fn new(config: ControllerConfig) -> Result<Self> {
        Self::with_observer(config, ())
    }
}

impl<S: Sdr, O: Observer> Controller<S, O> {
    /// Controller reporting to `observer`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the configured callsign cannot be used.
    pub fn with_observer(config: ControllerConfig, observer: O) -> Result<Self> {
        let station = Address::new(&config.callsign, config.ssid.value())?;
        let mut bridge = Bridge::new(&config.callsign, config.ssid.value())?;
        bridge.set_can(config.can);
        let mut kiss_params = KissParams::default();
        kiss_params.full_duplex = config.full_duplex;
        info!("controller: {} as {station}", config.mode);
        Ok(Self {
            classifier: Classifier::new(config.mode, config.protocol_timeout_ms),
            links: LinkManager::new(station),
            bridge,
            kiss_params,
            config,
            state: ControllerState::Idle,
            sdr: None,
            observer,
            stats: Stats::default(),
            kiss_decoder: KissDecoder::new(),
            input: InputQueue::new(),
            actions: Deque::new(),
            pending_tx: Deque::new(),
            ready: Deque::new(),
            host_out: Deque::new(),
            link_rx: Deque::new(),
            m17_packets: Deque::new(),
            lich: LichCollector::new(),
            packets: PacketAssembler::new(),
            stream_lsf: None,
            stream_open: false,
            il2p_sequence: 0,
            scan_index: 0,
            scan_deadline: 0,
            now_ms: 0,
            uptime_base: None,
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current state
    #[must_use]
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Statistics snapshot
    #[must_use]
    pub const fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Zero all counters
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Classifier (active protocol, flags)
    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// AX.25 link table
    #[must_use]
    pub const fn links(&self) -> &LinkManager {
        &self.links
    }

    /// Bridge and its mapping table
    #[must_use]
    pub const fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Mutable bridge, for mappings and the beacon
    pub fn bridge_mut(&mut self) -> &mut Bridge {
        &mut self.bridge
    }

    /// Parameters last set over KISS
    #[must_use]
    pub const fn kiss_params(&self) -> &KissParams {
        &self.kiss_params
    }

    /// Observer
    #[must_use]
    pub const fn observer(&self) -> &O {
        &self.observer
    }

    /// Mutable observer
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Replace the observer, returning the old one
    pub fn set_observer(&mut self, observer: O) -> O {
        core::mem::replace(&mut self.observer, observer)
    }

    /// Bound SDR
    #[must_use]
    pub const fn sdr(&self) -> Option<&S> {
        self.sdr.as_ref()
    }

    /// Mutable bound SDR
    pub fn sdr_mut(&mut self) -> Option<&mut S> {
        self.sdr.as_mut()
    }

    /// Attach an SDR; returns the one it replaces
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Idle or Error.
    pub fn bind_sdr(&mut self, sdr: S) -> Result<Option<S>> {
        self.require_quiet("sdr can only be swapped while idle")?;
        Ok(self.sdr.replace(sdr))
    }

    /// Detach the SDR
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Idle or Error.
    pub fn unbind_sdr(&mut self) -> Result<Option<S>> {
        self.require_quiet("sdr can only be swapped while idle")?;
        Ok(self.sdr.take())
    }

    /// Operating mode
    #[must_use]
    pub const fn mode(&self) -> OperatingMode {
        self.config.mode
    }

    /// Change the operating mode; the receiver follows if running
    ///
    /// # Errors
    ///
    /// SDR faults while retuning a running receiver.
    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<()> {
        info!("controller: mode {} -> {mode}", self.config.mode);
        self.config.mode = mode;
        self.classifier.set_mode(mode);
        if matches!(self.state, ControllerState::Rx | ControllerState::Scan) {
            let modulation = self.rx_modulation();
            self.sdr_do(|sdr| sdr.set_modulation(modulation))?;
        }
        Ok(())
    }

    /// FEC used for outbound AX.25
    #[must_use]
    pub const fn tx_fec(&self) -> TxFec {
        self.config.fec
    }

    /// Change the outbound AX.25 FEC
    pub fn set_tx_fec(&mut self, fec: TxFec) {
        self.config.fec = fec;
    }

    /// Allow or forbid sending while receiving
    pub fn set_full_duplex(&mut self, full_duplex: bool) {
        self.config.full_duplex = full_duplex;
        self.kiss_params.full_duplex = full_duplex;
    }

    /// Whether an M17 stream is in progress
    #[must_use]
    pub const fn m17_stream_open(&self) -> bool {
        self.stream_open
    }

    /// LSF rebuilt from the current stream's LICH
    #[must_use]
    pub const fn stream_lsf(&self) -> Option<&Lsf> {
        self.stream_lsf.as_ref()
    }

    /// Next reassembled M17 packet payload
    pub fn take_m17_packet(&mut self) -> Option<Vec<u8, MAX_PACKET_LEN>> {
        self.m17_packets.pop_front()
    }

    /// Next in-sequence payload delivered by a connected link
    pub fn take_link_data(&mut self) -> Option<(Address, Info)> {
        self.link_rx.pop_front()
    }

    /// Next KISS-encoded frame for the host
    pub fn take_host_output(&mut self) -> Option<Chunk> {
        self.host_out.pop_front()
    }

    /// Frames queued for transmission
    #[must_use]
    pub fn pending_tx(&self) -> usize {
        self.pending_tx.len()
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Start receiving
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Idle (Rx is accepted as a no-op), or SDR
    /// faults.
    pub fn start_rx(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Rx => return Ok(()),
            ControllerState::Idle => {}
            _ => return Err(Error::StateViolation("start_rx requires idle")),
        }
        let frequency = self.rx_frequency();
        self.enable_receiver(frequency)?;
        self.enter(ControllerState::Rx);
        Ok(())
    }

    /// Stop receiving
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Rx, or SDR faults.
    pub fn stop_rx(&mut self) -> Result<()> {
        if self.state != ControllerState::Rx {
            return Err(Error::StateViolation("stop_rx requires rx"));
        }
        self.sdr_do(S::stop_rx)?;
        self.cancel_link_timers();
        self.enter(ControllerState::Idle);
        Ok(())
    }

    /// Key the transmitter
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Idle (Tx is accepted as a no-op), or SDR
    /// faults.
    pub fn start_tx(&mut self) -> Result<()> {
        match self.state {
            ControllerState::Tx => return Ok(()),
            ControllerState::Idle => {}
            _ => return Err(Error::StateViolation("start_tx requires idle")),
        }
        let gain = self.config.tx_gain;
        self.sdr_do(|sdr| sdr.set_tx_gain(gain))?;
        self.sdr_do(S::start_tx)?;
        self.enter(ControllerState::Tx);
        Ok(())
    }

    /// Unkey the transmitter
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Tx, or SDR faults.
    pub fn stop_tx(&mut self) -> Result<()> {
        if self.state != ControllerState::Tx {
            return Err(Error::StateViolation("stop_tx requires tx"));
        }
        self.flush_pending();
        if self.state != ControllerState::Tx {
            // a fatal fault during the flush already moved us to Error
            return Err(Error::Fatal("sdr fault"));
        }
        self.sdr_do(S::stop_tx)?;
        self.cancel_link_timers();
        self.enter(ControllerState::Idle);
        Ok(())
    }

    /// Start hopping over the scan list
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Idle, `InvalidArgument` for an empty scan
    /// list, or SDR faults.
    pub fn start_scan(&mut self) -> Result<()> {
        if self.state != ControllerState::Idle {
            return Err(Error::StateViolation("start_scan requires idle"));
        }
        let first = *self
            .config
            .scan_channels
            .first()
            .ok_or(Error::InvalidArgument("empty scan list"))?;
        self.enable_receiver(first)?;
        self.scan_index = 0;
        self.scan_deadline = self.now_ms + u64::from(self.config.scan_dwell_ms);
        self.enter(ControllerState::Scan);
        Ok(())
    }

    /// Stop scanning
    ///
    /// # Errors
    ///
    /// `StateViolation` unless Scan, or SDR faults.
    pub fn stop_scan(&mut self) -> Result<()> {
        if self.state != ControllerState::Scan {
            return Err(Error::StateViolation("stop_scan requires scan"));
        }
        self.sdr_do(S::stop_rx)?;
        self.cancel_link_timers();
        self.enter(ControllerState::Idle);
        Ok(())
    }

    /// Return to Idle from any state, dropping queued work
    ///
    /// The SDR is asked to stop; its faults are ignored here.
    pub fn reset(&mut self) {
        if let Some(sdr) = self.sdr.as_mut() {
            let _ = sdr.stop_tx();
            let _ = sdr.stop_rx();
        }
        self.cancel_link_timers();
        self.pending_tx.clear();
        self.input.clear();
        self.kiss_decoder.reset();
        self.lich.reset();
        self.packets.reset();
        self.stream_open = false;
        self.enter(ControllerState::Idle);
    }

    fn enter(&mut self, next: ControllerState) {
        if self.state != next {
            debug!("controller: {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }

    fn require_quiet(&self, context: &'static str) -> Result<()> {
        match self.state {
            ControllerState::Idle | ControllerState::Error => Ok(()),
            _ => Err(Error::StateViolation(context)),
        }
    }

    fn enable_receiver(&mut self, frequency: Frequency) -> Result<()> {
        let (bandwidth, gain, modulation) =
            (self.config.bandwidth, self.config.rx_gain, self.rx_modulation());
        self.sdr_do(|sdr| sdr.set_frequency(frequency))?;
        self.sdr_do(|sdr| sdr.set_bandwidth(bandwidth))?;
        self.sdr_do(|sdr| sdr.set_rx_gain(gain))?;
        self.sdr_do(|sdr| sdr.set_modulation(modulation))?;
        self.sdr_do(S::start_rx)
    }

    const fn rx_modulation(&self) -> Modulation {
        match self.config.mode {
            OperatingMode::M17Only => Modulation::M17Fsk4,
            _ => Modulation::Afsk1200,
        }
    }

    fn rx_frequency(&self) -> Frequency {
        if self.state == ControllerState::Scan {
            if let Some(&f) = self.config.scan_channels.get(self.scan_index) {
                return f;
            }
        }
        match self.config.mode {
            OperatingMode::M17Only => self.config.m17_frequency,
            _ => self.config.ax25_frequency,
        }
    }

    const fn tx_frequency(&self, protocol: Protocol) -> Frequency {
        match protocol {
            Protocol::M17 => self.config.m17_frequency,
            _ => self.config.ax25_frequency,
        }
    }

    /// Run one SDR call, mapping faults and entering Error on a fatal one
    fn sdr_do<T>(&mut self, call: impl FnOnce(&mut S) -> SdrResult<T>) -> Result<T> {
        let sdr = self
            .sdr
            .as_mut()
            .ok_or(Error::StateViolation("no sdr bound"))?;
        match call(sdr) {
            Ok(value) => Ok(value),
            Err(fault) => {
                let error = Error::from(fault);
                if matches!(error, Error::Fatal(_)) {
                    warn!("controller: fatal sdr fault in {}", self.state.as_str());
                    self.enter(ControllerState::Error);
                } else {
                    debug!("controller: sdr {fault:?}");
                }
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------
    // Transmit
    // ------------------------------------------------------------------

    /// Send one M17 frame
    ///
    /// # Errors
    ///
    /// `StateViolation` if the radio cannot transmit now, otherwise encode
    /// or SDR errors.
    pub fn send_m17_frame(&mut self, frame: &M17Frame) -> Result<()> {
        self.send_burst(iter::once(Outgoing::M17(*frame)))
    }

    /// Send `data` to `dst` as an M17 packet (LSF, packet frames, EOT)
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an unusable callsign or payload size,
    /// `StateViolation` if the radio cannot transmit now, or SDR errors.
    pub fn send_m17(&mut self, dst: &str, data: &[u8]) -> Result<()> {
        let lsf = Lsf::new(dst, &self.config.callsign, LsfType::packet(self.config.can))?;
        let frames = packetize(data)?;
        let burst = iter::once(Outgoing::M17(M17Frame::Lsf(lsf)))
            .chain(frames.into_iter().map(|p| Outgoing::M17(M17Frame::Packet(p))))
            .chain(iter::once(Outgoing::M17(M17Frame::Eot)));
        self.send_burst(burst)
    }

    /// Send an AX.25 frame with the configured FEC
    ///
    /// # Errors
    ///
    /// `StateViolation` if the radio cannot transmit now, otherwise encode
    /// or SDR errors.
    pub fn send_ax25(&mut self, frame: &Frame) -> Result<()> {
        self.send_burst(iter::once(Outgoing::Ax25(frame.clone())))
    }

    /// Send an APRS UI frame from this station to `APRS`
    ///
    /// # Errors
    ///
    /// As [`Controller::send_ax25`], plus `InvalidArgument` for an
    /// oversize info field.
    pub fn send_aprs(&mut self, info: &str) -> Result<()> {
        let frame = Frame::ui(
            Address::new(APRS_DESTINATION, 0)?.with_c_bit(true),
            self.links.local().clone(),
            PID_NO_LAYER3,
            info.as_bytes(),
        )?;
        self.send_ax25(&frame)
    }

    fn user_keying(&self) -> Result<Keying> {
        match self.state {
            ControllerState::Idle => Ok(Keying::Burst),
            ControllerState::Tx => Ok(Keying::Keyed),
            ControllerState::Rx if self.config.full_duplex => Ok(Keying::Duplex),
            _ => Err(Error::StateViolation("cannot transmit in current state")),
        }
    }

    fn send_burst(&mut self, items: impl IntoIterator<Item = Outgoing>) -> Result<()> {
        let keying = self.user_keying()?;
        self.key_up(keying)?;
        let mut result = Ok(());
        for item in items {
            if let Err(e) = self.transmit_one(&item) {
                result = Err(e);
                break;
            }
        }
        let down = self.key_down(keying);
        result.and(down)
    }

    fn key_up(&mut self, keying: Keying) -> Result<()> {
        let gain = self.config.tx_gain;
        match keying {
            Keying::Keyed => Ok(()),
            Keying::Burst | Keying::Duplex => {
                self.sdr_do(|sdr| sdr.set_tx_gain(gain))?;
                self.sdr_do(S::start_tx)?;
                if keying == Keying::Burst {
                    self.enter(ControllerState::Tx);
                }
                Ok(())
            }
            Keying::Turnaround => {
                self.sdr_do(S::stop_rx)?;
                self.sdr_do(|sdr| sdr.set_tx_gain(gain))?;
                self.sdr_do(S::start_tx)
            }
        }
    }

    fn key_down(&mut self, keying: Keying) -> Result<()> {
        if self.state == ControllerState::Error {
            return Err(Error::Fatal("sdr fault"));
        }
        match keying {
            Keying::Keyed => Ok(()),
            Keying::Burst => {
                let result = self.sdr_do(S::stop_tx);
                if self.state == ControllerState::Tx {
                    self.enter(ControllerState::Idle);
                }
                result
            }
            Keying::Duplex => self.sdr_do(S::stop_tx),
            Keying::Turnaround => {
                self.sdr_do(S::stop_tx)?;
                let frequency = self.rx_frequency();
                let modulation = self.rx_modulation();
                self.sdr_do(|sdr| sdr.set_frequency(frequency))?;
                self.sdr_do(|sdr| sdr.set_modulation(modulation))?;
                self.sdr_do(S::start_rx)
            }
        }
    }

    fn encode_outgoing(&mut self, item: &Outgoing, out: &mut [u8]) -> Result<(Protocol, usize)> {
        match item {
            Outgoing::M17(frame) => Ok((Protocol::M17, frame.encode(out)?)),
            Outgoing::Ax25(frame) => match self.config.fec {
                TxFec::None => {
                    let protocol = if frame.is_aprs() {
                        Protocol::Aprs
                    } else {
                        Protocol::Ax25
                    };
                    Ok((protocol, frame.to_hdlc(out)?))
                }
                TxFec::Fx25(code) => {
                    let mut body = [0u8; fx25::MAX_DATA_LEN];
                    let len = frame.encode_with_fcs(&mut body)?;
                    Ok((Protocol::Fx25, fx25::encode(&body[..len], code, out)?))
                }
                TxFec::Il2p => {
                    let sequence = self.il2p_sequence;
                    let len = il2p::encode_ax25(frame, sequence, out)?;
                    self.il2p_sequence = sequence.wrapping_add(1);
                    Ok((Protocol::Il2p, len))
                }
            },
        }
    }

    fn transmit_one(&mut self, item: &Outgoing) -> Result<()> {
        let mut wire = [0u8; WIRE_MTU];
        let (protocol, len) = self.encode_outgoing(item, &mut wire)?;
        let frequency = self.tx_frequency(protocol);
        let modulation = protocol
            .modulation()
            .ok_or(Error::InvalidArgument("protocol has no modulation"))?;
        self.sdr_do(|sdr| sdr.set_frequency(frequency))?;
        self.sdr_do(|sdr| sdr.set_modulation(modulation))?;
        self.sdr_do(|sdr| sdr.send_bytes(&wire[..len]))?;
        trace!("controller: sent {len} bytes of {protocol}");
        self.stats.record(Direction::Tx, protocol);
        self.observer.on_frame(Direction::Tx, protocol, &wire[..len]);
        Ok(())
    }

    fn queue_tx(&mut self, item: Outgoing) {
        if self.pending_tx.push_back(item).is_err() {
            warn!("controller: tx queue full, frame dropped");
        }
    }

    /// Send everything queued by the link layer, bridge or host
    ///
    /// Transient failures leave the rest queued for the next attempt.
    pub fn flush_pending(&mut self) {
        if self.pending_tx.is_empty() || self.sdr.is_none() {
            return;
        }
        let keying = match self.state {
            ControllerState::Idle => Keying::Burst,
            ControllerState::Tx => Keying::Keyed,
            ControllerState::Rx | ControllerState::Scan if self.config.full_duplex => {
                Keying::Duplex
            }
            ControllerState::Rx | ControllerState::Scan => Keying::Turnaround,
            ControllerState::Error => return,
        };
        if let Err(e) = self.key_up(keying) {
            debug!("controller: deferred tx ({e})");
            return;
        }
        while let Some(item) = self.pending_tx.pop_front() {
            match self.transmit_one(&item) {
                Ok(()) => {}
                Err(e @ (Error::Transient(_) | Error::StateViolation(_))) => {
                    debug!("controller: tx deferred ({e})");
                    let _ = self.pending_tx.push_front(item);
                    break;
                }
                Err(e @ Error::Fatal(_)) => {
                    warn!("controller: tx aborted ({e})");
                    break;
                }
                Err(e) => warn!("controller: dropping unsendable frame ({e})"),
            }
        }
        if let Err(e) = self.key_down(keying) {
            debug!("controller: key down failed ({e})");
        }
    }

    // ------------------------------------------------------------------
    // Connected mode
    // ------------------------------------------------------------------

    /// Open a connected-mode link
    ///
    /// # Errors
    ///
    /// As [`LinkManager::connect`].
    pub fn connect(&mut self, remote: &Address) -> Result<()> {
        let actions = &mut self.actions;
        let result = self
            .links
            .connect(remote, self.now_ms, &mut |a| push_action(actions, a));
        self.drain_actions();
        self.flush_pending();
        result
    }

    /// Close a connected-mode link
    ///
    /// # Errors
    ///
    /// As [`LinkManager::disconnect`].
    pub fn disconnect(&mut self, remote: &Address) -> Result<()> {
        let actions = &mut self.actions;
        let result = self
            .links
            .disconnect(remote, self.now_ms, &mut |a| push_action(actions, a));
        self.drain_actions();
        self.flush_pending();
        result
    }

    /// Queue data on a connected link
    ///
    /// # Errors
    ///
    /// As [`LinkManager::send_data`].
    pub fn send_data(&mut self, remote: &Address, data: &[u8]) -> Result<()> {
        let actions = &mut self.actions;
        let result = self
            .links
            .send_data(remote, data, self.now_ms, &mut |a| push_action(actions, a));
        self.drain_actions();
        self.flush_pending();
        result
    }

    /// Link state towards `remote`
    #[must_use]
    pub fn link_state(&self, remote: &Address) -> LinkState {
        self.links.state(remote)
    }

    fn cancel_link_timers(&mut self) {
        let actions = &mut self.actions;
        self.links.cancel_timers(&mut |a| push_action(actions, a));
        self.drain_actions();
    }

    fn drain_actions(&mut self) {
        while let Some(action) = self.actions.pop_front() {
            match action {
                LinkAction::Send(frame) => self.queue_tx(Outgoing::Ax25(frame)),
                LinkAction::Deliver { remote, data } => {
                    if self.link_rx.is_full() {
                        warn!("controller: link data from {remote} dropped");
                        self.stats.overflow = self.stats.overflow.wrapping_add(1);
                    } else {
                        let _ = self.link_rx.push_back((remote, data));
                    }
                }
                LinkAction::Connected(remote) => {
                    self.observer.on_link(&LinkEvent::Connected(remote));
                }
                LinkAction::Disconnected(remote) => {
                    self.observer.on_link(&LinkEvent::Disconnected(remote));
                }
                LinkAction::Failed(remote) => {
                    self.observer.on_link(&LinkEvent::Failed(remote));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------

    /// Poll for a received frame
    ///
    /// AX.25-family frames are returned as their body without FCS; M17
    /// frames in their byte envelope. `Ok(None)` means nothing is ready.
    ///
    /// # Errors
    ///
    /// - `StateViolation` unless receiving.
    /// - `InvalidArgument` if `buf` is too small; the frame stays queued.
    /// - SDR faults.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Received>> {
        if !matches!(self.state, ControllerState::Rx | ControllerState::Scan) {
            return Err(Error::StateViolation("receive requires rx or scan"));
        }
        if self.ready.is_empty() {
            let mut scratch = [0u8; WIRE_MTU];
            let len = self.sdr_do(|sdr| sdr.recv_bytes(&mut scratch))?;
            if len > 0 {
                self.ingest(&scratch[..len]);
            }
        }
        self.flush_pending();
        let Some((protocol, data)) = self.ready.front() else {
            return Ok(None);
        };
        let dst = buf
            .get_mut(..data.len())
            .ok_or(Error::InvalidArgument("receive buffer too small"))?;
        dst.copy_from_slice(data);
        let received = Received {
            protocol: *protocol,
            len: data.len(),
        };
        self.ready.pop_front();
        Ok(Some(received))
    }

    /// Decode one frame from the SDR; failures are counted, not returned
    fn ingest(&mut self, bytes: &[u8]) {
        let detected = self.classifier.detect(bytes);
        let result = match detected {
            Protocol::Unknown => Err(Error::Malformed("unrecognized frame")),
            Protocol::M17 => self.ingest_m17(bytes),
            Protocol::Ax25 | Protocol::Aprs | Protocol::Fx25 | Protocol::Il2p => {
                self.ingest_ax25(detected, bytes)
            }
        };
        if let Err(error) = result {
            debug!("controller: {detected} frame dropped ({error})");
            self.stats.errors = self.stats.errors.wrapping_add(1);
            self.observer.on_error(detected, &error);
        }
    }

    fn ingest_ax25(&mut self, detected: Protocol, bytes: &[u8]) -> Result<()> {
        let (protocol, frame, corrections) = match detected {
            Protocol::Fx25 => {
                let mut data = [0u8; fx25::MAX_DATA_LEN];
                let decoded = fx25::decode(bytes, &mut data)?;
                let frame = Frame::decode_with_fcs(&data[..decoded.len])?;
                (Protocol::Fx25, frame, decoded.corrections)
            }
            Protocol::Il2p => {
                let (frame, corrections) = il2p::decode_ax25(bytes)?;
                (Protocol::Il2p, frame, corrections)
            }
            _ => {
                let frame = Frame::decode_with_fcs(hdlc::unwrap(bytes)?)?;
                let protocol = if frame.is_aprs() {
                    Protocol::Aprs
                } else {
                    Protocol::Ax25
                };
                (protocol, frame, 0)
            }
        };

        let corrections = u32::try_from(corrections).unwrap_or(u32::MAX);
        self.stats.fec_corrections = self.stats.fec_corrections.saturating_add(corrections);
        self.accept(protocol, bytes);

        let actions = &mut self.actions;
        let handled = self
            .links
            .handle_frame(&frame, self.now_ms, &mut |a| push_action(actions, a));
        if handled {
            self.drain_actions();
        }

        if self.config.mode == OperatingMode::Bridge && is_ui(&frame) {
            match self.bridge.ui_to_m17(&frame) {
                Ok((lsf, packets)) => {
                    self.queue_tx(Outgoing::M17(M17Frame::Lsf(lsf)));
                    for packet in packets {
                        self.queue_tx(Outgoing::M17(M17Frame::Packet(packet)));
                    }
                    self.queue_tx(Outgoing::M17(M17Frame::Eot));
                }
                Err(e) => self.conversion_failed(&e),
            }
        }

        let mut body = [0u8; WIRE_MTU];
        let len = frame.encode(&mut body)?;
        self.to_host(&body[..len]);
        self.deliver(protocol, &body[..len]);
        Ok(())
    }

    fn ingest_m17(&mut self, bytes: &[u8]) -> Result<()> {
        let frame = M17Frame::decode(bytes)?;
        trace!("controller: m17 {}", frame.name());
        match &frame {
            M17Frame::Lsf(lsf) => {
                self.lich.reset();
                self.packets.reset();
                self.stream_lsf = None;
                if self.config.mode == OperatingMode::Bridge {
                    match self.bridge.lsf_to_aprs(lsf) {
                        Ok(aprs) => self.queue_tx(Outgoing::Ax25(aprs)),
                        Err(e) => self.conversion_failed(&e),
                    }
                }
            }
            M17Frame::Stream(stream) => {
                self.stream_open = !stream.end_of_stream;
                match self.lich.push(&stream.lich) {
                    Ok(Some(lsf)) => self.stream_lsf = Some(lsf),
                    Ok(None) => {}
                    Err(e) => debug!("controller: lich dropped ({e})"),
                }
            }
            M17Frame::Packet(packet) => {
                // a broken reassembly only loses the partial packet
                match self.packets.push(packet) {
                    Ok(Some(data)) => {
                        if self.m17_packets.is_full() {
                            self.m17_packets.pop_front();
                        }
                        let _ = self.m17_packets.push_back(data);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!("controller: packet reassembly reset ({e})");
                        self.packets.reset();
                    }
                }
                if self.config.mode == OperatingMode::Bridge {
                    match self.bridge.packet_to_ui(packet) {
                        Ok(ui) => self.queue_tx(Outgoing::Ax25(ui)),
                        Err(e) => self.conversion_failed(&e),
                    }
                }
            }
            M17Frame::Eot => {
                self.stats.m17_eot = self.stats.m17_eot.wrapping_add(1);
                self.stream_open = false;
                self.lich.reset();
            }
            M17Frame::Bert(_) => {
                self.stats.m17_bert = self.stats.m17_bert.wrapping_add(1);
            }
        }
        self.accept(Protocol::M17, bytes);
        self.deliver(Protocol::M17, bytes);
        Ok(())
    }

    fn accept(&mut self, protocol: Protocol, raw: &[u8]) {
        if self.classifier.note(protocol, self.now_ms) {
            self.stats.protocol_switches = self.stats.protocol_switches.wrapping_add(1);
        }
        self.stats.record(Direction::Rx, protocol);
        self.observer.on_frame(Direction::Rx, protocol, raw);
    }

    fn conversion_failed(&mut self, error: &Error) {
        warn!("controller: bridge conversion failed ({error})");
        self.stats.conversion_errors = self.stats.conversion_errors.wrapping_add(1);
    }

    fn deliver(&mut self, protocol: Protocol, data: &[u8]) {
        let Ok(chunk) = Chunk::from_slice(data) else {
            return;
        };
        if self.ready.push_back((protocol, chunk)).is_err() {
            self.stats.overflow = self.stats.overflow.wrapping_add(1);
            debug!("controller: rx queue full, {protocol} frame dropped");
        }
    }

    fn to_host(&mut self, body: &[u8]) {
        let mut encoded = [0u8; WIRE_MTU];
        let Ok(len) = kiss::encode(0, Command::Data, body, &mut encoded) else {
            return;
        };
        let Ok(chunk) = Chunk::from_slice(&encoded[..len]) else {
            return;
        };
        if self.host_out.is_full() {
            trace!("controller: host queue full, oldest frame dropped");
            self.host_out.pop_front();
        }
        let _ = self.host_out.push_back(chunk);
    }

    // ------------------------------------------------------------------
    // Host (KISS) side
    // ------------------------------------------------------------------

    /// Feed KISS bytes from the host
    ///
    /// DATA frames are queued for transmission; parameter frames update
    /// [`KissParams`].
    ///
    /// # Errors
    ///
    /// The first KISS or AX.25 decode error; later bytes are still consumed.
    pub fn host_input(&mut self, bytes: &[u8]) -> Result<()> {
        let mut first_error = None;
        for &byte in bytes {
            let outcome = match self.kiss_decoder.feed(byte) {
                Ok(Some(frame)) => self.handle_kiss(&frame),
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                warn!("controller: host frame rejected ({e})");
                first_error.get_or_insert(e);
            }
        }
        self.flush_pending();
        first_error.map_or(Ok(()), Err)
    }

    fn handle_kiss(&mut self, frame: &KissFrame) -> Result<()> {
        match frame.command {
            Command::Data => {
                let ax25 = Frame::decode(&frame.payload)?;
                self.queue_tx(Outgoing::Ax25(ax25));
                Ok(())
            }
            Command::Return => {
                debug!("controller: kiss return");
                Ok(())
            }
            command => {
                self.kiss_params.apply(command, &frame.payload)?;
                self.config.full_duplex = self.kiss_params.full_duplex;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Input queue
    // ------------------------------------------------------------------

    /// Queue a frame that arrived from the SDR
    ///
    /// Returns false, counting an overflow, when the queue is full or the
    /// frame is larger than the link MTU.
    pub fn post_sdr_bytes(&mut self, bytes: &[u8]) -> bool {
        let queued = Chunk::from_slice(bytes)
            .ok()
            .is_some_and(|chunk| self.input.push(Input::Sdr(chunk)).is_ok());
        if !queued {
            self.stats.overflow = self.stats.overflow.wrapping_add(1);
        }
        queued
    }

    /// Queue bytes from the host link
    ///
    /// # Errors
    ///
    /// `InvalidArgument` above the link MTU, `Transient` when the queue is
    /// full.
    pub fn post_host_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let chunk =
            Chunk::from_slice(bytes).map_err(|()| Error::InvalidArgument("host chunk too large"))?;
        self.input
            .push(Input::Host(chunk))
            .map_err(|_| Error::Transient("input queue full"))
    }

    /// Queue a timer tick
    ///
    /// # Errors
    ///
    /// `Transient` when the queue is full.
    pub fn post_tick(&mut self, now_ms: u64) -> Result<()> {
        self.input
            .push(Input::Tick(now_ms))
            .map_err(|_| Error::Transient("input queue full"))
    }

    /// Process every queued input in arrival order; returns how many ran
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(input) = self.input.pop() {
            count += 1;
            match input {
                Input::Sdr(chunk) => {
                    if matches!(self.state, ControllerState::Rx | ControllerState::Scan) {
                        self.ingest(&chunk);
                    } else {
                        trace!("controller: sdr frame ignored in {}", self.state.as_str());
                    }
                }
                Input::Host(chunk) => {
                    // errors are logged by host_input
                    let _ = self.host_input(&chunk);
                }
                Input::Tick(now_ms) => self.tick(now_ms),
            }
        }
        self.flush_pending();
        count
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Advance time: link timers, scan hops, uptime, protocol decay and
    /// queued transmissions. Nothing runs in Error.
    pub fn tick(&mut self, now_ms: u64) {
        if self.state == ControllerState::Error {
            return;
        }
        self.now_ms = now_ms;
        let base = *self.uptime_base.get_or_insert(now_ms);
        self.stats.uptime_seconds =
            u32::try_from(now_ms.saturating_sub(base) / 1000).unwrap_or(u32::MAX);

        self.classifier.tick(now_ms);

        let actions = &mut self.actions;
        self.links.tick(now_ms, &mut |a| push_action(actions, a));
        self.drain_actions();

        if self.state == ControllerState::Scan && now_ms >= self.scan_deadline {
            self.hop(now_ms);
        }
        self.flush_pending();
    }

    fn hop(&mut self, now_ms: u64) {
        let channels = self.config.scan_channels.len();
        if channels == 0 {
            return;
        }
        self.scan_index = (self.scan_index + 1) % channels;
        self.scan_deadline = now_ms + u64::from(self.config.scan_dwell_ms);
        let frequency = self.rx_frequency();
        debug!("controller: scan -> {} kHz", frequency.as_khz());
        if let Err(e) = self.sdr_do(|sdr| sdr.set_frequency(frequency)) {
            debug!("controller: scan hop failed ({e})");
        }
    }
}

fn push_action(actions: &mut Deque<LinkAction, ACTION_QUEUE_DEPTH>, action: LinkAction) {
    if actions.push_back(action).is_err() {
        warn!("controller: link action queue full");
    }
}

const fn is_ui(frame: &Frame) -> bool {
    matches!(
        frame.control,
        Control::Unnumbered {
            kind: UnnumberedKind::Ui,
            ..
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdr::LoopbackSdr;

    fn controller() -> Controller<LoopbackSdr> {
        let mut c = Controller::new(ControllerConfig::default()).unwrap();
        c.bind_sdr(LoopbackSdr::new()).unwrap();
        c
    }

    #[test]
    fn test_start_rx_idempotent() {
        let mut c = controller();
        c.start_rx().unwrap();
        c.start_rx().unwrap();
        assert_eq!(c.state(), ControllerState::Rx);
    }

    #[test]
    fn test_no_sdr_is_state_violation() {
        let mut c: Controller<LoopbackSdr> = Controller::new(ControllerConfig::default()).unwrap();
        assert!(matches!(c.start_rx(), Err(Error::StateViolation(_))));
        assert_eq!(c.state(), ControllerState::Idle);
    }

    #[test]
    fn test_tick_ignored_in_error() {
        let mut c = controller();
        c.sdr_mut().unwrap().set_fault(Some(crate::sdr::SdrFault::Fatal));
        assert!(matches!(c.start_rx(), Err(Error::Fatal(_))));
        assert_eq!(c.state(), ControllerState::Error);
        c.tick(10_000);
        assert_eq!(c.stats().uptime_seconds, 0);
        c.sdr_mut().unwrap().set_fault(None);
        c.reset();
        assert_eq!(c.state(), ControllerState::Idle);
    }
}
