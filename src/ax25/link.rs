//! AX.25 connected mode
//!
//! A LAPB subset, modulo 8, for up to sixteen simultaneous peers. The
//! manager never touches the radio: every frame it wants on the air and every
//! event it raises is handed to a caller-supplied sink as a [`LinkAction`].
//! Timers are absolute deadlines in milliseconds, checked by
//! [`LinkManager::tick`].

use heapless::{Deque, Vec};
use log::{debug, info, warn};

use crate::ax25::address::Address;
use crate::ax25::frame::{Control, Frame, Info, SupervisoryKind, UnnumberedKind, MAX_INFO_LEN};
use crate::config::link::{
    MAX_CONNECTIONS, MAX_RETRIES, MODULUS, SEND_QUEUE_DEPTH, T1_MS, T2_MS, T3_MS, WINDOW,
};
use crate::error::{Error, Result};

const WINDOW_SLOTS: usize = WINDOW as usize;

/// Connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No link
    #[default]
    Disconnected,
    /// SABM sent, waiting for UA
    Connecting,
    /// Information transfer
    Connected,
    /// DISC sent, waiting for UA
    Disconnecting,
}

#[cfg(feature = "embedded")]
impl defmt::Format for LinkState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Disconnected => defmt::write!(f, "Disconnected"),
            Self::Connecting => defmt::write!(f, "Connecting"),
            Self::Connected => defmt::write!(f, "Connected"),
            Self::Disconnecting => defmt::write!(f, "Disconnecting"),
        }
    }
}

/// Output of the link state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkAction {
    /// Put this frame on the air
    Send(Frame),
    /// In-sequence I-frame payload for the application
    Deliver {
        /// Peer the data came from
        remote: Address,
        /// Payload
        data: Info,
    },
    /// Link came up
    Connected(Address),
    /// Link went down in an orderly way (DISC/DM)
    Disconnected(Address),
    /// Link abandoned after retries ran out
    Failed(Address),
}

const fn seq_add(a: u8, b: u8) -> u8 {
    (a + b) % MODULUS
}

const fn seq_diff(a: u8, b: u8) -> u8 {
    (a + MODULUS - b) % MODULUS
}

/// Per-peer connection entry
#[derive(Clone, Debug)]
pub struct Connection {
    remote: Address,
    state: LinkState,
    vs: u8,
    vr: u8,
    va: u8,
    window: u8,
    retries: u8,
    t1: Option<u64>,
    t2: Option<u64>,
    t3: Option<u64>,
    reject_sent: bool,
    remote_busy: bool,
    /// Sent, not yet acknowledged; front has N(S) = V(A)
    unacked: Deque<Info, WINDOW_SLOTS>,
    /// Waiting for the window to open
    queue: Deque<Info, SEND_QUEUE_DEPTH>,
}

impl Connection {
    fn new(remote: Address) -> Self {
        Self {
            remote,
            state: LinkState::Disconnected,
            vs: 0,
            vr: 0,
            va: 0,
            window: WINDOW,
            retries: 0,
            t1: None,
            t2: None,
            t3: None,
            reject_sent: false,
            remote_busy: false,
            unacked: Deque::new(),
            queue: Deque::new(),
        }
    }

    /// Peer address
    #[must_use]
    pub const fn remote(&self) -> &Address {
        &self.remote
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// V(S), V(R), V(A)
    #[must_use]
    pub const fn sequence(&self) -> (u8, u8, u8) {
        (self.vs, self.vr, self.va)
    }

    /// Window size k
    #[must_use]
    pub const fn window(&self) -> u8 {
        self.window
    }

    /// Retry counter
    #[must_use]
    pub const fn retries(&self) -> u8 {
        self.retries
    }

    /// Pending T1 deadline
    #[must_use]
    pub const fn t1_deadline(&self) -> Option<u64> {
        self.t1
    }

    /// I-frames sent and awaiting acknowledgement
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.unacked.len()
    }

    /// Whether the peer has signalled RNR
    #[must_use]
    pub const fn remote_busy(&self) -> bool {
        self.remote_busy
    }

    fn reset_sequence(&mut self) {
        self.vs = 0;
        self.vr = 0;
        self.va = 0;
        self.retries = 0;
        self.reject_sent = false;
        self.remote_busy = false;
        self.unacked.clear();
    }

    fn go_disconnected(&mut self) {
        self.state = LinkState::Disconnected;
        self.reset_sequence();
        self.queue.clear();
        self.t1 = None;
        self.t2 = None;
        self.t3 = None;
    }

    fn nr_is_valid(&self, nr: u8) -> bool {
        seq_diff(nr, self.va) <= seq_diff(self.vs, self.va)
    }

    /// Release frames acknowledged by `nr`; returns true if any were
    fn acknowledge(&mut self, nr: u8, now_ms: u64) -> bool {
        let mut progressed = false;
        while self.va != nr {
            self.unacked.pop_front();
            self.va = seq_add(self.va, 1);
            progressed = true;
        }
        if self.unacked.is_empty() {
            self.t1 = None;
            self.retries = 0;
            self.t3 = Some(now_ms + T3_MS);
        } else if progressed {
            self.retries = 0;
            self.t1 = Some(now_ms + T1_MS);
        }
        progressed
    }
}

/// Connection table and frame dispatcher
#[derive(Debug)]
pub struct LinkManager {
    local: Address,
    connections: Vec<Connection, MAX_CONNECTIONS>,
}

impl LinkManager {
    /// Manager answering for `local`
    #[must_use]
    pub fn new(local: Address) -> Self {
        Self {
            local: local.with_c_bit(false),
            connections: Vec::new(),
        }
    }

    /// Local station address
    #[must_use]
    pub const fn local(&self) -> &Address {
        &self.local
    }

    /// Change the local address; existing links are not affected
    pub fn set_local(&mut self, local: Address) {
        self.local = local.with_c_bit(false);
    }

    /// Connection entry for `remote`
    #[must_use]
    pub fn connection(&self, remote: &Address) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.remote.same_station(remote))
    }

    /// State of the link to `remote` (Disconnected if unknown)
    #[must_use]
    pub fn state(&self, remote: &Address) -> LinkState {
        self.connection(remote)
            .map_or(LinkState::Disconnected, Connection::state)
    }

    /// Links not in Disconnected
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|c| c.state != LinkState::Disconnected)
            .count()
    }

    fn index_of(&self, remote: &Address) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.remote.same_station(remote))
    }

    /// Existing entry, a recycled Disconnected one, or a new one
    fn entry(&mut self, remote: &Address) -> Result<usize> {
        if let Some(i) = self.index_of(remote) {
            return Ok(i);
        }
        let fresh = Connection::new(remote.clone().with_c_bit(false));
        if let Some(i) = self
            .connections
            .iter()
            .position(|c| c.state == LinkState::Disconnected)
        {
            self.connections[i] = fresh;
            return Ok(i);
        }
        self.connections
            .push(fresh)
            .map_err(|_| Error::ResourceExhausted("link table full"))?;
        Ok(self.connections.len() - 1)
    }

    fn command(&self, remote: &Address, control: Control) -> Frame {
        Frame::new(
            remote.clone().with_c_bit(true),
            self.local.clone().with_c_bit(false),
            control,
        )
    }

    fn response(&self, remote: &Address, control: Control) -> Frame {
        Frame::new(
            remote.clone().with_c_bit(false),
            self.local.clone().with_c_bit(true),
            control,
        )
    }

    fn unnumbered(kind: UnnumberedKind, pf: bool) -> Control {
        Control::Unnumbered { kind, pf }
    }

    fn supervisory(kind: SupervisoryKind, nr: u8, pf: bool) -> Control {
        Control::Supervisory { kind, nr, pf }
    }

    /// Start a connection to `remote` by sending SABM
    ///
    /// Already connecting or connected links are left alone.
    ///
    /// # Errors
    ///
    /// `ResourceExhausted` if the table is full, `StateViolation` while the
    /// link is being torn down.
    pub fn connect<F: FnMut(LinkAction)>(
        &mut self,
        remote: &Address,
        now_ms: u64,
        out: &mut F,
    ) -> Result<()> {
        let i = self.entry(remote)?;
        match self.connections[i].state {
            LinkState::Connecting | LinkState::Connected => return Ok(()),
            LinkState::Disconnecting => {
                return Err(Error::StateViolation("link is disconnecting"))
            }
            LinkState::Disconnected => {}
        }
        let sabm = self.command(remote, Self::unnumbered(UnnumberedKind::Sabm, true));
        let conn = &mut self.connections[i];
        conn.go_disconnected();
        conn.state = LinkState::Connecting;
        conn.t1 = Some(now_ms + T1_MS);
        info!("ax25 link: connecting to {remote}");
        out(LinkAction::Send(sabm));
        Ok(())
    }

    /// Tear down the link to `remote` by sending DISC
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if there is no entry for `remote`.
    pub fn disconnect<F: FnMut(LinkAction)>(
        &mut self,
        remote: &Address,
        now_ms: u64,
        out: &mut F,
    ) -> Result<()> {
        let i = self
            .index_of(remote)
            .ok_or(Error::InvalidArgument("no such link"))?;
        match self.connections[i].state {
            LinkState::Disconnected | LinkState::Disconnecting => return Ok(()),
            LinkState::Connecting | LinkState::Connected => {}
        }
        let disc = self.command(remote, Self::unnumbered(UnnumberedKind::Disc, true));
        let conn = &mut self.connections[i];
        conn.state = LinkState::Disconnecting;
        conn.retries = 0;
        conn.queue.clear();
        conn.t1 = Some(now_ms + T1_MS);
        conn.t2 = None;
        conn.t3 = None;
        info!("ax25 link: disconnecting from {remote}");
        out(LinkAction::Send(disc));
        Ok(())
    }

    /// Queue `data` for reliable delivery to `remote`
    ///
    /// # Errors
    ///
    /// - `StateViolation` unless the link is Connected.
    /// - `InvalidArgument` for data over 256 bytes.
    /// - `ResourceExhausted` when the send queue is full.
    pub fn send_data<F: FnMut(LinkAction)>(
        &mut self,
        remote: &Address,
        data: &[u8],
        now_ms: u64,
        out: &mut F,
    ) -> Result<()> {
        if data.len() > MAX_INFO_LEN {
            return Err(Error::InvalidArgument("info too long"));
        }
        let i = self
            .index_of(remote)
            .filter(|&i| self.connections[i].state == LinkState::Connected)
            .ok_or(Error::StateViolation("link not connected"))?;
        let info = Vec::from_slice(data).map_err(|()| Error::InvalidArgument("info too long"))?;
        self.connections[i]
            .queue
            .push_back(info)
            .map_err(|_| Error::ResourceExhausted("link send queue full"))?;
        self.pump(i, now_ms, out);
        Ok(())
    }

    /// Send queued I-frames while the window is open and the peer is ready
    fn pump<F: FnMut(LinkAction)>(&mut self, i: usize, now_ms: u64, out: &mut F) {
        loop {
            let conn = &self.connections[i];
            if conn.state != LinkState::Connected
                || conn.remote_busy
                || conn.unacked.len() >= usize::from(conn.window)
                || conn.queue.is_empty()
            {
                return;
            }
            let remote = conn.remote.clone();
            let control = Control::Information {
                ns: conn.vs,
                nr: conn.vr,
                pf: false,
            };
            let conn = &mut self.connections[i];
            let Some(info) = conn.queue.pop_front() else {
                return;
            };
            let mut frame = Frame::new(
                remote.with_c_bit(true),
                self.local.clone().with_c_bit(false),
                control,
            );
            frame.info = info.clone();
            // window check above guarantees room
            let _ = conn.unacked.push_back(info);
            conn.vs = seq_add(conn.vs, 1);
            conn.t2 = None;
            conn.t3 = None;
            if conn.t1.is_none() {
                conn.t1 = Some(now_ms + T1_MS);
            }
            out(LinkAction::Send(frame));
        }
    }

    /// Resend every unacknowledged I-frame starting at V(A)
    fn retransmit<F: FnMut(LinkAction)>(&mut self, i: usize, now_ms: u64, out: &mut F) {
        let conn = &self.connections[i];
        let dst = conn.remote.clone().with_c_bit(true);
        let src = self.local.clone().with_c_bit(false);
        for (offset, info) in (0u8..).zip(conn.unacked.iter()) {
            let mut frame = Frame::new(
                dst.clone(),
                src.clone(),
                Control::Information {
                    ns: seq_add(conn.va, offset),
                    nr: conn.vr,
                    pf: false,
                },
            );
            frame.info = info.clone();
            out(LinkAction::Send(frame));
        }
        let conn = &mut self.connections[i];
        conn.vs = seq_add(conn.va, conn.unacked.len() as u8);
        if !conn.unacked.is_empty() {
            conn.t1 = Some(now_ms + T1_MS);
            conn.t2 = None;
        }
    }

    /// Process a received frame
    ///
    /// Returns false when the frame is not for this station or is a UI frame
    /// (datagram traffic is not part of any connection).
    pub fn handle_frame<F: FnMut(LinkAction)>(
        &mut self,
        frame: &Frame,
        now_ms: u64,
        out: &mut F,
    ) -> bool {
        if !frame.dst.same_station(&self.local) {
            return false;
        }
        if matches!(
            frame.control,
            Control::Unnumbered {
                kind: UnnumberedKind::Ui,
                ..
            }
        ) {
            return false;
        }
        let remote = frame.src.clone().with_c_bit(false);
        let poll = frame.is_command() && frame.control.pf();

        // DISC is always answered with UA
        if let Control::Unnumbered {
            kind: UnnumberedKind::Disc,
            pf,
        } = frame.control
        {
            out(LinkAction::Send(self.response(
                &remote,
                Self::unnumbered(UnnumberedKind::Ua, pf),
            )));
            if let Some(i) = self.index_of(&remote) {
                let was = self.connections[i].state;
                self.connections[i].go_disconnected();
                if was != LinkState::Disconnected {
                    info!("ax25 link: {remote} disconnected by peer");
                    out(LinkAction::Disconnected(remote));
                }
            }
            return true;
        }

        let state = self.state(&remote);
        match state {
            LinkState::Disconnected => self.on_disconnected(frame, &remote, now_ms, out),
            LinkState::Connecting => self.on_connecting(frame, &remote, now_ms, out),
            LinkState::Connected => self.on_connected(frame, &remote, poll, now_ms, out),
            LinkState::Disconnecting => self.on_disconnecting(frame, &remote, out),
        }
        true
    }

    fn establish(&mut self, i: usize, now_ms: u64) {
        let conn = &mut self.connections[i];
        conn.reset_sequence();
        conn.state = LinkState::Connected;
        conn.t1 = None;
        conn.t2 = None;
        conn.t3 = Some(now_ms + T3_MS);
    }

    fn on_disconnected<F: FnMut(LinkAction)>(
        &mut self,
        frame: &Frame,
        remote: &Address,
        now_ms: u64,
        out: &mut F,
    ) {
        match frame.control {
            Control::Unnumbered {
                kind: UnnumberedKind::Sabm | UnnumberedKind::Sabme,
                pf,
            } => match self.entry(remote) {
                Ok(i) => {
                    self.establish(i, now_ms);
                    out(LinkAction::Send(self.response(
                        remote,
                        Self::unnumbered(UnnumberedKind::Ua, pf),
                    )));
                    info!("ax25 link: accepted connection from {remote}");
                    out(LinkAction::Connected(remote.clone()));
                }
                Err(_) => {
                    warn!("ax25 link: table full, refusing {remote}");
                    out(LinkAction::Send(self.response(
                        remote,
                        Self::unnumbered(UnnumberedKind::Dm, pf),
                    )));
                }
            },
            // never answer a DM, it would ping-pong
            Control::Unnumbered {
                kind: UnnumberedKind::Dm,
                ..
            } => {}
            control => {
                debug!("ax25 link: {remote} not connected, sending DM");
                out(LinkAction::Send(self.response(
                    remote,
                    Self::unnumbered(UnnumberedKind::Dm, control.pf()),
                )));
            }
        }
    }

    fn on_connecting<F: FnMut(LinkAction)>(
        &mut self,
        frame: &Frame,
        remote: &Address,
        now_ms: u64,
        out: &mut F,
    ) {
        let Some(i) = self.index_of(remote) else {
            return;
        };
        match frame.control {
            Control::Unnumbered {
                kind: UnnumberedKind::Ua,
                ..
            } => {
                self.establish(i, now_ms);
                info!("ax25 link: connected to {remote}");
                out(LinkAction::Connected(remote.clone()));
            }
            Control::Unnumbered {
                kind: UnnumberedKind::Dm,
                ..
            } => {
                self.connections[i].go_disconnected();
                info!("ax25 link: {remote} refused connection");
                out(LinkAction::Disconnected(remote.clone()));
            }
            // simultaneous connect
            Control::Unnumbered {
                kind: UnnumberedKind::Sabm | UnnumberedKind::Sabme,
                pf,
            } => {
                out(LinkAction::Send(self.response(
                    remote,
                    Self::unnumbered(UnnumberedKind::Ua, pf),
                )));
                self.establish(i, now_ms);
                out(LinkAction::Connected(remote.clone()));
            }
            _ => {}
        }
    }

    fn on_disconnecting<F: FnMut(LinkAction)>(
        &mut self,
        frame: &Frame,
        remote: &Address,
        out: &mut F,
    ) {
        let Some(i) = self.index_of(remote) else {
            return;
        };
        if matches!(
            frame.control,
            Control::Unnumbered {
                kind: UnnumberedKind::Ua | UnnumberedKind::Dm,
                ..
            }
        ) {
            self.connections[i].go_disconnected();
            info!("ax25 link: disconnected from {remote}");
            out(LinkAction::Disconnected(remote.clone()));
        }
    }

    fn send_frmr<F: FnMut(LinkAction)>(&self, frame: &Frame, remote: &Address, out: &mut F) {
        warn!("ax25 link: frame reject to {remote}");
        let conn = self.connection(remote);
        let (vs, vr) = conn.map_or((0, 0), |c| (c.vs, c.vr));
        let mut frmr = self.response(
            remote,
            Self::unnumbered(UnnumberedKind::Frmr, frame.control.pf()),
        );
        // rejected control, V(R)/V(S), reason bits (W: invalid control, Z: invalid N(R))
        let reason = if matches!(frame.control, Control::Reserved(_)) {
            0x01
        } else {
            0x08
        };
        let _ = frmr.set_info(&[frame.control.to_byte(), (vr << 5) | (vs << 1), reason]);
        out(LinkAction::Send(frmr));
    }

    fn on_connected<F: FnMut(LinkAction)>(
        &mut self,
        frame: &Frame,
        remote: &Address,
        poll: bool,
        now_ms: u64,
        out: &mut F,
    ) {
        let Some(i) = self.index_of(remote) else {
            return;
        };
        match frame.control {
            Control::Reserved(_) => self.send_frmr(frame, remote, out),
            Control::Information { ns, nr, .. } => {
                if !self.connections[i].nr_is_valid(nr) {
                    self.send_frmr(frame, remote, out);
                    return;
                }
                self.connections[i].acknowledge(nr, now_ms);
                let conn = &mut self.connections[i];
                if ns == conn.vr {
                    conn.vr = seq_add(conn.vr, 1);
                    conn.reject_sent = false;
                    out(LinkAction::Deliver {
                        remote: remote.clone(),
                        data: frame.info.clone(),
                    });
                    if poll {
                        let rr = Self::supervisory(SupervisoryKind::Rr, conn.vr, true);
                        conn.t2 = None;
                        out(LinkAction::Send(self.response(remote, rr)));
                    } else if conn.t2.is_none() {
                        conn.t2 = Some(now_ms + T2_MS);
                    }
                } else if !conn.reject_sent {
                    conn.reject_sent = true;
                    let rej = Self::supervisory(SupervisoryKind::Rej, conn.vr, poll);
                    debug!("ax25 link: sequence gap from {remote}, N(S)={ns} V(R)={}", conn.vr);
                    out(LinkAction::Send(self.response(remote, rej)));
                } else if poll {
                    let rr = Self::supervisory(SupervisoryKind::Rr, conn.vr, true);
                    out(LinkAction::Send(self.response(remote, rr)));
                }
                self.pump(i, now_ms, out);
            }
            Control::Supervisory { kind, nr, .. } => {
                if !self.connections[i].nr_is_valid(nr) {
                    self.send_frmr(frame, remote, out);
                    return;
                }
                self.connections[i].acknowledge(nr, now_ms);
                self.connections[i].remote_busy = kind == SupervisoryKind::Rnr;
                if poll {
                    let rr = Self::supervisory(SupervisoryKind::Rr, self.connections[i].vr, true);
                    out(LinkAction::Send(self.response(remote, rr)));
                }
                match kind {
                    SupervisoryKind::Rej | SupervisoryKind::Srej => {
                        self.retransmit(i, now_ms, out);
                    }
                    SupervisoryKind::Rr | SupervisoryKind::Rnr => {}
                }
                self.pump(i, now_ms, out);
            }
            Control::Unnumbered { kind, pf } => match kind {
                UnnumberedKind::Sabm | UnnumberedKind::Sabme => {
                    // link reset by peer
                    self.establish(i, now_ms);
                    out(LinkAction::Send(self.response(
                        remote,
                        Self::unnumbered(UnnumberedKind::Ua, pf),
                    )));
                }
                UnnumberedKind::Dm => {
                    self.connections[i].go_disconnected();
                    info!("ax25 link: {remote} sent DM");
                    out(LinkAction::Disconnected(remote.clone()));
                }
                UnnumberedKind::Frmr => {
                    warn!("ax25 link: {remote} rejected a frame, resetting");
                    let sabm = self.command(remote, Self::unnumbered(UnnumberedKind::Sabm, true));
                    let conn = &mut self.connections[i];
                    conn.go_disconnected();
                    conn.state = LinkState::Connecting;
                    conn.t1 = Some(now_ms + T1_MS);
                    out(LinkAction::Send(sabm));
                }
                UnnumberedKind::Ua | UnnumberedKind::Disc | UnnumberedKind::Ui => {}
            },
        }
    }

    /// Expire timers due at `now_ms`
    pub fn tick<F: FnMut(LinkAction)>(&mut self, now_ms: u64, out: &mut F) {
        for i in 0..self.connections.len() {
            self.tick_one(i, now_ms, out);
        }
    }

    fn tick_one<F: FnMut(LinkAction)>(&mut self, i: usize, now_ms: u64, out: &mut F) {
        let due = |deadline: Option<u64>| deadline.is_some_and(|d| now_ms >= d);
        let conn = &self.connections[i];
        let remote = conn.remote.clone();

        if due(conn.t2) {
            let rr = Self::supervisory(SupervisoryKind::Rr, conn.vr, false);
            self.connections[i].t2 = None;
            out(LinkAction::Send(self.response(&remote, rr)));
        }

        let conn = &self.connections[i];
        if due(conn.t1) {
            let exhausted = conn.retries >= MAX_RETRIES;
            let state = conn.state;
            match state {
                LinkState::Connecting if exhausted => {
                    self.connections[i].go_disconnected();
                    warn!("ax25 link: no answer from {remote}");
                    out(LinkAction::Failed(remote.clone()));
                }
                LinkState::Connecting => {
                    let sabm = self.command(&remote, Self::unnumbered(UnnumberedKind::Sabm, true));
                    let conn = &mut self.connections[i];
                    conn.retries += 1;
                    conn.t1 = Some(now_ms + T1_MS);
                    out(LinkAction::Send(sabm));
                }
                LinkState::Connected if exhausted => {
                    self.connections[i].go_disconnected();
                    warn!("ax25 link: {remote} stopped acknowledging");
                    out(LinkAction::Failed(remote.clone()));
                }
                LinkState::Connected => {
                    self.connections[i].retries += 1;
                    self.retransmit(i, now_ms, out);
                    if self.connections[i].unacked.is_empty() {
                        self.connections[i].t1 = None;
                    }
                }
                LinkState::Disconnecting if exhausted => {
                    self.connections[i].go_disconnected();
                    info!("ax25 link: forced disconnect from {remote}");
                    out(LinkAction::Disconnected(remote.clone()));
                }
                LinkState::Disconnecting => {
                    let disc = self.command(&remote, Self::unnumbered(UnnumberedKind::Disc, true));
                    let conn = &mut self.connections[i];
                    conn.retries += 1;
                    conn.t1 = Some(now_ms + T1_MS);
                    out(LinkAction::Send(disc));
                }
                LinkState::Disconnected => self.connections[i].t1 = None,
            }
        }

        let conn = &self.connections[i];
        if conn.state == LinkState::Connected && conn.t1.is_none() && due(conn.t3) {
            let poll = Self::supervisory(SupervisoryKind::Rr, conn.vr, true);
            self.connections[i].t3 = Some(now_ms + T3_MS);
            debug!("ax25 link: idle poll to {remote}");
            out(LinkAction::Send(self.command(&remote, poll)));
        }
    }

    /// Cancel retry timers when the radio stops
    ///
    /// Links still handshaking are forced to Disconnected with an event.
    /// Connected links keep their state; T1 stays armed while I frames are
    /// unacknowledged so they are still retransmitted.
    pub fn cancel_timers<F: FnMut(LinkAction)>(&mut self, out: &mut F) {
        for conn in &mut self.connections {
            match conn.state {
                LinkState::Connecting => {
                    conn.go_disconnected();
                    out(LinkAction::Failed(conn.remote.clone()));
                }
                LinkState::Disconnecting => {
                    conn.go_disconnected();
                    out(LinkAction::Disconnected(conn.remote.clone()));
                }
                LinkState::Connected if conn.unacked.is_empty() => conn.t1 = None,
                LinkState::Connected | LinkState::Disconnected => {}
            }
        }
    }
}
