//! Observer hooks, statistics and the controller input queue

use heapless::{Deque, Vec};

use crate::ax25::Address;
use crate::config::{INPUT_QUEUE_DEPTH, WIRE_MTU};
use crate::error::Error;
use crate::types::{Direction, Protocol};

/// Connected-mode link notifications
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// Link established with the remote station
    Connected(Address),
    /// Link closed normally
    Disconnected(Address),
    /// Link setup or retry limit failed
    Failed(Address),
}

impl LinkEvent {
    /// Remote station
    #[must_use]
    pub const fn remote(&self) -> &Address {
        match self {
            Self::Connected(a) | Self::Disconnected(a) | Self::Failed(a) => a,
        }
    }
}

/// Receives frames, local errors and link events from a controller
///
/// All methods run synchronously inside controller calls.
pub trait Observer {
    /// A classified RX frame or a completed TX
    fn on_frame(&mut self, direction: Direction, protocol: Protocol, bytes: &[u8]);

    /// A frame-local decode error
    fn on_error(&mut self, _protocol: Protocol, _error: &Error) {}

    /// A link came up, went down or failed
    fn on_link(&mut self, _event: &LinkEvent) {}
}

impl Observer for () {
    fn on_frame(&mut self, _direction: Direction, _protocol: Protocol, _bytes: &[u8]) {}
}

/// RX/TX frame counters for one protocol
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProtocolCounters {
    /// Frames received
    pub rx: u32,
    /// Frames sent
    pub tx: u32,
}

/// Controller statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// M17 frames
    pub m17: ProtocolCounters,
    /// Plain AX.25 frames
    pub ax25: ProtocolCounters,
    /// APRS frames
    pub aprs: ProtocolCounters,
    /// FX.25 frames
    pub fx25: ProtocolCounters,
    /// IL2P frames
    pub il2p: ProtocolCounters,
    /// Active protocol changes
    pub protocol_switches: u32,
    /// Bridge conversions that failed
    pub conversion_errors: u32,
    /// Frame-local RX errors
    pub errors: u32,
    /// SDR arrivals dropped on a full input queue
    pub overflow: u32,
    /// M17 EOT markers seen
    pub m17_eot: u32,
    /// M17 BERT frames seen
    pub m17_bert: u32,
    /// Symbols corrected by Reed-Solomon
    pub fec_corrections: u32,
    /// Seconds since the controller was created
    pub uptime_seconds: u32,
}

impl Stats {
    /// Counters for `protocol` (None for Unknown)
    #[must_use]
    pub const fn counters(&self, protocol: Protocol) -> Option<&ProtocolCounters> {
        match protocol {
            Protocol::M17 => Some(&self.m17),
            Protocol::Ax25 => Some(&self.ax25),
            Protocol::Aprs => Some(&self.aprs),
            Protocol::Fx25 => Some(&self.fx25),
            Protocol::Il2p => Some(&self.il2p),
            Protocol::Unknown => None,
        }
    }

    fn counters_mut(&mut self, protocol: Protocol) -> Option<&mut ProtocolCounters> {
        match protocol {
            Protocol::M17 => Some(&mut self.m17),
            Protocol::Ax25 => Some(&mut self.ax25),
            Protocol::Aprs => Some(&mut self.aprs),
            Protocol::Fx25 => Some(&mut self.fx25),
            Protocol::Il2p => Some(&mut self.il2p),
            Protocol::Unknown => None,
        }
    }

    /// Count one frame
    pub fn record(&mut self, direction: Direction, protocol: Protocol) {
        if let Some(c) = self.counters_mut(protocol) {
            match direction {
                Direction::Rx => c.rx = c.rx.wrapping_add(1),
                Direction::Tx => c.tx = c.tx.wrapping_add(1),
            }
        }
    }

    /// Frames received on `protocol`
    #[must_use]
    pub const fn rx(&self, protocol: Protocol) -> u32 {
        match self.counters(protocol) {
            Some(c) => c.rx,
            None => 0,
        }
    }

    /// Frames sent on `protocol`
    #[must_use]
    pub const fn tx(&self, protocol: Protocol) -> u32 {
        match self.counters(protocol) {
            Some(c) => c.tx,
            None => 0,
        }
    }

    /// Zero every counter
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Bytes carried by one queued input
pub type Chunk = Vec<u8, WIRE_MTU>;

/// Work item for the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Frame bytes from the SDR
    Sdr(Chunk),
    /// KISS bytes from the host
    Host(Chunk),
    /// Timer tick
    Tick(u64),
}

/// Bounded FIFO of controller inputs
#[derive(Debug, Default)]
pub struct InputQueue {
    items: Deque<Input, INPUT_QUEUE_DEPTH>,
}

impl InputQueue {
    /// Empty queue
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Deque::new(),
        }
    }

    /// Append an input; hands it back if the queue is full
    ///
    /// # Errors
    ///
    /// The rejected input when no slot is free.
    pub fn push(&mut self, input: Input) -> core::result::Result<(), Input> {
        self.items.push_back(input)
    }

    /// Oldest input
    pub fn pop(&mut self) -> Option<Input> {
        self.items.pop_front()
    }

    /// Queued inputs
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True if the next push would fail
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Drop everything queued
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
