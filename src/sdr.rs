//! SDR capability boundary
//!
//! The data-link core never touches radio hardware. It drives an [`Sdr`]
//! implementation that tunes, keys and moves whole byte frames. The
//! [`LoopbackSdr`] keeps everything in memory for the harness and tests.

use heapless::Deque;
use log::trace;

use crate::config::{DEFAULT_BANDWIDTH_HZ, DEFAULT_FREQUENCY, TX_QUEUE_DEPTH};
use crate::error::Error;
use crate::events::Chunk;
use crate::types::{Frequency, Modulation};

/// Failure reported by an SDR
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdrFault {
    /// Device busy; try again later
    Busy,
    /// Request refused (bad parameter or wrong state)
    Rejected,
    /// Device unusable until reset
    Fatal,
}

impl From<SdrFault> for Error {
    fn from(fault: SdrFault) -> Self {
        match fault {
            SdrFault::Busy => Self::Transient("sdr busy"),
            SdrFault::Rejected => Self::Transient("sdr rejected request"),
            SdrFault::Fatal => Self::Fatal("sdr fault"),
        }
    }
}

/// Result of an SDR call
pub type SdrResult<T> = core::result::Result<T, SdrFault>;

/// Radio operations the controller needs
pub trait Sdr {
    /// Tune
    fn set_frequency(&mut self, frequency: Frequency) -> SdrResult<()>;
    /// Channel bandwidth
    fn set_bandwidth(&mut self, hz: u32) -> SdrResult<()>;
    /// Transmit gain
    fn set_tx_gain(&mut self, db: i8) -> SdrResult<()>;
    /// Receive gain
    fn set_rx_gain(&mut self, db: i8) -> SdrResult<()>;
    /// Modulator and demodulator selection
    fn set_modulation(&mut self, modulation: Modulation) -> SdrResult<()>;
    /// Enable the receiver
    fn start_rx(&mut self) -> SdrResult<()>;
    /// Disable the receiver
    fn stop_rx(&mut self) -> SdrResult<()>;
    /// Key the transmitter
    fn start_tx(&mut self) -> SdrResult<()>;
    /// Unkey the transmitter
    fn stop_tx(&mut self) -> SdrResult<()>;
    /// Transmit one frame
    fn send_bytes(&mut self, bytes: &[u8]) -> SdrResult<()>;
    /// Copy one received frame into `buf`; `Ok(0)` when nothing is ready
    fn recv_bytes(&mut self, buf: &mut [u8]) -> SdrResult<usize>;
}

/// In-memory SDR: sent frames are kept, received frames are injected
#[derive(Debug)]
pub struct LoopbackSdr {
    frequency: Frequency,
    bandwidth: u32,
    tx_gain: i8,
    rx_gain: i8,
    modulation: Option<Modulation>,
    receiving: bool,
    transmitting: bool,
    sent: Deque<Chunk, TX_QUEUE_DEPTH>,
    pending: Deque<Chunk, TX_QUEUE_DEPTH>,
    fault: Option<SdrFault>,
}

impl Default for LoopbackSdr {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackSdr {
    /// Idle loopback tuned to the default frequency
    #[must_use]
    pub fn new() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            bandwidth: DEFAULT_BANDWIDTH_HZ,
            tx_gain: 0,
            rx_gain: 0,
            modulation: None,
            receiving: false,
            transmitting: false,
            sent: Deque::new(),
            pending: Deque::new(),
            fault: None,
        }
    }

    /// Queue a frame for `recv_bytes`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the frame is too large, `ResourceExhausted` if
    /// the receive queue is full.
    pub fn inject(&mut self, bytes: &[u8]) -> crate::error::Result<()> {
        let chunk = Chunk::from_slice(bytes).map_err(|()| Error::InvalidArgument("frame too large"))?;
        self.pending
            .push_back(chunk)
            .map_err(|_| Error::ResourceExhausted("loopback rx queue full"))
    }

    /// Move every sent frame to the receive queue; returns how many moved
    pub fn loop_back(&mut self) -> usize {
        let mut moved = 0;
        while !self.pending.is_full() {
            let Some(chunk) = self.sent.pop_front() else {
                break;
            };
            let _ = self.pending.push_back(chunk);
            moved += 1;
        }
        moved
    }

    /// Oldest sent frame
    pub fn take_sent(&mut self) -> Option<Chunk> {
        self.sent.pop_front()
    }

    /// Frames sent and not yet taken
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    /// Fail every following call with `fault` until cleared
    pub fn set_fault(&mut self, fault: Option<SdrFault>) {
        self.fault = fault;
    }

    /// Current tuning
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Current bandwidth
    #[must_use]
    pub const fn bandwidth(&self) -> u32 {
        self.bandwidth
    }

    /// Current gains (tx, rx)
    #[must_use]
    pub const fn gains(&self) -> (i8, i8) {
        (self.tx_gain, self.rx_gain)
    }

    /// Last selected modulation
    #[must_use]
    pub const fn modulation(&self) -> Option<Modulation> {
        self.modulation
    }

    /// Receiver enabled
    #[must_use]
    pub const fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Transmitter keyed
    #[must_use]
    pub const fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    fn check(&self) -> SdrResult<()> {
        self.fault.map_or(Ok(()), Err)
    }
}

impl Sdr for LoopbackSdr {
    fn set_frequency(&mut self, frequency: Frequency) -> SdrResult<()> {
        self.check()?;
        self.frequency = frequency;
        Ok(())
    }

    fn set_bandwidth(&mut self, hz: u32) -> SdrResult<()> {
        self.check()?;
        if hz == 0 {
            return Err(SdrFault::Rejected);
        }
        self.bandwidth = hz;
        Ok(())
    }

    fn set_tx_gain(&mut self, db: i8) -> SdrResult<()> {
        self.check()?;
        self.tx_gain = db;
        Ok(())
    }

    fn set_rx_gain(&mut self, db: i8) -> SdrResult<()> {
        self.check()?;
        self.rx_gain = db;
        Ok(())
    }

    fn set_modulation(&mut self, modulation: Modulation) -> SdrResult<()> {
        self.check()?;
        self.modulation = Some(modulation);
        Ok(())
    }

    fn start_rx(&mut self) -> SdrResult<()> {
        self.check()?;
        self.receiving = true;
        Ok(())
    }

    fn stop_rx(&mut self) -> SdrResult<()> {
        self.check()?;
        self.receiving = false;
        Ok(())
    }

    fn start_tx(&mut self) -> SdrResult<()> {
        self.check()?;
        self.transmitting = true;
        Ok(())
    }

    fn stop_tx(&mut self) -> SdrResult<()> {
        self.check()?;
        self.transmitting = false;
        Ok(())
    }

    fn send_bytes(&mut self, bytes: &[u8]) -> SdrResult<()> {
        self.check()?;
        if !self.transmitting {
            return Err(SdrFault::Rejected);
        }
        let chunk = Chunk::from_slice(bytes).map_err(|()| SdrFault::Rejected)?;
        self.sent.push_back(chunk).map_err(|_| SdrFault::Busy)?;
        trace!("loopback: sent {} bytes", bytes.len());
        Ok(())
    }

    fn recv_bytes(&mut self, buf: &mut [u8]) -> SdrResult<usize> {
        self.check()?;
        let Some(front) = self.pending.front() else {
            return Ok(0);
        };
        let dst = buf.get_mut(..front.len()).ok_or(SdrFault::Rejected)?;
        dst.copy_from_slice(front);
        let len = front.len();
        self.pending.pop_front();
        Ok(len)
    }
}
