//! Protocol classifier
//!
//! Decides which link layer a received byte frame belongs to. The decision
//! order is fixed: FX.25, IL2P, M17, AX.25 (refined to APRS), Unknown. Only
//! protocols enabled by the operating mode are considered.
//!
//! The classifier also tracks which protocol is currently active: one flag
//! per protocol, exactly one set after a recognised frame, decaying back to
//! none after the protocol timeout.

use log::{debug, trace};

use crate::ax25::address::ADDRESS_LEN;
use crate::ax25::PID_NO_LAYER3;
use crate::hdlc::FLAG;
use crate::types::{OperatingMode, Protocol};
use crate::{fx25, il2p, m17};


/// Stateful frame classifier
#[derive(Clone, Debug)]
pub struct Classifier {
    mode: OperatingMode,
    active: u8,
    current: Protocol,
    switches: u32,
    timeout_ms: u32,
    last_activity_ms: u64,
}

impl Classifier {
    /// Classifier for `mode`, decaying after `timeout_ms` of silence (0 disables)
    #[must_use]
    pub const fn new(mode: OperatingMode, timeout_ms: u32) -> Self {
        Self {
            mode,
            active: 0,
            current: Protocol::Unknown,
            switches: 0,
            timeout_ms,
            last_activity_ms: 0,
        }
    }

    /// Operating mode
    #[must_use]
    pub const fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Change the enabled protocol set; active flags are cleared
    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
        self.active = 0;
        self.current = Protocol::Unknown;
    }

    /// Change the activity timeout
    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Whether `protocol` is decoded in the current mode
    #[must_use]
    pub const fn enabled(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::M17 => self.mode.m17_enabled(),
            Protocol::Ax25 | Protocol::Aprs | Protocol::Fx25 | Protocol::Il2p => {
                self.mode.ax25_enabled()
            }
            Protocol::Unknown => false,
        }
    }

    /// Pure classification of `bytes`
    #[must_use]
    pub fn detect(&self, bytes: &[u8]) -> Protocol {
        if self.enabled(Protocol::Fx25) && fx25::is_fx25(bytes) {
            return Protocol::Fx25;
        }
        if self.enabled(Protocol::Il2p) && il2p::find_sync(bytes).is_some() {
            return Protocol::Il2p;
        }
        if self.enabled(Protocol::M17) && m17::frame::is_m17(bytes) {
            return Protocol::M17;
        }
        if self.enabled(Protocol::Ax25) && bytes.first() == Some(&FLAG) {
            return if looks_like_aprs(bytes) {
                Protocol::Aprs
            } else {
                Protocol::Ax25
            };
        }
        Protocol::Unknown
    }

    /// Classify `bytes` and record the verdict as activity
    pub fn classify(&mut self, bytes: &[u8], now_ms: u64) -> Protocol {
        let protocol = self.detect(bytes);
        trace!("classifier: {} bytes -> {protocol}", bytes.len());
        self.note(protocol, now_ms);
        protocol
    }

    /// Record activity on `protocol`; returns true if the active protocol
    /// changed. Unknown leaves the flags alone.
    pub fn note(&mut self, protocol: Protocol, now_ms: u64) -> bool {
        if protocol == Protocol::Unknown {
            return false;
        }
        self.last_activity_ms = now_ms;
        self.active = protocol.flag();
        if self.current == protocol {
            return false;
        }
        debug!("classifier: active protocol {} -> {protocol}", self.current);
        self.current = protocol;
        self.switches = self.switches.wrapping_add(1);
        true
    }

    /// Decay the active protocol after the timeout; returns true on decay
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.timeout_ms == 0 || self.current == Protocol::Unknown {
            return false;
        }
        if now_ms.saturating_sub(self.last_activity_ms) < u64::from(self.timeout_ms) {
            return false;
        }
        debug!("classifier: {} idle, decaying", self.current);
        self.current = Protocol::Unknown;
        self.active = 0;
        true
    }

    /// Protocol of the last recognised frame
    #[must_use]
    pub const fn current(&self) -> Protocol {
        self.current
    }

    /// Active-flags mask
    #[must_use]
    pub const fn active_flags(&self) -> u8 {
        self.active
    }

    /// Whether `protocol`'s flag is set
    #[must_use]
    pub const fn is_active(&self, protocol: Protocol) -> bool {
        protocol.flag() != 0 && self.active & protocol.flag() != 0
    }

    /// Number of active protocol changes
    #[must_use]
    pub const fn switches(&self) -> u32 {
        self.switches
    }

    /// Clear flags and the switch count
    pub fn reset(&mut self) {
        self.active = 0;
        self.current = Protocol::Unknown;
        self.switches = 0;
    }
}

/// Raw look at an HDLC frame: any 0xF0 after the address and control fields
///
/// This is a routing hint only. The decoder settles APRS from the parsed
/// control and PID.
fn looks_like_aprs(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|&b| b != FLAG).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| b != FLAG).map_or(start, |i| i + 1);
    let body = bytes.get(start..end).unwrap_or_default();
    let mut offset = 0;
    loop {
        let Some(last) = body.get(offset + ADDRESS_LEN - 1) else {
            return false;
        };
        offset += ADDRESS_LEN;
        if last & 0x01 != 0 {
            break;
        }
    }
    // skip the control byte
    body.get(offset + 1..)
        .is_some_and(|rest| rest.contains(&PID_NO_LAYER3))
}
