//! System configuration and protocol constants
//!
//! Compile-time defaults for the data-link core. Runtime settings that may be
//! persisted live in [`crate::settings`]; everything here is fixed at build
//! time.

use crate::types::{Frequency, OperatingMode};

/// Default operating frequency (2m APRS, 144.800 MHz)
pub const DEFAULT_FREQUENCY_HZ: u32 = 144_800_000;

/// Default operating frequency as a validated value
pub const DEFAULT_FREQUENCY: Frequency = match Frequency::from_hz(DEFAULT_FREQUENCY_HZ) {
    Some(f) => f,
    None => panic!("default frequency out of range"),
};

/// Default channel bandwidth in Hz
pub const DEFAULT_BANDWIDTH_HZ: u32 = 25_000;

/// Default TX/RX gain in dB
pub const DEFAULT_GAIN_DB: i8 = 0;

/// Default station callsign
pub const DEFAULT_CALLSIGN: &str = "N0CALL";

/// Default operating mode
pub const DEFAULT_MODE: OperatingMode = OperatingMode::Dual;

/// Protocol activity timeout in milliseconds
pub const DEFAULT_PROTOCOL_TIMEOUT_MS: u32 = 5_000;

/// Scan dwell per channel in milliseconds
pub const DEFAULT_SCAN_DWELL_MS: u32 = 2_000;

/// Maximum channels in the scan list
pub const MAX_SCAN_CHANNELS: usize = 8;

/// Largest frame that crosses the SDR boundary in either direction
pub const WIRE_MTU: usize = 2048;

/// Depth of the controller input queue
pub const INPUT_QUEUE_DEPTH: usize = 8;

/// Depth of the pending transmit queue
pub const TX_QUEUE_DEPTH: usize = 16;

/// Received frames waiting for `receive`
pub const RX_QUEUE_DEPTH: usize = 4;

/// KISS frames waiting for the host
pub const HOST_QUEUE_DEPTH: usize = 4;

/// Link actions buffered per state-machine call
pub const ACTION_QUEUE_DEPTH: usize = 32;

/// Largest payload handed back by a single receive poll
pub const MAX_DELIVERY_LEN: usize = 1024;

/// AX.25 data-link timing and capacities
pub mod link {
    //! LAPB subset parameters

    /// Simultaneous connections
    pub const MAX_CONNECTIONS: usize = 16;

    /// Acknowledgement / retry timer
    pub const T1_MS: u64 = 3_000;

    /// Response delay timer
    pub const T2_MS: u64 = 1_000;

    /// Idle link poll timer
    pub const T3_MS: u64 = 30_000;

    /// Retries before a link is abandoned
    pub const MAX_RETRIES: u8 = 3;

    /// Outstanding I-frames (k)
    pub const WINDOW: u8 = 4;

    /// Sequence number modulus
    pub const MODULUS: u8 = 8;

    /// I-frames waiting to be sent per connection
    pub const SEND_QUEUE_DEPTH: usize = 8;
}

/// KISS host-link defaults
pub mod kiss {
    //! Parameters in KISS units (10 ms for timings)

    /// TX delay, 10 ms units
    pub const TXDELAY: u8 = 50;

    /// Persistence (p = (P + 1) / 256)
    pub const PERSISTENCE: u8 = 63;

    /// Slot time, 10 ms units
    pub const SLOTTIME: u8 = 10;

    /// TX tail, 10 ms units
    pub const TXTAIL: u8 = 5;

    /// Largest payload accepted inside one KISS frame
    pub const MAX_PAYLOAD: usize = 1100;

    /// Bytes kept from a SETHARD command
    pub const MAX_HARDWARE: usize = 32;
}

/// Bridge defaults
pub mod bridge {
    //! M17 <-> AX.25 translation

    /// Mapping table capacity
    pub const MAX_MAPPINGS: usize = 16;

    /// Beacon used when no position is configured
    pub const DEFAULT_BEACON: &str = "!0000.00N/00000.00W-M17 Bridge";

    /// Payload bytes carried from an M17 packet into a UI frame
    pub const PACKET_INFO_LEN: usize = 20;

    /// Destination used for M17 packet relays
    pub const RELAY_DESTINATION: &str = "QQQQQQ";

    /// Frames buffered for transmission on the other side
    pub const OUTBOX_DEPTH: usize = 4;
}
