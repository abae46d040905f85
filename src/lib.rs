//! Dual-mode packet radio data-link core
//!
//! This library implements the link layers of a software-defined radio TNC
//! that speaks both M17 and the AX.25 family (plain AX.25, APRS, FX.25 and
//! IL2P) over one shared byte link, and can bridge between them.
//!
//! # Architecture
//!
//! The crate is organized in layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CONTROL LAYER                           │
//! │  Controller  │  Classifier  │  Bridge  │  Settings          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      LINK LAYER                             │
//! │  AX.25 frames + LAPB  │  FX.25  │  IL2P  │  M17  │  KISS    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     CODING LAYER                            │
//! │  CRC  │  GF(256) / Reed-Solomon  │  HDLC  │  soft-bit SIMD  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    CAPABILITIES                             │
//! │  Sdr (radio front end)  │  Observer (frames, links, errors) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **No heap**: all buffers are fixed-capacity `heapless` containers
//! - **Type-driven design**: newtypes enforce ranges at construction
//! - **No unsafe code** outside the `core::arch` soft-bit kernels
//! - **Capabilities in, events out**: the radio is a trait, observers are
//!   notified synchronously
//! - **Explicit error handling**: all fallible operations return `Result`

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error taxonomy shared by every layer
pub mod error;

/// System configuration and constants
pub mod config;

/// Shared types used across modules
pub mod types;

/// Persistent key/value settings
pub mod settings;

/// CRCs, GF(256) arithmetic and Reed-Solomon
pub mod fec;

/// HDLC flags and bit stuffing
pub mod hdlc;

/// KISS host protocol
pub mod kiss;

/// AX.25 addresses, frames and connected mode
pub mod ax25;

/// FX.25 forward error correction wrapper
pub mod fx25;

/// Improved Layer 2 Protocol
pub mod il2p;

/// M17 frames, packet mode and symbol helpers
pub mod m17;

/// Per-frame protocol detection
pub mod classifier;

/// M17 <-> AX.25/APRS translation
pub mod bridge;

/// Observer hooks, statistics and the input queue
pub mod events;

/// Radio front-end capability
pub mod sdr;

/// Soft-symbol kernels with runtime dispatch
pub mod simd;

/// The dual-mode controller
pub mod controller;

pub use controller::{Controller, ControllerState, Received};
pub use error::{Error, Result};
pub use events::{LinkEvent, Observer, Stats};
pub use sdr::{LoopbackSdr, Sdr, SdrFault};
pub use settings::ControllerConfig;
pub use types::{Can, Direction, Frequency, Modulation, OperatingMode, Protocol, Ssid, TxFec};

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::ax25::{Address, Frame};
    pub use crate::config::*;
    pub use crate::controller::{Controller, ControllerState};
    pub use crate::error::{Error, Result};
    pub use crate::events::Observer;
    pub use crate::m17::{Lsf, M17Frame};
    pub use crate::sdr::Sdr;
    pub use crate::settings::ControllerConfig;
    pub use crate::types::*;

    // Logging
    pub use log::{debug, error, info, trace, warn};
}
