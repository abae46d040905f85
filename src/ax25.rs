//! AX.25 link layer
//!
//! Address and frame codecs plus the connected-mode state machine
//! (a LAPB subset, modulo 8).

pub mod address;
pub mod frame;
pub mod link;

pub use address::Address;
pub use frame::{Control, Frame, SupervisoryKind, UnnumberedKind, PID_NO_LAYER3};
pub use link::{LinkAction, LinkManager, LinkState};
