//! Error taxonomy
//!
//! One error type for the whole data-link core. Each variant carries a short
//! static context string so that logs say which check tripped without
//! allocating.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

/// Data-link core error
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// Empty or oversize buffer, out-of-range SSID/CAN, unknown mode
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// Sync mismatch, missing address terminator, bad length field
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
    /// CRC/FCS/checksum mismatch after any FEC succeeded
    #[error("integrity check failed: {0}")]
    IntegrityFailure(&'static str),
    /// Reed-Solomon decoder exceeded its correction capacity
    #[error("uncorrectable block")]
    Uncorrectable,
    /// Operation not permitted in the current state
    #[error("state violation: {0}")]
    StateViolation(&'static str),
    /// Fixed-capacity table or queue is full
    #[error("resource exhausted: {0}")]
    ResourceExhausted(&'static str),
    /// Collaborator busy or rejected a write; retry may succeed
    #[error("transient failure: {0}")]
    Transient(&'static str),
    /// Collaborator reported an unrecoverable fault
    #[error("fatal: {0}")]
    Fatal(&'static str),
}

impl Error {
    /// True for errors that are handled locally on the RX path
    /// (counted and reported, never unwound into the controller)
    #[must_use]
    pub const fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::IntegrityFailure(_) | Self::Uncorrectable
        )
    }

    /// Short name of the variant, for counters and log lines
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid-argument",
            Self::Malformed(_) => "malformed",
            Self::IntegrityFailure(_) => "integrity",
            Self::Uncorrectable => "uncorrectable",
            Self::StateViolation(_) => "state",
            Self::ResourceExhausted(_) => "exhausted",
            Self::Transient(_) => "transient",
            Self::Fatal(_) => "fatal",
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Uncorrectable => defmt::write!(f, "uncorrectable"),
            Self::InvalidArgument(ctx)
            | Self::Malformed(ctx)
            | Self::IntegrityFailure(ctx)
            | Self::StateViolation(ctx)
            | Self::ResourceExhausted(ctx)
            | Self::Transient(ctx)
            | Self::Fatal(ctx) => defmt::write!(f, "{}: {}", self.kind(), ctx),
        }
    }
}
