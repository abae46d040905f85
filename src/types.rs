//! Shared types used across the data-link core
//!
//! Domain-specific newtypes that enforce their invariants at construction,
//! plus the small enums every layer talks in.

use core::fmt;
use core::str::FromStr;

use crate::error::Error;
use crate::fec::RsCode;

/// Frequency in Hertz with validation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frequency(u32);

impl Frequency {
    /// Lowest frequency the core will tune (1 MHz)
    pub const MIN_HZ: u32 = 1_000_000;

    /// Highest frequency the core will tune (3 GHz)
    pub const MAX_HZ: u32 = 3_000_000_000;

    /// Create a new Frequency from Hz, returns None if out of range
    #[must_use]
    pub const fn from_hz(hz: u32) -> Option<Self> {
        if hz >= Self::MIN_HZ && hz <= Self::MAX_HZ {
            Some(Self(hz))
        } else {
            None
        }
    }

    /// Get the frequency in Hz
    #[must_use]
    pub const fn as_hz(self) -> u32 {
        self.0
    }

    /// Get the frequency in kHz (truncated)
    #[must_use]
    pub const fn as_khz(self) -> u32 {
        self.0 / 1000
    }
}

impl fmt::Debug for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frequency({} Hz)", self.0)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Frequency {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{} Hz", self.0);
    }
}

/// AX.25 secondary station identifier (0..=15)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ssid(u8);

impl Ssid {
    /// Largest legal SSID
    pub const MAX: u8 = 15;

    /// Create an SSID, None if above 15
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// M17 Channel Access Number (0..=15)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Can(u8);

impl Can {
    /// Largest legal CAN
    pub const MAX: u8 = 15;

    /// Create a CAN, None if above 15
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw value
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Which link layers the controller runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OperatingMode {
    /// M17 only
    M17Only,
    /// AX.25 family only (AX.25, APRS, FX.25, IL2P)
    Ax25Only,
    /// Both, classified per frame
    #[default]
    Dual,
    /// Both, with M17 <-> AX.25 translation
    Bridge,
}

impl OperatingMode {
    /// Whether M17 frames are decoded in this mode
    #[must_use]
    pub const fn m17_enabled(self) -> bool {
        !matches!(self, Self::Ax25Only)
    }

    /// Whether AX.25-family frames are decoded in this mode
    #[must_use]
    pub const fn ax25_enabled(self) -> bool {
        !matches!(self, Self::M17Only)
    }

    /// Mode from the pair of enable flags used in the settings file
    #[must_use]
    pub const fn from_flags(m17: bool, ax25: bool) -> Option<Self> {
        match (m17, ax25) {
            (true, true) => Some(Self::Dual),
            (true, false) => Some(Self::M17Only),
            (false, true) => Some(Self::Ax25Only),
            (false, false) => None,
        }
    }

    /// Keyword used on the command line and in settings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M17Only => "m17",
            Self::Ax25Only => "ax25",
            Self::Dual => "dual",
            Self::Bridge => "bridge",
        }
    }
}

impl FromStr for OperatingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "m17" | "M17" => Ok(Self::M17Only),
            "ax25" | "AX25" => Ok(Self::Ax25Only),
            "dual" | "DUAL" => Ok(Self::Dual),
            "bridge" | "BRIDGE" => Ok(Self::Bridge),
            _ => Err(Error::InvalidArgument("unknown mode")),
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for OperatingMode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// Link-layer protocol of a frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    /// M17 (byte envelope on the shared link)
    M17,
    /// AX.25 in HDLC flags
    Ax25,
    /// AX.25 UI frame carrying APRS (PID 0xF0)
    Aprs,
    /// FX.25 (AX.25 with Reed-Solomon)
    Fx25,
    /// IL2P
    Il2p,
    /// Not recognized
    #[default]
    Unknown,
}

impl Protocol {
    /// All protocols with an active flag, in classifier order
    pub const ALL: [Self; 5] = [Self::Fx25, Self::Il2p, Self::M17, Self::Ax25, Self::Aprs];

    /// Bit in the active-flags mask (0 for Unknown)
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Self::M17 => 1 << 0,
            Self::Ax25 => 1 << 1,
            Self::Aprs => 1 << 2,
            Self::Fx25 => 1 << 3,
            Self::Il2p => 1 << 4,
            Self::Unknown => 0,
        }
    }

    /// Modulation the SDR must use to carry this protocol
    #[must_use]
    pub const fn modulation(self) -> Option<Modulation> {
        match self {
            Self::M17 => Some(Modulation::M17Fsk4),
            Self::Ax25 | Self::Aprs | Self::Fx25 | Self::Il2p => Some(Modulation::Afsk1200),
            Self::Unknown => None,
        }
    }

    /// Short lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::M17 => "m17",
            Self::Ax25 => "ax25",
            Self::Aprs => "aprs",
            Self::Fx25 => "fx25",
            Self::Il2p => "il2p",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Protocol {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// Modulation selected on the SDR for transmit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Modulation {
    /// M17 4-FSK, 4800 symbols/s
    M17Fsk4,
    /// Bell 202 AFSK, 1200 baud
    Afsk1200,
}

/// Direction of a frame relative to this station
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Received from the air
    Rx,
    /// Sent to the air
    Tx,
}

/// Forward error correction wrapped around outbound AX.25
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TxFec {
    /// Plain flag-delimited AX.25
    #[default]
    None,
    /// FX.25 with the given Reed-Solomon code
    Fx25(RsCode),
    /// IL2P
    Il2p,
}

impl FromStr for TxFec {
    type Err = Error;

    /// `none`, `il2p`, `fx25` (RS(255,239)) or `fx25:<k>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Self::None),
            "il2p" => Ok(Self::Il2p),
            "fx25" => Ok(Self::Fx25(RsCode::K239)),
            other => {
                let k: usize = other
                    .strip_prefix("fx25:")
                    .and_then(|k| k.parse().ok())
                    .ok_or(Error::InvalidArgument("unknown fec"))?;
                RsCode::ALL
                    .into_iter()
                    .find(|code| code.data_len() == k)
                    .map(Self::Fx25)
                    .ok_or(Error::InvalidArgument("unknown fx25 code"))
            }
        }
    }
}

impl fmt::Display for TxFec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Fx25(code) => write!(f, "fx25:{}", code.data_len()),
            Self::Il2p => f.write_str("il2p"),
        }
    }
}
