//! AX.25 address field
//!
//! Seven bytes on the wire: six callsign characters shifted left by one and
//! space padded, then the SSID byte laid out as `C R R S S S S E`:
//! command/has-been-repeated bit, two reserved bits (emitted as 1), the SSID
//! and the end-of-address flag.

use core::fmt;
use core::str::FromStr;

use heapless::String;

use crate::error::{Error, Result};
use crate::types::Ssid;

/// Encoded address length
pub const ADDRESS_LEN: usize = 7;

/// Longest callsign
pub const MAX_CALLSIGN_LEN: usize = 6;

/// C (command) / H (has-been-repeated) bit of the SSID byte
const C_BIT: u8 = 0x80;
/// Reserved bits, always set on emission
const RESERVED_BITS: u8 = 0x60;
/// End of address chain
const LAST_BIT: u8 = 0x01;

/// Callsign, SSID and command bit
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    callsign: String<MAX_CALLSIGN_LEN>,
    ssid: Ssid,
    c_bit: bool,
}

/// True for the characters allowed in an AX.25 callsign
#[must_use]
pub const fn is_callsign_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

impl Address {
    /// Build an address from a callsign of 1..=6 characters `[A-Z0-9]`
    ///
    /// Lowercase letters are folded to uppercase.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty, oversize or non-alphanumeric callsign
    /// or an SSID above 15.
    pub fn new(callsign: &str, ssid: u8) -> Result<Self> {
        let ssid = Ssid::new(ssid).ok_or(Error::InvalidArgument("ssid above 15"))?;
        if callsign.is_empty() || callsign.len() > MAX_CALLSIGN_LEN {
            return Err(Error::InvalidArgument("callsign length"));
        }
        let mut text = String::new();
        for c in callsign.bytes().map(|c| c.to_ascii_uppercase()) {
            if !is_callsign_char(c) {
                return Err(Error::InvalidArgument("callsign character"));
            }
            text.push(char::from(c))
                .map_err(|()| Error::InvalidArgument("callsign length"))?;
        }
        Ok(Self {
            callsign: text,
            ssid,
            c_bit: false,
        })
    }

    /// Same address with the C/H bit set or cleared
    #[must_use]
    pub fn with_c_bit(mut self, c_bit: bool) -> Self {
        self.c_bit = c_bit;
        self
    }

    /// Callsign without SSID
    #[must_use]
    pub fn callsign(&self) -> &str {
        &self.callsign
    }

    /// SSID (0..=15)
    #[must_use]
    pub const fn ssid(&self) -> u8 {
        self.ssid.value()
    }

    /// C/H bit
    #[must_use]
    pub const fn c_bit(&self) -> bool {
        self.c_bit
    }

    /// Same callsign and SSID, ignoring the C/H bit
    #[must_use]
    pub fn same_station(&self, other: &Self) -> bool {
        self.callsign == other.callsign && self.ssid == other.ssid
    }

    /// Encode into seven bytes, setting the end flag if `last`
    #[must_use]
    pub fn encode(&self, last: bool) -> [u8; ADDRESS_LEN] {
        let mut out = [b' ' << 1; ADDRESS_LEN];
        for (slot, c) in out.iter_mut().zip(self.callsign.bytes()) {
            *slot = c << 1;
        }
        let mut ssid_byte = RESERVED_BITS | (self.ssid.value() << 1);
        if self.c_bit {
            ssid_byte |= C_BIT;
        }
        if last {
            ssid_byte |= LAST_BIT;
        }
        out[ADDRESS_LEN - 1] = ssid_byte;
        out
    }

    /// Decode seven bytes; returns the address and its end flag
    ///
    /// # Errors
    ///
    /// `Malformed` if fewer than seven bytes are given or the callsign is not
    /// 1..=6 characters `[A-Z0-9]` followed only by padding.
    pub fn decode(bytes: &[u8]) -> Result<(Self, bool)> {
        let field = bytes
            .get(..ADDRESS_LEN)
            .ok_or(Error::Malformed("short address"))?;
        let mut callsign = String::new();
        let mut padding = false;
        for &raw in &field[..MAX_CALLSIGN_LEN] {
            let c = raw >> 1;
            if c == b' ' {
                padding = true;
                continue;
            }
            if padding || !is_callsign_char(c) {
                return Err(Error::Malformed("address callsign"));
            }
            callsign
                .push(char::from(c))
                .map_err(|()| Error::Malformed("address callsign"))?;
        }
        if callsign.is_empty() {
            return Err(Error::Malformed("empty callsign"));
        }
        let ssid_byte = field[ADDRESS_LEN - 1];
        let ssid = Ssid::new((ssid_byte >> 1) & 0x0F).ok_or(Error::Malformed("ssid"))?;
        Ok((
            Self {
                callsign,
                ssid,
                c_bit: ssid_byte & C_BIT != 0,
            },
            ssid_byte & LAST_BIT != 0,
        ))
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse `CALL` or `CALL-SSID`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((call, ssid)) => {
                let ssid = ssid
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidArgument("ssid"))?;
                Self::new(call, ssid)
            }
            None => Self::new(s, 0),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.callsign)?;
        if self.ssid.value() != 0 {
            write!(f, "-{}", self.ssid.value())?;
        }
        Ok(())
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Address {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}-{=u8}", self.callsign.as_str(), self.ssid.value());
    }
}
