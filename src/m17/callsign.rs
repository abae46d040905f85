//! Base-40 callsign codec
//!
//! Up to nine characters from [`CHAR_MAP`] packed into 48 bits, first
//! character least significant. Values from 40^9 upward are special: the
//! all-ones value is the `@ALL` broadcast, the next 40^8 values are the
//! `#`-prefixed hash space, and the rest is reserved.

use heapless::String;

use crate::error::{Error, Result};

/// Character set; index is the base-40 digit
pub const CHAR_MAP: &[u8; 40] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-/.";

/// Longest encodable callsign, including a leading `#`
pub const MAX_LEN: usize = 9;

/// Encoded size
pub const ENCODED_LEN: usize = 6;

/// Broadcast address value
pub const BROADCAST: u64 = 0xFFFF_FFFF_FFFF;

/// Broadcast address text
pub const BROADCAST_TEXT: &str = "@ALL";

/// 40^9, start of the hash space
pub const HASH_BASE: u64 = 262_144_000_000_000;

/// 40^9 + 40^8, end (exclusive) of the hash space
pub const HASH_LIMIT: u64 = 268_697_600_000_000;

/// Decoded callsign text
pub type Callsign = String<MAX_LEN>;

fn digit(c: u8) -> Option<u64> {
    CHAR_MAP
        .iter()
        .position(|&m| m == c)
        .and_then(|p| u64::try_from(p).ok())
}

/// Encode a callsign to its 48-bit value
///
/// # Errors
///
/// `InvalidArgument` for more than nine characters or a character outside
/// the base-40 set.
pub fn encode_value(callsign: &str) -> Result<u64> {
    if callsign == BROADCAST_TEXT {
        return Ok(BROADCAST);
    }
    if callsign.len() > MAX_LEN {
        return Err(Error::InvalidArgument("callsign longer than 9"));
    }
    let (body, offset) = match callsign.strip_prefix('#') {
        Some(rest) => (rest, HASH_BASE),
        None => (callsign, 0),
    };
    let mut value = 0u64;
    for c in body.bytes().rev() {
        let d = digit(c).ok_or(Error::InvalidArgument("callsign character"))?;
        value = value * 40 + d;
    }
    Ok(value + offset)
}

/// Encode a callsign into six big-endian bytes
///
/// # Errors
///
/// As [`encode_value`].
pub fn encode(callsign: &str) -> Result<[u8; ENCODED_LEN]> {
    let value = encode_value(callsign)?;
    let mut out = [0u8; ENCODED_LEN];
    out.copy_from_slice(&value.to_be_bytes()[8 - ENCODED_LEN..]);
    Ok(out)
}

/// Decode a 48-bit value
///
/// # Errors
///
/// `Malformed` for values in the reserved range.
pub fn decode_value(value: u64) -> Result<Callsign> {
    let mut text = Callsign::new();
    if value == BROADCAST {
        text.push_str(BROADCAST_TEXT)
            .map_err(|()| Error::Malformed("callsign"))?;
        return Ok(text);
    }
    let mut rest = match value {
        v if v < HASH_BASE => v,
        v if v < HASH_LIMIT => {
            text.push('#').map_err(|()| Error::Malformed("callsign"))?;
            v - HASH_BASE
        }
        _ => return Err(Error::Malformed("reserved callsign value")),
    };
    while rest > 0 {
        let d = usize::try_from(rest % 40).map_err(|_| Error::Malformed("callsign"))?;
        text.push(char::from(CHAR_MAP[d]))
            .map_err(|()| Error::Malformed("callsign too long"))?;
        rest /= 40;
    }
    Ok(text)
}

/// Decode six big-endian bytes
///
/// # Errors
///
/// As [`decode_value`].
pub fn decode(bytes: &[u8; ENCODED_LEN]) -> Result<Callsign> {
    let mut wide = [0u8; 8];
    wide[8 - ENCODED_LEN..].copy_from_slice(bytes);
    decode_value(u64::from_be_bytes(wide))
}

/// Validate and normalise a callsign for the bridge: 3..=9 characters
/// `[A-Z0-9]`, folded to uppercase
///
/// # Errors
///
/// `InvalidArgument` otherwise.
pub fn normalize(callsign: &str) -> Result<Callsign> {
    if !(3..=MAX_LEN).contains(&callsign.len()) {
        return Err(Error::InvalidArgument("m17 callsign length"));
    }
    let mut text = Callsign::new();
    for c in callsign.bytes().map(|c| c.to_ascii_uppercase()) {
        if !(c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(Error::InvalidArgument("m17 callsign character"));
        }
        text.push(char::from(c))
            .map_err(|()| Error::InvalidArgument("m17 callsign length"))?;
    }
    Ok(text)
}
