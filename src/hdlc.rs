//! HDLC bit stuffing and flag framing
//!
//! Bits are processed MSB-first across byte boundaries. The stuffed output is
//! zero-padded to a whole byte; unstuffing drops any trailing partial byte.
//! Flags are added around, never inside, the stuffed data.

use crate::error::{Error, Result};

/// Frame delimiter
pub const FLAG: u8 = 0x7E;

/// Consecutive ones after which a zero is inserted
const MAX_ONES: u8 = 5;

/// Bit writer that packs MSB-first into a caller buffer
struct BitWriter<'a> {
    out: &'a mut [u8],
    bits: usize,
}

impl<'a> BitWriter<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self { out, bits: 0 }
    }

    fn push(&mut self, bit: bool) -> Result<()> {
        let byte = self.bits / 8;
        let slot = self
            .out
            .get_mut(byte)
            .ok_or(Error::InvalidArgument("hdlc output too small"))?;
        if self.bits % 8 == 0 {
            *slot = 0;
        }
        if bit {
            *slot |= 0x80 >> (self.bits % 8);
        }
        self.bits += 1;
        Ok(())
    }

    fn whole_bytes(&self) -> usize {
        self.bits / 8
    }

    fn padded_bytes(&self) -> usize {
        self.bits.div_ceil(8)
    }
}

fn bits_of(data: &[u8]) -> impl Iterator<Item = bool> + '_ {
    data.iter()
        .flat_map(|&byte| (0..8).map(move |i| byte & (0x80 >> i) != 0))
}

/// Worst-case stuffed length for `len` input bytes
#[must_use]
pub const fn max_stuffed_len(len: usize) -> usize {
    let bits = len * 8;
    (bits + bits / MAX_ONES as usize).div_ceil(8)
}

/// Insert a zero after every run of five ones
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// `InvalidArgument` if `out` cannot hold the stuffed stream.
pub fn stuff(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut writer = BitWriter::new(out);
    let mut ones = 0u8;
    for bit in bits_of(data) {
        writer.push(bit)?;
        if bit {
            ones += 1;
            if ones == MAX_ONES {
                writer.push(false)?;
                ones = 0;
            }
        } else {
            ones = 0;
        }
    }
    Ok(writer.padded_bytes())
}

/// Remove the zero that follows every run of five ones
///
/// Returns the number of whole bytes recovered.
///
/// # Errors
///
/// `Malformed` when six ones appear in a row (a flag or abort inside the
/// data), `InvalidArgument` if `out` is too small.
pub fn unstuff(data: &[u8], out: &mut [u8]) -> Result<usize> {
    let mut writer = BitWriter::new(out);
    let mut ones = 0u8;
    for bit in bits_of(data) {
        if ones == MAX_ONES {
            if bit {
                return Err(Error::Malformed("six consecutive ones"));
            }
            ones = 0;
            continue;
        }
        writer.push(bit)?;
        ones = if bit { ones + 1 } else { 0 };
    }
    Ok(writer.whole_bytes())
}

/// Surround `body` with flags without stuffing it
///
/// # Errors
///
/// `InvalidArgument` if `out` is shorter than `body.len() + 2`.
pub fn wrap(body: &[u8], out: &mut [u8]) -> Result<usize> {
    let len = body.len() + 2;
    let dst = out
        .get_mut(..len)
        .ok_or(Error::InvalidArgument("hdlc output too small"))?;
    dst[0] = FLAG;
    dst[1..len - 1].copy_from_slice(body);
    dst[len - 1] = FLAG;
    Ok(len)
}

/// Stuff `body` and surround it with flags
///
/// # Errors
///
/// `InvalidArgument` if `out` is too small.
pub fn frame(body: &[u8], out: &mut [u8]) -> Result<usize> {
    let (first, rest) = out
        .split_first_mut()
        .ok_or(Error::InvalidArgument("hdlc output too small"))?;
    *first = FLAG;
    let stuffed = stuff(body, rest)?;
    let tail = rest
        .get_mut(stuffed)
        .ok_or(Error::InvalidArgument("hdlc output too small"))?;
    *tail = FLAG;
    Ok(stuffed + 2)
}

/// Strip the opening flags and the closing flag, returning the interior
///
/// Any number of opening flags is accepted; exactly one closing flag is
/// removed so that an unstuffed body may itself end in 0x7E.
///
/// # Errors
///
/// `Malformed` if the data is not delimited by flags on both ends.
pub fn unwrap(framed: &[u8]) -> Result<&[u8]> {
    let start = framed
        .iter()
        .position(|&b| b != FLAG)
        .ok_or(Error::Malformed("no hdlc body"))?;
    if start == 0 {
        return Err(Error::Malformed("missing opening flag"));
    }
    match framed.split_last() {
        Some((&FLAG, _)) => Ok(&framed[start..framed.len() - 1]),
        _ => Err(Error::Malformed("missing closing flag")),
    }
}

/// Unwrap flags and unstuff the interior into `out`
///
/// # Errors
///
/// As [`unwrap`] and [`unstuff`].
pub fn deframe(framed: &[u8], out: &mut [u8]) -> Result<usize> {
    unstuff(unwrap(framed)?, out)
}
