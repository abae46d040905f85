//! FX.25 codec
//!
//! ```text
//! 55 x8 | 5D 5F | type len_hi len_lo | data | parity | crc_lo crc_hi
//! ```
//!
//! The data is cut into `ceil(len / k)` Reed-Solomon blocks of at most `k`
//! bytes; each block contributes `nroots` parity bytes in order. The CRC is
//! the AX.25 FCS over the (corrected) data.

use log::debug;

use crate::config::WIRE_MTU;
use crate::error::{Error, Result};
use crate::fec::crc::ax25_fcs;
use crate::fec::rs::{ReedSolomon, RsCode, BLOCK_LEN};

/// Preamble byte
pub const PREAMBLE: u8 = 0x55;

/// Preamble length
pub const PREAMBLE_LEN: usize = 8;

/// Sync bytes after the preamble
pub const SYNC: [u8; 2] = [0x5D, 0x5F];

/// Header length (type + 16-bit length)
pub const HEADER_LEN: usize = 3;

/// Largest data region
pub const MAX_DATA_LEN: usize = 1024;

/// CRC length
pub const CRC_LEN: usize = 2;

/// Bytes before the data region
pub const OVERHEAD_PREFIX: usize = PREAMBLE_LEN + SYNC.len() + HEADER_LEN;

/// Result of a successful decode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Code found in the header
    pub code: RsCode,
    /// Data bytes written to the output
    pub len: usize,
    /// Symbols corrected across all blocks
    pub corrections: usize,
}

const fn block_count(len: usize, code: RsCode) -> usize {
    len.div_ceil(code.data_len())
}

/// Total encoded size for `len` data bytes
#[must_use]
pub const fn encoded_len(len: usize, code: RsCode) -> usize {
    OVERHEAD_PREFIX + len + block_count(len, code) * code.nroots() + CRC_LEN
}

/// True if `bytes` starts with the FX.25 preamble and sync
#[must_use]
pub fn is_fx25(bytes: &[u8]) -> bool {
    bytes.len() >= PREAMBLE_LEN + SYNC.len()
        && bytes[..PREAMBLE_LEN].iter().all(|&b| b == PREAMBLE)
        && bytes[PREAMBLE_LEN..PREAMBLE_LEN + SYNC.len()] == SYNC
}

/// Encode `data` with `code` into `out`
///
/// # Errors
///
/// `InvalidArgument` for empty or oversize data, a frame larger than the wire
/// MTU, or an output buffer that is too small.
pub fn encode(data: &[u8], code: RsCode, out: &mut [u8]) -> Result<usize> {
    if data.is_empty() || data.len() > MAX_DATA_LEN {
        return Err(Error::InvalidArgument("fx25 data length"));
    }
    let total = encoded_len(data.len(), code);
    if total > WIRE_MTU {
        return Err(Error::InvalidArgument("fx25 frame exceeds mtu"));
    }
    let out = out
        .get_mut(..total)
        .ok_or(Error::InvalidArgument("fx25 output too small"))?;

    out[..PREAMBLE_LEN].fill(PREAMBLE);
    out[PREAMBLE_LEN..PREAMBLE_LEN + SYNC.len()].copy_from_slice(&SYNC);
    let len = u16::try_from(data.len()).map_err(|_| Error::InvalidArgument("fx25 data length"))?;
    let [len_hi, len_lo] = len.to_be_bytes();
    out[PREAMBLE_LEN + SYNC.len()..OVERHEAD_PREFIX].copy_from_slice(&[code.tag(), len_hi, len_lo]);

    let data_end = OVERHEAD_PREFIX + data.len();
    out[OVERHEAD_PREFIX..data_end].copy_from_slice(data);

    let rs = ReedSolomon::for_code(code);
    let parity_region = &mut out[data_end..total - CRC_LEN];
    for (block, parity) in data
        .chunks(code.data_len())
        .zip(parity_region.chunks_exact_mut(code.nroots()))
    {
        rs.encode(block, parity)?;
    }

    out[total - CRC_LEN..].copy_from_slice(&ax25_fcs(data).to_le_bytes());
    Ok(total)
}

/// Decode an FX.25 frame, writing the corrected data to `out`
///
/// # Errors
///
/// - `Malformed` for a bad preamble, sync, type or length, or a frame whose
///   size disagrees with its header.
/// - `Uncorrectable` if any block is beyond repair.
/// - `IntegrityFailure` if the CRC fails after correction.
/// - `InvalidArgument` if `out` is too small.
pub fn decode(bytes: &[u8], out: &mut [u8]) -> Result<Decoded> {
    if !is_fx25(bytes) {
        return Err(Error::Malformed("fx25 sync"));
    }
    let header = bytes
        .get(PREAMBLE_LEN + SYNC.len()..OVERHEAD_PREFIX)
        .ok_or(Error::Malformed("fx25 header truncated"))?;
    let code = RsCode::from_tag(header[0]).ok_or(Error::Malformed("fx25 rs type"))?;
    let len = usize::from(u16::from_be_bytes([header[1], header[2]]));
    if len == 0 || len > MAX_DATA_LEN {
        return Err(Error::Malformed("fx25 length field"));
    }
    if bytes.len() != encoded_len(len, code) {
        return Err(Error::Malformed("fx25 length mismatch"));
    }
    let data_out = out
        .get_mut(..len)
        .ok_or(Error::InvalidArgument("fx25 output too small"))?;

    let data_end = OVERHEAD_PREFIX + len;
    data_out.copy_from_slice(&bytes[OVERHEAD_PREFIX..data_end]);
    let parity_region = &bytes[data_end..bytes.len() - CRC_LEN];

    let rs = ReedSolomon::for_code(code);
    let nroots = code.nroots();
    let mut corrections = 0;
    let mut scratch = [0u8; BLOCK_LEN];
    for (block, parity) in data_out
        .chunks_mut(code.data_len())
        .zip(parity_region.chunks_exact(nroots))
    {
        let n = block.len() + nroots;
        scratch[..block.len()].copy_from_slice(block);
        scratch[block.len()..n].copy_from_slice(parity);
        corrections += rs.decode(&mut scratch[..n])?;
        block.copy_from_slice(&scratch[..block.len()]);
    }

    let crc = u16::from_le_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);
    if ax25_fcs(data_out) != crc {
        return Err(Error::IntegrityFailure("fx25 crc"));
    }
    if corrections > 0 {
        debug!("fx25: corrected {corrections} symbols");
    }
    Ok(Decoded {
        code,
        len,
        corrections,
    })
}
