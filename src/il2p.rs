//! IL2P codec
//!
//! ```text
//! 55 | F1 5E 48 | header (18) | header parity (2) | payload | payload parity
//! ```
//!
//! The header is version, type, sequence, six-byte source and destination,
//! a big-endian payload length and, at byte 17, an XOR checksum of the
//! seventeen bytes before it.
//! The payload is whitened by a byte-wise LFSR, cut into at most five
//! near-equal blocks, and each block gets sixteen parity symbols computed over
//! the whitened bytes.

use log::debug;

use crate::ax25::frame::{Frame, FCS_LEN, MAX_FRAME_LEN};
use crate::error::{Error, Result};
use crate::fec::rs::{ReedSolomon, BLOCK_LEN};

/// Preamble byte
pub const PREAMBLE: u8 = 0x55;

/// Sync word
pub const SYNC: [u8; 3] = [0xF1, 0x5E, 0x48];

/// Header length including checksum
pub const HEADER_LEN: usize = 18;

/// Header parity symbols
pub const HEADER_ROOTS: usize = 2;

/// Payload parity symbols per block
pub const PAYLOAD_ROOTS: usize = 16;

/// Largest payload
pub const MAX_PAYLOAD_LEN: usize = 1023;

/// Nominal payload bytes per block
pub const BLOCK_DATA_LEN: usize = 205;

/// Most payload blocks
pub const MAX_BLOCKS: usize = 5;

/// Header format version
pub const VERSION: u8 = 1;

/// Window in which the classifier and decoder look for the sync word
pub const SYNC_SEARCH_LEN: usize = 256;

const PREFIX_LEN: usize = 1 + SYNC.len();
const CALLSIGN_FIELD: usize = 6;

/// Scrambler seed
const SCRAMBLER_SEED: u8 = 0xFF;
/// Scrambler feedback taps
const SCRAMBLER_POLY: u8 = 0x8E;

/// Decoded IL2P header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Format version
    pub version: u8,
    /// Frame type (the AX.25 control byte when carrying AX.25)
    pub frame_type: u8,
    /// Sequence number
    pub sequence: u8,
    /// Source callsign, ASCII, space padded
    pub src: [u8; CALLSIGN_FIELD],
    /// Destination callsign, ASCII, space padded
    pub dst: [u8; CALLSIGN_FIELD],
    /// Payload length
    pub length: u16,
}

impl Header {
    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.version;
        out[1] = self.frame_type;
        out[2] = self.sequence;
        out[3..9].copy_from_slice(&self.src);
        out[9..15].copy_from_slice(&self.dst);
        out[15..17].copy_from_slice(&self.length.to_be_bytes());
        out[HEADER_LEN - 1] = checksum(&out[..HEADER_LEN - 1]);
        out
    }

    fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        if checksum(&bytes[..HEADER_LEN - 1]) != bytes[HEADER_LEN - 1] {
            return Err(Error::IntegrityFailure("il2p header checksum"));
        }
        let mut src = [0u8; CALLSIGN_FIELD];
        let mut dst = [0u8; CALLSIGN_FIELD];
        src.copy_from_slice(&bytes[3..9]);
        dst.copy_from_slice(&bytes[9..15]);
        Ok(Self {
            version: bytes[0],
            frame_type: bytes[1],
            sequence: bytes[2],
            src,
            dst,
            length: u16::from_be_bytes([bytes[15], bytes[16]]),
        })
    }
}

/// XOR of all bytes
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &b| acc ^ b)
}

/// Whiten or de-whiten in place (the operation is its own inverse)
pub fn scramble(data: &mut [u8]) {
    let mut state = SCRAMBLER_SEED;
    for byte in data {
        let feedback = state;
        state >>= 1;
        if feedback & 1 != 0 {
            state ^= SCRAMBLER_POLY;
        }
        *byte ^= state;
    }
}

/// Number of payload blocks for `len` bytes (none for an empty payload)
#[must_use]
pub const fn block_count(len: usize) -> usize {
    len.div_ceil(BLOCK_DATA_LEN)
}

/// Length of block `index` when `len` bytes are split into `blocks`
const fn block_len(len: usize, blocks: usize, index: usize) -> usize {
    let base = len / blocks;
    if index < len % blocks {
        base + 1
    } else {
        base
    }
}

/// Total encoded size for a payload of `len` bytes
#[must_use]
pub const fn encoded_len(len: usize) -> usize {
    PREFIX_LEN + HEADER_LEN + HEADER_ROOTS + len + block_count(len) * PAYLOAD_ROOTS
}

/// Position of the sync word within the search window
#[must_use]
pub fn find_sync(bytes: &[u8]) -> Option<usize> {
    let window = &bytes[..bytes.len().min(SYNC_SEARCH_LEN + SYNC.len())];
    window
        .windows(SYNC.len())
        .position(|w| w == SYNC)
        .filter(|&pos| pos < SYNC_SEARCH_LEN)
}

/// Result of a successful decode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Header after correction
    pub header: Header,
    /// Payload bytes written to the output
    pub len: usize,
    /// Symbols corrected in header and payload
    pub corrections: usize,
}

/// Encode a header and payload into `out`
///
/// The header's `length` is taken from `payload`.
///
/// # Errors
///
/// `InvalidArgument` for a payload over 1023 bytes or a short output buffer.
pub fn encode(header: &Header, payload: &[u8], out: &mut [u8]) -> Result<usize> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::InvalidArgument("il2p payload length"));
    }
    let total = encoded_len(payload.len());
    let out = out
        .get_mut(..total)
        .ok_or(Error::InvalidArgument("il2p output too small"))?;

    out[0] = PREAMBLE;
    out[1..PREFIX_LEN].copy_from_slice(&SYNC);

    let length =
        u16::try_from(payload.len()).map_err(|_| Error::InvalidArgument("il2p payload length"))?;
    let header = Header { length, ..*header };
    let header_start = PREFIX_LEN;
    let header_end = header_start + HEADER_LEN;
    out[header_start..header_end].copy_from_slice(&header.to_bytes());
    let (head, rest) = out.split_at_mut(header_end);
    let header_rs = ReedSolomon::new(HEADER_ROOTS)?;
    header_rs.encode(&head[header_start..], &mut rest[..HEADER_ROOTS])?;

    let payload_start = header_end + HEADER_ROOTS;
    let payload_end = payload_start + payload.len();
    out[payload_start..payload_end].copy_from_slice(payload);
    scramble(&mut out[payload_start..payload_end]);

    let blocks = block_count(payload.len());
    if blocks > 0 {
        let payload_rs = ReedSolomon::new(PAYLOAD_ROOTS)?;
        let (data, parity) = out[payload_start..].split_at_mut(payload.len());
        let mut offset = 0;
        for (index, parity) in parity.chunks_exact_mut(PAYLOAD_ROOTS).enumerate() {
            let len = block_len(payload.len(), blocks, index);
            payload_rs.encode(&data[offset..offset + len], parity)?;
            offset += len;
        }
    }
    Ok(total)
}

/// Decode an IL2P frame, writing the de-whitened payload to `out`
///
/// Leading bytes before the sync word (within the search window) are skipped.
///
/// # Errors
///
/// - `Malformed` for a missing sync word, a bad length or a frame whose size
///   disagrees with its header.
/// - `Uncorrectable` when header or payload blocks are beyond repair.
/// - `IntegrityFailure` for a header checksum mismatch after correction.
/// - `InvalidArgument` if `out` is too small.
pub fn decode(bytes: &[u8], out: &mut [u8]) -> Result<Decoded> {
    let sync = find_sync(bytes).ok_or(Error::Malformed("il2p sync"))?;
    let header_start = sync + SYNC.len();
    let parity_end = header_start + HEADER_LEN + HEADER_ROOTS;
    let mut header_block = [0u8; HEADER_LEN + HEADER_ROOTS];
    header_block.copy_from_slice(
        bytes
            .get(header_start..parity_end)
            .ok_or(Error::Malformed("il2p header truncated"))?,
    );
    let header_rs = ReedSolomon::new(HEADER_ROOTS)?;
    let mut corrections = header_rs.decode(&mut header_block)?;
    let mut header_bytes = [0u8; HEADER_LEN];
    header_bytes.copy_from_slice(&header_block[..HEADER_LEN]);
    let header = Header::from_bytes(&header_bytes)?;

    let len = usize::from(header.length);
    if len > MAX_PAYLOAD_LEN {
        return Err(Error::Malformed("il2p length field"));
    }
    let blocks = block_count(len);
    let body = &bytes[parity_end..];
    if body.len() != len + blocks * PAYLOAD_ROOTS {
        return Err(Error::Malformed("il2p length mismatch"));
    }
    let payload_out = out
        .get_mut(..len)
        .ok_or(Error::InvalidArgument("il2p output too small"))?;

    if blocks > 0 {
        let payload_rs = ReedSolomon::new(PAYLOAD_ROOTS)?;
        let (data, parity) = body.split_at(len);
        let mut scratch = [0u8; BLOCK_LEN];
        let mut offset = 0;
        for (index, parity) in parity.chunks_exact(PAYLOAD_ROOTS).enumerate() {
            let block = block_len(len, blocks, index);
            let n = block + PAYLOAD_ROOTS;
            scratch[..block].copy_from_slice(&data[offset..offset + block]);
            scratch[block..n].copy_from_slice(parity);
            corrections += payload_rs.decode(&mut scratch[..n])?;
            payload_out[offset..offset + block].copy_from_slice(&scratch[..block]);
            offset += block;
        }
        scramble(payload_out);
    }
    if corrections > 0 {
        debug!("il2p: corrected {corrections} symbols");
    }
    Ok(Decoded {
        header,
        len,
        corrections,
    })
}

fn callsign_field(callsign: &str) -> [u8; CALLSIGN_FIELD] {
    let mut field = [b' '; CALLSIGN_FIELD];
    for (slot, c) in field.iter_mut().zip(callsign.bytes()) {
        *slot = c;
    }
    field
}

/// Carry a complete AX.25 frame (body and FCS) over IL2P
///
/// # Errors
///
/// As [`encode`].
pub fn encode_ax25(frame: &Frame, sequence: u8, out: &mut [u8]) -> Result<usize> {
    let mut body = [0u8; MAX_FRAME_LEN + FCS_LEN];
    let len = frame.encode_with_fcs(&mut body)?;
    let header = Header {
        version: VERSION,
        frame_type: frame.control.to_byte(),
        sequence,
        src: callsign_field(frame.src.callsign()),
        dst: callsign_field(frame.dst.callsign()),
        length: 0,
    };
    encode(&header, &body[..len], out)
}

/// Decode an IL2P frame carrying AX.25
///
/// Returns the frame and the number of corrected symbols.
///
/// # Errors
///
/// As [`decode`] and [`Frame::decode_with_fcs`].
pub fn decode_ax25(bytes: &[u8]) -> Result<(Frame, usize)> {
    let mut payload = [0u8; MAX_PAYLOAD_LEN];
    let decoded = decode(bytes, &mut payload)?;
    let frame = Frame::decode_with_fcs(&payload[..decoded.len])?;
    Ok((frame, decoded.corrections))
}
