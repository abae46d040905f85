//! Symbol-level helpers for the M17 demodulator
//!
//! Symbol mapping, the type-4 randomizer, the soft slicer and syncword
//! matching by Euclidean distance.

use crate::error::{Error, Result};
use crate::m17::{SYNC_BERT, SYNC_EOT, SYNC_LSF, SYNC_PACKET, SYNC_STREAM};
use crate::simd::{scalar, Simd};

/// Symbols per second
pub const SYMBOL_RATE: u32 = 4800;

/// Symbols in one syncword
pub const SYNC_SYMBOLS: usize = 8;

/// Payload symbols per frame
pub const PAYLOAD_SYMBOLS: usize = 184;

/// Type-4 bits covered by the randomizer
pub const TYPE4_BITS: usize = 368;

/// Dibit to symbol (index is the dibit value)
pub const SYMBOL_MAP: [i8; 4] = [1, 3, -1, -3];

/// Symbol levels in ascending order
pub const SYMBOL_LIST: [i8; 4] = [-3, -1, 1, 3];

/// Randomizer sequence
pub const RAND_SEQ: [u8; TYPE4_BITS / 8] = [
    0xD6, 0xB5, 0xE2, 0x30, 0x82, 0xFF, 0x84, 0x62, 0xBA, 0x4E, 0x96, 0x90, 0xD8, 0x98, 0xDD, 0x5D,
    0x0C, 0xC8, 0x52, 0x43, 0x91, 0x1D, 0xF8, 0x6E, 0x68, 0x2F, 0x35, 0xDA, 0x14, 0xEA, 0xCD, 0x76,
    0x19, 0x8D, 0xD5, 0x80, 0xD1, 0x33, 0x87, 0x13, 0x57, 0x18, 0x2D, 0x29, 0x78, 0xC3,
];

/// Symbols of a 16-bit syncword, dibits taken MSB first
#[must_use]
pub const fn sync_symbols(word: u16) -> [i8; SYNC_SYMBOLS] {
    let mut out = [0i8; SYNC_SYMBOLS];
    let mut i = 0;
    while i < SYNC_SYMBOLS {
        let dibit = (word >> (14 - 2 * i)) & 0b11;
        out[i] = SYMBOL_MAP[dibit as usize];
        i += 1;
    }
    out
}

/// Syncword kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Syncword {
    /// Link Setup Frame
    Lsf,
    /// Stream frame
    Stream,
    /// Packet frame
    Packet,
    /// BERT frame
    Bert,
    /// End of transmission marker
    Eot,
}

impl Syncword {
    /// All syncwords in matching order
    pub const ALL: [Self; 5] = [Self::Lsf, Self::Stream, Self::Packet, Self::Bert, Self::Eot];

    /// 16-bit word
    #[must_use]
    pub const fn word(self) -> u16 {
        match self {
            Self::Lsf => SYNC_LSF,
            Self::Stream => SYNC_STREAM,
            Self::Packet => SYNC_PACKET,
            Self::Bert => SYNC_BERT,
            Self::Eot => SYNC_EOT,
        }
    }

    /// Symbol pattern
    #[must_use]
    pub const fn symbols(self) -> [i8; SYNC_SYMBOLS] {
        sync_symbols(self.word())
    }
}

/// Nearest syncword to `symbols` and its distance
///
/// # Errors
///
/// `InvalidArgument` unless exactly eight symbols are given.
pub fn match_syncword(simd: &Simd, symbols: &[f32]) -> Result<(Syncword, f32)> {
    if symbols.len() != SYNC_SYMBOLS {
        return Err(Error::InvalidArgument("syncword needs 8 symbols"));
    }
    let mut best = (Syncword::Lsf, f32::MAX);
    for sync in Syncword::ALL {
        let distance = simd.euclidean_norm(symbols, &sync.symbols())?;
        if distance < best.1 {
            best = (sync, distance);
        }
    }
    Ok(best)
}

/// True if type-4 bit `index` is flipped by the randomizer
#[must_use]
pub const fn rand_bit(index: usize) -> bool {
    (RAND_SEQ[index / 8] >> (7 - index % 8)) & 1 != 0
}

/// Randomize (or derandomize) packed type-4 bytes
///
/// # Errors
///
/// `InvalidArgument` beyond 46 bytes.
pub fn randomize_bytes(data: &mut [u8]) -> Result<()> {
    if data.len() > RAND_SEQ.len() {
        return Err(Error::InvalidArgument("randomizer covers 46 bytes"));
    }
    for (byte, mask) in data.iter_mut().zip(RAND_SEQ) {
        *byte ^= mask;
    }
    Ok(())
}

/// Randomize unpacked bits (one bit per byte, 0 or 1)
///
/// # Errors
///
/// `InvalidArgument` beyond 368 bits.
pub fn randomize_bits(bits: &mut [u8]) -> Result<()> {
    if bits.len() > TYPE4_BITS {
        return Err(Error::InvalidArgument("randomizer covers 368 bits"));
    }
    for (i, bit) in bits.iter_mut().enumerate() {
        if rand_bit(i) {
            *bit ^= 1;
        }
    }
    Ok(())
}

/// Randomize soft bits by soft NOT where the sequence is 1
///
/// # Errors
///
/// `InvalidArgument` beyond 368 soft bits.
pub fn randomize_soft_bits(bits: &mut [u16]) -> Result<()> {
    if bits.len() > TYPE4_BITS {
        return Err(Error::InvalidArgument("randomizer covers 368 bits"));
    }
    for (i, bit) in bits.iter_mut().enumerate() {
        if rand_bit(i) {
            *bit = scalar::soft_not(*bit);
        }
    }
    Ok(())
}

/// Slice soft symbols into soft dibits
///
/// # Errors
///
/// `InvalidArgument` if `out` holds fewer than two entries per symbol.
pub fn slice_symbols(simd: &Simd, symbols: &[f32], out: &mut [u16]) -> Result<()> {
    simd.slice_symbols(symbols, out)
}
