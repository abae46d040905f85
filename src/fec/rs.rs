//! Reed-Solomon codec over GF(2^8)
//!
//! Systematic RS(255, 255 - nroots) with first consecutive root 1 and
//! primitive element step 1. Shortened blocks are handled implicitly: the
//! missing leading data symbols are zero and contribute nothing to the
//! parity or the syndromes, so callers pass only the bytes they have.
//!
//! Decoding runs Berlekamp-Massey to find the error locator, a Chien search
//! restricted to the positions actually present, and Forney's formula for the
//! error values. Corrections are applied to a scratch copy and only committed
//! after the syndromes of the corrected block come out clean.

use crate::error::{Error, Result};
use crate::fec::gf256::{self, ORDER};

/// Full block length
pub const BLOCK_LEN: usize = 255;

/// Fewest parity symbols accepted
pub const MIN_ROOTS: usize = 2;

/// Most parity symbols accepted
pub const MAX_ROOTS: usize = 224;

/// First consecutive root of the generator
const FCR: usize = 1;

/// Step between generator roots
const PRIM: usize = 1;

/// The eight FX.25 codes, identified by their data length `k`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RsCode {
    /// RS(255, 239), 16 parity
    K239,
    /// RS(255, 223), 32 parity
    K223,
    /// RS(255, 191), 64 parity
    K191,
    /// RS(255, 159), 96 parity
    K159,
    /// RS(255, 127), 128 parity
    K127,
    /// RS(255, 95), 160 parity
    K95,
    /// RS(255, 63), 192 parity
    K63,
    /// RS(255, 31), 224 parity
    K31,
}

impl RsCode {
    /// Every code, in tag order
    pub const ALL: [Self; 8] = [
        Self::K239,
        Self::K223,
        Self::K191,
        Self::K159,
        Self::K127,
        Self::K95,
        Self::K63,
        Self::K31,
    ];

    /// One-byte type tag carried in the FX.25 header (0x01..=0x08)
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Self::K239 => 0x01,
            Self::K223 => 0x02,
            Self::K191 => 0x03,
            Self::K159 => 0x04,
            Self::K127 => 0x05,
            Self::K95 => 0x06,
            Self::K63 => 0x07,
            Self::K31 => 0x08,
        }
    }

    /// Code for a header tag
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::K239),
            0x02 => Some(Self::K223),
            0x03 => Some(Self::K191),
            0x04 => Some(Self::K159),
            0x05 => Some(Self::K127),
            0x06 => Some(Self::K95),
            0x07 => Some(Self::K63),
            0x08 => Some(Self::K31),
            _ => None,
        }
    }

    /// Data symbols per full block
    #[must_use]
    pub const fn data_len(self) -> usize {
        match self {
            Self::K239 => 239,
            Self::K223 => 223,
            Self::K191 => 191,
            Self::K159 => 159,
            Self::K127 => 127,
            Self::K95 => 95,
            Self::K63 => 63,
            Self::K31 => 31,
        }
    }

    /// Parity symbols per block
    #[must_use]
    pub const fn nroots(self) -> usize {
        BLOCK_LEN - self.data_len()
    }
}

/// Reed-Solomon encoder/decoder for a fixed number of parity symbols
#[derive(Clone)]
pub struct ReedSolomon {
    nroots: usize,
    /// Monic generator polynomial, highest degree first
    generator: [u8; MAX_ROOTS + 1],
}

impl core::fmt::Debug for ReedSolomon {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReedSolomon")
            .field("nroots", &self.nroots)
            .finish_non_exhaustive()
    }
}

impl ReedSolomon {
    /// Build a codec with `nroots` parity symbols (2..=224)
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when `nroots` is outside the supported range.
    pub fn new(nroots: usize) -> Result<Self> {
        if !(MIN_ROOTS..=MAX_ROOTS).contains(&nroots) {
            return Err(Error::InvalidArgument("nroots out of range"));
        }
        Ok(Self::build(nroots))
    }

    /// Codec for one of the FX.25 codes
    #[must_use]
    pub fn for_code(code: RsCode) -> Self {
        Self::build(code.nroots())
    }

    fn build(nroots: usize) -> Self {
        let mut generator = [0u8; MAX_ROOTS + 1];
        generator[0] = 1;
        for i in 0..nroots {
            let root = gf256::pow_alpha(PRIM * (FCR + i));
            for j in (1..=i + 1).rev() {
                generator[j] ^= gf256::mul(root, generator[j - 1]);
            }
        }
        Self { nroots, generator }
    }

    /// Parity symbols per block
    #[must_use]
    pub const fn nroots(&self) -> usize {
        self.nroots
    }

    /// Largest data length for one block
    #[must_use]
    pub const fn max_data_len(&self) -> usize {
        BLOCK_LEN - self.nroots
    }

    /// Symbol errors the decoder is guaranteed to correct
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.nroots / 2
    }

    /// Generator coefficients, highest degree first (length `nroots + 1`)
    #[must_use]
    pub fn generator(&self) -> &[u8] {
        &self.generator[..=self.nroots]
    }

    /// Compute the parity symbols for `data` into `parity`
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `data` is empty or longer than one block allows,
    /// or if `parity` is not exactly `nroots` long.
    pub fn encode(&self, data: &[u8], parity: &mut [u8]) -> Result<()> {
        if data.is_empty() || data.len() > self.max_data_len() {
            return Err(Error::InvalidArgument("rs data length"));
        }
        if parity.len() != self.nroots {
            return Err(Error::InvalidArgument("rs parity length"));
        }
        parity.fill(0);
        let last = self.nroots - 1;
        for &d in data {
            let feedback = d ^ parity[0];
            for j in 0..last {
                parity[j] = parity[j + 1] ^ gf256::mul(feedback, self.generator[j + 1]);
            }
            parity[last] = gf256::mul(feedback, self.generator[self.nroots]);
        }
        Ok(())
    }

    /// Correct a block of `data ++ parity` in place
    ///
    /// Returns the number of symbols corrected.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a block that cannot hold data plus parity,
    /// `Uncorrectable` when more than `nroots / 2` symbols are in error
    /// (as far as the decoder can tell). The block is left untouched on error.
    pub fn decode(&self, block: &mut [u8]) -> Result<usize> {
        let n = block.len();
        let nroots = self.nroots;
        if n <= nroots || n > BLOCK_LEN {
            return Err(Error::InvalidArgument("rs block length"));
        }

        let mut synd = [0u8; MAX_ROOTS];
        if self.syndromes(block, &mut synd[..nroots]) {
            return Ok(0);
        }

        // Berlekamp-Massey
        let mut lambda = [0u8; MAX_ROOTS + 1];
        let mut prev = [0u8; MAX_ROOTS + 1];
        lambda[0] = 1;
        prev[0] = 1;
        let mut degree = 0usize;
        let mut shift = 1usize;
        let mut last_discrepancy = 1u8;
        for r in 0..nroots {
            let mut d = synd[r];
            for i in 1..=degree {
                d ^= gf256::mul(lambda[i], synd[r - i]);
            }
            if d == 0 {
                shift += 1;
                continue;
            }
            let coef = gf256::div(d, last_discrepancy);
            if 2 * degree <= r {
                let saved = lambda;
                for i in shift..=nroots {
                    lambda[i] ^= gf256::mul(coef, prev[i - shift]);
                }
                degree = r + 1 - degree;
                prev = saved;
                last_discrepancy = d;
                shift = 1;
            } else {
                for i in shift..=nroots {
                    lambda[i] ^= gf256::mul(coef, prev[i - shift]);
                }
                shift += 1;
            }
        }
        if degree == 0 || degree > self.capacity() {
            return Err(Error::Uncorrectable);
        }

        // Chien search over the positions that exist in this shortened block
        let mut positions = [0usize; MAX_ROOTS / 2];
        let mut found = 0usize;
        for (index, _) in block.iter().enumerate() {
            let power = n - 1 - index;
            let x_inv = gf256::pow_alpha(ORDER - power);
            if gf256::eval_low_first(&lambda[..=degree], x_inv) == 0 {
                if found == degree {
                    return Err(Error::Uncorrectable);
                }
                positions[found] = index;
                found += 1;
            }
        }
        if found != degree {
            return Err(Error::Uncorrectable);
        }

        // Error evaluator: omega = S * lambda mod x^nroots
        let mut omega = [0u8; MAX_ROOTS];
        for (i, slot) in omega[..nroots].iter_mut().enumerate() {
            let mut acc = 0u8;
            for j in 0..=i.min(degree) {
                acc ^= gf256::mul(synd[i - j], lambda[j]);
            }
            *slot = acc;
        }

        // Formal derivative of lambda: only odd-power terms survive
        let mut derivative = [0u8; MAX_ROOTS];
        for k in (0..degree).step_by(2) {
            derivative[k] = lambda[k + 1];
        }

        let mut scratch = [0u8; BLOCK_LEN];
        scratch[..n].copy_from_slice(block);
        for &index in &positions[..found] {
            let power = n - 1 - index;
            let x_inv = gf256::pow_alpha(ORDER - power);
            let numerator = gf256::eval_low_first(&omega[..nroots], x_inv);
            let denominator = gf256::eval_low_first(&derivative[..degree], x_inv);
            if denominator == 0 {
                return Err(Error::Uncorrectable);
            }
            // X^(1 - fcr) factor
            let scale = gf256::pow_alpha(power * (ORDER + 1 - FCR));
            scratch[index] ^= gf256::mul(gf256::div(numerator, denominator), scale);
        }

        if !self.syndromes(&scratch[..n], &mut synd[..nroots]) {
            return Err(Error::Uncorrectable);
        }
        block.copy_from_slice(&scratch[..n]);
        Ok(found)
    }

    /// Fill `out` with the syndromes of `block`; true when all are zero
    fn syndromes(&self, block: &[u8], out: &mut [u8]) -> bool {
        let mut clean = true;
        for (j, s) in out.iter_mut().enumerate().take(self.nroots) {
            *s = gf256::eval_high_first(block, gf256::pow_alpha(PRIM * (FCR + j)));
            clean &= *s == 0;
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codeword(rs: &ReedSolomon, data: &[u8]) -> Vec<u8> {
        let mut parity = vec![0u8; rs.nroots()];
        rs.encode(data, &mut parity).unwrap();
        let mut block = data.to_vec();
        block.extend_from_slice(&parity);
        block
    }

    #[test]
    fn generator_is_monic_with_expected_degree() {
        let rs = ReedSolomon::new(16).unwrap();
        assert_eq!(rs.generator().len(), 17);
        assert_eq!(rs.generator()[0], 1);
    }

    #[test]
    fn generator_roots_are_consecutive_powers() {
        let rs = ReedSolomon::new(8).unwrap();
        for i in 0..8 {
            let root = gf256::pow_alpha(1 + i);
            assert_eq!(gf256::eval_high_first(rs.generator(), root), 0);
        }
    }

    #[test]
    fn clean_block_needs_no_correction() {
        let rs = ReedSolomon::new(16).unwrap();
        let mut block = codeword(&rs, b"clean data block");
        assert_eq!(rs.decode(&mut block).unwrap(), 0);
    }

    #[test]
    fn corrects_up_to_capacity() {
        for nroots in [2usize, 16, 32, 64] {
            let rs = ReedSolomon::new(nroots).unwrap();
            let data: Vec<u8> = (0..100u32).map(|i| (i * 7 + 3) as u8).collect();
            let original = codeword(&rs, &data);
            let mut block = original.clone();
            for e in 0..rs.capacity() {
                block[e * 5] ^= 0xA5;
            }
            assert_eq!(rs.decode(&mut block).unwrap(), rs.capacity());
            assert_eq!(block, original);
        }
    }

    #[test]
    fn corrects_errors_in_parity() {
        let rs = ReedSolomon::new(16).unwrap();
        let original = codeword(&rs, b"parity damage");
        let mut block = original.clone();
        let len = block.len();
        block[len - 1] ^= 0xFF;
        block[len - 3] ^= 0x01;
        assert_eq!(rs.decode(&mut block).unwrap(), 2);
        assert_eq!(block, original);
    }

    #[test]
    fn beyond_capacity_never_returns_original() {
        let rs = ReedSolomon::new(16).unwrap();
        let original = codeword(&rs, &[0x42; 200]);
        let mut block = original.clone();
        for e in 0..9 {
            block[e * 3] ^= 0x5A;
        }
        match rs.decode(&mut block) {
            Err(err) => assert_eq!(err, Error::Uncorrectable),
            Ok(_) => assert_ne!(block, original),
        }
    }

    #[test]
    fn rejects_bad_nroots() {
        assert!(ReedSolomon::new(1).is_err());
        assert!(ReedSolomon::new(225).is_err());
    }

    #[test]
    fn code_tags_round_trip() {
        for code in RsCode::ALL {
            assert_eq!(RsCode::from_tag(code.tag()), Some(code));
        }
        assert_eq!(RsCode::from_tag(0), None);
        assert_eq!(RsCode::K239.nroots(), 16);
        assert_eq!(RsCode::K31.nroots(), 224);
    }
}
