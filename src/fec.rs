//! Forward error correction and integrity checks
//!
//! - M17 CRC-16 and the AX.25 frame check sequence
//! - GF(2^8) arithmetic over the 0x11D field
//! - Reed-Solomon encoder and Berlekamp-Massey decoder shared by FX.25 and IL2P

pub mod crc;
pub mod gf256;
pub mod rs;

pub use crc::{ax25_fcs, fcs_register, m17_crc, FCS_RESIDUE};
pub use rs::{ReedSolomon, RsCode};
