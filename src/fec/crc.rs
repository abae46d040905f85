//! CRC-16 variants
//!
//! Both checks are table driven; the tables are generated at compile time.

/// M17 generator polynomial (MSB-first)
pub const M17_POLY: u16 = 0x5935;

/// AX.25 generator polynomial, reflected form of 0x1021
pub const AX25_POLY_REFLECTED: u16 = 0x8408;

/// Register value left after running [`fcs_register`] over a frame and its FCS
pub const FCS_RESIDUE: u16 = 0xF0B8;

const fn m17_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ M17_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

const fn ax25_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ AX25_POLY_REFLECTED
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static M17_TABLE: [u16; 256] = m17_table();
static AX25_TABLE: [u16; 256] = ax25_table();

/// M17 CRC-16: init 0xFFFF, no reflection, no final XOR
///
/// Appending the result big-endian makes the CRC of the whole buffer zero.
#[must_use]
pub fn m17_crc(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF_u16, |crc, &b| {
        (crc << 8) ^ M17_TABLE[usize::from((crc >> 8) as u8 ^ b)]
    })
}

/// Raw AX.25 CRC register (init 0xFFFF, no final inversion)
#[must_use]
pub fn fcs_register(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF_u16, |crc, &b| {
        (crc >> 8) ^ AX25_TABLE[usize::from(crc as u8 ^ b)]
    })
}

/// AX.25 frame check sequence, transmitted little-endian
#[must_use]
pub fn ax25_fcs(bytes: &[u8]) -> u16 {
    !fcs_register(bytes)
}
