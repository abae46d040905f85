//! GF(2^8) arithmetic
//!
//! Field generated by x^8 + x^4 + x^3 + x^2 + 1 (0x11D) with primitive
//! element alpha = 2. The exponent table is doubled so that a product of two
//! logarithms can index it without a modulo.

/// Field polynomial
pub const PRIMITIVE_POLY: u16 = 0x11D;

/// Multiplicative group order
pub const ORDER: usize = 255;

const fn build_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < ORDER {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
        i += 1;
    }
    while i < 512 {
        exp[i] = exp[i - ORDER];
        i += 1;
    }
    (exp, log)
}

const TABLES: ([u8; 512], [u8; 256]) = build_tables();

/// alpha^i for i in 0..512
pub static EXP: [u8; 512] = TABLES.0;

/// log_alpha(x) for x in 1..256; entry 0 is unused
pub static LOG: [u8; 256] = TABLES.1;

/// Product of two field elements
#[inline]
#[must_use]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        0
    } else {
        EXP[usize::from(LOG[usize::from(a)]) + usize::from(LOG[usize::from(b)])]
    }
}

/// Quotient `a / b`; `b` must be non-zero, a zero divisor yields zero
#[inline]
#[must_use]
pub fn div(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        0
    } else {
        EXP[usize::from(LOG[usize::from(a)]) + ORDER - usize::from(LOG[usize::from(b)])]
    }
}

/// alpha raised to `power` (any non-negative exponent)
#[inline]
#[must_use]
pub fn pow_alpha(power: usize) -> u8 {
    EXP[power % ORDER]
}

/// Multiplicative inverse; zero maps to zero
#[inline]
#[must_use]
pub fn inv(a: u8) -> u8 {
    div(1, a)
}

/// Evaluate a polynomial stored highest degree first at `x`
#[must_use]
pub fn eval_high_first(poly: &[u8], x: u8) -> u8 {
    poly.iter().fold(0, |acc, &c| mul(acc, x) ^ c)
}

/// Evaluate a polynomial stored lowest degree first at `x`
#[must_use]
pub fn eval_low_first(poly: &[u8], x: u8) -> u8 {
    poly.iter().rev().fold(0, |acc, &c| mul(acc, x) ^ c)
}
