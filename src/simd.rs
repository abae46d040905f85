//! Soft-decision kernels with per-ISA dispatch
//!
//! The demodulator's hot loops (symbol slicing, soft XOR, saturating soft
//! add, Euclidean norm) have a scalar reference in [`scalar`] and vector
//! kernels in `core::arch` intrinsics for SSE2, SSE4.1, AVX2 and NEON. A
//! [`Simd`] runs the kernel of the capability it was built for only when the
//! running CPU reports that capability, and the scalar code otherwise. Every
//! kernel produces the same bits as the scalar reference.
//!
//! Soft bits are `u16` confidences: 0 is a certain 0, 0xFFFF a certain 1
//! and 0x7FFF an erasure.

#[cfg(not(feature = "std"))]
use micromath::F32Ext;

use crate::error::{Error, Result};

#[cfg(target_arch = "aarch64")]
mod neon;
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod x86;

/// Confidence of a certain 1
pub const SOFT_ONE: u16 = 0xFFFF;

/// Confidence of an erasure
pub const SOFT_ERASURE: u16 = 0x7FFF;

const HALF_SCALE: f32 = 32_767.5;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
macro_rules! x86_feature {
    ($name:tt) => {{
        #[cfg(feature = "std")]
        let found = std::is_x86_feature_detected!($name);
        #[cfg(not(feature = "std"))]
        let found = cfg!(target_feature = $name);
        found
    }};
}

/// Vector extension available to the kernels
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// No vector unit used
    Scalar,
    /// x86 SSE2
    Sse2,
    /// x86 SSE4.1
    Sse41,
    /// x86 AVX2
    Avx2,
    /// ARM NEON
    Neon,
}

impl Capability {
    /// Best capability of the running CPU
    #[must_use]
    pub fn detect() -> Self {
        [Self::Avx2, Self::Sse41, Self::Sse2, Self::Neon]
            .into_iter()
            .find(|capability| capability.is_supported())
            .unwrap_or(Self::Scalar)
    }

    /// Best capability enabled at compile time
    #[must_use]
    pub const fn compiled() -> Self {
        if cfg!(target_feature = "avx2") {
            Self::Avx2
        } else if cfg!(target_feature = "sse4.1") {
            Self::Sse41
        } else if cfg!(target_feature = "sse2") {
            Self::Sse2
        } else if cfg!(all(target_arch = "aarch64", target_feature = "neon")) {
            Self::Neon
        } else {
            Self::Scalar
        }
    }

    /// Whether the running CPU can execute this capability's kernels
    ///
    /// Without `std` only compile-time target features count.
    #[must_use]
    pub fn is_supported(self) -> bool {
        match self {
            Self::Scalar => true,
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse2 => x86_feature!("sse2"),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Sse41 => x86_feature!("sse4.1"),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Self::Avx2 => x86_feature!("avx2"),
            #[cfg(all(feature = "std", target_arch = "aarch64"))]
            Self::Neon => std::arch::is_aarch64_feature_detected!("neon"),
            #[cfg(all(not(feature = "std"), target_arch = "aarch64"))]
            Self::Neon => cfg!(target_feature = "neon"),
            _ => false,
        }
    }

    /// `f32` lanes per vector register
    #[must_use]
    pub const fn lanes(self) -> usize {
        match self {
            Self::Avx2 => 8,
            Self::Sse2 | Self::Sse41 | Self::Neon => 4,
            Self::Scalar => 1,
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Sse2 => "sse2",
            Self::Sse41 => "sse4.1",
            Self::Avx2 => "avx2",
            Self::Neon => "neon",
        }
    }
}

/// Scalar reference kernels
pub mod scalar {
    use super::{HALF_SCALE, SOFT_ERASURE, SOFT_ONE};

    /// Slice one symbol into soft dibit `[bit1, bit0]`
    ///
    /// Piecewise linear between the symbol levels {-3, -1, +1, +3},
    /// saturating beyond the outer ones.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn slice_symbol(x: f32) -> [u16; 2] {
        let bit0 = if x >= 3.0 {
            SOFT_ONE
        } else if x >= 1.0 {
            (-HALF_SCALE + x * HALF_SCALE) as u16
        } else if x >= -1.0 {
            0
        } else if x >= -3.0 {
            (-HALF_SCALE - x * HALF_SCALE) as u16
        } else {
            SOFT_ONE
        };
        let bit1 = if x >= 1.0 {
            0
        } else if x >= -1.0 {
            (f32::from(SOFT_ERASURE) - x * HALF_SCALE) as u16
        } else {
            SOFT_ONE
        };
        [bit1, bit0]
    }

    /// 16-bit fixed point product
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn mul16(a: u16, b: u16) -> u16 {
        ((a as u32 * b as u32) >> 16) as u16
    }

    /// Saturating soft add
    #[must_use]
    pub const fn soft_add(a: u16, b: u16) -> u16 {
        a.saturating_add(b)
    }

    /// Soft NOT
    #[must_use]
    pub const fn soft_not(a: u16) -> u16 {
        SOFT_ONE - a
    }

    /// Bilinear soft XOR, `a(1-b) + b(1-a)`
    #[must_use]
    pub const fn soft_xor(a: u16, b: u16) -> u16 {
        soft_add(mul16(a, soft_not(b)), mul16(b, soft_not(a)))
    }

    /// Sum of squared differences, accumulated in index order
    #[must_use]
    pub fn squared_distance(a: &[f32], b: &[i8]) -> f32 {
        let mut sum = 0.0f32;
        accumulate_squares(&mut sum, a, b);
        sum
    }

    pub(super) fn accumulate_squares(sum: &mut f32, a: &[f32], b: &[i8]) {
        for (&p, &q) in a.iter().zip(b) {
            let d = p - f32::from(q);
            *sum += d * d;
        }
    }

    pub(super) fn slice_into(symbols: &[f32], out: &mut [u16]) {
        for (&x, pair) in symbols.iter().zip(out.chunks_exact_mut(2)) {
            pair.copy_from_slice(&slice_symbol(x));
        }
    }

    pub(super) fn zip_into(a: &[u16], b: &[u16], out: &mut [u16], op: fn(u16, u16) -> u16) {
        for ((z, &p), &q) in out.iter_mut().zip(a).zip(b) {
            *z = op(p, q);
        }
    }
}

/// Kernel set bound to one capability
#[derive(Clone, Copy, Debug)]
pub struct Simd {
    capability: Capability,
    kernel: Capability,
}

impl Default for Simd {
    fn default() -> Self {
        Self::new()
    }
}

impl Simd {
    /// Kernels for the running CPU
    #[must_use]
    pub fn new() -> Self {
        Self::with_capability(Capability::detect())
    }

    /// Kernels for an explicit capability
    ///
    /// A capability the running CPU lacks runs the scalar kernels.
    #[must_use]
    pub fn with_capability(capability: Capability) -> Self {
        let kernel = if capability.is_supported() {
            capability
        } else {
            Capability::Scalar
        };
        Self { capability, kernel }
    }

    /// Capability requested
    #[must_use]
    pub const fn capability(&self) -> Capability {
        self.capability
    }

    /// Capability whose kernels actually run
    #[must_use]
    pub const fn kernel(&self) -> Capability {
        self.kernel
    }

    /// Slice symbols into soft dibits, `out[2i]` bit 1 and `out[2i + 1]` bit 0
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `out` holds fewer than two entries per symbol.
    pub fn slice_symbols(&self, symbols: &[f32], out: &mut [u16]) -> Result<()> {
        let out = out
            .get_mut(..symbols.len() * 2)
            .ok_or(Error::InvalidArgument("slicer output too small"))?;
        let done = match self.kernel {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Avx2 => x86::slice_avx2(symbols, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Sse41 => x86::slice_sse41(symbols, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Sse2 => x86::slice_sse2(symbols, out),
            #[cfg(target_arch = "aarch64")]
            Capability::Neon => neon::slice(symbols, out),
            _ => 0,
        };
        scalar::slice_into(&symbols[done..], &mut out[2 * done..]);
        Ok(())
    }

    /// Element-wise soft XOR
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the lengths differ.
    pub fn soft_xor(&self, a: &[u16], b: &[u16], out: &mut [u16]) -> Result<()> {
        check_lengths(a, b, out)?;
        let done = match self.kernel {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Avx2 => x86::soft_xor_avx2(a, b, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Sse2 | Capability::Sse41 => x86::soft_xor_sse2(a, b, out),
            #[cfg(target_arch = "aarch64")]
            Capability::Neon => neon::soft_xor(a, b, out),
            _ => 0,
        };
        scalar::zip_into(&a[done..], &b[done..], &mut out[done..], scalar::soft_xor);
        Ok(())
    }

    /// Element-wise saturating soft add
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the lengths differ.
    pub fn soft_add(&self, a: &[u16], b: &[u16], out: &mut [u16]) -> Result<()> {
        check_lengths(a, b, out)?;
        let done = match self.kernel {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Avx2 => x86::soft_add_avx2(a, b, out),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Sse2 | Capability::Sse41 => x86::soft_add_sse2(a, b, out),
            #[cfg(target_arch = "aarch64")]
            Capability::Neon => neon::soft_add(a, b, out),
            _ => 0,
        };
        scalar::zip_into(&a[done..], &b[done..], &mut out[done..], scalar::soft_add);
        Ok(())
    }

    /// Euclidean distance between soft symbols and a reference pattern
    ///
    /// Squares are summed in index order at every capability, so the result
    /// is identical to [`scalar::squared_distance`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the lengths differ.
    pub fn euclidean_norm(&self, a: &[f32], b: &[i8]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(Error::InvalidArgument("norm lengths differ"));
        }
        let mut sum = 0.0f32;
        let done = match self.kernel {
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Avx2 => x86::squares_avx2(&mut sum, a, b),
            #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
            Capability::Sse2 | Capability::Sse41 => x86::squares_sse2(&mut sum, a, b),
            #[cfg(target_arch = "aarch64")]
            Capability::Neon => neon::squares(&mut sum, a, b),
            _ => 0,
        };
        scalar::accumulate_squares(&mut sum, &a[done..], &b[done..]);
        Ok(sum.sqrt())
    }
}

fn check_lengths(a: &[u16], b: &[u16], out: &[u16]) -> Result<()> {
    if a.len() != b.len() || out.len() != a.len() {
        return Err(Error::InvalidArgument("soft vector lengths differ"));
    }
    Ok(())
}
