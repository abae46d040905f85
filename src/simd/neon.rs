//! NEON kernels
//!
//! Same contract as the x86 kernels: whole vectors only, return the number
//! of input elements consumed, reached only after
//! `Capability::Neon.is_supported()`.

#![allow(unsafe_code)]

use core::arch::aarch64::*;

use super::{Capability, HALF_SCALE, SOFT_ERASURE};

pub(super) fn slice(symbols: &[f32], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Neon.is_supported());
    // SAFETY: only reached when NEON is present
    unsafe { slice_impl(symbols, out) }
}

pub(super) fn soft_xor(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Neon.is_supported());
    // SAFETY: only reached when NEON is present
    unsafe { soft_xor_impl(a, b, out) }
}

pub(super) fn soft_add(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Neon.is_supported());
    // SAFETY: only reached when NEON is present
    unsafe { soft_add_impl(a, b, out) }
}

pub(super) fn squares(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    debug_assert!(Capability::Neon.is_supported());
    // SAFETY: only reached when NEON is present
    unsafe { squares_impl(sum, a, b) }
}

#[target_feature(enable = "neon")]
unsafe fn slice_impl(symbols: &[f32], out: &mut [u16]) -> usize {
    let h = vdupq_n_f32(HALF_SCALE);
    let neg_h = vdupq_n_f32(-HALF_SCALE);
    let erasure = vdupq_n_f32(f32::from(SOFT_ERASURE));
    let ones = vdupq_n_u32(0xFFFF);
    let zero = vdupq_n_u32(0);

    let mut done = 0;
    for (chunk, dst) in symbols.chunks_exact(4).zip(out.chunks_exact_mut(8)) {
        let x = vld1q_f32(chunk.as_ptr());
        let xh = vmulq_f32(x, h);
        let ge3 = vcgeq_f32(x, vdupq_n_f32(3.0));
        let ge1 = vcgeq_f32(x, vdupq_n_f32(1.0));
        let gem1 = vcgeq_f32(x, vdupq_n_f32(-1.0));
        let gem3 = vcgeq_f32(x, vdupq_n_f32(-3.0));

        // float to u32 truncates and clamps negatives to zero, like `as u16`
        let rising = vcvtq_u32_f32(vaddq_f32(neg_h, xh));
        let falling = vcvtq_u32_f32(vsubq_f32(neg_h, xh));
        let middle = vcvtq_u32_f32(vsubq_f32(erasure, xh));

        let bit0 = vbslq_u32(
            ge3,
            ones,
            vbslq_u32(ge1, rising, vbslq_u32(gem1, zero, vbslq_u32(gem3, falling, ones))),
        );
        let bit1 = vbslq_u32(ge1, zero, vbslq_u32(gem1, middle, ones));

        // interleaving store writes bit1, bit0 per symbol
        vst2_u16(dst.as_mut_ptr(), uint16x4x2_t(vqmovn_u32(bit1), vqmovn_u32(bit0)));
        done += 4;
    }
    done
}

#[target_feature(enable = "neon")]
unsafe fn soft_xor_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(8).zip(b.chunks_exact(8)).zip(out.chunks_exact_mut(8)) {
        let p = vld1q_u16(x.as_ptr());
        let q = vld1q_u16(y.as_ptr());
        let pq = mul16(p, vmvnq_u16(q));
        let qp = mul16(q, vmvnq_u16(p));
        vst1q_u16(z.as_mut_ptr(), vqaddq_u16(pq, qp));
        done += 8;
    }
    done
}

/// `(a * b) >> 16` per lane through widening multiplies
#[inline]
#[target_feature(enable = "neon")]
unsafe fn mul16(a: uint16x8_t, b: uint16x8_t) -> uint16x8_t {
    let low = vmull_u16(vget_low_u16(a), vget_low_u16(b));
    let high = vmull_high_u16(a, b);
    vcombine_u16(vshrn_n_u32::<16>(low), vshrn_n_u32::<16>(high))
}

#[target_feature(enable = "neon")]
unsafe fn soft_add_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(8).zip(b.chunks_exact(8)).zip(out.chunks_exact_mut(8)) {
        vst1q_u16(z.as_mut_ptr(), vqaddq_u16(vld1q_u16(x.as_ptr()), vld1q_u16(y.as_ptr())));
        done += 8;
    }
    done
}

#[target_feature(enable = "neon")]
unsafe fn squares_impl(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    let mut done = 0;
    let mut lanes = [0.0f32; 4];
    for (x, y) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        let reference = [f32::from(y[0]), f32::from(y[1]), f32::from(y[2]), f32::from(y[3])];
        let d = vsubq_f32(vld1q_f32(x.as_ptr()), vld1q_f32(reference.as_ptr()));
        vst1q_f32(lanes.as_mut_ptr(), vmulq_f32(d, d));
        // lane by lane to keep the scalar summation order
        for square in lanes {
            *sum += square;
        }
        done += 4;
    }
    done
}
