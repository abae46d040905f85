//! SSE2, SSE4.1 and AVX2 kernels
//!
//! Each entry point handles whole vectors only and returns how many input
//! elements it consumed; the caller finishes the tail with the scalar
//! reference. `Simd` calls an entry point only after
//! `Capability::is_supported` has confirmed the feature on this CPU.

#![allow(unsafe_code)]
#![allow(clippy::cast_ptr_alignment)]

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use super::{Capability, HALF_SCALE, SOFT_ERASURE};

// ============================================================================
// Symbol slicer
// ============================================================================

pub(super) fn slice_sse2(symbols: &[f32], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Sse2.is_supported());
    // SAFETY: only reached when SSE2 is present
    unsafe { slice_sse2_impl(symbols, out) }
}

pub(super) fn slice_sse41(symbols: &[f32], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Sse41.is_supported());
    // SAFETY: only reached when SSE4.1 is present
    unsafe { slice_sse41_impl(symbols, out) }
}

pub(super) fn slice_avx2(symbols: &[f32], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Avx2.is_supported());
    // SAFETY: only reached when AVX2 is present
    unsafe { slice_avx2_impl(symbols, out) }
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn select_sse2(mask: __m128i, yes: __m128i, no: __m128i) -> __m128i {
    _mm_or_si128(_mm_and_si128(mask, yes), _mm_andnot_si128(mask, no))
}

#[target_feature(enable = "sse2")]
unsafe fn slice_sse2_impl(symbols: &[f32], out: &mut [u16]) -> usize {
    let h = _mm_set1_ps(HALF_SCALE);
    let neg_h = _mm_set1_ps(-HALF_SCALE);
    let erasure = _mm_set1_ps(f32::from(SOFT_ERASURE));
    let ones = _mm_set1_epi32(0xFFFF);
    let zero = _mm_setzero_si128();
    let bias = _mm_set1_epi32(0x8000);
    let unbias = _mm_set1_epi16(i16::MIN);

    let mut done = 0;
    for (chunk, dst) in symbols.chunks_exact(4).zip(out.chunks_exact_mut(8)) {
        let x = _mm_loadu_ps(chunk.as_ptr());
        let xh = _mm_mul_ps(x, h);
        let ge3 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(3.0)));
        let ge1 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(1.0)));
        let gem1 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(-1.0)));
        let gem3 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(-3.0)));

        let rising = _mm_cvttps_epi32(_mm_add_ps(neg_h, xh));
        let falling = _mm_cvttps_epi32(_mm_sub_ps(neg_h, xh));
        let middle = _mm_cvttps_epi32(_mm_sub_ps(erasure, xh));

        let bit0 = select_sse2(
            ge3,
            ones,
            select_sse2(ge1, rising, select_sse2(gem1, zero, select_sse2(gem3, falling, ones))),
        );
        let bit1 = select_sse2(ge1, zero, select_sse2(gem1, middle, ones));

        // no unsigned 32 to 16 pack before SSE4.1: shift into i16 range and back
        let lo = _mm_sub_epi32(_mm_unpacklo_epi32(bit1, bit0), bias);
        let hi = _mm_sub_epi32(_mm_unpackhi_epi32(bit1, bit0), bias);
        let packed = _mm_xor_si128(_mm_packs_epi32(lo, hi), unbias);
        _mm_storeu_si128(dst.as_mut_ptr().cast(), packed);
        done += 4;
    }
    done
}

#[target_feature(enable = "sse4.1")]
unsafe fn slice_sse41_impl(symbols: &[f32], out: &mut [u16]) -> usize {
    let h = _mm_set1_ps(HALF_SCALE);
    let neg_h = _mm_set1_ps(-HALF_SCALE);
    let erasure = _mm_set1_ps(f32::from(SOFT_ERASURE));
    let ones = _mm_set1_epi32(0xFFFF);
    let zero = _mm_setzero_si128();

    let mut done = 0;
    for (chunk, dst) in symbols.chunks_exact(4).zip(out.chunks_exact_mut(8)) {
        let x = _mm_loadu_ps(chunk.as_ptr());
        let xh = _mm_mul_ps(x, h);
        let ge3 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(3.0)));
        let ge1 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(1.0)));
        let gem1 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(-1.0)));
        let gem3 = _mm_castps_si128(_mm_cmpge_ps(x, _mm_set1_ps(-3.0)));

        let rising = _mm_cvttps_epi32(_mm_add_ps(neg_h, xh));
        let falling = _mm_cvttps_epi32(_mm_sub_ps(neg_h, xh));
        let middle = _mm_cvttps_epi32(_mm_sub_ps(erasure, xh));

        // blendv takes the second operand where the mask is set
        let outer = _mm_blendv_epi8(ones, falling, gem3);
        let bit0 = _mm_blendv_epi8(
            _mm_blendv_epi8(_mm_blendv_epi8(outer, zero, gem1), rising, ge1),
            ones,
            ge3,
        );
        let bit1 = _mm_blendv_epi8(_mm_blendv_epi8(ones, middle, gem1), zero, ge1);

        let packed = _mm_packus_epi32(
            _mm_unpacklo_epi32(bit1, bit0),
            _mm_unpackhi_epi32(bit1, bit0),
        );
        _mm_storeu_si128(dst.as_mut_ptr().cast(), packed);
        done += 4;
    }
    done
}

#[target_feature(enable = "avx2")]
unsafe fn slice_avx2_impl(symbols: &[f32], out: &mut [u16]) -> usize {
    let h = _mm256_set1_ps(HALF_SCALE);
    let neg_h = _mm256_set1_ps(-HALF_SCALE);
    let erasure = _mm256_set1_ps(f32::from(SOFT_ERASURE));
    let ones = _mm256_set1_epi32(0xFFFF);
    let zero = _mm256_setzero_si256();

    let mut done = 0;
    for (chunk, dst) in symbols.chunks_exact(8).zip(out.chunks_exact_mut(16)) {
        let x = _mm256_loadu_ps(chunk.as_ptr());
        let xh = _mm256_mul_ps(x, h);
        let ge3 = _mm256_castps_si256(_mm256_cmp_ps::<_CMP_GE_OQ>(x, _mm256_set1_ps(3.0)));
        let ge1 = _mm256_castps_si256(_mm256_cmp_ps::<_CMP_GE_OQ>(x, _mm256_set1_ps(1.0)));
        let gem1 = _mm256_castps_si256(_mm256_cmp_ps::<_CMP_GE_OQ>(x, _mm256_set1_ps(-1.0)));
        let gem3 = _mm256_castps_si256(_mm256_cmp_ps::<_CMP_GE_OQ>(x, _mm256_set1_ps(-3.0)));

        let rising = _mm256_cvttps_epi32(_mm256_add_ps(neg_h, xh));
        let falling = _mm256_cvttps_epi32(_mm256_sub_ps(neg_h, xh));
        let middle = _mm256_cvttps_epi32(_mm256_sub_ps(erasure, xh));

        let outer = _mm256_blendv_epi8(ones, falling, gem3);
        let bit0 = _mm256_blendv_epi8(
            _mm256_blendv_epi8(_mm256_blendv_epi8(outer, zero, gem1), rising, ge1),
            ones,
            ge3,
        );
        let bit1 = _mm256_blendv_epi8(_mm256_blendv_epi8(ones, middle, gem1), zero, ge1);

        // unpack and pack both work per 128-bit half, which keeps symbol order
        let packed = _mm256_packus_epi32(
            _mm256_unpacklo_epi32(bit1, bit0),
            _mm256_unpackhi_epi32(bit1, bit0),
        );
        _mm256_storeu_si256(dst.as_mut_ptr().cast(), packed);
        done += 8;
    }
    done
}

// ============================================================================
// Soft arithmetic
// ============================================================================

pub(super) fn soft_xor_sse2(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Sse2.is_supported());
    // SAFETY: only reached when SSE2 is present
    unsafe { soft_xor_sse2_impl(a, b, out) }
}

pub(super) fn soft_xor_avx2(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Avx2.is_supported());
    // SAFETY: only reached when AVX2 is present
    unsafe { soft_xor_avx2_impl(a, b, out) }
}

pub(super) fn soft_add_sse2(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Sse2.is_supported());
    // SAFETY: only reached when SSE2 is present
    unsafe { soft_add_sse2_impl(a, b, out) }
}

pub(super) fn soft_add_avx2(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    debug_assert!(Capability::Avx2.is_supported());
    // SAFETY: only reached when AVX2 is present
    unsafe { soft_add_avx2_impl(a, b, out) }
}

#[target_feature(enable = "sse2")]
unsafe fn soft_xor_sse2_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let all = _mm_set1_epi16(-1);
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(8).zip(b.chunks_exact(8)).zip(out.chunks_exact_mut(8)) {
        let p = _mm_loadu_si128(x.as_ptr().cast());
        let q = _mm_loadu_si128(y.as_ptr().cast());
        // mulhi_epu16 is (a * b) >> 16
        let pq = _mm_mulhi_epu16(p, _mm_xor_si128(q, all));
        let qp = _mm_mulhi_epu16(q, _mm_xor_si128(p, all));
        _mm_storeu_si128(z.as_mut_ptr().cast(), _mm_adds_epu16(pq, qp));
        done += 8;
    }
    done
}

#[target_feature(enable = "avx2")]
unsafe fn soft_xor_avx2_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let all = _mm256_set1_epi16(-1);
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(16).zip(b.chunks_exact(16)).zip(out.chunks_exact_mut(16)) {
        let p = _mm256_loadu_si256(x.as_ptr().cast());
        let q = _mm256_loadu_si256(y.as_ptr().cast());
        let pq = _mm256_mulhi_epu16(p, _mm256_xor_si256(q, all));
        let qp = _mm256_mulhi_epu16(q, _mm256_xor_si256(p, all));
        _mm256_storeu_si256(z.as_mut_ptr().cast(), _mm256_adds_epu16(pq, qp));
        done += 16;
    }
    done
}

#[target_feature(enable = "sse2")]
unsafe fn soft_add_sse2_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(8).zip(b.chunks_exact(8)).zip(out.chunks_exact_mut(8)) {
        let p = _mm_loadu_si128(x.as_ptr().cast());
        let q = _mm_loadu_si128(y.as_ptr().cast());
        _mm_storeu_si128(z.as_mut_ptr().cast(), _mm_adds_epu16(p, q));
        done += 8;
    }
    done
}

#[target_feature(enable = "avx2")]
unsafe fn soft_add_avx2_impl(a: &[u16], b: &[u16], out: &mut [u16]) -> usize {
    let mut done = 0;
    for ((x, y), z) in a.chunks_exact(16).zip(b.chunks_exact(16)).zip(out.chunks_exact_mut(16)) {
        let p = _mm256_loadu_si256(x.as_ptr().cast());
        let q = _mm256_loadu_si256(y.as_ptr().cast());
        _mm256_storeu_si256(z.as_mut_ptr().cast(), _mm256_adds_epu16(p, q));
        done += 16;
    }
    done
}

// ============================================================================
// Squared distance
// ============================================================================

pub(super) fn squares_sse2(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    debug_assert!(Capability::Sse2.is_supported());
    // SAFETY: only reached when SSE2 is present
    unsafe { squares_sse2_impl(sum, a, b) }
}

pub(super) fn squares_avx2(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    debug_assert!(Capability::Avx2.is_supported());
    // SAFETY: only reached when AVX2 is present
    unsafe { squares_avx2_impl(sum, a, b) }
}

// Squares are formed in vector lanes, then added one lane at a time so the
// total matches the scalar accumulation order.

#[target_feature(enable = "sse2")]
unsafe fn squares_sse2_impl(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    let mut done = 0;
    let mut lanes = [0.0f32; 4];
    for (x, y) in a.chunks_exact(4).zip(b.chunks_exact(4)) {
        let reference = [f32::from(y[0]), f32::from(y[1]), f32::from(y[2]), f32::from(y[3])];
        let d = _mm_sub_ps(_mm_loadu_ps(x.as_ptr()), _mm_loadu_ps(reference.as_ptr()));
        _mm_storeu_ps(lanes.as_mut_ptr(), _mm_mul_ps(d, d));
        for square in lanes {
            *sum += square;
        }
        done += 4;
    }
    done
}

#[target_feature(enable = "avx2")]
unsafe fn squares_avx2_impl(sum: &mut f32, a: &[f32], b: &[i8]) -> usize {
    let mut done = 0;
    let mut lanes = [0.0f32; 8];
    for (x, y) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        // sign-extend eight pattern bytes to i32 lanes, then convert exactly
        let bytes = _mm_loadl_epi64(y.as_ptr().cast());
        let reference = _mm256_cvtepi32_ps(_mm256_cvtepi8_epi32(bytes));
        let d = _mm256_sub_ps(_mm256_loadu_ps(x.as_ptr()), reference);
        _mm256_storeu_ps(lanes.as_mut_ptr(), _mm256_mul_ps(d, d));
        for square in lanes {
            *sum += square;
        }
        done += 8;
    }
    done
}
