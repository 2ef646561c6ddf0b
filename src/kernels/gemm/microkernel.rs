//! SIMD matmul microkernels
//!
//! Macro-generated AVX2 and AVX-512 variants of the same 6xNR algorithm:
//! 6 C-accumulator rows kept live in registers across the full K loop, one
//! B vector load shared across 6 A broadcasts per k. The double-width (2x)
//! variants carry 12 independent FMA chains so the FMA pipeline stays full.
//!
//! `first_k = true` starts the accumulators from zero instead of loading C,
//! which removes the separate zero pass over the output.
//!
//! The scalar edge kernel handles partial tiles and non-SIMD targets with the
//! same per-tile accumulation order, so a given block shape always produces
//! the same bits.

use super::MR;

/// Generate a 6xLANES f32 microkernel (single column chunk)
///
/// `b_stride` is the packed B panel's row stride, which may exceed LANES when
/// the panel was packed at the double width.
#[cfg(target_arch = "x86_64")]
macro_rules! define_microkernel_f32 {
    (
        $name:ident,
        $lanes:expr,
        $feat1:literal,
        $feat2:literal,
        $loadu:ident,
        $storeu:ident,
        $set1:ident,
        $fmadd:ident,
        $setzero:ident,
        $reg_ty:ty
    ) => {
        /// Matmul microkernel: C[0:6, 0:LANES] += A[0:6, 0:K] @ B[0:K, 0:LANES]
        #[target_feature(enable = $feat1)]
        #[target_feature(enable = $feat2)]
        pub unsafe fn $name(
            a: *const f32,
            b: *const f32,
            c: *mut f32,
            k: usize,
            ldc: usize,
            b_stride: usize,
            first_k: bool,
        ) {
            let mut c0: $reg_ty;
            let mut c1: $reg_ty;
            let mut c2: $reg_ty;
            let mut c3: $reg_ty;
            let mut c4: $reg_ty;
            let mut c5: $reg_ty;

            if first_k {
                c0 = $setzero();
                c1 = $setzero();
                c2 = $setzero();
                c3 = $setzero();
                c4 = $setzero();
                c5 = $setzero();
            } else {
                c0 = $loadu(c);
                c1 = $loadu(c.add(ldc));
                c2 = $loadu(c.add(ldc * 2));
                c3 = $loadu(c.add(ldc * 3));
                c4 = $loadu(c.add(ldc * 4));
                c5 = $loadu(c.add(ldc * 5));
            }

            for kk in 0..k {
                let b_row = $loadu(b.add(kk * b_stride));
                let a_base = a.add(kk * 6);

                let a0 = $set1(*a_base);
                c0 = $fmadd(a0, b_row, c0);

                let a1 = $set1(*a_base.add(1));
                c1 = $fmadd(a1, b_row, c1);

                let a2 = $set1(*a_base.add(2));
                c2 = $fmadd(a2, b_row, c2);

                let a3 = $set1(*a_base.add(3));
                c3 = $fmadd(a3, b_row, c3);

                let a4 = $set1(*a_base.add(4));
                c4 = $fmadd(a4, b_row, c4);

                let a5 = $set1(*a_base.add(5));
                c5 = $fmadd(a5, b_row, c5);
            }

            $storeu(c, c0);
            $storeu(c.add(ldc), c1);
            $storeu(c.add(ldc * 2), c2);
            $storeu(c.add(ldc * 3), c3);
            $storeu(c.add(ldc * 4), c4);
            $storeu(c.add(ldc * 5), c5);
        }
    };
}

/// Generate a 6x(2*LANES) double-width f32 microkernel (12 FMA chains)
#[cfg(target_arch = "x86_64")]
macro_rules! define_microkernel_2x_f32 {
    (
        $name:ident,
        $lanes:expr,
        $feat1:literal,
        $feat2:literal,
        $loadu:ident,
        $storeu:ident,
        $set1:ident,
        $fmadd:ident,
        $setzero:ident,
        $reg_ty:ty
    ) => {
        /// Matmul microkernel: C[0:6, 0:2*LANES] += A[0:6, 0:K] @ B[0:K, 0:2*LANES]
        #[target_feature(enable = $feat1)]
        #[target_feature(enable = $feat2)]
        pub unsafe fn $name(
            a: *const f32,
            b: *const f32,
            c: *mut f32,
            k: usize,
            ldc: usize,
            b_stride: usize,
            first_k: bool,
        ) {
            let (mut c00, mut c01): ($reg_ty, $reg_ty);
            let (mut c10, mut c11): ($reg_ty, $reg_ty);
            let (mut c20, mut c21): ($reg_ty, $reg_ty);
            let (mut c30, mut c31): ($reg_ty, $reg_ty);
            let (mut c40, mut c41): ($reg_ty, $reg_ty);
            let (mut c50, mut c51): ($reg_ty, $reg_ty);

            if first_k {
                c00 = $setzero();
                c01 = $setzero();
                c10 = $setzero();
                c11 = $setzero();
                c20 = $setzero();
                c21 = $setzero();
                c30 = $setzero();
                c31 = $setzero();
                c40 = $setzero();
                c41 = $setzero();
                c50 = $setzero();
                c51 = $setzero();
            } else {
                c00 = $loadu(c);
                c01 = $loadu(c.add($lanes));
                c10 = $loadu(c.add(ldc));
                c11 = $loadu(c.add(ldc + $lanes));
                c20 = $loadu(c.add(ldc * 2));
                c21 = $loadu(c.add(ldc * 2 + $lanes));
                c30 = $loadu(c.add(ldc * 3));
                c31 = $loadu(c.add(ldc * 3 + $lanes));
                c40 = $loadu(c.add(ldc * 4));
                c41 = $loadu(c.add(ldc * 4 + $lanes));
                c50 = $loadu(c.add(ldc * 5));
                c51 = $loadu(c.add(ldc * 5 + $lanes));
            }

            for kk in 0..k {
                // 2 B loads shared across 6 A broadcasts
                let b0 = $loadu(b.add(kk * b_stride));
                let b1 = $loadu(b.add(kk * b_stride + $lanes));
                let a_base = a.add(kk * 6);

                let a0 = $set1(*a_base);
                c00 = $fmadd(a0, b0, c00);
                c01 = $fmadd(a0, b1, c01);

                let a1 = $set1(*a_base.add(1));
                c10 = $fmadd(a1, b0, c10);
                c11 = $fmadd(a1, b1, c11);

                let a2 = $set1(*a_base.add(2));
                c20 = $fmadd(a2, b0, c20);
                c21 = $fmadd(a2, b1, c21);

                let a3 = $set1(*a_base.add(3));
                c30 = $fmadd(a3, b0, c30);
                c31 = $fmadd(a3, b1, c31);

                let a4 = $set1(*a_base.add(4));
                c40 = $fmadd(a4, b0, c40);
                c41 = $fmadd(a4, b1, c41);

                let a5 = $set1(*a_base.add(5));
                c50 = $fmadd(a5, b0, c50);
                c51 = $fmadd(a5, b1, c51);
            }

            $storeu(c, c00);
            $storeu(c.add($lanes), c01);
            $storeu(c.add(ldc), c10);
            $storeu(c.add(ldc + $lanes), c11);
            $storeu(c.add(ldc * 2), c20);
            $storeu(c.add(ldc * 2 + $lanes), c21);
            $storeu(c.add(ldc * 3), c30);
            $storeu(c.add(ldc * 3 + $lanes), c31);
            $storeu(c.add(ldc * 4), c40);
            $storeu(c.add(ldc * 4 + $lanes), c41);
            $storeu(c.add(ldc * 5), c50);
            $storeu(c.add(ldc * 5 + $lanes), c51);
        }
    };
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use core::arch::x86_64::*;

    define_microkernel_f32!(
        microkernel_6x8_f32,
        8,
        "avx2",
        "fma",
        _mm256_loadu_ps,
        _mm256_storeu_ps,
        _mm256_set1_ps,
        _mm256_fmadd_ps,
        _mm256_setzero_ps,
        __m256
    );

    define_microkernel_2x_f32!(
        microkernel_6x16_f32,
        8,
        "avx2",
        "fma",
        _mm256_loadu_ps,
        _mm256_storeu_ps,
        _mm256_set1_ps,
        _mm256_fmadd_ps,
        _mm256_setzero_ps,
        __m256
    );

    define_microkernel_f32!(
        microkernel_6x16_avx512_f32,
        16,
        "avx512f",
        "fma",
        _mm512_loadu_ps,
        _mm512_storeu_ps,
        _mm512_set1_ps,
        _mm512_fmadd_ps,
        _mm512_setzero_ps,
        __m512
    );

    define_microkernel_2x_f32!(
        microkernel_6x32_avx512_f32,
        16,
        "avx512f",
        "fma",
        _mm512_loadu_ps,
        _mm512_storeu_ps,
        _mm512_set1_ps,
        _mm512_fmadd_ps,
        _mm512_setzero_ps,
        __m512
    );
}

#[cfg(target_arch = "x86_64")]
pub use x86::{
    microkernel_6x16_avx512_f32, microkernel_6x16_f32, microkernel_6x32_avx512_f32,
    microkernel_6x8_f32,
};

/// Scalar microkernel for edge tiles (partial MRxNR blocks)
///
/// `a` is MR-interleaved packed, `b` packed at row stride `b_stride`. When
/// `first_k` is true the C tile is zeroed before accumulation. Accumulation
/// order matches the SIMD kernels per (row, k) step, keeping partial tiles
/// deterministic for a fixed block shape.
///
/// # Safety
/// `a`/`b` must be valid packed panels for `k` steps; `c` must be valid for
/// an `mr x nr` tile at row stride `ldc`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn microkernel_edge_f32(
    a: *const f32,
    b: *const f32,
    c: *mut f32,
    mr: usize,
    nr: usize,
    k: usize,
    ldc: usize,
    b_stride: usize,
    first_k: bool,
) {
    if first_k {
        for i in 0..mr {
            for j in 0..nr {
                *c.add(i * ldc + j) = 0.0;
            }
        }
    }

    for kk in 0..k {
        for i in 0..mr {
            let a_val = *a.add(kk * MR + i);
            for j in 0..nr {
                *c.add(i * ldc + j) += a_val * *b.add(kk * b_stride + j);
            }
        }
    }
}
