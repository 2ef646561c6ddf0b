//! Cache-blocked GEMM
//!
//! BLIS-style three-level blocking over thread-local packing buffers, with
//! runtime dispatch to AVX2/AVX-512 microkernels and a portable scalar path
//! for everything else. Transposed operands are absorbed during packing (or
//! strided reads on the scalar path), never inside the inner loop.
//!
//! ```text
//! for jc in (0..N).step_by(nc):           # N blocking
//!   for pc in (0..K).step_by(kc):         # K blocking
//!     pack B[pc.., jc..] -> B~
//!     for ic in (0..M).step_by(mc):       # M blocking
//!       pack A[ic.., pc..] -> A~
//!       for jr, ir:                       # microkernel tiles
//!         microkernel(A~[ir], B~[jr], C[ic+ir, jc+jr])
//! ```
//!
//! The `(mc, nc, kc)` triple comes from three M regimes, with `nc` rounded
//! down to a power-of-two multiple of the SIMD lane width so packed B blocks
//! stay tile-aligned.

mod microkernel;
mod packing;

use std::cell::RefCell;

use crate::kernels::simd::detect_simd;
#[cfg(target_arch = "x86_64")]
use crate::kernels::simd::SimdLevel;
use microkernel::microkernel_edge_f32;
#[cfg(target_arch = "x86_64")]
use microkernel::{
    microkernel_6x16_avx512_f32, microkernel_6x16_f32, microkernel_6x32_avx512_f32,
    microkernel_6x8_f32,
};
#[cfg(target_arch = "x86_64")]
use packing::{pack_a_f32, pack_b_f32};
#[cfg(target_arch = "x86_64")]
use tracing::trace;

/// Microkernel row dimension
pub const MR: usize = 6;

/// Below this M*N*K the packing overhead dominates; use the scalar path
const SMALL_GEMM_THRESHOLD: usize = 32 * 32 * 32;

/// Pick the `(mc, nc, kc)` block triple from the M regime
///
/// `nc` is rounded down to the largest power-of-two multiple of the lane
/// width that fits the pre-tuned base.
fn block_sizes(m: usize, lanes: usize) -> (usize, usize, usize) {
    let (mc, nc_base, kc) = if m <= 576 {
        (132, 512, 512)
    } else if m <= 1152 {
        (192, 512, 384)
    } else {
        (264, 512, 256)
    };
    let mut nc = lanes;
    while nc * 2 <= nc_base {
        nc *= 2;
    }
    (mc, nc, kc)
}

thread_local! {
    static PACK_F32: RefCell<(Vec<f32>, Vec<f32>)> = const { RefCell::new((Vec::new(), Vec::new())) };
}

/// Borrow the thread-local packing buffers at the requested capacities
fn with_pack_f32<R>(a_need: usize, b_need: usize, f: impl FnOnce(&mut [f32], &mut [f32]) -> R) -> R {
    PACK_F32.with(|cell| {
        let mut bufs = cell.borrow_mut();
        if bufs.0.len() < a_need {
            bufs.0.resize(a_need, 0.0);
        }
        if bufs.1.len() < b_need {
            bufs.1.resize(b_need, 0.0);
        }
        let (pack_a, pack_b) = &mut *bufs;
        f(&mut pack_a[..a_need], &mut pack_b[..b_need])
    })
}

/// General matrix multiply: `C = A @ B` (or `C += ...` when `accumulate`)
///
/// `lda`/`ldb` are the storage row strides of A and B as laid out in memory;
/// a transposed flag means the logical operand is the stored matrix
/// transposed. Deterministic for a fixed detected SIMD level and shape.
///
/// # Safety
/// - `a` must be valid for the stored A panel (`m x k` or `k x m` per
///   `trans_a`), `b` likewise, `c` for `m` rows of `n` at stride `ldc`
/// - `c` must not alias `a` or `b`
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemm_f32(
    a: *const f32,
    b: *const f32,
    c: *mut f32,
    m: usize,
    n: usize,
    k: usize,
    lda: usize,
    ldb: usize,
    ldc: usize,
    trans_a: bool,
    trans_b: bool,
    accumulate: bool,
) {
    if m == 0 || n == 0 {
        return;
    }
    if k == 0 {
        if !accumulate {
            for i in 0..m {
                std::slice::from_raw_parts_mut(c.add(i * ldc), n).fill(0.0);
            }
        }
        return;
    }

    // Logical element (i, j) of A is a[i*rs_a + j*cs_a]; transposition is a
    // stride swap that packing absorbs.
    let (rs_a, cs_a) = if trans_a { (1, lda) } else { (lda, 1) };
    let (rs_b, cs_b) = if trans_b { (1, ldb) } else { (ldb, 1) };

    let level = detect_simd();

    #[cfg(target_arch = "x86_64")]
    if m * n * k >= SMALL_GEMM_THRESHOLD {
        match level {
            SimdLevel::Avx512 => {
                return gemm_tiled::<32>(
                    a, b, c, m, n, k, rs_a, cs_a, rs_b, cs_b, ldc, level, accumulate,
                );
            }
            SimdLevel::Avx2Fma => {
                return gemm_tiled::<16>(
                    a, b, c, m, n, k, rs_a, cs_a, rs_b, cs_b, ldc, level, accumulate,
                );
            }
            _ => {}
        }
    }

    let _ = level;
    gemm_scalar_f32(a, b, c, m, n, k, rs_a, cs_a, rs_b, cs_b, ldc, accumulate);
}

/// Tiled loop; `NR` is the double-width tile (2x the lane count)
#[allow(clippy::too_many_arguments)]
#[cfg(target_arch = "x86_64")]
unsafe fn gemm_tiled<const NR: usize>(
    a: *const f32,
    b: *const f32,
    c: *mut f32,
    m: usize,
    n: usize,
    k: usize,
    rs_a: usize,
    cs_a: usize,
    rs_b: usize,
    cs_b: usize,
    ldc: usize,
    level: SimdLevel,
    accumulate: bool,
) {
    let lanes = NR / 2;
    let (mc_max, nc_max, kc_max) = block_sizes(m, lanes);
    trace!(m, n, k, mc_max, nc_max, kc_max, %level, "gemm block regime");

    let a_need = mc_max.div_ceil(MR) * MR * kc_max;
    let b_need = kc_max * nc_max.div_ceil(NR) * NR;

    with_pack_f32(a_need, b_need, |packed_a, packed_b| {
        for jc in (0..n).step_by(nc_max) {
            let nc = (n - jc).min(nc_max);

            for pc in (0..k).step_by(kc_max) {
                let kc = (k - pc).min(kc_max);
                // The first K-block overwrites C unless the caller asked to
                // accumulate into it; later K-blocks always accumulate.
                let first_k = pc == 0 && !accumulate;

                pack_b_f32::<NR>(
                    b.add(pc * rs_b + jc * cs_b),
                    packed_b.as_mut_ptr(),
                    nc,
                    kc,
                    rs_b,
                    cs_b,
                );

                for ic in (0..m).step_by(mc_max) {
                    let mc = (m - ic).min(mc_max);

                    pack_a_f32(
                        a.add(ic * rs_a + pc * cs_a),
                        packed_a.as_mut_ptr(),
                        mc,
                        kc,
                        rs_a,
                        cs_a,
                    );

                    microkernel_loop::<NR>(
                        packed_a.as_ptr(),
                        packed_b.as_ptr(),
                        c,
                        ic,
                        jc,
                        mc,
                        nc,
                        kc,
                        ldc,
                        level,
                        first_k,
                    );
                }
            }
        }
    });
}

/// Microkernel tile loop over one packed (mc, nc, kc) block
#[allow(clippy::too_many_arguments)]
#[cfg(target_arch = "x86_64")]
#[inline]
unsafe fn microkernel_loop<const NR: usize>(
    packed_a: *const f32,
    packed_b: *const f32,
    c: *mut f32,
    ic: usize,
    jc: usize,
    mc: usize,
    nc: usize,
    kc: usize,
    ldc: usize,
    level: SimdLevel,
    first_k: bool,
) {
    let lanes = NR / 2;

    for jr in (0..nc).step_by(NR) {
        let nr_actual = (nc - jr).min(NR);

        for ir in (0..mc).step_by(MR) {
            let mr_actual = (mc - ir).min(MR);
            // A blocks are MR-interleaved, B blocks NR-wide: block offsets
            // reduce to ir*kc and jr*kc.
            let ap = packed_a.add(ir * kc);
            let bp = packed_b.add(jr * kc);
            let cp = c.add((ic + ir) * ldc + jc + jr);

            if mr_actual == MR && nr_actual == NR {
                match level {
                    SimdLevel::Avx512 => {
                        microkernel_6x32_avx512_f32(ap, bp, cp, kc, ldc, NR, first_k)
                    }
                    _ => microkernel_6x16_f32(ap, bp, cp, kc, ldc, NR, first_k),
                }
            } else if mr_actual == MR && nr_actual == lanes {
                match level {
                    SimdLevel::Avx512 => {
                        microkernel_6x16_avx512_f32(ap, bp, cp, kc, ldc, NR, first_k)
                    }
                    _ => microkernel_6x8_f32(ap, bp, cp, kc, ldc, NR, first_k),
                }
            } else {
                microkernel_edge_f32(ap, bp, cp, mr_actual, nr_actual, kc, ldc, NR, first_k);
            }
        }
    }
}

/// Portable fallback with the ikj loop order
///
/// Reads both operands through explicit strides, so transposes need no
/// packing here. The unit-stride B case keeps the inner loop
/// auto-vectorizable.
#[allow(clippy::too_many_arguments)]
pub(crate) unsafe fn gemm_scalar_f32(
    a: *const f32,
    b: *const f32,
    c: *mut f32,
    m: usize,
    n: usize,
    k: usize,
    rs_a: usize,
    cs_a: usize,
    rs_b: usize,
    cs_b: usize,
    ldc: usize,
    accumulate: bool,
) {
    if !accumulate {
        for i in 0..m {
            std::slice::from_raw_parts_mut(c.add(i * ldc), n).fill(0.0);
        }
    }

    if cs_b == 1 {
        for i in 0..m {
            let c_row = std::slice::from_raw_parts_mut(c.add(i * ldc), n);
            for kk in 0..k {
                let a_val = *a.add(i * rs_a + kk * cs_a);
                let b_row = std::slice::from_raw_parts(b.add(kk * rs_b), n);
                for j in 0..n {
                    c_row[j] += a_val * b_row[j];
                }
            }
        }
    } else {
        for i in 0..m {
            let c_row = std::slice::from_raw_parts_mut(c.add(i * ldc), n);
            for kk in 0..k {
                let a_val = *a.add(i * rs_a + kk * cs_a);
                for j in 0..n {
                    c_row[j] += a_val * *b.add(kk * rs_b + j * cs_b);
                }
            }
        }
    }
}
