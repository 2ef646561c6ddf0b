//! Panel packing for microkernel consumption
//!
//! Packing reorders A and B panels so the microkernel's innermost loop reads
//! contiguous memory. Both packers take explicit (row, column) strides, which
//! is where transposed operands are absorbed: a transposed panel packs from
//! strided reads into the same contiguous layout, and the inner loop never
//! sees the difference.

use super::MR;

/// Pack an A panel, MR-row interleaved
///
/// Layout: for each MR-row block, for each k, MR consecutive elements
/// `[a[0,k], a[1,k], ..., a[MR-1,k]]`. Partial blocks are zero-padded to MR.
///
/// # Safety
/// `a` must be valid for reading an `mc x kc` panel at strides `(rs, cs)`;
/// `packed` must be valid for writing `mc.div_ceil(MR) * MR * kc` elements.
pub unsafe fn pack_a_f32(
    a: *const f32,
    packed: *mut f32,
    mc: usize,
    kc: usize,
    rs: usize,
    cs: usize,
) {
    let mut p = 0;
    for ir in (0..mc).step_by(MR) {
        let mr_actual = (mc - ir).min(MR);
        if mr_actual == MR {
            for k in 0..kc {
                for i in 0..MR {
                    *packed.add(p) = *a.add((ir + i) * rs + k * cs);
                    p += 1;
                }
            }
        } else {
            for k in 0..kc {
                for i in 0..mr_actual {
                    *packed.add(p) = *a.add((ir + i) * rs + k * cs);
                    p += 1;
                }
                for _ in mr_actual..MR {
                    *packed.add(p) = 0.0;
                    p += 1;
                }
            }
        }
    }
}

/// Pack a B panel in NR-column blocks
///
/// Layout: for each NR-column block, for each k, NR consecutive elements.
/// Bulk-copies full blocks when the panel's columns are unit-stride; the
/// unaligned tail block is zero-padded to NR.
///
/// # Safety
/// `b` must be valid for reading a `kc x nc` panel at strides `(rs, cs)`;
/// `packed` must be valid for writing `nc.div_ceil(NR) * NR * kc` elements.
pub unsafe fn pack_b_f32<const NR: usize>(
    b: *const f32,
    packed: *mut f32,
    nc: usize,
    kc: usize,
    rs: usize,
    cs: usize,
) {
    let mut p = 0;
    for jr in (0..nc).step_by(NR) {
        let nr_actual = (nc - jr).min(NR);
        if nr_actual == NR && cs == 1 {
            for k in 0..kc {
                std::ptr::copy_nonoverlapping(b.add(k * rs + jr), packed.add(p), NR);
                p += NR;
            }
        } else {
            for k in 0..kc {
                for j in 0..nr_actual {
                    *packed.add(p) = *b.add(k * rs + (jr + j) * cs);
                    p += 1;
                }
                for _ in nr_actual..NR {
                    *packed.add(p) = 0.0;
                    p += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_a_interleaves_rows() {
        // 2x3 panel, row-major (rs=3, cs=1), MR block padded with zeros
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut packed = vec![-1.0f32; MR * 3];
        unsafe { pack_a_f32(a.as_ptr(), packed.as_mut_ptr(), 2, 3, 3, 1) };
        // k=0 column: rows 1,4 then zero pad
        assert_eq!(&packed[..MR], &[1.0, 4.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&packed[MR..2 * MR], &[2.0, 5.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pack_a_transposed_reads() {
        // Same logical 2x3 panel stored transposed (3x2, rs=1, cs=2)
        let at = [1.0f32, 4.0, 2.0, 5.0, 3.0, 6.0];
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut p1 = vec![0.0f32; MR * 3];
        let mut p2 = vec![0.0f32; MR * 3];
        unsafe {
            pack_a_f32(a.as_ptr(), p1.as_mut_ptr(), 2, 3, 3, 1);
            pack_a_f32(at.as_ptr(), p2.as_mut_ptr(), 2, 3, 1, 2);
        }
        assert_eq!(p1, p2);
    }

    #[test]
    fn test_pack_b_zero_pads_tail() {
        // kc=2, nc=3 with NR=4: one partial block padded to 4
        let b = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut packed = vec![-1.0f32; 8];
        unsafe { pack_b_f32::<4>(b.as_ptr(), packed.as_mut_ptr(), 3, 2, 3, 1) };
        assert_eq!(packed, [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
    }
}
