//! im2col / vol2col patch gathering
//!
//! Builds a `(channels x kernel positions) x (output positions)` column block
//! so the convolution reduces to GEMM. Padding cells are written as explicit
//! zeros; the inner copies are specialized for stride 1 (bulk copy of the
//! valid run) and stride 2 (4-wide unrolled gather) with a generic strided
//! fallback.

/// Gather a 2D im2col block for output positions `[n0, n0 + nb)`
///
/// `src` is one (batch, group) input slab `[c_in_pg, ih, iw]`; `col` receives
/// `c_in_pg * kh * kw` rows of `nb` columns, row-major.
///
/// # Safety
/// `src` must be valid for the slab, `col` for `c_in_pg * kh * kw * nb`
/// writes; they must not alias.
#[allow(clippy::too_many_arguments)]
pub unsafe fn im2col_f32(
    src: *const f32,
    col: *mut f32,
    c_in_pg: usize,
    ih: usize,
    iw: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    dh: usize,
    dw: usize,
    ow: usize,
    n0: usize,
    nb: usize,
) {
    let mut row = 0usize;
    for c in 0..c_in_pg {
        let plane = src.add(c * ih * iw);
        for ky in 0..kh {
            for kx in 0..kw {
                let dst = col.add(row * nb);
                gather_row(
                    plane, dst, ih, iw, ky, kx, sh, sw, ph, pw, dh, dw, ow, n0, nb,
                );
                row += 1;
            }
        }
    }
}

/// Fill one column row for a fixed (channel, ky, kx) tap
#[allow(clippy::too_many_arguments)]
unsafe fn gather_row(
    plane: *const f32,
    dst: *mut f32,
    ih: usize,
    iw: usize,
    ky: usize,
    kx: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    dh: usize,
    dw: usize,
    ow: usize,
    n0: usize,
    nb: usize,
) {
    let x_off = kx as isize * dw as isize - pw as isize;
    let mut n = n0;
    let mut written = 0usize;
    while written < nb {
        let oy = n / ow;
        let ox0 = n % ow;
        let run = (ow - ox0).min(nb - written);
        let d = dst.add(written);

        let iy = oy as isize * sh as isize + ky as isize * dh as isize - ph as isize;
        if iy < 0 || iy >= ih as isize {
            std::slice::from_raw_parts_mut(d, run).fill(0.0);
        } else {
            let src_row = plane.add(iy as usize * iw);
            copy_tap_run(src_row, d, iw, ox0, run, sw, x_off);
        }

        n += run;
        written += run;
    }
}

/// Copy `run` output columns `[ox0, ox0 + run)` of one tap row
///
/// `ix = ox * sw + x_off`; out-of-range columns read as zero.
#[inline]
unsafe fn copy_tap_run(
    src_row: *const f32,
    dst: *mut f32,
    iw: usize,
    ox0: usize,
    run: usize,
    sw: usize,
    x_off: isize,
) {
    // Valid ox range: 0 <= ox*sw + x_off < iw
    let lo = if x_off < 0 {
        ((-x_off) as usize).div_ceil(sw)
    } else {
        0
    };
    let hi = {
        let max_ix = iw as isize - 1 - x_off;
        if max_ix < 0 {
            0
        } else {
            max_ix as usize / sw + 1
        }
    };

    let start = lo.clamp(ox0, ox0 + run);
    let end = hi.clamp(ox0, ox0 + run);

    // Left padding
    for i in ox0..start {
        *dst.add(i - ox0) = 0.0;
    }

    if start < end {
        let n_valid = end - start;
        let first_ix = (start as isize * sw as isize + x_off) as usize;
        match sw {
            1 => {
                std::ptr::copy_nonoverlapping(
                    src_row.add(first_ix),
                    dst.add(start - ox0),
                    n_valid,
                );
            }
            2 => {
                let s = src_row.add(first_ix);
                let d = dst.add(start - ox0);
                let mut i = 0;
                while i + 4 <= n_valid {
                    *d.add(i) = *s.add(i * 2);
                    *d.add(i + 1) = *s.add(i * 2 + 2);
                    *d.add(i + 2) = *s.add(i * 2 + 4);
                    *d.add(i + 3) = *s.add(i * 2 + 6);
                    i += 4;
                }
                while i < n_valid {
                    *d.add(i) = *s.add(i * 2);
                    i += 1;
                }
            }
            _ => {
                let s = src_row.add(first_ix);
                let d = dst.add(start - ox0);
                for i in 0..n_valid {
                    *d.add(i) = *s.add(i * sw);
                }
            }
        }
    }

    // Right padding
    for i in end..ox0 + run {
        *dst.add(i - ox0) = 0.0;
    }
}

/// Gather a 3D vol2col block for flat output positions `[n0, n0 + nb)`
///
/// `src` is one (batch, group) input volume `[c_in_pg, id, ih, iw]`; output
/// positions flatten as `(oz * oh + oy) * ow + ox`. Generic strided gather
/// with explicit zeros for padding cells.
///
/// # Safety
/// `src` must be valid for the volume, `col` for
/// `c_in_pg * kd * kh * kw * nb` writes; they must not alias.
#[allow(clippy::too_many_arguments)]
pub unsafe fn vol2col_f32(
    src: *const f32,
    col: *mut f32,
    c_in_pg: usize,
    dims_in: [usize; 3],
    dims_k: [usize; 3],
    strides: [usize; 3],
    pads: [usize; 3],
    dilations: [usize; 3],
    dims_out: [usize; 3],
    n0: usize,
    nb: usize,
) {
    let [id, ih, iw] = dims_in;
    let [kd, kh, kw] = dims_k;
    let [od, oh, ow] = dims_out;
    debug_assert!(n0 + nb <= od * oh * ow);

    let mut row = 0usize;
    for c in 0..c_in_pg {
        let volume = src.add(c * id * ih * iw);
        for kz in 0..kd {
            for ky in 0..kh {
                for kx in 0..kw {
                    let dst = col.add(row * nb);
                    for idx in 0..nb {
                        let n = n0 + idx;
                        let oz = n / (oh * ow);
                        let oy = (n / ow) % oh;
                        let ox = n % ow;
                        let iz = (oz * strides[0] + kz * dilations[0]) as isize - pads[0] as isize;
                        let iy = (oy * strides[1] + ky * dilations[1]) as isize - pads[1] as isize;
                        let ix = (ox * strides[2] + kx * dilations[2]) as isize - pads[2] as isize;
                        let in_bounds = iz >= 0
                            && iz < id as isize
                            && iy >= 0
                            && iy < ih as isize
                            && ix >= 0
                            && ix < iw as isize;
                        *dst.add(idx) = if in_bounds {
                            *volume
                                .add((iz as usize * ih + iy as usize) * iw + ix as usize)
                        } else {
                            0.0
                        };
                    }
                    row += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Per-cell reference gather
    #[allow(clippy::too_many_arguments)]
    fn reference_im2col(
        src: &[f32],
        c_in: usize,
        ih: usize,
        iw: usize,
        kh: usize,
        kw: usize,
        sh: usize,
        sw: usize,
        ph: usize,
        pw: usize,
        dh: usize,
        dw: usize,
        oh: usize,
        ow: usize,
    ) -> Vec<f32> {
        let rows = c_in * kh * kw;
        let n = oh * ow;
        let mut col = vec![0.0f32; rows * n];
        for c in 0..c_in {
            for ky in 0..kh {
                for kx in 0..kw {
                    let row = (c * kh + ky) * kw + kx;
                    for oy in 0..oh {
                        for ox in 0..ow {
                            let iy = (oy * sh + ky * dh) as isize - ph as isize;
                            let ix = (ox * sw + kx * dw) as isize - pw as isize;
                            let v = if iy >= 0 && iy < ih as isize && ix >= 0 && ix < iw as isize
                            {
                                src[(c * ih + iy as usize) * iw + ix as usize]
                            } else {
                                0.0
                            };
                            col[row * n + oy * ow + ox] = v;
                        }
                    }
                }
            }
        }
        col
    }

    #[allow(clippy::too_many_arguments)]
    fn check(
        c_in: usize,
        ih: usize,
        iw: usize,
        kh: usize,
        kw: usize,
        sh: usize,
        sw: usize,
        ph: usize,
        pw: usize,
        dh: usize,
        dw: usize,
    ) {
        let span_h = ih + 2 * ph;
        let span_w = iw + 2 * pw;
        let oh = (span_h - (dh * (kh - 1) + 1)) / sh + 1;
        let ow = (span_w - (dw * (kw - 1) + 1)) / sw + 1;
        let src: Vec<f32> = (0..c_in * ih * iw).map(|i| (i + 1) as f32).collect();
        let expected =
            reference_im2col(&src, c_in, ih, iw, kh, kw, sh, sw, ph, pw, dh, dw, oh, ow);

        let n = oh * ow;
        let rows = c_in * kh * kw;
        let mut col = vec![-1.0f32; rows * n];
        unsafe {
            im2col_f32(
                src.as_ptr(),
                col.as_mut_ptr(),
                c_in,
                ih,
                iw,
                kh,
                kw,
                sh,
                sw,
                ph,
                pw,
                dh,
                dw,
                ow,
                0,
                n,
            );
        }
        assert_eq!(col, expected, "full-block gather mismatch");

        // Blocked gather splitting mid output row must agree too
        let nb = (n / 3).max(1);
        let mut blocked = vec![-1.0f32; rows * n];
        let mut n0 = 0;
        while n0 < n {
            let cur = nb.min(n - n0);
            let mut part = vec![0.0f32; rows * cur];
            unsafe {
                im2col_f32(
                    src.as_ptr(),
                    part.as_mut_ptr(),
                    c_in,
                    ih,
                    iw,
                    kh,
                    kw,
                    sh,
                    sw,
                    ph,
                    pw,
                    dh,
                    dw,
                    ow,
                    n0,
                    cur,
                );
            }
            for r in 0..rows {
                blocked[r * n + n0..r * n + n0 + cur].copy_from_slice(&part[r * cur..(r + 1) * cur]);
            }
            n0 += cur;
        }
        assert_eq!(blocked, expected, "blocked gather mismatch");
    }

    #[test]
    fn test_stride1_padded() {
        check(2, 5, 5, 3, 3, 1, 1, 1, 1, 1, 1);
    }

    #[test]
    fn test_stride2() {
        check(1, 7, 9, 3, 3, 2, 2, 1, 1, 1, 1);
    }

    #[test]
    fn test_generic_stride3_dilated() {
        check(1, 11, 11, 3, 3, 3, 3, 2, 2, 2, 2);
    }

    #[test]
    fn test_vol2col_matches_per_cell() {
        let (c, id, ih, iw) = (1, 3, 4, 4);
        let (kd, kh, kw) = (2, 2, 2);
        let src: Vec<f32> = (0..c * id * ih * iw).map(|i| i as f32).collect();
        let (od, oh, ow) = (2, 3, 3);
        let rows = c * kd * kh * kw;
        let n = od * oh * ow;
        let mut col = vec![0.0f32; rows * n];
        unsafe {
            vol2col_f32(
                src.as_ptr(),
                col.as_mut_ptr(),
                c,
                [id, ih, iw],
                [kd, kh, kw],
                [1, 1, 1],
                [0, 0, 0],
                [1, 1, 1],
                [od, oh, ow],
                0,
                n,
            );
        }
        // Spot-check: row (kz=1, ky=1, kx=1), output (1,1,1)
        let row = ((1 * kh) + 1) * kw + 1;
        let pos = (1 * oh + 1) * ow + 1;
        let expect = src[((2 * ih) + 2) * iw + 2];
        assert_eq!(col[row * n + pos], expect);
    }
}
