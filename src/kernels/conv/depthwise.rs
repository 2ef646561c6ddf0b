//! Fused direct depthwise convolution
//!
//! One input and one output channel per group: each channel is an
//! independent 2D filter, so the im2col round-trip is pure overhead. The
//! direct kernel walks output rows with an interior/border split: the
//! interior column range (every tap in bounds) runs without bounds checks
//! and auto-vectorizes; borders take the checked loop.
//!
//! The precondition function is the contract for the fast path; anything
//! outside it must fall back to the generic gather path.

use super::ConvParams;

/// Widest kernel the direct path handles
const MAX_KERNEL: usize = 5;
/// Largest stride the direct path handles
const MAX_STRIDE: usize = 2;
/// Largest padding the direct path handles
const MAX_PAD: usize = 1;

/// Whether the fused depthwise kernel applies to this configuration
///
/// Requires true depthwise (one input and one output channel per group),
/// spatial rank 2, dilation 1, and kernel/stride/pad within the tuned
/// bounds. Callers fall back to the generic path when this returns false.
pub fn depthwise_applicable(p: &ConvParams) -> bool {
    p.spatial_rank == 2
        && p.groups == p.c_in
        && p.groups == p.c_out
        && p.groups > 0
        && (0..2).all(|ax| {
            p.dilation[ax] == 1
                && p.kernel[ax] <= MAX_KERNEL
                && p.stride[ax] <= MAX_STRIDE
                && p.pad_begin[ax] <= MAX_PAD
                && p.pad_end[ax] <= MAX_PAD
        })
}

/// Direct depthwise convolution of one (batch, channel) plane
///
/// `src` is the `[ih, iw]` input plane, `w` the `[kh, kw]` filter; output is
/// `[oh, ow]`. `bias` and the epilogue's lower clamp are fused into the
/// store.
///
/// # Safety
/// `src`, `w` and `dst` must be valid for their stated extents; `dst` must
/// not alias the inputs.
#[allow(clippy::too_many_arguments)]
pub unsafe fn depthwise2d_f32(
    src: *const f32,
    w: *const f32,
    dst: *mut f32,
    ih: usize,
    iw: usize,
    kh: usize,
    kw: usize,
    sh: usize,
    sw: usize,
    ph: usize,
    pw: usize,
    oh: usize,
    ow: usize,
    bias: f32,
    clamp_lo: f32,
) {
    // Interior ox range: every kx tap reads in bounds.
    // ix = ox*sw - pw + kx must satisfy 0 <= ix < iw for kx in 0..kw.
    let ox_lo = pw.div_ceil(sw).min(ow);
    let ox_hi = if iw + pw >= kw {
        ((iw + pw - kw) / sw + 1).min(ow)
    } else {
        0
    }
    .max(ox_lo);

    for oy in 0..oh {
        let iy0 = (oy * sh) as isize - ph as isize;
        let d_row = dst.add(oy * ow);

        for ox in 0..ox_lo {
            *d_row.add(ox) = conv_tap_checked(
                src, w, ih, iw, kh, kw, sw, pw, iy0, ox, bias, clamp_lo,
            );
        }

        for ox in ox_lo..ox_hi {
            let ix0 = ox * sw - pw;
            let mut acc = bias;
            for ky in 0..kh {
                let iy = iy0 + ky as isize;
                if iy < 0 || iy >= ih as isize {
                    continue;
                }
                let s_row = src.add(iy as usize * iw + ix0);
                let w_row = w.add(ky * kw);
                for kx in 0..kw {
                    acc += *s_row.add(kx) * *w_row.add(kx);
                }
            }
            *d_row.add(ox) = acc.max(clamp_lo);
        }

        for ox in ox_hi..ow {
            *d_row.add(ox) = conv_tap_checked(
                src, w, ih, iw, kh, kw, sw, pw, iy0, ox, bias, clamp_lo,
            );
        }
    }
}

/// Border column: every tap bounds-checked
#[allow(clippy::too_many_arguments)]
#[inline]
unsafe fn conv_tap_checked(
    src: *const f32,
    w: *const f32,
    ih: usize,
    iw: usize,
    kh: usize,
    kw: usize,
    sw: usize,
    pw: usize,
    iy0: isize,
    ox: usize,
    bias: f32,
    clamp_lo: f32,
) -> f32 {
    let mut acc = bias;
    for ky in 0..kh {
        let iy = iy0 + ky as isize;
        if iy < 0 || iy >= ih as isize {
            continue;
        }
        for kx in 0..kw {
            let ix = (ox * sw + kx) as isize - pw as isize;
            if ix < 0 || ix >= iw as isize {
                continue;
            }
            acc += *src.add(iy as usize * iw + ix as usize) * *w.add(ky * kw + kx);
        }
    }
    acc.max(clamp_lo)
}
