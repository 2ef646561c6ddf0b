//! Softmax / log-softmax kernel
//!
//! Single-axis, max-subtract stabilized. Works over the `[outer, len, inner]`
//! decomposition; every output lane is an independent normalization.

/// Softmax or log-softmax along one axis
///
/// # Safety
/// `src` and `dst` must each be valid for `outer * len * inner` elements and
/// must not alias.
pub unsafe fn softmax(
    src: *const f32,
    dst: *mut f32,
    outer: usize,
    len: usize,
    inner: usize,
    log: bool,
) {
    debug_assert!(len > 0 && inner > 0);
    for o in 0..outer {
        let base = o * len * inner;
        for i in 0..inner {
            let p = src.add(base + i);
            let d = dst.add(base + i);

            let mut mx = *p;
            for r in 1..len {
                let v = *p.add(r * inner);
                if v > mx {
                    mx = v;
                }
            }

            let mut sum = 0.0f32;
            for r in 0..len {
                let e = (*p.add(r * inner) - mx).exp();
                *d.add(r * inner) = e;
                sum += e;
            }

            if log {
                let ln_sum = sum.ln();
                for r in 0..len {
                    let x = *p.add(r * inner);
                    *d.add(r * inner) = x - mx - ln_sum;
                }
            } else {
                let inv = 1.0 / sum;
                for r in 0..len {
                    *d.add(r * inner) *= inv;
                }
            }
        }
    }
}
