//! Cumulative-sum kernel
//!
//! Single-axis prefix (or suffix) scan over the `[outer, len, inner]`
//! decomposition. `exclusive` shifts the scan by one position, seeding the
//! first output with 0; `reverse` scans from the high end of the axis.

use crate::dtype::Element;

/// Prefix/suffix scan along one axis
///
/// # Safety
/// `src` and `dst` must each be valid for `outer * len * inner` elements and
/// must not alias.
#[allow(clippy::too_many_arguments)]
pub unsafe fn cumsum<T: Element>(
    src: *const T,
    dst: *mut T,
    outer: usize,
    len: usize,
    inner: usize,
    exclusive: bool,
    reverse: bool,
) {
    debug_assert!(len > 0 && inner > 0);
    for o in 0..outer {
        let base = o * len * inner;
        for i in 0..inner {
            let p = src.add(base + i);
            let d = dst.add(base + i);
            let mut acc = T::zero();
            if reverse {
                for r in (0..len).rev() {
                    let v = *p.add(r * inner);
                    if exclusive {
                        *d.add(r * inner) = acc;
                        acc = acc + v;
                    } else {
                        acc = acc + v;
                        *d.add(r * inner) = acc;
                    }
                }
            } else {
                for r in 0..len {
                    let v = *p.add(r * inner);
                    if exclusive {
                        *d.add(r * inner) = acc;
                        acc = acc + v;
                    } else {
                        acc = acc + v;
                        *d.add(r * inner) = acc;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &[f32], len: usize, exclusive: bool, reverse: bool) -> Vec<f32> {
        let mut dst = vec![0.0f32; src.len()];
        unsafe {
            cumsum(
                src.as_ptr(),
                dst.as_mut_ptr(),
                src.len() / len,
                len,
                1,
                exclusive,
                reverse,
            );
        }
        dst
    }

    #[test]
    fn test_inclusive_forward() {
        assert_eq!(run(&[1.0, 2.0, 3.0, 4.0], 4, false, false), [1.0, 3.0, 6.0, 10.0]);
    }

    #[test]
    fn test_exclusive_seeds_zero() {
        assert_eq!(run(&[1.0, 2.0, 3.0, 4.0], 4, true, false), [0.0, 1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_reverse() {
        assert_eq!(run(&[1.0, 2.0, 3.0, 4.0], 4, false, true), [10.0, 9.0, 7.0, 4.0]);
    }

    #[test]
    fn test_reverse_exclusive() {
        assert_eq!(run(&[1.0, 2.0, 3.0, 4.0], 4, true, true), [9.0, 7.0, 4.0, 0.0]);
    }

    #[test]
    fn test_strided_inner() {
        // axis 0 of a [3, 2] tensor: inner = 2
        let src = [1.0f32, 10.0, 2.0, 20.0, 3.0, 30.0];
        let mut dst = [0.0f32; 6];
        unsafe {
            cumsum(src.as_ptr(), dst.as_mut_ptr(), 1, 3, 2, false, false);
        }
        assert_eq!(dst, [1.0, 10.0, 3.0, 30.0, 6.0, 60.0]);
    }
}
