//! Broadcast iteration model
//!
//! For two broadcast-compatible shapes, [`prepare`] computes the unified
//! iteration space and one [`BroadcastIter`] per input. An iterator maps a
//! flat output index back to the correct (possibly replicated) input offset:
//! a size-1 input axis contributes a step of 0, so advancing along it stays
//! on the same element.
//!
//! Iterators assume pre-validated shapes; [`prepare`] is the validation
//! point and the only constructor.

use crate::error::Result;
use crate::shape::{broadcast_shape, contiguous_strides, Shape, MAX_RANK};
use smallvec::SmallVec;

/// Per-input offset stepper over a broadcast iteration space
#[derive(Clone, Debug)]
pub struct BroadcastIter {
    /// Output iteration shape, padded to the common rank
    dims: Shape,
    /// Input stride per output axis; 0 where the input axis is replicated
    steps: SmallVec<[usize; MAX_RANK]>,
    /// Per-axis counters for the current position
    counters: SmallVec<[usize; MAX_RANK]>,
    /// Flat offset into the input buffer
    offset: usize,
}

/// Compute the broadcast output shape and configure one iterator per input
///
/// Returns `(output_shape, iter_a, iter_b)`. The output length is
/// `output_shape.iter().product()`.
pub fn prepare(shape_a: &[usize], shape_b: &[usize]) -> Result<(Shape, BroadcastIter, BroadcastIter)> {
    let out = broadcast_shape(shape_a, shape_b)?;
    let iter_a = BroadcastIter::for_input(&out, shape_a);
    let iter_b = BroadcastIter::for_input(&out, shape_b);
    Ok((out, iter_a, iter_b))
}

impl BroadcastIter {
    /// Configure an iterator for one input against a broadcast output shape
    pub(crate) fn for_input(out_shape: &[usize], in_shape: &[usize]) -> Self {
        // Normalize a rank-0 space to [1] so the innermost axis always exists.
        let dims: Shape = if out_shape.is_empty() {
            Shape::from_slice(&[1])
        } else {
            Shape::from_slice(out_shape)
        };
        let rank = dims.len();
        let in_strides = contiguous_strides(in_shape);
        let lead = rank - in_shape.len().min(rank);

        let mut steps = SmallVec::from_elem(0usize, rank);
        for ax in 0..rank {
            if ax >= lead {
                let in_ax = ax - lead;
                // Replicated axis: stride contribution is zero.
                if in_shape[in_ax] != 1 {
                    steps[ax] = in_strides[in_ax];
                }
            }
        }

        Self {
            dims,
            steps,
            counters: SmallVec::from_elem(0usize, rank),
            offset: 0,
        }
    }

    /// Position the iterator at a flat output index
    ///
    /// Computes per-axis counters by div/mod against the output shape and
    /// the starting input offset weighted by the per-axis steps.
    pub fn initial_offset(&mut self, flat_index: usize) -> usize {
        let mut rem = flat_index;
        let mut offset = 0usize;
        for ax in (0..self.dims.len()).rev() {
            let c = rem % self.dims[ax];
            rem /= self.dims[ax];
            self.counters[ax] = c;
            offset += c * self.steps[ax];
        }
        self.offset = offset;
        offset
    }

    /// Advance `count` output positions with ripple-carry across axes
    ///
    /// Returns the new input offset.
    pub fn advance(&mut self, count: usize) -> usize {
        let mut carry = count;
        for ax in (0..self.dims.len()).rev() {
            if carry == 0 {
                break;
            }
            let cur = self.counters[ax] + carry;
            let new = cur % self.dims[ax];
            carry = cur / self.dims[ax];
            let step = self.steps[ax];
            if step != 0 {
                if new >= self.counters[ax] {
                    self.offset += (new - self.counters[ax]) * step;
                } else {
                    self.offset -= (self.counters[ax] - new) * step;
                }
            }
            self.counters[ax] = new;
        }
        self.offset
    }

    /// Current flat input offset
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Contiguous elements remaining before the fastest-varying axis rolls over
    ///
    /// Lets callers chunk work per span instead of re-deriving counters every
    /// element.
    #[inline]
    pub fn span_size(&self) -> usize {
        let last = self.dims.len() - 1;
        self.dims[last] - self.counters[last]
    }

    /// Input step along the fastest-varying output axis (0 or the unit stride)
    #[inline]
    pub fn inner_step(&self) -> usize {
        self.steps[self.dims.len() - 1]
    }

    /// True iff the input is a single element replicated over the whole space
    ///
    /// The degenerate fast path: stride 0 throughout, no counter logic needed.
    #[inline]
    pub fn is_scalar_broadcast(&self) -> bool {
        self.steps.iter().all(|&s| s == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::numel;

    /// Reference mapping: flat output index -> flat input index, via full
    /// coordinate expansion.
    fn reference_map(flat: usize, out_shape: &[usize], in_shape: &[usize]) -> usize {
        let rank = out_shape.len();
        let lead = rank - in_shape.len();
        let in_strides = contiguous_strides(in_shape);
        let mut rem = flat;
        let mut idx = 0;
        for ax in (0..rank).rev() {
            let c = rem % out_shape[ax];
            rem /= out_shape[ax];
            if ax >= lead && in_shape[ax - lead] != 1 {
                idx += c * in_strides[ax - lead];
            }
        }
        idx
    }

    fn check_pair(a: &[usize], b: &[usize]) {
        let (out, mut ia, mut ib) = prepare(a, b).unwrap();
        let total = numel(&out);
        ia.initial_offset(0);
        ib.initial_offset(0);
        for i in 0..total {
            assert_eq!(ia.offset(), reference_map(i, &out, a), "A at {i}");
            assert_eq!(ib.offset(), reference_map(i, &out, b), "B at {i}");
            ia.advance(1);
            ib.advance(1);
        }
    }

    #[test]
    fn test_equal_shapes() {
        check_pair(&[2, 3], &[2, 3]);
    }

    #[test]
    fn test_ones_dims() {
        check_pair(&[2, 3, 4], &[3, 1]);
        check_pair(&[4, 1, 5], &[1, 6, 5]);
    }

    #[test]
    fn test_scalar_broadcast() {
        let (_, ia, ib) = prepare(&[1], &[2, 3, 4]).unwrap();
        assert!(ia.is_scalar_broadcast());
        assert!(!ib.is_scalar_broadcast());
        check_pair(&[1], &[2, 3, 4]);
    }

    #[test]
    fn test_initial_offset_mid_space() {
        let (out, _, mut ib) = prepare(&[2, 3, 4], &[3, 1]).unwrap();
        for start in [0, 5, 11, 17, 23] {
            ib.initial_offset(start);
            assert_eq!(ib.offset(), reference_map(start, &out, &[3, 1]));
        }
    }

    #[test]
    fn test_advance_by_span() {
        let (out, _, mut ib) = prepare(&[2, 3, 4], &[2, 3, 1]).unwrap();
        ib.initial_offset(0);
        let mut flat = 0;
        while flat < numel(&out) {
            let span = ib.span_size();
            assert_eq!(ib.offset(), reference_map(flat, &out, &[2, 3, 1]));
            // Replicated trailing axis: whole span reads one element.
            assert_eq!(ib.inner_step(), 0);
            flat += span;
            ib.advance(span);
        }
    }
}
