//! Shape and stride arithmetic
//!
//! Tensors are dense and row-major: `stride(axis)` is the product of the
//! dimension sizes strictly to the right of `axis`. Rank is bounded by
//! [`MAX_RANK`] so shapes, strides, and iteration counters live in inline
//! fixed-capacity arrays on hot paths.

use crate::error::{Error, Result};
use smallvec::SmallVec;

/// Maximum tensor rank supported by the engine
pub const MAX_RANK: usize = 8;

/// Inline shape/stride/counter storage sized to [`MAX_RANK`]
pub type Shape = SmallVec<[usize; MAX_RANK]>;

/// Build a [`Shape`] from a slice, rejecting ranks above [`MAX_RANK`]
pub fn shape_from(dims: &[usize]) -> Result<Shape> {
    if dims.len() > MAX_RANK {
        return Err(Error::RankOverflow {
            rank: dims.len(),
            max: MAX_RANK,
        });
    }
    Ok(Shape::from_slice(dims))
}

/// Total element count of a shape (empty shape is a scalar: 1 element)
#[inline]
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Row-major strides for a dense shape
pub fn contiguous_strides(shape: &[usize]) -> Shape {
    let mut strides = Shape::from_elem(1, shape.len());
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Resolve a possibly-negative axis index against a rank
///
/// Negative axes count from the back: `-1` is the trailing axis.
pub fn resolve_axis(axis: isize, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 {
        axis + rank as isize
    } else {
        axis
    };
    if resolved < 0 || resolved as usize >= rank {
        return Err(Error::InvalidAxis { axis, rank });
    }
    Ok(resolved as usize)
}

/// Compute the broadcast shape of two shapes
///
/// Shapes align at the trailing axis; each dimension pair must be equal or
/// one of them 1. The result takes the larger dimension per axis.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Shape> {
    let rank = a.len().max(b.len());
    if rank > MAX_RANK {
        return Err(Error::RankOverflow { rank, max: MAX_RANK });
    }
    let mut out = Shape::from_elem(0, rank);
    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };
        out[i] = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return Err(Error::broadcast(a, b));
        };
    }
    Ok(out)
}

/// Output shape of a reduction: reduced axes collapse to size 1
///
/// Whether the size-1 axes are subsequently squeezed is the caller's concern.
pub fn reduce_output_shape(shape: &[usize], axes: &[usize]) -> Shape {
    let mut out = Shape::from_slice(shape);
    for &a in axes {
        out[a] = 1;
    }
    out
}
