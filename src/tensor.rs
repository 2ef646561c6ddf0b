//! Borrowed tensor views
//!
//! The engine never owns tensor storage. Callers hand in a contiguous,
//! row-major buffer plus its shape; [`TensorView`] and [`TensorViewMut`]
//! bundle the two and validate that they agree. This is the whole
//! shape/stride contract: strides are always the dense row-major ones
//! implied by the shape.

use crate::error::{Error, Result};
use crate::shape::{numel, shape_from, Shape};

/// Read-only view over a caller-owned tensor buffer
#[derive(Copy, Clone)]
pub struct TensorView<'a, T> {
    data: &'a [T],
    shape: &'a [usize],
}

impl<'a, T> TensorView<'a, T> {
    /// Create a view, validating buffer length against the shape
    pub fn new(data: &'a [T], shape: &'a [usize]) -> Result<Self> {
        shape_from(shape)?;
        if data.len() != numel(shape) {
            return Err(Error::BufferMismatch {
                len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(Self { data, shape })
    }

    /// The underlying buffer
    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// The shape
    #[inline]
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    /// Number of dimensions
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Total element count
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Raw pointer to the first element
    #[inline]
    pub(crate) fn ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// Owned copy of the shape
    #[inline]
    pub(crate) fn shape_owned(&self) -> Shape {
        Shape::from_slice(self.shape)
    }
}

/// Mutable view over a caller-owned output buffer
pub struct TensorViewMut<'a, T> {
    data: &'a mut [T],
    shape: &'a [usize],
}

impl<'a, T> TensorViewMut<'a, T> {
    /// Create a mutable view, validating buffer length against the shape
    pub fn new(data: &'a mut [T], shape: &'a [usize]) -> Result<Self> {
        shape_from(shape)?;
        if data.len() != numel(shape) {
            return Err(Error::BufferMismatch {
                len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(Self { data, shape })
    }

    /// The underlying buffer
    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        self.data
    }

    /// The shape
    #[inline]
    pub fn shape(&self) -> &'a [usize] {
        self.shape
    }

    /// Total element count
    #[inline]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Raw mutable pointer to the first element
    #[inline]
    pub(crate) fn ptr_mut(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}
