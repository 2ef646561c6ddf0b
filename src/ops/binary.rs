//! Binary and comparison operator dispatch

use crate::broadcast;
use crate::dtype::Element;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::elementwise::{self, BinaryOp, CompareOp};
use crate::tensor::{TensorView, TensorViewMut};

impl Engine {
    /// Elementwise binary operator with broadcasting
    ///
    /// `out` must be pre-allocated at the broadcast shape of `a` and `b`;
    /// every element of it is overwritten.
    pub fn binary<T: Element>(
        &self,
        op: BinaryOp,
        a: TensorView<'_, T>,
        b: TensorView<'_, T>,
        out: &mut TensorViewMut<'_, T>,
    ) -> Result<()> {
        let (out_shape, iter_a, iter_b) = broadcast::prepare(a.shape(), b.shape())?;
        if out.shape() != out_shape.as_slice() {
            return Err(Error::shape_mismatch(&out_shape, out.shape()));
        }
        let total = out.numel();
        if total == 0 {
            return Ok(());
        }

        let a_addr = a.ptr() as usize;
        let b_addr = b.ptr() as usize;
        let o_addr = out.ptr_mut() as usize;

        if a.shape() == b.shape() {
            // Same shapes: both inputs walk contiguously, no iterator needed.
            self.for_each_range(total, 1, |start, len| unsafe {
                elementwise::binary_contiguous(
                    op,
                    (a_addr as *const T).add(start),
                    (b_addr as *const T).add(start),
                    (o_addr as *mut T).add(start),
                    len,
                );
            });
            return Ok(());
        }

        // Chunks are whole innermost-axis spans so no span straddles a chunk.
        let unit = out_shape.last().copied().unwrap_or(1).max(1);
        self.for_each_range(total, unit, |start, len| {
            let mut ia = iter_a.clone();
            let mut ib = iter_b.clone();
            unsafe {
                elementwise::binary_broadcast(
                    op,
                    a_addr as *const T,
                    &mut ia,
                    b_addr as *const T,
                    &mut ib,
                    o_addr as *mut T,
                    start,
                    len,
                );
            }
        });
        Ok(())
    }

    /// Elementwise comparison with broadcasting, producing `{0, 1}` as i32
    pub fn compare<T: Element>(
        &self,
        op: CompareOp,
        a: TensorView<'_, T>,
        b: TensorView<'_, T>,
        out: &mut TensorViewMut<'_, i32>,
    ) -> Result<()> {
        let (out_shape, iter_a, iter_b) = broadcast::prepare(a.shape(), b.shape())?;
        if out.shape() != out_shape.as_slice() {
            return Err(Error::shape_mismatch(&out_shape, out.shape()));
        }
        let total = out.numel();
        if total == 0 {
            return Ok(());
        }

        let a_addr = a.ptr() as usize;
        let b_addr = b.ptr() as usize;
        let o_addr = out.ptr_mut() as usize;

        if a.shape() == b.shape() {
            self.for_each_range(total, 1, |start, len| unsafe {
                elementwise::compare_contiguous(
                    op,
                    (a_addr as *const T).add(start),
                    (b_addr as *const T).add(start),
                    (o_addr as *mut i32).add(start),
                    len,
                );
            });
            return Ok(());
        }

        let unit = out_shape.last().copied().unwrap_or(1).max(1);
        self.for_each_range(total, unit, |start, len| {
            let mut ia = iter_a.clone();
            let mut ib = iter_b.clone();
            unsafe {
                elementwise::compare_broadcast(
                    op,
                    a_addr as *const T,
                    &mut ia,
                    b_addr as *const T,
                    &mut ib,
                    o_addr as *mut i32,
                    start,
                    len,
                );
            }
        });
        Ok(())
    }
}
