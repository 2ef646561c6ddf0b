//! Unary operator dispatch

use crate::dtype::Element;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::elementwise::{self, UnaryOp};
use crate::tensor::{TensorView, TensorViewMut};

impl Engine {
    /// Elementwise unary operator
    ///
    /// `out` must match the input shape exactly; every element is
    /// overwritten.
    pub fn unary<T: Element>(
        &self,
        op: UnaryOp,
        x: TensorView<'_, T>,
        out: &mut TensorViewMut<'_, T>,
    ) -> Result<()> {
        if out.shape() != x.shape() {
            return Err(Error::shape_mismatch(x.shape(), out.shape()));
        }
        let total = x.numel();
        if total == 0 {
            return Ok(());
        }

        let x_addr = x.ptr() as usize;
        let o_addr = out.ptr_mut() as usize;
        self.for_each_range(total, 1, |start, len| unsafe {
            elementwise::unary_contiguous(
                op,
                (x_addr as *const T).add(start),
                (o_addr as *mut T).add(start),
                len,
            );
        });
        Ok(())
    }
}
