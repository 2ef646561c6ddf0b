//! Batched matrix-multiply dispatch
//!
//! The trailing two axes of each input are the matrix; leading axes are
//! batch dimensions and broadcast against each other. Parallelism is batch
//! first; when there are fewer batches than workers, each matrix is split
//! into stripes along its larger output dimension so single-matrix calls
//! still use the whole pool.

use crate::broadcast;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::gemm;
use crate::shape::{numel, Shape};
use crate::tensor::{TensorView, TensorViewMut};

/// Matrix-multiply options
///
/// A transposed flag means the logical operand is the stored matrix
/// transposed; no data movement happens. `accumulate` adds into the output
/// instead of overwriting it.
#[derive(Copy, Clone, Debug, Default)]
pub struct MatmulParams {
    /// Treat A as stored transposed (`[k, m]`)
    pub trans_a: bool,
    /// Treat B as stored transposed (`[n, k]`)
    pub trans_b: bool,
    /// `C += A @ B` instead of `C = A @ B`
    pub accumulate: bool,
}

impl Engine {
    /// Batched matrix multiply: `C = A @ B` over broadcast batch dimensions
    ///
    /// Both inputs must have rank at least 2. `out` must be pre-allocated at
    /// the broadcast batch shape followed by `[m, n]`.
    pub fn matmul(
        &self,
        params: MatmulParams,
        a: TensorView<'_, f32>,
        b: TensorView<'_, f32>,
        out: &mut TensorViewMut<'_, f32>,
    ) -> Result<()> {
        if a.rank() < 2 {
            return Err(Error::invalid_argument("a", "matmul requires rank >= 2"));
        }
        if b.rank() < 2 {
            return Err(Error::invalid_argument("b", "matmul requires rank >= 2"));
        }

        let (ra, rb) = (a.rank(), b.rank());
        let lda = a.shape()[ra - 1];
        let ldb = b.shape()[rb - 1];
        let (m, k) = if params.trans_a {
            (a.shape()[ra - 1], a.shape()[ra - 2])
        } else {
            (a.shape()[ra - 2], a.shape()[ra - 1])
        };
        let (kb, n) = if params.trans_b {
            (b.shape()[rb - 1], b.shape()[rb - 2])
        } else {
            (b.shape()[rb - 2], b.shape()[rb - 1])
        };
        if k != kb {
            return Err(Error::invalid_argument(
                "b",
                format!("inner dimensions disagree: {k} vs {kb}"),
            ));
        }

        let (batch_shape, iter_a, iter_b) =
            broadcast::prepare(&a.shape()[..ra - 2], &b.shape()[..rb - 2])?;
        let mut out_shape: Shape = batch_shape.clone();
        out_shape.push(m);
        out_shape.push(n);
        if out.shape() != out_shape.as_slice() {
            return Err(Error::shape_mismatch(&out_shape, out.shape()));
        }
        if out.numel() == 0 {
            return Ok(());
        }

        let batches = numel(&batch_shape).max(1);
        let a_mat = a.shape()[ra - 2] * a.shape()[ra - 1];
        let b_mat = b.shape()[rb - 2] * b.shape()[rb - 1];
        let ldc = n;

        // Stripe the larger output dimension when batches alone cannot fill
        // the pool.
        let stripe_m = m >= n;
        let dim = if stripe_m { m } else { n };
        let threads = self.threads();
        let want = if batches >= threads || threads <= 1 {
            1
        } else {
            (threads * 2).div_ceil(batches)
        };
        let stripe_len = dim.div_ceil(want.min(dim)).max(1);
        let stripes = dim.div_ceil(stripe_len);
        let tasks = batches * stripes;
        let weight = stripe_len * if stripe_m { n } else { m };

        let a_addr = a.ptr() as usize;
        let b_addr = b.ptr() as usize;
        let o_addr = out.ptr_mut() as usize;

        self.for_each_task(tasks, weight, |t| {
            let batch = t / stripes;
            let s = t % stripes;
            let mut ia = iter_a.clone();
            let mut ib = iter_b.clone();
            unsafe {
                let mut ap = (a_addr as *const f32).add(ia.initial_offset(batch) * a_mat);
                let mut bp = (b_addr as *const f32).add(ib.initial_offset(batch) * b_mat);
                let mut cp = (o_addr as *mut f32).add(batch * m * n);

                let s0 = s * stripe_len;
                let slen = stripe_len.min(dim - s0);
                let (sm, sn) = if stripe_m {
                    // Row stripe: advance A by s0 logical rows and C likewise.
                    ap = ap.add(if params.trans_a { s0 } else { s0 * lda });
                    cp = cp.add(s0 * ldc);
                    (slen, n)
                } else {
                    // Column stripe: advance B by s0 logical columns.
                    bp = bp.add(if params.trans_b { s0 * ldb } else { s0 });
                    cp = cp.add(s0);
                    (m, slen)
                };

                gemm::gemm_f32(
                    ap,
                    bp,
                    cp,
                    sm,
                    sn,
                    k,
                    lda,
                    ldb,
                    ldc,
                    params.trans_a,
                    params.trans_b,
                    params.accumulate,
                );
            }
        });
        Ok(())
    }
}
