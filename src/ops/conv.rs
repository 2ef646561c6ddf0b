//! Convolution dispatch
//!
//! Layout is channels-first: input `[batch, c_in, *spatial]`, weights
//! `[c_out, c_in / groups, *kernel]`, output `[batch, c_out, *out_spatial]`.
//! Each (batch, group) pair is an independent task. Within a task the
//! generic path gathers column blocks into a thread-local scratch buffer and
//! feeds the GEMM engine, finishing each block with the fused bias/ReLU
//! epilogue while it is still cache-hot. Pointwise convolutions skip the
//! gather; true depthwise 2D convolutions take the direct kernel.

use std::cell::RefCell;

use tracing::trace;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::conv::depthwise::{depthwise2d_f32, depthwise_applicable};
use crate::kernels::conv::im2col::{im2col_f32, vol2col_f32};
use crate::kernels::conv::{ConvParams, MAX_SPATIAL};
use crate::kernels::gemm;
use crate::tensor::{TensorView, TensorViewMut};

/// Output positions gathered per column block
const COL_BLOCK: usize = 512;

thread_local! {
    static COL_F32: RefCell<Vec<f32>> = const { RefCell::new(Vec::new()) };
}

/// Borrow the thread-local column scratch at the requested capacity
fn with_col_f32<R>(need: usize, f: impl FnOnce(&mut [f32]) -> R) -> R {
    COL_F32.with(|cell| {
        let mut buf = cell.borrow_mut();
        if buf.len() < need {
            buf.resize(need, 0.0);
        }
        f(&mut buf[..need])
    })
}

fn validate(p: &ConvParams, x_shape: &[usize], w_shape: &[usize]) -> Result<()> {
    if p.spatial_rank == 0 || p.spatial_rank > MAX_SPATIAL {
        return Err(Error::invalid_argument(
            "spatial_rank",
            format!("must be 1..=3, got {}", p.spatial_rank),
        ));
    }
    if p.groups == 0 || p.c_in % p.groups != 0 || p.c_out % p.groups != 0 {
        return Err(Error::invalid_argument(
            "groups",
            format!(
                "{} must divide c_in {} and c_out {}",
                p.groups, p.c_in, p.c_out
            ),
        ));
    }
    for ax in 0..p.spatial_rank {
        if p.kernel[ax] == 0 || p.stride[ax] == 0 || p.dilation[ax] == 0 {
            return Err(Error::invalid_argument(
                "kernel",
                format!("kernel, stride and dilation must be nonzero on axis {ax}"),
            ));
        }
        let span = p.input[ax] + p.pad_begin[ax] + p.pad_end[ax];
        let eff_k = p.dilation[ax] * (p.kernel[ax] - 1) + 1;
        if span < eff_k {
            return Err(Error::invalid_argument(
                "input",
                format!("padded extent {span} is smaller than effective kernel {eff_k} on axis {ax}"),
            ));
        }
    }
    // Unused trailing axes feed the spatial products below; anything but the
    // neutral values would scale offsets past the validated buffers.
    for ax in p.spatial_rank..MAX_SPATIAL {
        if p.input[ax] != 1
            || p.kernel[ax] != 1
            || p.stride[ax] != 1
            || p.dilation[ax] != 1
            || p.pad_begin[ax] != 0
            || p.pad_end[ax] != 0
        {
            return Err(Error::invalid_argument(
                "spatial_rank",
                format!(
                    "axis {ax} is past spatial_rank {} and must hold neutral values",
                    p.spatial_rank
                ),
            ));
        }
    }

    let mut expect_x = vec![p.batch, p.c_in];
    expect_x.extend_from_slice(&p.input[..p.spatial_rank]);
    if x_shape != expect_x.as_slice() {
        return Err(Error::shape_mismatch(&expect_x, x_shape));
    }
    let mut expect_w = vec![p.c_out, p.c_in / p.groups];
    expect_w.extend_from_slice(&p.kernel[..p.spatial_rank]);
    if w_shape != expect_w.as_slice() {
        return Err(Error::shape_mismatch(&expect_w, w_shape));
    }
    Ok(())
}

impl Engine {
    /// Grouped N-dimensional convolution with fused bias and optional ReLU
    ///
    /// `out` must be pre-allocated at `[batch, c_out, *out_spatial]` where
    /// the spatial extents follow from [`ConvParams::output_dims`].
    pub fn conv(
        &self,
        params: &ConvParams,
        x: TensorView<'_, f32>,
        w: TensorView<'_, f32>,
        bias: Option<TensorView<'_, f32>>,
        out: &mut TensorViewMut<'_, f32>,
    ) -> Result<()> {
        validate(params, x.shape(), w.shape())?;
        if let Some(bv) = &bias {
            if bv.shape() != [params.c_out] {
                return Err(Error::shape_mismatch(&[params.c_out], bv.shape()));
            }
        }
        let out_dims = params.output_dims();
        let mut expect_out = vec![params.batch, params.c_out];
        expect_out.extend_from_slice(&out_dims[..params.spatial_rank]);
        if out.shape() != expect_out.as_slice() {
            return Err(Error::shape_mismatch(&expect_out, out.shape()));
        }
        if out.numel() == 0 {
            return Ok(());
        }

        let p = params.normalized();
        let out_dims = p.output_dims();
        let n_total: usize = out_dims.iter().product();
        let in_spatial: usize = p.input.iter().product();
        let c_in_pg = p.c_in / p.groups;
        let c_out_pg = p.c_out / p.groups;
        let kernel_prod: usize = p.kernel.iter().product();
        let k_dim = c_in_pg * kernel_prod;
        let clamp_lo = p.clamp_lo();

        let x_addr = x.ptr() as usize;
        let w_addr = w.ptr() as usize;
        let b_addr = bias.as_ref().map(|b| b.ptr() as usize);
        let o_addr = out.ptr_mut() as usize;

        if depthwise_applicable(&p) {
            let (ih, iw) = (p.input[0], p.input[1]);
            let (kh, kw) = (p.kernel[0], p.kernel[1]);
            let (oh, ow) = (out_dims[0], out_dims[1]);
            let tasks = p.batch * p.c_out;
            self.for_each_task(tasks, oh * ow, |t| {
                let ch = t % p.c_out;
                unsafe {
                    let src = (x_addr as *const f32).add(t * ih * iw);
                    let wp = (w_addr as *const f32).add(ch * kh * kw);
                    let dst = (o_addr as *mut f32).add(t * oh * ow);
                    let bv = match b_addr {
                        Some(addr) => *(addr as *const f32).add(ch),
                        None => 0.0,
                    };
                    depthwise2d_f32(
                        src, wp, dst, ih, iw, kh, kw, p.stride[0], p.stride[1], p.pad_begin[0],
                        p.pad_begin[1], oh, ow, bv, clamp_lo,
                    );
                }
            });
            return Ok(());
        }
        if p.groups > 1 && p.groups == p.c_in && p.groups == p.c_out {
            trace!(
                groups = p.groups,
                "depthwise configuration outside the direct kernel bounds, using gather path"
            );
        }

        let pointwise = p.is_pointwise();
        let tasks = p.batch * p.groups;
        self.for_each_task(tasks, c_out_pg * n_total, |t| {
            let b = t / p.groups;
            let g = t % p.groups;
            unsafe {
                let src = (x_addr as *const f32).add((b * p.c_in + g * c_in_pg) * in_spatial);
                let wg = (w_addr as *const f32).add(g * c_out_pg * k_dim);
                let dst = (o_addr as *mut f32).add((b * p.c_out + g * c_out_pg) * n_total);

                if pointwise {
                    // Identity gather: the input slab is already the
                    // [k_dim, n_total] column matrix.
                    gemm::gemm_f32(
                        wg, src, dst, c_out_pg, n_total, k_dim, k_dim, n_total, n_total, false,
                        false, false,
                    );
                    epilogue(dst, c_out_pg, n_total, 0, n_total, b_addr, g * c_out_pg, p.relu,
                        clamp_lo);
                    return;
                }

                with_col_f32(k_dim * COL_BLOCK.min(n_total), |col| {
                    let mut n0 = 0;
                    while n0 < n_total {
                        let nb = COL_BLOCK.min(n_total - n0);
                        if p.spatial_rank == 3 {
                            vol2col_f32(
                                src,
                                col.as_mut_ptr(),
                                c_in_pg,
                                p.input,
                                p.kernel,
                                p.stride,
                                p.pad_begin,
                                p.dilation,
                                out_dims,
                                n0,
                                nb,
                            );
                        } else {
                            im2col_f32(
                                src,
                                col.as_mut_ptr(),
                                c_in_pg,
                                p.input[0],
                                p.input[1],
                                p.kernel[0],
                                p.kernel[1],
                                p.stride[0],
                                p.stride[1],
                                p.pad_begin[0],
                                p.pad_begin[1],
                                p.dilation[0],
                                p.dilation[1],
                                out_dims[1],
                                n0,
                                nb,
                            );
                        }
                        gemm::gemm_f32(
                            wg,
                            col.as_ptr(),
                            dst.add(n0),
                            c_out_pg,
                            nb,
                            k_dim,
                            k_dim,
                            nb,
                            n_total,
                            false,
                            false,
                            false,
                        );
                        epilogue(dst, c_out_pg, n_total, n0, nb, b_addr, g * c_out_pg, p.relu,
                            clamp_lo);
                        n0 += nb;
                    }
                });
            }
        });
        Ok(())
    }
}

/// Fused bias add and lower clamp over output columns `[n0, n0 + nb)`
#[allow(clippy::too_many_arguments)]
unsafe fn epilogue(
    dst: *mut f32,
    c_out_pg: usize,
    ldc: usize,
    n0: usize,
    nb: usize,
    bias: Option<usize>,
    oc0: usize,
    relu: bool,
    clamp_lo: f32,
) {
    if bias.is_none() && !relu {
        return;
    }
    for oc in 0..c_out_pg {
        let bv = match bias {
            Some(addr) => *(addr as *const f32).add(oc0 + oc),
            None => 0.0,
        };
        let row = std::slice::from_raw_parts_mut(dst.add(oc * ldc + n0), nb);
        for v in row {
            *v = (*v + bv).max(clamp_lo);
        }
    }
}
