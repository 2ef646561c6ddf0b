//! Reduction, arg-reduction, scan, and softmax dispatch
//!
//! Reductions fuse the requested axes into maximal contiguous runs; each run
//! is one `[outer, reduce, inner]` kernel pass, and non-adjacent runs chain
//! through an intermediate buffer. The element map applies only on the first
//! pass and the finalizer only on the last, so chained L2 is square-sum then
//! plain sum then sqrt.

use crate::dtype::Element;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::kernels::reduce::{self, Accum, Finalize, Map, ReduceKind};
use crate::kernels::{cumsum, softmax};
use crate::shape::{self, reduce_output_shape, Shape};
use crate::tensor::{TensorView, TensorViewMut};

/// Index-producing reduction kind
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgReduce {
    /// Index of the minimum element
    Min,
    /// Index of the maximum element
    Max,
}

/// Resolve, sort, and dedup reduction axes; empty means every axis
fn resolve_axes(axes: &[isize], rank: usize) -> Result<Shape> {
    if axes.is_empty() {
        return Ok((0..rank).collect());
    }
    let mut resolved = Shape::new();
    for &a in axes {
        resolved.push(shape::resolve_axis(a, rank)?);
    }
    resolved.sort_unstable();
    resolved.dedup();
    Ok(resolved)
}

/// Group sorted axes into maximal runs of consecutive indices
fn contiguous_runs(axes: &[usize]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < axes.len() {
        let start = axes[i];
        let mut end = start;
        while i + 1 < axes.len() && axes[i + 1] == end + 1 {
            i += 1;
            end = axes[i];
        }
        runs.push((start, end));
        i += 1;
    }
    runs
}

/// Decompose a shape around one axis into `(outer, len, inner)`
fn axis_decompose(shape: &[usize], axis: usize) -> (usize, usize, usize) {
    let outer = shape[..axis].iter().product();
    let len = shape[axis];
    let inner = shape[axis + 1..].iter().product();
    (outer, len, inner)
}

impl Engine {
    /// Reduce over the given axes, keeping them as size-1 dimensions
    ///
    /// An empty `axes` slice reduces over every axis. `out` must be
    /// pre-allocated at the input shape with the reduced axes collapsed
    /// to 1.
    pub fn reduce<T: Element>(
        &self,
        kind: ReduceKind,
        x: TensorView<'_, T>,
        axes: &[isize],
        out: &mut TensorViewMut<'_, T>,
    ) -> Result<()> {
        let axes = resolve_axes(axes, x.rank())?;
        for &a in &axes {
            if x.shape()[a] == 0 {
                return Err(Error::ZeroLengthAxis { axis: a });
            }
        }
        let out_shape = reduce_output_shape(x.shape(), &axes);
        if out.shape() != out_shape.as_slice() {
            return Err(Error::shape_mismatch(&out_shape, out.shape()));
        }
        if out.numel() == 0 {
            return Ok(());
        }

        let total_reduce: usize = axes.iter().map(|&a| x.shape()[a]).product();
        let runs = contiguous_runs(&axes);
        let accum = kind.accum();

        if runs.is_empty() {
            // Rank-0 input: the value passes through map and finalize alone.
            let src = x.ptr() as usize;
            let dst = out.ptr_mut() as usize;
            unsafe {
                reduce::reduce_pass(
                    src as *const T,
                    dst as *mut T,
                    1,
                    1,
                    1,
                    accum,
                    kind.map(),
                    kind.finalize(1),
                );
            }
            return Ok(());
        }

        let mut cur = x.shape_owned();
        let mut src_addr = x.ptr() as usize;
        // Keeps the intermediate of the previous pass alive while it is read.
        let mut _carry: Vec<T>;

        for (ri, &(start, end)) in runs.iter().enumerate() {
            let outer: usize = cur[..start].iter().product();
            let red: usize = cur[start..=end].iter().product();
            let inner: usize = cur[end + 1..].iter().product();
            let map = if ri == 0 { kind.map() } else { Map::Identity };
            let last = ri == runs.len() - 1;
            let fin = if last {
                kind.finalize(total_reduce)
            } else {
                Finalize::None
            };

            if last {
                let dst = out.ptr_mut() as usize;
                self.reduce_rows::<T>(src_addr, dst, outer, red, inner, accum, map, fin);
            } else {
                let mut buf = vec![T::zero(); outer * inner];
                self.reduce_rows::<T>(
                    src_addr,
                    buf.as_mut_ptr() as usize,
                    outer,
                    red,
                    inner,
                    accum,
                    map,
                    fin,
                );
                src_addr = buf.as_ptr() as usize;
                _carry = buf;
            }
            for a in start..=end {
                cur[a] = 1;
            }
        }
        Ok(())
    }

    /// One reduction pass, chunked over output rows
    #[allow(clippy::too_many_arguments)]
    fn reduce_rows<T: Element>(
        &self,
        src: usize,
        dst: usize,
        outer: usize,
        red: usize,
        inner: usize,
        accum: Accum,
        map: Map,
        fin: Finalize,
    ) {
        let row = red * inner;
        let chunk = (self.min_parallel_len() / row.max(1)).max(1);
        let tasks = outer.div_ceil(chunk);
        self.for_each_task(tasks, chunk * inner, |t| {
            let o0 = t * chunk;
            let rows = chunk.min(outer - o0);
            unsafe {
                reduce::reduce_pass(
                    (src as *const T).add(o0 * row),
                    (dst as *mut T).add(o0 * inner),
                    rows,
                    red,
                    inner,
                    accum,
                    map,
                    fin,
                );
            }
        });
    }

    /// Index of the minimum or maximum along one axis
    ///
    /// Ties keep the earliest index unless `select_last` is set. `out` holds
    /// i32 indices at the input shape with `axis` collapsed to 1.
    pub fn arg_reduce<T: Element>(
        &self,
        arg: ArgReduce,
        x: TensorView<'_, T>,
        axis: isize,
        select_last: bool,
        out: &mut TensorViewMut<'_, i32>,
    ) -> Result<()> {
        let axis = shape::resolve_axis(axis, x.rank())?;
        if x.shape()[axis] == 0 {
            return Err(Error::ZeroLengthAxis { axis });
        }
        let out_shape = reduce_output_shape(x.shape(), &[axis]);
        if out.shape() != out_shape.as_slice() {
            return Err(Error::shape_mismatch(&out_shape, out.shape()));
        }
        if out.numel() == 0 {
            return Ok(());
        }

        let (outer, len, inner) = axis_decompose(x.shape(), axis);
        let find_max = arg == ArgReduce::Max;
        let src = x.ptr() as usize;
        let dst = out.ptr_mut() as usize;
        let row = len * inner;
        let chunk = (self.min_parallel_len() / row.max(1)).max(1);
        let tasks = outer.div_ceil(chunk);
        self.for_each_task(tasks, chunk * inner, |t| {
            let o0 = t * chunk;
            let rows = chunk.min(outer - o0);
            unsafe {
                reduce::arg_reduce(
                    (src as *const T).add(o0 * row),
                    (dst as *mut i32).add(o0 * inner),
                    rows,
                    len,
                    inner,
                    find_max,
                    select_last,
                );
            }
        });
        Ok(())
    }

    /// Cumulative sum along one axis
    ///
    /// `exclusive` shifts the scan by one position (first output 0);
    /// `reverse` scans from the high end. `out` matches the input shape.
    pub fn cumsum<T: Element>(
        &self,
        x: TensorView<'_, T>,
        axis: isize,
        exclusive: bool,
        reverse: bool,
        out: &mut TensorViewMut<'_, T>,
    ) -> Result<()> {
        let axis = shape::resolve_axis(axis, x.rank())?;
        if out.shape() != x.shape() {
            return Err(Error::shape_mismatch(x.shape(), out.shape()));
        }
        if x.numel() == 0 {
            return Ok(());
        }

        let (outer, len, inner) = axis_decompose(x.shape(), axis);
        let src = x.ptr() as usize;
        let dst = out.ptr_mut() as usize;
        let row = len * inner;
        let chunk = (self.min_parallel_len() / row.max(1)).max(1);
        let tasks = outer.div_ceil(chunk);
        self.for_each_task(tasks, chunk * row, |t| {
            let o0 = t * chunk;
            let rows = chunk.min(outer - o0);
            unsafe {
                cumsum::cumsum(
                    (src as *const T).add(o0 * row),
                    (dst as *mut T).add(o0 * row),
                    rows,
                    len,
                    inner,
                    exclusive,
                    reverse,
                );
            }
        });
        Ok(())
    }

    /// Softmax (or log-softmax) along one axis
    pub fn softmax(
        &self,
        x: TensorView<'_, f32>,
        axis: isize,
        log: bool,
        out: &mut TensorViewMut<'_, f32>,
    ) -> Result<()> {
        let axis = shape::resolve_axis(axis, x.rank())?;
        if out.shape() != x.shape() {
            return Err(Error::shape_mismatch(x.shape(), out.shape()));
        }
        if x.numel() == 0 {
            return Ok(());
        }

        let (outer, len, inner) = axis_decompose(x.shape(), axis);
        let src = x.ptr() as usize;
        let dst = out.ptr_mut() as usize;
        let row = len * inner;
        let chunk = (self.min_parallel_len() / row.max(1)).max(1);
        let tasks = outer.div_ceil(chunk);
        self.for_each_task(tasks, chunk * row, |t| {
            let o0 = t * chunk;
            let rows = chunk.min(outer - o0);
            unsafe {
                softmax::softmax(
                    (src as *const f32).add(o0 * row),
                    (dst as *mut f32).add(o0 * row),
                    rows,
                    len,
                    inner,
                    log,
                );
            }
        });
        Ok(())
    }
}
