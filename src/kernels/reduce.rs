//! Generic reduction kernels
//!
//! Every reduction runs over the same `[outer, reduce, inner]` decomposition.
//! `inner == 1` selects the horizontal loop (contiguous walk per output
//! element); `inner > 1` selects the vertical loop, which carries 8
//! independent accumulators across the strided reduce walk plus a scalar
//! tail.
//!
//! A chained reduction (axis fusion broke on a non-contiguous axis) applies
//! the element map only on the first pass and the finalizer only on the last:
//! L2 is square-sum on the first pass, plain sum on later passes, sqrt at the
//! end. LogSumExp is associative across passes so every pass runs the same
//! stabilized kernel.

use crate::dtype::Element;

/// Reduction kinds sharing the inner/reduce/outer decomposition
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceKind {
    /// Sum of elements
    Sum,
    /// Product of elements
    Prod,
    /// Minimum element
    Min,
    /// Maximum element
    Max,
    /// Sum of squares
    SumSquare,
    /// Sum of absolute values
    L1,
    /// Euclidean norm: `sqrt(sum(x^2))`
    L2,
    /// `log(sum(x))`
    LogSum,
    /// `log(sum(exp(x)))`, max-subtract stabilized
    LogSumExp,
    /// Arithmetic mean
    Mean,
}

/// Accumulation rule of one reduction pass
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Accum {
    Sum,
    Prod,
    Min,
    Max,
    LogSumExp,
}

/// Per-element transform applied while loading (first pass only)
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Map {
    Identity,
    Square,
    Abs,
}

/// Transform applied to the accumulated value (last pass only)
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) enum Finalize {
    None,
    Sqrt,
    Log,
    Scale(f64),
}

impl ReduceKind {
    pub(crate) fn accum(self) -> Accum {
        match self {
            ReduceKind::Prod => Accum::Prod,
            ReduceKind::Min => Accum::Min,
            ReduceKind::Max => Accum::Max,
            ReduceKind::LogSumExp => Accum::LogSumExp,
            _ => Accum::Sum,
        }
    }

    /// Load transform of the initial pass; chained continuation passes use
    /// [`Map::Identity`] instead.
    pub(crate) fn map(self) -> Map {
        match self {
            ReduceKind::SumSquare | ReduceKind::L2 => Map::Square,
            ReduceKind::L1 => Map::Abs,
            _ => Map::Identity,
        }
    }

    /// Finalizer of the terminal pass; `total_reduce` is the product of all
    /// reduced extents across the whole chain.
    pub(crate) fn finalize(self, total_reduce: usize) -> Finalize {
        match self {
            ReduceKind::L2 => Finalize::Sqrt,
            ReduceKind::LogSum => Finalize::Log,
            ReduceKind::Mean => Finalize::Scale(1.0 / total_reduce as f64),
            _ => Finalize::None,
        }
    }
}

#[inline]
fn map_fn<T: Element>(map: Map) -> fn(T) -> T {
    match map {
        Map::Identity => |v| v,
        Map::Square => |v| v * v,
        Map::Abs => |v| if v < T::zero() { -v } else { v },
    }
}

#[inline]
fn finish<T: Element>(acc: T, fin: Finalize) -> T {
    match fin {
        Finalize::None => acc,
        Finalize::Sqrt => T::from_f64(acc.to_f64().sqrt()),
        Finalize::Log => T::from_f64(acc.to_f64().ln()),
        Finalize::Scale(s) => T::from_f64(acc.to_f64() * s),
    }
}

/// One reduction pass over `[outer, reduce, inner]` into `[outer, inner]`
///
/// # Safety
/// `src` must be valid for `outer * reduce * inner` reads, `dst` for
/// `outer * inner` writes; they must not alias. `reduce > 0` and `inner > 0`
/// are dispatch-validated invariants.
pub unsafe fn reduce_pass<T: Element>(
    src: *const T,
    dst: *mut T,
    outer: usize,
    reduce: usize,
    inner: usize,
    accum: Accum,
    map: Map,
    fin: Finalize,
) {
    debug_assert!(reduce > 0 && inner > 0);
    let m = map_fn::<T>(map);
    match accum {
        Accum::Sum => fold_pass(src, dst, outer, reduce, inner, m, |a, b| a + b, fin),
        Accum::Prod => fold_pass(src, dst, outer, reduce, inner, m, |a, b| a * b, fin),
        Accum::Min => fold_pass(
            src,
            dst,
            outer,
            reduce,
            inner,
            m,
            |a, b| if b < a { b } else { a },
            fin,
        ),
        Accum::Max => fold_pass(
            src,
            dst,
            outer,
            reduce,
            inner,
            m,
            |a, b| if b > a { b } else { a },
            fin,
        ),
        Accum::LogSumExp => lse_pass(src, dst, outer, reduce, inner, fin),
    }
}

/// Fold-style pass shared by sum/prod/min/max
///
/// Seeds the accumulator from the first element so min/max need no identity
/// value.
#[allow(clippy::too_many_arguments)]
unsafe fn fold_pass<T: Element>(
    src: *const T,
    dst: *mut T,
    outer: usize,
    reduce: usize,
    inner: usize,
    m: fn(T) -> T,
    f: fn(T, T) -> T,
    fin: Finalize,
) {
    if inner == 1 {
        // Horizontal: each output element reduces a contiguous run.
        for o in 0..outer {
            let p = src.add(o * reduce);
            let mut acc = m(*p);
            for r in 1..reduce {
                acc = f(acc, m(*p.add(r)));
            }
            *dst.add(o) = finish(acc, fin);
        }
        return;
    }

    // Vertical: 8 output lanes at a time, strided walk down the reduce axis.
    for o in 0..outer {
        let base = src.add(o * reduce * inner);
        let dbase = dst.add(o * inner);
        let mut i0 = 0;
        while i0 + 8 <= inner {
            let p = base.add(i0);
            let mut acc = [
                m(*p),
                m(*p.add(1)),
                m(*p.add(2)),
                m(*p.add(3)),
                m(*p.add(4)),
                m(*p.add(5)),
                m(*p.add(6)),
                m(*p.add(7)),
            ];
            for r in 1..reduce {
                let row = p.add(r * inner);
                for j in 0..8 {
                    acc[j] = f(acc[j], m(*row.add(j)));
                }
            }
            for j in 0..8 {
                *dbase.add(i0 + j) = finish(acc[j], fin);
            }
            i0 += 8;
        }
        for i in i0..inner {
            let p = base.add(i);
            let mut acc = m(*p);
            for r in 1..reduce {
                acc = f(acc, m(*p.add(r * inner)));
            }
            *dbase.add(i) = finish(acc, fin);
        }
    }
}

/// Stabilized log-sum-exp pass: two walks per output lane (max, then exp-sum)
unsafe fn lse_pass<T: Element>(
    src: *const T,
    dst: *mut T,
    outer: usize,
    reduce: usize,
    inner: usize,
    fin: Finalize,
) {
    for o in 0..outer {
        let base = src.add(o * reduce * inner);
        let dbase = dst.add(o * inner);
        for i in 0..inner {
            let p = base.add(i);
            let mut mx = (*p).to_f64();
            for r in 1..reduce {
                let v = (*p.add(r * inner)).to_f64();
                if v > mx {
                    mx = v;
                }
            }
            let mut s = 0.0f64;
            for r in 0..reduce {
                s += ((*p.add(r * inner)).to_f64() - mx).exp();
            }
            *dbase.add(i) = finish(T::from_f64(s.ln() + mx), fin);
        }
    }
}

/// Argmin/argmax over `[outer, reduce, inner]`, writing i32 indices
///
/// Comparison is the total order over the raw representation (bit-pattern
/// compare for floats), so NaN inputs give deterministic results. With
/// `select_last` false the earliest extremum index wins ties; true keeps the
/// latest.
///
/// # Safety
/// `src` must be valid for `outer * reduce * inner` reads, `dst` for
/// `outer * inner` writes; they must not alias.
pub unsafe fn arg_reduce<T: Element>(
    src: *const T,
    dst: *mut i32,
    outer: usize,
    reduce: usize,
    inner: usize,
    find_max: bool,
    select_last: bool,
) {
    use std::cmp::Ordering;
    debug_assert!(reduce > 0 && inner > 0);
    for o in 0..outer {
        let base = src.add(o * reduce * inner);
        let dbase = dst.add(o * inner);
        for i in 0..inner {
            let p = base.add(i);
            let mut best = *p;
            let mut best_idx = 0i32;
            for r in 1..reduce {
                let v = *p.add(r * inner);
                let ord = v.total_order(best);
                let better = if find_max {
                    if select_last {
                        ord != Ordering::Less
                    } else {
                        ord == Ordering::Greater
                    }
                } else if select_last {
                    ord != Ordering::Greater
                } else {
                    ord == Ordering::Less
                };
                if better {
                    best = v;
                    best_idx = r as i32;
                }
            }
            *dbase.add(i) = best_idx;
        }
    }
}
