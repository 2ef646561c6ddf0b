//! Elementwise kernel catalog and broadcast execution driver
//!
//! Each operator is a pure scalar function; one generic driver owns iterator
//! stepping and span chunking for every operator. Binary kernels pick one of
//! three inner loops per contiguous span (x replicated, y replicated, or both
//! strided) so the hot loop is branch-free.

use std::cmp::Ordering;

use crate::broadcast::BroadcastIter;
use crate::dtype::Element;

/// Binary elementwise operators
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    /// `x + y`
    Add,
    /// `x - y`
    Sub,
    /// `x * y`
    Mul,
    /// `x / y` (IEEE754 for floats; integer division truncates)
    Div,
    /// `x ^ y` computed in f64
    Pow,
    /// Larger of the two operands
    Max,
    /// Smaller of the two operands
    Min,
    /// `x >= 0 ? x : x * y` with y broadcast as the slope
    PRelu,
    /// Remainder with the sign of the divisor: `((x % y) + y) % y`
    Mod,
    /// Truncating remainder with the sign of the dividend (C `fmod`)
    FMod,
    /// Bitwise AND on the integer representation
    And,
    /// Bitwise OR on the integer representation
    Or,
    /// Bitwise XOR on the integer representation
    Xor,
}

/// Comparison operators producing `{0, 1}` as i32
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CompareOp {
    /// `x == y`
    Eq,
    /// `x != y`
    Ne,
    /// `x < y`
    Lt,
    /// `x <= y`
    Le,
    /// `x > y`
    Gt,
    /// `x >= y`
    Ge,
}

/// Unary elementwise operators
///
/// Transcendentals are computed in f64 and converted back, so the i32
/// instantiations stay well-defined.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `|x|`
    Abs,
    /// Square root
    Sqrt,
    /// Natural exponent
    Exp,
    /// Natural log
    Log,
    /// `1 / (1 + exp(-x))`
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// `max(x, 0)`
    Relu,
    /// `x >= 0 ? x : alpha * x`
    LeakyRelu(f64),
    /// Gauss error function
    Erf,
    /// Round toward negative infinity
    Floor,
    /// Round toward positive infinity
    Ceil,
    /// Round half away from zero
    Round,
    /// `1 / x`
    Reciprocal,
    /// `x * x`
    Square,
}

/// Scalar function for a binary operator
#[inline]
pub fn binary_fn<T: Element>(op: BinaryOp) -> fn(T, T) -> T {
    match op {
        BinaryOp::Add => |x, y| x + y,
        BinaryOp::Sub => |x, y| x - y,
        BinaryOp::Mul => |x, y| x * y,
        BinaryOp::Div => |x, y| x / y,
        BinaryOp::Pow => |x: T, y: T| T::from_f64(x.to_f64().powf(y.to_f64())),
        BinaryOp::Max => |x, y| if matches!(x.partial_cmp(&y), Some(Ordering::Less)) { y } else { x },
        BinaryOp::Min => |x, y| if matches!(y.partial_cmp(&x), Some(Ordering::Less)) { y } else { x },
        BinaryOp::PRelu => |x, y| if x >= T::zero() { x } else { x * y },
        // Euclidean-style remainder: result carries the divisor's sign.
        BinaryOp::Mod => |x: T, y: T| ((x % y) + y) % y,
        BinaryOp::FMod => |x, y| x % y,
        BinaryOp::And => T::bit_and,
        BinaryOp::Or => T::bit_or,
        BinaryOp::Xor => T::bit_xor,
    }
}

/// Scalar predicate for a comparison operator
#[inline]
pub fn compare_fn<T: Element>(op: CompareOp) -> fn(T, T) -> i32 {
    match op {
        CompareOp::Eq => |x, y| (x == y) as i32,
        CompareOp::Ne => |x, y| (x != y) as i32,
        CompareOp::Lt => |x, y| (x < y) as i32,
        CompareOp::Le => |x, y| (x <= y) as i32,
        CompareOp::Gt => |x, y| (x > y) as i32,
        CompareOp::Ge => |x, y| (x >= y) as i32,
    }
}

/// Scalar function for a unary operator
#[inline]
pub fn unary_fn<T: Element>(op: UnaryOp) -> impl Fn(T) -> T + Copy {
    move |x: T| match op {
        UnaryOp::Neg => -x,
        UnaryOp::Abs => {
            if x < T::zero() {
                -x
            } else {
                x
            }
        }
        UnaryOp::Sqrt => T::from_f64(x.to_f64().sqrt()),
        UnaryOp::Exp => T::from_f64(x.to_f64().exp()),
        UnaryOp::Log => T::from_f64(x.to_f64().ln()),
        UnaryOp::Sigmoid => T::from_f64(1.0 / (1.0 + (-x.to_f64()).exp())),
        UnaryOp::Tanh => T::from_f64(x.to_f64().tanh()),
        UnaryOp::Relu => {
            if x < T::zero() {
                T::zero()
            } else {
                x
            }
        }
        UnaryOp::LeakyRelu(alpha) => {
            if x < T::zero() {
                T::from_f64(x.to_f64() * alpha)
            } else {
                x
            }
        }
        UnaryOp::Erf => T::from_f64(erf(x.to_f64())),
        UnaryOp::Floor => T::from_f64(x.to_f64().floor()),
        UnaryOp::Ceil => T::from_f64(x.to_f64().ceil()),
        UnaryOp::Round => T::from_f64(x.to_f64().round()),
        UnaryOp::Reciprocal => T::one() / x,
        UnaryOp::Square => x * x,
    }
}

/// Abramowitz & Stegun 7.1.26 rational approximation, |error| < 1.5e-7
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Unary kernel over a contiguous range
///
/// # Safety
/// `src` and `dst` must each be valid for `len` elements and must not alias.
pub unsafe fn unary_contiguous<T: Element>(
    op: UnaryOp,
    src: *const T,
    dst: *mut T,
    len: usize,
) {
    let f = unary_fn::<T>(op);
    for i in 0..len {
        *dst.add(i) = f(*src.add(i));
    }
}

/// Binary kernel over same-shape contiguous inputs
///
/// # Safety
/// All pointers must be valid for `len` elements; `dst` must not alias the
/// inputs.
pub unsafe fn binary_contiguous<T: Element>(
    op: BinaryOp,
    a: *const T,
    b: *const T,
    dst: *mut T,
    len: usize,
) {
    let f = binary_fn::<T>(op);
    for i in 0..len {
        *dst.add(i) = f(*a.add(i), *b.add(i));
    }
}

/// Comparison kernel over same-shape contiguous inputs
///
/// # Safety
/// All pointers must be valid for `len` elements; `dst` must not alias the
/// inputs.
pub unsafe fn compare_contiguous<T: Element>(
    op: CompareOp,
    a: *const T,
    b: *const T,
    dst: *mut i32,
    len: usize,
) {
    let f = compare_fn::<T>(op);
    for i in 0..len {
        *dst.add(i) = f(*a.add(i), *b.add(i));
    }
}

/// One contiguous span of a broadcast binary kernel
///
/// `step_a`/`step_b` are 0 (replicated input) or 1 (advancing input); the
/// variant is chosen once per span, never per element.
///
/// # Safety
/// `a`/`b` must be valid for `len` strided elements at their step, `dst` for
/// `len` contiguous writes; `dst` must not alias the inputs.
#[inline]
unsafe fn binary_span<T: Element>(
    f: fn(T, T) -> T,
    a: *const T,
    b: *const T,
    dst: *mut T,
    len: usize,
    step_a: usize,
    step_b: usize,
) {
    match (step_a, step_b) {
        (1, 1) => {
            for i in 0..len {
                *dst.add(i) = f(*a.add(i), *b.add(i));
            }
        }
        (0, 1) => {
            let xa = *a;
            for i in 0..len {
                *dst.add(i) = f(xa, *b.add(i));
            }
        }
        (1, 0) => {
            let yb = *b;
            for i in 0..len {
                *dst.add(i) = f(*a.add(i), yb);
            }
        }
        _ => {
            let v = f(*a, *b);
            for i in 0..len {
                *dst.add(i) = v;
            }
        }
    }
}

#[inline]
unsafe fn compare_span<T: Element>(
    f: fn(T, T) -> i32,
    a: *const T,
    b: *const T,
    dst: *mut i32,
    len: usize,
    step_a: usize,
    step_b: usize,
) {
    match (step_a, step_b) {
        (1, 1) => {
            for i in 0..len {
                *dst.add(i) = f(*a.add(i), *b.add(i));
            }
        }
        (0, 1) => {
            let xa = *a;
            for i in 0..len {
                *dst.add(i) = f(xa, *b.add(i));
            }
        }
        (1, 0) => {
            let yb = *b;
            for i in 0..len {
                *dst.add(i) = f(*a.add(i), yb);
            }
        }
        _ => {
            let v = f(*a, *b);
            for i in 0..len {
                *dst.add(i) = v;
            }
        }
    }
}

/// Broadcast binary kernel over an output range `[start, start + len)`
///
/// The iterators are positioned internally; the range must be a whole number
/// of innermost-axis spans so no span straddles the range boundary.
///
/// # Safety
/// Pointers must cover the full (broadcast) extents of their tensors; `dst`
/// must be valid for the output range and not alias the inputs.
#[allow(clippy::too_many_arguments)]
pub unsafe fn binary_broadcast<T: Element>(
    op: BinaryOp,
    a: *const T,
    iter_a: &mut BroadcastIter,
    b: *const T,
    iter_b: &mut BroadcastIter,
    dst: *mut T,
    start: usize,
    len: usize,
) {
    let f = binary_fn::<T>(op);
    iter_a.initial_offset(start);
    iter_b.initial_offset(start);
    let mut done = 0;
    while done < len {
        let span = iter_a.span_size().min(iter_b.span_size()).min(len - done);
        binary_span(
            f,
            a.add(iter_a.offset()),
            b.add(iter_b.offset()),
            dst.add(start + done),
            span,
            iter_a.inner_step(),
            iter_b.inner_step(),
        );
        iter_a.advance(span);
        iter_b.advance(span);
        done += span;
    }
}

/// Broadcast comparison kernel over an output range (see [`binary_broadcast`])
///
/// # Safety
/// Same contract as [`binary_broadcast`].
#[allow(clippy::too_many_arguments)]
pub unsafe fn compare_broadcast<T: Element>(
    op: CompareOp,
    a: *const T,
    iter_a: &mut BroadcastIter,
    b: *const T,
    iter_b: &mut BroadcastIter,
    dst: *mut i32,
    start: usize,
    len: usize,
) {
    let f = compare_fn::<T>(op);
    iter_a.initial_offset(start);
    iter_b.initial_offset(start);
    let mut done = 0;
    while done < len {
        let span = iter_a.span_size().min(iter_b.span_size()).min(len - done);
        compare_span(
            f,
            a.add(iter_a.offset()),
            b.add(iter_b.offset()),
            dst.add(start + done),
            span,
            iter_a.inner_step(),
            iter_b.inner_step(),
        );
        iter_a.advance(span);
        iter_b.advance(span);
        done += span;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mod_sign_follows_divisor() {
        let f = binary_fn::<i32>(BinaryOp::Mod);
        assert_eq!(f(5, 3), 2);
        assert_eq!(f(-5, 3), 1);
        assert_eq!(f(5, -3), -1);
        assert_eq!(f(-5, -3), -2);
    }

    #[test]
    fn test_fmod_sign_follows_dividend() {
        let f = binary_fn::<f32>(BinaryOp::FMod);
        assert_eq!(f(5.5, 3.0), 2.5);
        assert_eq!(f(-5.5, 3.0), -2.5);
        assert_eq!(f(5.5, -3.0), 2.5);
    }

    #[test]
    fn test_prelu() {
        let f = binary_fn::<f32>(BinaryOp::PRelu);
        assert_eq!(f(2.0, 0.1), 2.0);
        assert_eq!(f(-2.0, 0.1), -0.2);
        assert_eq!(f(0.0, 0.1), 0.0);
    }

    #[test]
    fn test_compare_produces_zero_one() {
        let f = compare_fn::<f32>(CompareOp::Lt);
        assert_eq!(f(1.0, 2.0), 1);
        assert_eq!(f(2.0, 1.0), 0);
    }

    #[test]
    fn test_bitwise_on_int_representation() {
        let f = binary_fn::<i32>(BinaryOp::Xor);
        assert_eq!(f(0b1100, 0b1010), 0b0110);
    }

    #[test]
    fn test_erf_reference_values() {
        assert!((erf(0.0)).abs() < 1e-7);
        assert!((erf(1.0) - 0.8427007929).abs() < 1e-6);
        assert!((erf(-1.0) + 0.8427007929).abs() < 1e-6);
    }

    #[test]
    fn test_binary_broadcast_spans() {
        // [2, 3] + [3] broadcast over rows
        let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [10.0f32, 20.0, 30.0];
        let (_, mut ia, mut ib) = crate::broadcast::prepare(&[2, 3], &[3]).unwrap();
        let mut out = [0.0f32; 6];
        unsafe {
            binary_broadcast(
                BinaryOp::Add,
                a.as_ptr(),
                &mut ia,
                b.as_ptr(),
                &mut ib,
                out.as_mut_ptr(),
                0,
                6,
            );
        }
        assert_eq!(out, [11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }
}
