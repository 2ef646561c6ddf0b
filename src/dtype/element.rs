//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::cmp::Ordering;
use std::ops::{Add, Div, Mul, Neg, Rem, Sub};

/// Trait for types that can be elements of a tensor buffer
///
/// Connects Rust's type system to the runtime [`DType`] tag. Implemented for
/// `f32` and `i32`, the two element types this engine executes.
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - basic kernel requirements
/// - `Pod + Zeroable` - safe memory transmutation (bytemuck)
/// - arithmetic ops with `Output = Self`
/// - `PartialOrd` - comparison for min/max
pub trait Element:
    Copy
    + Send
    + Sync
    + Pod
    + Zeroable
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Rem<Output = Self>
    + Neg<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Total ordering over the raw representation
    ///
    /// For floats this is a bit-pattern compare (`f32::total_cmp`), not an
    /// IEEE754 partial compare. Argmin/argmax rely on it so that NaN inputs
    /// produce consistent, deterministic tie-breaks.
    fn total_order(self, other: Self) -> Ordering;

    /// Bitwise AND on the integer representation
    fn bit_and(self, other: Self) -> Self;

    /// Bitwise OR on the integer representation
    fn bit_or(self, other: Self) -> Self;

    /// Bitwise XOR on the integer representation
    fn bit_xor(self, other: Self) -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn total_order(self, other: Self) -> Ordering {
        self.total_cmp(&other)
    }

    #[inline]
    fn bit_and(self, other: Self) -> Self {
        f32::from_bits(self.to_bits() & other.to_bits())
    }

    #[inline]
    fn bit_or(self, other: Self) -> Self {
        f32::from_bits(self.to_bits() | other.to_bits())
    }

    #[inline]
    fn bit_xor(self, other: Self) -> Self {
        f32::from_bits(self.to_bits() ^ other.to_bits())
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i32
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }

    #[inline]
    fn total_order(self, other: Self) -> Ordering {
        self.cmp(&other)
    }

    #[inline]
    fn bit_and(self, other: Self) -> Self {
        self & other
    }

    #[inline]
    fn bit_or(self, other: Self) -> Self {
        self | other
    }

    #[inline]
    fn bit_xor(self, other: Self) -> Self {
        self ^ other
    }
}
