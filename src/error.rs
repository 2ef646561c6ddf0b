//! Error types for opkern

use thiserror::Error;

/// Result type alias using opkern's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when dispatching a kernel
///
/// All variants represent caller-contract violations caught in the dispatch
/// layer before any kernel runs. Kernels themselves are infallible.
#[derive(Error, Debug)]
pub enum Error {
    /// Shapes cannot be broadcast together
    #[error("cannot broadcast shapes {lhs:?} and {rhs:?}")]
    Broadcast {
        /// Left-hand side shape
        lhs: Vec<usize>,
        /// Right-hand side shape
        rhs: Vec<usize>,
    },

    /// Shape mismatch in an operation
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Invalid axis index (out of range after negative resolution)
    #[error("invalid axis {axis} for tensor with {rank} dimensions")]
    InvalidAxis {
        /// The invalid axis as given by the caller
        axis: isize,
        /// Number of dimensions
        rank: usize,
    },

    /// Tensor rank exceeds the fixed maximum
    #[error("rank {rank} exceeds maximum supported rank {max}")]
    RankOverflow {
        /// Requested rank
        rank: usize,
        /// Maximum supported rank
        max: usize,
    },

    /// Reduction over an axis of size zero has no identity
    #[error("cannot reduce axis {axis} of size 0")]
    ZeroLengthAxis {
        /// The resolved axis
        axis: usize,
    },

    /// Buffer length does not match the product of the shape
    #[error("buffer of {len} elements does not match shape {shape:?}")]
    BufferMismatch {
        /// Buffer length in elements
        len: usize,
        /// The declared shape
        shape: Vec<usize>,
    },

    /// Invalid argument provided to an operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

impl Error {
    /// Create a broadcast error
    pub fn broadcast(lhs: &[usize], rhs: &[usize]) -> Self {
        Self::Broadcast {
            lhs: lhs.to_vec(),
            rhs: rhs.to_vec(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }
}
