//! Raw compute kernels
//!
//! Everything in this module operates on typed raw pointers or slices with
//! pre-validated lengths; validation and parallel dispatch live in [`crate::ops`].
//! Kernels are infallible and never allocate except for documented transient
//! scratch (GEMM packing buffers, im2col columns).

pub mod conv;
pub mod cumsum;
pub mod elementwise;
pub mod gemm;
pub mod lstm;
pub mod reduce;
pub mod simd;
pub mod softmax;
