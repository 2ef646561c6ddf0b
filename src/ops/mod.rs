//! Operator dispatch layer
//!
//! One public method on [`crate::engine::Engine`] per tensor operator. This
//! layer owns all validation (shape compatibility, axis resolution, buffer
//! lengths) and the parallel chunk partition; the kernels it calls assume
//! validated inputs and are infallible.

mod binary;
mod conv;
mod lstm;
mod matmul;
mod reduce;
mod unary;

pub use matmul::MatmulParams;
pub use reduce::ArgReduce;
