//! CPU tensor-execution kernels for neural-network inference
//!
//! `opkern` executes the operator workloads of an inference runtime on dense,
//! row-major, caller-owned buffers: broadcast elementwise arithmetic,
//! reductions and scans, softmax, cache-blocked GEMM with runtime SIMD
//! dispatch, grouped N-dimensional convolution, and fused LSTM timesteps.
//!
//! The engine owns no tensor storage and no graph. Construct an [`Engine`],
//! hand each call input [`TensorView`]s and a pre-allocated output
//! [`TensorViewMut`], and the call returns once every parallel chunk has
//! completed:
//!
//! ```
//! use opkern::{BinaryOp, Engine, TensorView, TensorViewMut};
//!
//! let engine = Engine::default();
//! let a = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let b = [10.0f32, 20.0, 30.0];
//! let mut out = [0.0f32; 6];
//!
//! let av = TensorView::new(&a, &[2, 3])?;
//! let bv = TensorView::new(&b, &[3])?;
//! let mut ov = TensorViewMut::new(&mut out, &[2, 3])?;
//! engine.binary(BinaryOp::Add, av, bv, &mut ov)?;
//! assert_eq!(out, [11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
//! # Ok::<(), opkern::Error>(())
//! ```
//!
//! Layering: [`ops`] is the public dispatch surface (validation and parallel
//! partitioning), [`kernels`] the raw compute underneath. Results are
//! deterministic for a fixed engine configuration and detected SIMD level.

pub mod broadcast;
pub mod dtype;
pub mod engine;
pub mod error;
pub mod kernels;
pub mod ops;
pub mod shape;
pub mod tensor;

pub use dtype::{DType, Element};
pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use kernels::conv::ConvParams;
pub use kernels::elementwise::{BinaryOp, CompareOp, UnaryOp};
pub use kernels::lstm::{GateActivation, LstmConfig};
pub use kernels::reduce::ReduceKind;
pub use ops::{ArgReduce, MatmulParams};
pub use shape::MAX_RANK;
pub use tensor::{TensorView, TensorViewMut};
