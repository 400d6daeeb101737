//! # linewise
//!
//! **Broadcast-elementwise engine for device-resident matrices.**
//!
//! linewise applies one or more vectors across a 2-D matrix stored in
//! row-major or column-major order: `out[i] = op(in[i], v0[idx(i)], ...)`,
//! where `idx(i)` is either the row of element `i` or its position in the
//! row. The work is split into an unaligned head, a wide-load aligned body
//! and an unaligned tail, and enqueued asynchronously on the client's stream.
//!
//! ## Features
//!
//! - **Alignment-aware**: picks the widest transaction (up to 16 bytes) at
//!   which input and output line up, for any pointer offset
//! - **Two strategies**: blocked (`vectorCols`) for per-row vectors, striped
//!   with shared-memory staging (`vectorRows`) for per-column vectors
//! - **Occupancy-aware grid sizing**, tunable through [`algorithm::LinewiseConfig`]
//! - **Backends**: a simulated SIMT CPU device (always built) and CUDA
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use linewise::prelude::*;
//!
//! let client = CpuRuntime::default_client(&CpuRuntime::default_device());
//! let m = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[1., 2., 3., 4., 5., 6.])?;
//! let v = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[10., 20.])?;
//! let mut out = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 6)?;
//!
//! let input = MatrixView::new(&m, 2, 3, Layout::RowMajor)?;
//! let mut output = MatrixViewMut::new(&mut out, 2, 3, Layout::RowMajor)?;
//! matrix_vector_op(&client, &mut output, &input, &[(&v).into()], false, BinaryOp::Sub)?;
//! assert_eq!(out.to_vec(&client)?, vec![-9., -8., -7., -16., -15., -14.]);
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): run simulated blocks in parallel on the CPU backend
//! - `cuda`: NVIDIA CUDA backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::{LinewiseAlgorithm, LinewiseConfig, MatrixLinewiseOp, VecWidth};
    pub use crate::dtype::{DType, Element, IndexType};
    pub use crate::error::{Error, Result, fail_fast};
    pub use crate::ops::{
        BinaryOp, Layout, LinewiseFn, MatrixView, MatrixViewMut, VectorView, linewise_fn, linewise_op,
        linewise_op_inplace, matrix_vector_op,
    };
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    pub use crate::runtime::{DeviceBuffer, DevicePtr, Device, Runtime, RuntimeClient};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::CudaRuntime;
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
