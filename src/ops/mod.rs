//! Linewise operations
//!
//! ```text
//! matrix_vector_op / linewise_op     (layout-aware, checked views)
//!   └── MatrixLinewiseOp::run        (raw device pointers, planning)
//!         └── LinewiseAlgorithm<R>   (per-backend kernel launches)
//! ```
//!
//! Operators are anything implementing [`LinewiseFn`]: a named [`BinaryOp`]
//! (which every backend supports) or a host closure (CPU backend only).

mod arithmetic;
mod matrix;
pub mod reference;

pub use arithmetic::{BinaryOp, LinewiseFn, linewise_fn};
pub use matrix::{
    Layout, MatrixView, MatrixViewMut, VectorView, linewise_op, linewise_op_inplace,
    linewise_op_with_config, matrix_vector_op,
};
