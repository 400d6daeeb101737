//! CPU kernel implementations
//!
//! Kernels are generic over `T: Element` and the operator, and are written
//! against the simulated SIMT model of [`super::simt`].

pub mod linewise;

pub use linewise::{VecArgs, VecColsMain, VecColsTail, VecRowsMain, VecRowsTail};
