//! Algorithm contracts for runtime backends
//!
//! Backend-neutral pieces of the linewise engine. Everything here is pure
//! arithmetic on addresses and extents; backends consume the resulting
//! [`linewise::LinewisePlan`] through the [`linewise::LinewiseAlgorithm`]
//! trait and only decide how to launch it.
//!
//! - [`pow2`] - power-of-two rounding and transaction widths
//! - [`vectorized`] - wide load/store descriptor
//! - [`aligned`] - head / aligned body / tail partition
//! - [`grid`] - occupancy-aware grid sizing for both strategies
//! - [`linewise`] - configuration, planning and the orchestrator

pub mod aligned;
pub mod grid;
pub mod linewise;
pub mod pow2;
pub mod vectorized;

pub use aligned::AlignedSplit;
pub use linewise::{LinewiseAlgorithm, LinewiseConfig, LinewisePlan, MatrixLinewiseOp, Strategy};
pub use pow2::{Pow2, VecWidth};
pub use vectorized::{TxN, VecLayout};
