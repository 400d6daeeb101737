//! CUDA kernels for the linewise engine
//!
//! Kernels are written in CUDA C++ (`linewise.cu`) and compiled to PTX by
//! build.rs. The PTX is loaded at runtime and cached per-device.
//!
//! - `loader` - PTX loading, module cache, launch configuration
//! - `linewise` - symbol naming and launch of the four linewise kernels

pub mod linewise;
pub mod loader;

pub use linewise::{KernelRole, LinewiseKernelArgs, MAX_DEVICE_VECS, launch_linewise_kernel, linewise_symbol};
