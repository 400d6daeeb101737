//! CUDA runtime implementation
//!
//! GPU execution of the linewise kernels via cudarc.
//!
//! - `CudaDevice` - a CUDA GPU and its launch limits
//! - `CudaClient` - context, stream and stream-ordered allocator
//! - `CudaRuntime` - implements the generic Runtime trait
//!
//! Device faults surface as errors from `RuntimeClient::synchronize`, and a
//! device that cannot be opened by `Runtime::default_client` aborts the
//! process.

mod cache;
mod client;
mod device;
mod kernels;
mod linewise;
mod runtime;

pub use client::{CudaAllocator, CudaClient};
pub use device::CudaDevice;
pub use runtime::{CudaRuntime, is_cuda_available};
