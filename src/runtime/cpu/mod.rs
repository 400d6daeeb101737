//! CPU runtime implementation
//!
//! The CPU runtime simulates a SIMT device on the host: device memory is
//! 256-byte aligned heap memory, launches are queued on an ordered stream
//! served by a worker thread, and each launch runs its grid of blocks in
//! parallel. Kernels are written with the same thread/warp/block
//! decomposition a GPU kernel would use, so the CPU backend exercises the
//! exact work distribution of the device kernels.

mod client;
mod device;
pub(crate) mod kernels;
mod linewise;
mod runtime;
pub mod simt;
mod stream;

pub use client::{CPU_ALLOC_ALIGN, CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
pub use stream::CpuStream;
