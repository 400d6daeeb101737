//! Runtime backends for linewise kernels
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the simulated SIMT CPU device and (behind the `cuda` feature) NVIDIA GPUs.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU, reports DeviceProperties)
//! ├── Client (owns one ordered execution stream, launches kernels)
//! └── Allocator (stream-ordered memory management)
//! ```
//!
//! All launches issued through one client execute in issue order and are
//! asynchronous relative to the issuing thread; completion is observed only
//! through [`RuntimeClient::synchronize`].

mod allocator;
mod buffer;
mod launch;
mod ptr;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use allocator::Allocator;
pub use buffer::DeviceBuffer;
pub use launch::{LaunchConfig, LaunchError};
pub use ptr::DevicePtr;

use crate::error::{Error, Result};

/// Core trait for compute backends
///
/// `Runtime` abstracts over different compute devices (CPU, GPU, etc.).
/// It uses static dispatch via generics for zero-cost abstraction.
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching operations
    type Client: RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: Allocator;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Copy data from host to device
    ///
    /// The caller is responsible for ordering the copy after pending work
    /// that touches `dst` (see [`DeviceBuffer::copy_from_slice`]).
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle operation dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Hardware limits of the device, used for launch validation and grid sizing
    fn properties(&self) -> &DeviceProperties;

    /// Wait for all pending operations on this client's stream to complete
    ///
    /// Returns the first device fault raised by a launch since the last
    /// synchronization, if any.
    fn synchronize(&self) -> Result<()>;

    /// Get the allocator for this client
    fn allocator(&self) -> &R::Allocator;
}

/// Execution limits of a device
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DeviceProperties {
    /// Number of streaming multiprocessors
    pub sm_count: u32,
    /// Largest block a kernel may be launched with
    pub max_threads_per_block: u32,
    /// Threads per warp
    pub warp_size: u32,
    /// Static + dynamic shared memory available to one block, in bytes
    pub max_shared_mem_per_block: u32,
    /// Largest grid (x dimension)
    pub max_grid_dim: u32,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            sm_count: 1,
            max_threads_per_block: 1024,
            warp_size: 32,
            max_shared_mem_per_block: 48 * 1024,
            max_grid_dim: i32::MAX as u32,
        }
    }
}

impl DeviceProperties {
    /// Reject limits no launch can satisfy
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("sm_count", self.sm_count),
            ("max_threads_per_block", self.max_threads_per_block),
            ("warp_size", self.warp_size),
            ("max_grid_dim", self.max_grid_dim),
        ];
        for (arg, value) in fields {
            if value == 0 {
                return Err(Error::InvalidArgument {
                    arg,
                    reason: "device property must be nonzero".to_string(),
                });
            }
        }
        Ok(())
    }
}
