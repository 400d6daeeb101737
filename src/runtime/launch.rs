//! Kernel launch configuration

use super::DeviceProperties;
use thiserror::Error;

/// One-dimensional launch shape: `grid_dim` blocks of `block_dim` threads
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Number of blocks
    pub grid_dim: u32,
    /// Threads per block
    pub block_dim: u32,
    /// Shared memory per block in bytes
    pub shared_mem_bytes: u32,
}

/// Reasons a device rejects a launch configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Grid is empty or exceeds the device limit
    #[error("invalid grid dimension {grid_dim} (device limit {max})")]
    InvalidGrid {
        /// Requested grid size
        grid_dim: u32,
        /// Device limit
        max: u32,
    },

    /// Block is empty, exceeds the device limit or is not a whole number of warps
    #[error("invalid block dimension {block_dim} (device limit {max}, warp size {warp_size})")]
    InvalidBlock {
        /// Requested block size
        block_dim: u32,
        /// Device limit
        max: u32,
        /// Warp size of the device
        warp_size: u32,
    },

    /// Shared memory request exceeds what one block may use
    #[error("too many resources requested: {requested} bytes of shared memory (limit {max})")]
    OutOfSharedMemory {
        /// Requested bytes
        requested: u32,
        /// Device limit
        max: u32,
    },

    /// The stream can no longer accept work
    #[error("stream is closed")]
    StreamClosed,
}

impl LaunchConfig {
    /// Build a launch configuration
    pub const fn new(grid_dim: u32, block_dim: u32, shared_mem_bytes: u32) -> Self {
        Self {
            grid_dim,
            block_dim,
            shared_mem_bytes,
        }
    }

    /// Check the configuration against device limits
    pub fn validate(&self, props: &DeviceProperties) -> Result<(), LaunchError> {
        if self.grid_dim == 0 || self.grid_dim > props.max_grid_dim {
            return Err(LaunchError::InvalidGrid {
                grid_dim: self.grid_dim,
                max: props.max_grid_dim,
            });
        }
        if self.block_dim == 0
            || self.block_dim > props.max_threads_per_block
            || self.block_dim.checked_rem(props.warp_size) != Some(0)
        {
            return Err(LaunchError::InvalidBlock {
                block_dim: self.block_dim,
                max: props.max_threads_per_block,
                warp_size: props.warp_size,
            });
        }
        if self.shared_mem_bytes > props.max_shared_mem_per_block {
            return Err(LaunchError::OutOfSharedMemory {
                requested: self.shared_mem_bytes,
                max: props.max_shared_mem_per_block,
            });
        }
        Ok(())
    }
}
