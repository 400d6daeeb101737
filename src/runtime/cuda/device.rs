//! CUDA Device implementation
//!
//! Provides CUDA device abstraction using cudarc for direct GPU control.

use cudarc::driver::sys::CUdevice_attribute;

use crate::error::Result;
use crate::runtime::{Device, DeviceProperties};

/// CUDA Device using cudarc
///
/// Identifies one GPU by ordinal. Launch limits are read from the driver when
/// a client is created for it.
#[derive(Clone, Debug)]
pub struct CudaDevice {
    /// Index of the GPU device (0, 1, 2, ...)
    pub(crate) index: usize,
}

impl CudaDevice {
    /// Create a new CUDA device
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    fn attribute(&self, attr: CUdevice_attribute) -> Result<i32> {
        let device = cudarc::driver::result::device::get(self.index as i32)?;
        Ok(unsafe { cudarc::driver::result::device::get_attribute(device, attr) }?)
    }

    /// Get the compute capability of this CUDA device
    ///
    /// Returns (major, minor) version numbers (e.g., (8, 6) for sm_86)
    pub fn compute_capability(&self) -> Result<(u32, u32)> {
        let major = self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR)?;
        let minor = self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR)?;
        Ok((major as u32, minor as u32))
    }

    /// Query the launch limits used for grid sizing and launch validation
    ///
    /// Requires the driver to be initialized (a context exists for the device).
    pub fn properties(&self) -> Result<DeviceProperties> {
        let get = |attr| self.attribute(attr).map(|v| v.max(1) as u32);
        Ok(DeviceProperties {
            sm_count: get(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)?,
            max_threads_per_block: get(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)?,
            warp_size: get(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_WARP_SIZE)?,
            max_shared_mem_per_block: get(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_SHARED_MEMORY_PER_BLOCK)?,
            max_grid_dim: get(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_GRID_DIM_X)?,
        })
    }
}

impl Device for CudaDevice {
    fn id(&self) -> usize {
        self.index
    }

    fn name(&self) -> String {
        format!("cuda:{}", self.index)
    }
}

impl Default for CudaDevice {
    fn default() -> Self {
        Self::new(0)
    }
}
