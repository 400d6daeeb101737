//! CUDA Client implementation
//!
//! CudaClient owns stream and context for direct cudarc access.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context and stream are reference-counted via `Arc`. CUDA operations
//! must be performed on the thread that owns the context or after calling
//! `context.bind_to_thread()`.

use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::CudaRuntime;
use super::cache::{is_cuda_context_valid, log_cuda_memory_error};
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::{Allocator, DeviceProperties, RuntimeClient};

/// CUDA Runtime Client
///
/// Owns CUDA context and stream for direct kernel launches. Every linewise
/// launch and every stream-ordered allocation goes to `self.stream()`, so
/// work issued through one client executes in issue order.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device (owns GPU context)
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// Allocator for memory management
    pub(crate) allocator: CudaAllocator,

    /// Launch limits read from the driver
    pub(crate) properties: DeviceProperties,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

/// CUDA allocator that uses stream-ordered allocation.
///
/// `cuMemAllocAsync` and `cuMemFreeAsync` on the client stream, so a free is
/// ordered after every launch already issued.
#[derive(Clone)]
pub struct CudaAllocator {
    stream: Arc<CudaStream>,
    allocated: Arc<AtomicUsize>,
}

impl Allocator for CudaAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let mut ptr: u64 = 0;
        let result = unsafe { cudarc::driver::sys::cuMemAllocAsync(&mut ptr, size_bytes, self.stream.cu_stream()) };
        if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS {
            tracing::warn!(size_bytes, ?result, "cuMemAllocAsync failed");
            return Err(Error::OutOfMemory { size: size_bytes });
        }
        self.allocated.fetch_add(size_bytes, Ordering::Relaxed);
        Ok(ptr)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 {
            return;
        }
        self.allocated.fetch_sub(size_bytes, Ordering::Relaxed);

        unsafe {
            // Context is gone: memory is reclaimed by the driver
            if !is_cuda_context_valid() {
                return;
            }

            let result = cudarc::driver::sys::cuMemFreeAsync(ptr, self.stream.cu_stream());
            if result != cudarc::driver::sys::CUresult::CUDA_SUCCESS
                && result != cudarc::driver::sys::CUresult::CUDA_ERROR_ILLEGAL_ADDRESS
            {
                log_cuda_memory_error("cuMemFreeAsync", ptr, result);
            }
        }
    }

    fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// Initializes the CUDA context, creates a stream and reads the device's
    /// launch limits.
    ///
    /// # Errors
    ///
    /// Returns an error if context creation (e.g. invalid device ID), stream
    /// creation or the attribute queries fail.
    pub fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index)?;
        context.bind_to_thread()?;
        let stream = context.new_stream()?;
        let properties = device.properties()?;

        tracing::debug!(device = device.index, ?properties, "created CUDA client");

        let allocator = CudaAllocator {
            stream: stream.clone(),
            allocated: Arc::new(AtomicUsize::new(0)),
        };

        Ok(Self {
            device,
            context,
            stream,
            allocator,
            properties,
        })
    }

    /// Get reference to the CUDA stream.
    ///
    /// All kernel launches MUST use this stream for correct ordering.
    #[inline]
    pub fn stream(&self) -> &CudaStream {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().map_err(|e| Error::DeviceFault {
            kernel: "cuda stream",
            reason: format!("{:?}", e),
        })
    }

    fn allocator(&self) -> &CudaAllocator {
        &self.allocator
    }
}
