//! CPU client and allocator implementation

use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use super::simt::{BlockKernel, execute_grid};
use super::stream::CpuStream;
use crate::error::{Error, Result};
use crate::runtime::{Allocator, DeviceProperties, LaunchConfig, LaunchError, RuntimeClient};

/// Alignment of every CPU allocation, matching the device allocator guarantee
pub const CPU_ALLOC_ALIGN: usize = 256;

/// CPU client for kernel dispatch
///
/// Owns one [`CpuStream`]; clones share it.
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    stream: CpuStream,
    allocator: CpuAllocator,
}

impl CpuClient {
    /// Create a new CPU client with its own asynchronous stream
    pub fn new(device: CpuDevice) -> Self {
        Self::with_stream(device, CpuStream::new())
    }

    /// Create a client that runs every launch on the calling thread
    pub fn inline(device: CpuDevice) -> Self {
        Self::with_stream(device, CpuStream::inline())
    }

    fn with_stream(device: CpuDevice, stream: CpuStream) -> Self {
        let allocator = CpuAllocator::new(stream.clone());
        Self {
            device,
            stream,
            allocator,
        }
    }

    /// The client's execution stream
    pub fn stream(&self) -> &CpuStream {
        &self.stream
    }

    /// Validate `cfg` and queue `kernel` on the stream
    ///
    /// Configuration errors are reported immediately; faults raised while the
    /// kernel runs are deferred to the next [`RuntimeClient::synchronize`].
    pub fn launch<K>(&self, cfg: LaunchConfig, kernel: K) -> std::result::Result<(), LaunchError>
    where
        K: BlockKernel + 'static,
    {
        let props = self.device.properties();
        cfg.validate(props)?;
        let warp_size = props.warp_size;
        let name = kernel.name();
        tracing::trace!(
            kernel = name,
            stream = self.stream.id(),
            grid = cfg.grid_dim,
            block = cfg.block_dim,
            shared = cfg.shared_mem_bytes,
            "launch"
        );
        self.stream
            .enqueue(name, move || execute_grid(&cfg, warp_size, &kernel))
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn properties(&self) -> &DeviceProperties {
        self.device.properties()
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()
    }

    fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }
}

/// Stream-ordered heap allocator for the CPU device
#[derive(Clone, Debug)]
pub struct CpuAllocator {
    stream: CpuStream,
    allocated: Arc<AtomicUsize>,
}

impl CpuAllocator {
    fn new(stream: CpuStream) -> Self {
        Self {
            stream,
            allocated: Arc::new(AtomicUsize::new(0)),
        }
    }
}

fn alloc_layout(size_bytes: usize) -> Result<AllocLayout> {
    AllocLayout::from_size_align(size_bytes, CPU_ALLOC_ALIGN).map_err(|_| Error::OutOfMemory { size: size_bytes })
}

impl Allocator for CpuAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }
        let layout = alloc_layout(size_bytes)?;
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory { size: size_bytes });
        }
        self.allocated.fetch_add(size_bytes, Ordering::Relaxed);
        Ok(ptr as u64)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }
        let Ok(layout) = alloc_layout(size_bytes) else {
            return;
        };
        let allocated = self.allocated.clone();
        let free = move || {
            unsafe { dealloc(ptr as usize as *mut u8, layout) };
            allocated.fetch_sub(size_bytes, Ordering::Relaxed);
            Ok(())
        };
        if self.stream.enqueue("free", free).is_err() {
            // The stream is shut down, so nothing can still be reading the block.
            unsafe { dealloc(ptr as usize as *mut u8, layout) };
            self.allocated.fetch_sub(size_bytes, Ordering::Relaxed);
        }
    }

    fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}
