//! Memory allocator trait
//!
//! Allocators are stream-ordered: a deallocation is queued behind every launch
//! already issued on the owning stream, so freeing a buffer that a pending
//! kernel still reads is safe.

use crate::error::Result;

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate `size_bytes` of device memory
    ///
    /// Returns a device pointer (u64); zero-sized requests return 0.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Release memory after all previously issued work on the stream
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Bytes currently allocated through this allocator
    fn allocated_bytes(&self) -> usize {
        0
    }
}
