//! Owned, typed device allocations

use std::marker::PhantomData;

use super::{Allocator, DevicePtr, Runtime, RuntimeClient};
use crate::dtype::Element;
use crate::error::{Error, Result};

/// An owned device allocation of `len` elements of `T`
///
/// Host transfers are ordered against the client's stream: reading or
/// writing through a buffer first waits for every launch already issued.
/// Dropping the buffer queues the deallocation behind pending work.
pub struct DeviceBuffer<R: Runtime, T: Element> {
    ptr: u64,
    len: usize,
    allocator: R::Allocator,
    device: R::Device,
    _marker: PhantomData<T>,
}

impl<R: Runtime, T: Element> DeviceBuffer<R, T> {
    /// Allocate a zero-filled buffer
    pub fn zeros(client: &R::Client, len: usize) -> Result<Self> {
        let buf = Self::uninit(client, len)?;
        if len > 0 {
            let zeros = vec![T::zero(); len];
            R::copy_to_device(bytemuck::cast_slice(&zeros), buf.ptr, &buf.device)?;
        }
        Ok(buf)
    }

    /// Allocate a buffer holding a copy of `data`
    pub fn from_slice(client: &R::Client, data: &[T]) -> Result<Self> {
        let buf = Self::uninit(client, data.len())?;
        if !data.is_empty() {
            R::copy_to_device(bytemuck::cast_slice(data), buf.ptr, &buf.device)?;
        }
        Ok(buf)
    }

    fn uninit(client: &R::Client, len: usize) -> Result<Self> {
        let size_bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(Error::OutOfMemory { size: usize::MAX })?;
        let allocator = client.allocator().clone();
        let ptr = allocator.allocate(size_bytes)?;
        Ok(Self {
            ptr,
            len,
            allocator,
            device: client.device().clone(),
            _marker: PhantomData,
        })
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }

    /// Address of the first element
    #[inline]
    pub fn ptr(&self) -> DevicePtr<T> {
        DevicePtr::new(self.ptr)
    }

    /// Address of element `offset`, which may be one past the end
    pub fn ptr_at(&self, offset: usize) -> Result<DevicePtr<T>> {
        if offset > self.len {
            return Err(Error::InvalidArgument {
                arg: "offset",
                reason: format!("offset {} past end of buffer of length {}", offset, self.len),
            });
        }
        Ok(self.ptr().add(offset))
    }

    /// Overwrite elements starting at `offset` with `data`
    pub fn copy_from_slice(&mut self, client: &R::Client, offset: usize, data: &[T]) -> Result<()> {
        self.check_range(offset, data.len())?;
        client.synchronize()?;
        if data.is_empty() {
            return Ok(());
        }
        R::copy_to_device(bytemuck::cast_slice(data), self.ptr().add(offset).addr(), &self.device)
    }

    /// Copy `len` elements starting at `offset` back to the host
    pub fn read_range(&self, client: &R::Client, offset: usize, len: usize) -> Result<Vec<T>> {
        self.check_range(offset, len)?;
        client.synchronize()?;
        let mut out = vec![T::zero(); len];
        if len > 0 {
            R::copy_from_device(
                self.ptr().add(offset).addr(),
                bytemuck::cast_slice_mut(&mut out),
                &self.device,
            )?;
        }
        Ok(out)
    }

    /// Copy the whole buffer back to the host
    pub fn to_vec(&self, client: &R::Client) -> Result<Vec<T>> {
        self.read_range(client, 0, self.len)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::InvalidArgument {
                arg: "range",
                reason: format!(
                    "range {}..{} out of bounds for buffer of length {}",
                    offset,
                    offset.saturating_add(len),
                    self.len
                ),
            }),
        }
    }
}

impl<R: Runtime, T: Element> Drop for DeviceBuffer<R, T> {
    fn drop(&mut self) {
        self.allocator.deallocate(self.ptr, self.size_bytes());
    }
}

impl<R: Runtime, T: Element> std::fmt::Debug for DeviceBuffer<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("runtime", &R::name())
            .field("ptr", &self.ptr())
            .field("len", &self.len)
            .field("dtype", &T::DTYPE)
            .finish()
    }
}
