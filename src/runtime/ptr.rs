//! Typed device addresses

use std::fmt;
use std::marker::PhantomData;

/// A typed address in device memory
///
/// `DevicePtr` is plain data: copying it does not copy the pointee, and
/// holding one does not keep the allocation alive. It is `Send + Sync` so it
/// can be captured by launches that run on a stream worker.
pub struct DevicePtr<T> {
    addr: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DevicePtr<T> {
    /// Wrap a raw device address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self {
            addr,
            _marker: PhantomData,
        }
    }

    /// The null address
    #[inline]
    pub const fn null() -> Self {
        Self::new(0)
    }

    /// Raw device address
    #[inline]
    pub const fn addr(self) -> u64 {
        self.addr
    }

    /// Whether this is the null address
    #[inline]
    pub const fn is_null(self) -> bool {
        self.addr == 0
    }

    /// Address `elems` elements past this one
    #[inline]
    pub const fn add(self, elems: usize) -> Self {
        Self::new(self.addr + (elems * std::mem::size_of::<T>()) as u64)
    }

    /// Reinterpret the address as pointing to `U`
    #[inline]
    pub const fn cast<U>(self) -> DevicePtr<U> {
        DevicePtr::new(self.addr)
    }

    /// Whether the address is aligned to `size_of::<T>()`
    #[inline]
    pub fn is_elem_aligned(self) -> bool {
        self.addr % std::mem::size_of::<T>().max(1) as u64 == 0
    }

    /// Host pointer view, valid only for backends whose device memory is host memory
    #[inline]
    pub fn as_ptr(self) -> *const T {
        self.addr as usize as *const T
    }

    /// Mutable host pointer view, valid only for backends whose device memory is host memory
    #[inline]
    pub fn as_mut_ptr(self) -> *mut T {
        self.addr as usize as *mut T
    }
}

impl<T> Clone for DevicePtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DevicePtr<T> {}

impl<T> PartialEq for DevicePtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl<T> Eq for DevicePtr<T> {}

impl<T> fmt::Debug for DevicePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePtr(0x{:x})", self.addr)
    }
}
