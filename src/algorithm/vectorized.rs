//! Vectorized load/store descriptor
//!
//! A [`VecLayout`] says how many scalars of one dtype fit in one aligned
//! transaction of a given [`VecWidth`]. A [`TxN`] is the register-resident
//! value of one such transaction: up to [`MAX_VEC_ELEMS`] scalars moved with a
//! single wide copy. Narrower layouts (down to one element) cover unaligned
//! regions.

use super::pow2::VecWidth;
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Largest number of scalars carried by one transaction (16 bytes of `u8`)
pub const MAX_VEC_ELEMS: usize = 16;

/// Shape of a wide transaction for one element type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VecLayout {
    width: VecWidth,
    elem_size: usize,
}

impl VecLayout {
    /// Layout for `T` at `width`
    ///
    /// The width must be at least one element and a whole number of elements.
    pub fn new<T: Element>(width: VecWidth) -> Result<Self> {
        Self::for_elem_size(width, std::mem::size_of::<T>())
    }

    /// Layout for an element size at `width`
    pub fn for_elem_size(width: VecWidth, elem_size: usize) -> Result<Self> {
        if elem_size == 0 || width.bytes() < elem_size || width.bytes() % elem_size != 0 {
            return Err(Error::InvalidArgument {
                arg: "width",
                reason: format!(
                    "{} transactions cannot carry whole {}-byte elements",
                    width, elem_size
                ),
            });
        }
        Ok(Self { width, elem_size })
    }

    /// One element per transaction
    pub fn scalar<T: Element>() -> Self {
        let elem_size = std::mem::size_of::<T>();
        Self {
            width: VecWidth::scalar(elem_size).unwrap_or(VecWidth::MAX),
            elem_size,
        }
    }

    /// Transaction width
    #[inline]
    pub fn width(&self) -> VecWidth {
        self.width
    }

    /// Bytes per transaction
    #[inline]
    pub fn bytes(&self) -> usize {
        self.width.bytes()
    }

    /// Scalars per transaction (`VecElems`)
    #[inline]
    pub fn elems(&self) -> usize {
        self.width.elems(self.elem_size)
    }

    /// Element size in bytes
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }
}

/// The value of one wide transaction: `len` contiguous scalars
#[derive(Copy, Clone, Debug)]
pub struct TxN<T: Element> {
    data: [T; MAX_VEC_ELEMS],
    len: usize,
}

impl<T: Element> TxN<T> {
    /// A zero-filled transaction of `len` scalars
    #[inline]
    pub fn zeroed(len: usize) -> Self {
        debug_assert!(len <= MAX_VEC_ELEMS);
        Self {
            data: [T::zero(); MAX_VEC_ELEMS],
            len,
        }
    }

    /// Build from a slice of at most [`MAX_VEC_ELEMS`] scalars
    #[inline]
    pub fn from_slice(values: &[T]) -> Self {
        let mut v = Self::zeroed(values.len());
        v.data[..values.len()].copy_from_slice(values);
        v
    }

    /// Load one transaction from device memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `layout.elems()` reads and aligned to
    /// `layout.bytes()`.
    #[inline]
    pub unsafe fn load(ptr: *const T, layout: VecLayout) -> Self {
        debug_assert!(layout.width().is_aligned(ptr as u64));
        let mut v = Self::zeroed(layout.elems());
        unsafe { std::ptr::copy_nonoverlapping(ptr, v.data.as_mut_ptr(), v.len) };
        v
    }

    /// Store this transaction to device memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for `self.len()` writes and aligned to the layout
    /// this value was loaded with.
    #[inline]
    pub unsafe fn store(&self, ptr: *mut T) {
        unsafe { std::ptr::copy_nonoverlapping(self.data.as_ptr(), ptr, self.len) };
    }

    /// Number of scalars
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the transaction carries no scalars
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Scalar view
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    /// Mutable scalar view
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }
}

impl<T: Element> std::ops::Index<usize> for TxN<T> {
    type Output = T;

    #[inline]
    fn index(&self, k: usize) -> &T {
        &self.as_slice()[k]
    }
}

impl<T: Element> std::ops::IndexMut<usize> for TxN<T> {
    #[inline]
    fn index_mut(&mut self, k: usize) -> &mut T {
        &mut self.as_mut_slice()[k]
    }
}
