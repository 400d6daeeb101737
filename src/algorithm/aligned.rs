//! Head/body/tail partition of a flat buffer
//!
//! ```text
//!   base                                                       base + len
//!    |  head  |               aligned body               |  tail  |
//!    0   aligned_offset                            aligned_end    len
//! ```
//!
//! The body starts and ends on a transaction boundary, so it can be moved
//! with wide loads; head and tail are handled one scalar at a time. The three
//! ranges are disjoint and cover `0..len` exactly.

use std::ops::Range;

use super::vectorized::VecLayout;
use crate::error::{Error, Result};

/// Partition of `0..len` (in elements) for one buffer and one transaction layout
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlignedSplit {
    len: usize,
    aligned_offset: usize,
    aligned_end: usize,
    layout: VecLayout,
}

impl AlignedSplit {
    /// Split a buffer starting at device address `base` holding `len` elements
    ///
    /// Fails if `base` is not aligned to the element size. If the buffer is
    /// too short to contain a single aligned transaction the body is empty
    /// and the whole buffer is head.
    pub fn new(base: u64, len: usize, layout: VecLayout) -> Result<Self> {
        let elem_size = layout.elem_size() as u64;
        if base % elem_size != 0 {
            return Err(Error::Misaligned {
                what: "matrix",
                addr: base,
                align: layout.elem_size(),
            });
        }
        let end = len as u64 * elem_size + base;
        let start = layout.width().round_up(base);
        let stop = layout.width().round_down(end);

        let (aligned_offset, aligned_end) = if stop > start {
            (
                ((start - base) / elem_size) as usize,
                ((stop - base) / elem_size) as usize,
            )
        } else {
            (len, len)
        };

        Ok(Self {
            len,
            aligned_offset,
            aligned_end,
            layout,
        })
    }

    /// Total number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length of the unaligned head
    #[inline]
    pub fn aligned_offset(&self) -> usize {
        self.aligned_offset
    }

    /// Start of the unaligned tail
    #[inline]
    pub fn aligned_end(&self) -> usize {
        self.aligned_end
    }

    /// Number of elements in the aligned body
    #[inline]
    pub fn aligned_len(&self) -> usize {
        self.aligned_end - self.aligned_offset
    }

    /// Number of wide transactions in the aligned body
    #[inline]
    pub fn aligned_vecs(&self) -> usize {
        self.aligned_len() / self.layout.elems()
    }

    /// Transaction layout the split was computed for
    #[inline]
    pub fn layout(&self) -> VecLayout {
        self.layout
    }

    /// Unaligned leading range
    pub fn head(&self) -> Range<usize> {
        0..self.aligned_offset
    }

    /// Aligned body
    pub fn body(&self) -> Range<usize> {
        self.aligned_offset..self.aligned_end
    }

    /// Unaligned trailing range
    pub fn tail(&self) -> Range<usize> {
        self.aligned_end..self.len
    }

    /// Whether head or tail is non-empty
    pub fn has_boundary(&self) -> bool {
        self.aligned_len() < self.len
    }
}
