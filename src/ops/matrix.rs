//! Layout-aware matrix/vector entry points
//!
//! A matrix is `n_rows x n_cols` in row-major or column-major order. Its
//! *lines* are the contiguous runs of the layout: rows for row-major, columns
//! for column-major. The engine only sees lines, so both entry points reduce
//! to "apply vectors along or across lines":
//!
//! ```text
//! line_len = row-major ? n_cols : n_rows
//! n_lines  = row-major ? n_rows : n_cols
//! ```

use std::marker::PhantomData;

use crate::algorithm::linewise::{LinewiseAlgorithm, LinewiseConfig, MatrixLinewiseOp};
use crate::dtype::{Element, IndexType};
use crate::error::{Error, Result};
use crate::ops::LinewiseFn;
use crate::runtime::{DeviceBuffer, DevicePtr, Runtime};

/// Memory order of a matrix
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Rows are contiguous (C order, `layout_right`)
    RowMajor,
    /// Columns are contiguous (Fortran order, `layout_left`)
    ColMajor,
}

impl Layout {
    /// Whether rows are contiguous
    #[inline]
    pub fn is_row_major(self) -> bool {
        self == Self::RowMajor
    }
}

/// Extents of a matrix in the caller's index type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Extents<I: IndexType> {
    n_rows: I,
    n_cols: I,
    len: usize,
    layout: Layout,
}

impl<I: IndexType> Extents<I> {
    fn new(n_rows: I, n_cols: I, layout: Layout) -> Result<Self> {
        let len = I::checked_total(n_rows, n_cols)?;
        Ok(Self {
            n_rows,
            n_cols,
            len,
            layout,
        })
    }

    fn line_len(&self) -> I {
        match self.layout {
            Layout::RowMajor => self.n_cols,
            Layout::ColMajor => self.n_rows,
        }
    }

    fn n_lines(&self) -> I {
        match self.layout {
            Layout::RowMajor => self.n_rows,
            Layout::ColMajor => self.n_cols,
        }
    }

    fn shape(&self) -> Result<Vec<usize>> {
        Ok(vec![self.n_rows.to_extent("n_rows")?, self.n_cols.to_extent("n_cols")?])
    }
}

fn check_fits(offset: usize, len: usize, capacity: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::ShapeMismatch {
            expected: vec![capacity.saturating_sub(offset)],
            got: vec![len],
        }),
    }
}

macro_rules! view_accessors {
    () => {
        /// Number of rows
        #[inline]
        pub fn n_rows(&self) -> I {
            self.extents.n_rows
        }

        /// Number of columns
        #[inline]
        pub fn n_cols(&self) -> I {
            self.extents.n_cols
        }

        /// Memory order
        #[inline]
        pub fn layout(&self) -> Layout {
            self.extents.layout
        }

        /// Number of elements
        #[inline]
        pub fn len(&self) -> usize {
            self.extents.len
        }

        /// Whether the matrix has no elements
        #[inline]
        pub fn is_empty(&self) -> bool {
            self.extents.len == 0
        }

        /// Length of one contiguous line
        #[inline]
        pub fn line_len(&self) -> I {
            self.extents.line_len()
        }

        /// Number of contiguous lines
        #[inline]
        pub fn n_lines(&self) -> I {
            self.extents.n_lines()
        }

        /// Address of the first element
        #[inline]
        pub fn ptr(&self) -> DevicePtr<T> {
            self.ptr
        }
    };
}

/// Read-only matrix over device memory
#[derive(Debug)]
pub struct MatrixView<'a, R: Runtime, T: Element, I: IndexType = usize> {
    ptr: DevicePtr<T>,
    extents: Extents<I>,
    _buf: PhantomData<&'a DeviceBuffer<R, T>>,
}

impl<'a, R: Runtime, T: Element, I: IndexType> MatrixView<'a, R, T, I> {
    /// View the start of `buf` as an `n_rows x n_cols` matrix
    pub fn new(buf: &'a DeviceBuffer<R, T>, n_rows: I, n_cols: I, layout: Layout) -> Result<Self> {
        Self::with_offset(buf, 0, n_rows, n_cols, layout)
    }

    /// View `buf` from element `offset` on as an `n_rows x n_cols` matrix
    pub fn with_offset(
        buf: &'a DeviceBuffer<R, T>,
        offset: usize,
        n_rows: I,
        n_cols: I,
        layout: Layout,
    ) -> Result<Self> {
        let extents = Extents::new(n_rows, n_cols, layout)?;
        check_fits(offset, extents.len, buf.len())?;
        Ok(Self {
            ptr: buf.ptr_at(offset)?,
            extents,
            _buf: PhantomData,
        })
    }

    /// View raw device memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `n_rows * n_cols` elements for as
    /// long as work using the view may still be pending.
    pub unsafe fn from_raw(ptr: DevicePtr<T>, n_rows: I, n_cols: I, layout: Layout) -> Result<Self> {
        Ok(Self {
            ptr,
            extents: Extents::new(n_rows, n_cols, layout)?,
            _buf: PhantomData,
        })
    }

    view_accessors!();
}

/// Mutable matrix over device memory
pub struct MatrixViewMut<'a, R: Runtime, T: Element, I: IndexType = usize> {
    ptr: DevicePtr<T>,
    extents: Extents<I>,
    _buf: PhantomData<&'a mut DeviceBuffer<R, T>>,
}

impl<'a, R: Runtime, T: Element, I: IndexType> MatrixViewMut<'a, R, T, I> {
    /// View the start of `buf` as an `n_rows x n_cols` matrix
    pub fn new(buf: &'a mut DeviceBuffer<R, T>, n_rows: I, n_cols: I, layout: Layout) -> Result<Self> {
        Self::with_offset(buf, 0, n_rows, n_cols, layout)
    }

    /// View `buf` from element `offset` on as an `n_rows x n_cols` matrix
    pub fn with_offset(
        buf: &'a mut DeviceBuffer<R, T>,
        offset: usize,
        n_rows: I,
        n_cols: I,
        layout: Layout,
    ) -> Result<Self> {
        let extents = Extents::new(n_rows, n_cols, layout)?;
        check_fits(offset, extents.len, buf.len())?;
        Ok(Self {
            ptr: buf.ptr_at(offset)?,
            extents,
            _buf: PhantomData,
        })
    }

    /// View raw device memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `n_rows * n_cols`
    /// elements for as long as work using the view may still be pending,
    /// and not aliased by any other live view.
    pub unsafe fn from_raw(ptr: DevicePtr<T>, n_rows: I, n_cols: I, layout: Layout) -> Result<Self> {
        Ok(Self {
            ptr,
            extents: Extents::new(n_rows, n_cols, layout)?,
            _buf: PhantomData,
        })
    }

    /// Reborrow as a read-only view
    pub fn as_view(&self) -> MatrixView<'_, R, T, I> {
        MatrixView {
            ptr: self.ptr,
            extents: self.extents,
            _buf: PhantomData,
        }
    }

    view_accessors!();
}

/// Read-only vector over device memory
pub struct VectorView<'a, R: Runtime, T: Element> {
    ptr: DevicePtr<T>,
    len: usize,
    _buf: PhantomData<&'a DeviceBuffer<R, T>>,
}

impl<'a, R: Runtime, T: Element> VectorView<'a, R, T> {
    /// View `len` elements of `buf` starting at `offset`
    pub fn with_offset(buf: &'a DeviceBuffer<R, T>, offset: usize, len: usize) -> Result<Self> {
        check_fits(offset, len, buf.len())?;
        Ok(Self {
            ptr: buf.ptr_at(offset)?,
            len,
            _buf: PhantomData,
        })
    }

    /// View raw device memory
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` elements for as long as work
    /// using the view may still be pending.
    pub unsafe fn from_raw(ptr: DevicePtr<T>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _buf: PhantomData,
        }
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the vector has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Address of the first element
    #[inline]
    pub fn ptr(&self) -> DevicePtr<T> {
        self.ptr
    }
}

impl<'a, R: Runtime, T: Element> From<&'a DeviceBuffer<R, T>> for VectorView<'a, R, T> {
    fn from(buf: &'a DeviceBuffer<R, T>) -> Self {
        Self {
            ptr: buf.ptr(),
            len: buf.len(),
            _buf: PhantomData,
        }
    }
}

fn check_vectors<R: Runtime, T: Element>(vecs: &[VectorView<'_, R, T>], expected: usize) -> Result<Vec<DevicePtr<T>>> {
    vecs.iter()
        .map(|v| {
            if v.len() != expected {
                return Err(Error::shape_mismatch(&[expected], &[v.len()]));
            }
            Ok(v.ptr())
        })
        .collect()
}

fn check_same_extents<I: IndexType>(out: &Extents<I>, input: &Extents<I>) -> Result<()> {
    if out.layout != input.layout {
        return Err(Error::InvalidArgument {
            arg: "layout",
            reason: format!("output is {:?} but input is {:?}", out.layout, input.layout),
        });
    }
    if out.n_rows != input.n_rows || out.n_cols != input.n_cols {
        return Err(Error::shape_mismatch(&input.shape()?, &out.shape()?));
    }
    Ok(())
}

/// Enqueue `out = op(input, vecs...)` broadcasting along or across lines
///
/// With `along_lines` every vector holds `line_len` values and element `j`
/// of each line is combined with `v[j]`; otherwise every vector holds
/// `n_lines` values and the whole of line `k` is combined with `v[k]`.
/// Returns once the kernels are queued on the client's stream.
pub fn linewise_op<R, T, I, F>(
    client: &R::Client,
    out: &mut MatrixViewMut<'_, R, T, I>,
    input: &MatrixView<'_, R, T, I>,
    along_lines: bool,
    op: F,
    vecs: &[VectorView<'_, R, T>],
) -> Result<()>
where
    R: Runtime,
    R::Client: LinewiseAlgorithm<R>,
    T: Element,
    I: IndexType,
    F: LinewiseFn<T>,
{
    linewise_op_with_config(client, &LinewiseConfig::DEFAULT, out, input, along_lines, op, vecs)
}

/// [`linewise_op`] with explicit tuning
pub fn linewise_op_with_config<R, T, I, F>(
    client: &R::Client,
    config: &LinewiseConfig,
    out: &mut MatrixViewMut<'_, R, T, I>,
    input: &MatrixView<'_, R, T, I>,
    along_lines: bool,
    op: F,
    vecs: &[VectorView<'_, R, T>],
) -> Result<()>
where
    R: Runtime,
    R::Client: LinewiseAlgorithm<R>,
    T: Element,
    I: IndexType,
    F: LinewiseFn<T>,
{
    check_same_extents(&out.extents, &input.extents)?;
    enqueue(client, config, out.ptr, input.ptr, &input.extents, along_lines, op, vecs)
}

/// In-place [`linewise_op`]: `inout = op(inout, vecs...)`
pub fn linewise_op_inplace<R, T, I, F>(
    client: &R::Client,
    inout: &mut MatrixViewMut<'_, R, T, I>,
    along_lines: bool,
    op: F,
    vecs: &[VectorView<'_, R, T>],
) -> Result<()>
where
    R: Runtime,
    R::Client: LinewiseAlgorithm<R>,
    T: Element,
    I: IndexType,
    F: LinewiseFn<T>,
{
    enqueue(
        client,
        &LinewiseConfig::DEFAULT,
        inout.ptr,
        inout.ptr,
        &inout.extents,
        along_lines,
        op,
        vecs,
    )
}

/// Apply vectors to every row (`bcast_along_rows`) or every column of a matrix
///
/// With `bcast_along_rows` each vector holds `n_cols` values and row `r` is
/// combined element by element with it; otherwise each vector holds
/// `n_rows` values and every element of row `r` is combined with `v[r]`.
pub fn matrix_vector_op<R, T, I, F>(
    client: &R::Client,
    out: &mut MatrixViewMut<'_, R, T, I>,
    matrix: &MatrixView<'_, R, T, I>,
    vecs: &[VectorView<'_, R, T>],
    bcast_along_rows: bool,
    op: F,
) -> Result<()>
where
    R: Runtime,
    R::Client: LinewiseAlgorithm<R>,
    T: Element,
    I: IndexType,
    F: LinewiseFn<T>,
{
    let along_lines = matrix.layout().is_row_major() == bcast_along_rows;
    linewise_op(client, out, matrix, along_lines, op, vecs)
}

#[allow(clippy::too_many_arguments)]
fn enqueue<R, T, I, F>(
    client: &R::Client,
    config: &LinewiseConfig,
    out: DevicePtr<T>,
    input: DevicePtr<T>,
    extents: &Extents<I>,
    along_lines: bool,
    op: F,
    vecs: &[VectorView<'_, R, T>],
) -> Result<()>
where
    R: Runtime,
    R::Client: LinewiseAlgorithm<R>,
    T: Element,
    I: IndexType,
    F: LinewiseFn<T>,
{
    let line_len = extents.line_len();
    let n_lines = extents.n_lines();
    let expected = (if along_lines { line_len } else { n_lines }).to_extent("vector length")?;
    let ptrs = check_vectors(vecs, expected)?;

    // Views guarantee `out`, `input` and every vector cover their extents.
    unsafe {
        MatrixLinewiseOp::run_with_config::<R, R::Client, T, I, F>(
            client,
            config,
            out,
            input,
            line_len,
            n_lines,
            along_lines,
            op,
            &ptrs,
        )
    }
}
