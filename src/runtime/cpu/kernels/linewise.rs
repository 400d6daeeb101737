//! Linewise kernels for the simulated SIMT device
//!
//! Four kernels, two per strategy:
//!
//! | kernel          | region        | width   | grid                      |
//! |-----------------|---------------|---------|---------------------------|
//! | `VecColsMain`   | aligned body  | wide    | blocked, `elems_per_thread` |
//! | `VecColsTail`   | head + tail   | scalar  | 2 blocks                  |
//! | `VecRowsMain`   | aligned body  | wide    | striped, period multiple  |
//! | `VecRowsTail`   | head + tail   | scalar  | 2 blocks                  |
//!
//! All positions are element offsets from the matrix start; the pointers the
//! kernels hold are the unshifted `out`/`in` base addresses.

use std::ops::Range;
use std::sync::Arc;

use smallvec::{SmallVec, smallvec};

use crate::algorithm::vectorized::{TxN, VecLayout};
use crate::dtype::Element;
use crate::error::Result;
use crate::ops::LinewiseFn;
use crate::runtime::DevicePtr;
use crate::runtime::cpu::simt::{BlockCtx, BlockKernel, SharedStage};

/// Broadcast vectors of one launch
pub type VecArgs<T> = SmallVec<[DevicePtr<T>; 4]>;

/// Per-thread broadcast values, one per vector
type Args<T> = SmallVec<[T; 4]>;

#[inline]
unsafe fn fetch_args<T: Element>(args: &mut [T], vecs: &[DevicePtr<T>], idx: usize) {
    for (a, v) in args.iter_mut().zip(vecs) {
        *a = unsafe { v.as_ptr().add(idx).read() };
    }
}

/// Blocked broadcast of one value per row
///
/// One thread of a warp: starts at element `pos` (its lane's transaction),
/// advances a whole warp of transactions per step and stops at `end`.
/// `(row_div, row_mod)` is the row and in-row offset of `pos`, kept up to date
/// by addition only. The cached `args` are refetched whenever a row boundary
/// is crossed, including inside one transaction.
///
/// # Safety
/// `out`/`input` valid over `[pos, end)`; every vector valid for the rows touched.
#[allow(clippy::too_many_arguments)]
pub unsafe fn vector_cols<T: Element, F: LinewiseFn<T>>(
    out: *mut T,
    input: *const T,
    mut pos: usize,
    end: usize,
    layout: VecLayout,
    warp_size: usize,
    row_len: usize,
    mut row_div: usize,
    mut row_mod: usize,
    op: &F,
    vecs: &[DevicePtr<T>],
    args: &mut [T],
) {
    let vec_elems = layout.elems();
    let step = warp_size * vec_elems;
    let warp_pad = (warp_size - 1) * vec_elems;
    let mut update = true;

    while pos < end {
        let v = unsafe { TxN::load(input.add(pos), layout) };
        while row_mod >= row_len {
            row_mod -= row_len;
            row_div += 1;
            update = true;
        }
        if update {
            unsafe { fetch_args(args, vecs, row_div) };
            update = false;
        }
        let mut w = TxN::zeroed(vec_elems);
        for k in 0..vec_elems {
            if row_mod == row_len {
                row_mod = 0;
                row_div += 1;
                unsafe { fetch_args(args, vecs, row_div) };
            }
            w[k] = op.apply(v[k], args);
            row_mod += 1;
        }
        unsafe { w.store(out.add(pos)) };

        pos += step;
        row_mod += warp_pad;
    }
}

/// Striped broadcast of one value per row offset
///
/// Visits transactions `first, first + stride, ...` below `len_vecs`. Each
/// visit sees the same in-row offset, so the thread's broadcast slices are
/// loaded once (`args`, one transaction per vector) and reused.
///
/// # Safety
/// `out`/`input` valid for `len_vecs` transactions of `layout`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn vector_rows<T: Element, F: LinewiseFn<T>>(
    out: *mut T,
    input: *const T,
    first: usize,
    stride: usize,
    len_vecs: usize,
    layout: VecLayout,
    op: &F,
    args: &[TxN<T>],
    scratch: &mut [T],
) {
    let vec_elems = layout.elems();
    let mut i = first;
    while i < len_vecs {
        let mut v = unsafe { TxN::load(input.add(i * vec_elems), layout) };
        for k in 0..vec_elems {
            for (s, a) in scratch.iter_mut().zip(args) {
                *s = a[k];
            }
            v[k] = op.apply(v[k], scratch);
        }
        unsafe { v.store(out.add(i * vec_elems)) };
        i += stride;
    }
}

/// Stage one block's slice of a broadcast vector through shared memory
///
/// Scatter: thread `t` writes slots `t, t + block_dim, ...` from
/// `vec[(block_offset + slot) mod row_len]`, which is an unaligned and
/// possibly wrapping read. Barrier. Gather: thread `t` reads the contiguous
/// transaction at slot `t * vec_elems` into `regs[t]`.
///
/// # Safety
/// `vec` valid for `row_len` elements.
pub unsafe fn load_vec<T: Element>(
    stage: &mut SharedStage<T>,
    vec: DevicePtr<T>,
    block_offset: usize,
    row_len: usize,
    block_dim: usize,
    vec_elems: usize,
    regs: &mut [TxN<T>],
) {
    let work = vec_elems * block_dim;
    stage.reset();
    for t in 0..block_dim {
        let mut j = block_offset + t;
        let mut k = t;
        while k < work {
            if j >= row_len {
                j %= row_len;
            }
            stage.write(k, unsafe { vec.as_ptr().add(j).read() });
            k += block_dim;
            j += block_dim;
        }
    }
    stage.barrier();
    for (t, reg) in regs.iter_mut().enumerate().take(block_dim) {
        *reg = TxN::from_slice(stage.read(t * vec_elems, vec_elems));
    }
}

/// Staging buffers and register files of one striped block
struct StripedBlock<T: Element> {
    vec_elems: usize,
    stages: SmallVec<[SharedStage<T>; 2]>,
    regs: Vec<Vec<TxN<T>>>,
    thread_args: SmallVec<[TxN<T>; 4]>,
    scratch: Args<T>,
}

impl<T: Element> StripedBlock<T> {
    fn new(ctx: &BlockCtx, n_vecs: usize, vec_elems: usize) -> Result<Self> {
        let work = ctx.block_dim * vec_elems;
        let stages = (0..n_vecs.min(2))
            .map(|_| ctx.shared_stage::<T>(work))
            .collect::<Result<_>>()?;
        Ok(Self {
            vec_elems,
            stages,
            regs: vec![vec![TxN::zeroed(vec_elems); ctx.block_dim]; n_vecs],
            thread_args: SmallVec::with_capacity(n_vecs),
            scratch: smallvec![T::zero(); n_vecs],
        })
    }

    /// Stage every vector for a block whose first element sits at `block_offset` in its row
    unsafe fn load(&mut self, vecs: &[DevicePtr<T>], block_offset: usize, row_len: usize, block_dim: usize) {
        for (v, (&vec, regs)) in vecs.iter().zip(self.regs.iter_mut()).enumerate() {
            unsafe { load_vec(&mut self.stages[v % 2], vec, block_offset, row_len, block_dim, self.vec_elems, regs) };
        }
    }

    fn thread(&mut self, tid: usize) -> (&[TxN<T>], &mut [T]) {
        self.thread_args.clear();
        self.thread_args.extend(self.regs.iter().map(|r| r[tid]));
        (&self.thread_args, &mut self.scratch)
    }
}

/// Main kernel of the blocked strategy
pub struct VecColsMain<T: Element, F> {
    pub out: DevicePtr<T>,
    pub input: DevicePtr<T>,
    pub layout: VecLayout,
    /// First element of the aligned body
    pub arr_offset: usize,
    /// One past the last element of the aligned body
    pub arr_end: usize,
    pub row_len: usize,
    pub elems_per_thread: usize,
    pub op: Arc<F>,
    pub vecs: VecArgs<T>,
}

impl<T: Element, F: LinewiseFn<T>> BlockKernel for VecColsMain<T, F> {
    fn name(&self) -> &'static str {
        "linewise_vec_cols_main"
    }

    fn run_block(&self, ctx: &BlockCtx) -> Result<()> {
        let vec_elems = self.layout.elems();
        let warp = ctx.warp_size;
        let mut args: Args<T> = smallvec![T::zero(); self.vecs.len()];
        for tid in 0..ctx.block_dim {
            let lane = tid % warp;
            let warp_start = self.elems_per_thread * (ctx.block_idx * ctx.block_dim + tid - lane);
            let t = self.arr_offset + warp_start + lane * vec_elems;
            let end = (t + self.elems_per_thread * warp).min(self.arr_end);
            unsafe {
                vector_cols(
                    self.out.as_mut_ptr(),
                    self.input.as_ptr(),
                    t,
                    end,
                    self.layout,
                    warp,
                    self.row_len,
                    t / self.row_len,
                    t % self.row_len,
                    &*self.op,
                    &self.vecs,
                    &mut args,
                );
            }
        }
        Ok(())
    }
}

/// Region of a boundary block: block 0 is the head, block 1 the tail
fn boundary_region(block_idx: usize, arr_offset: usize, arr_tail: usize, len: usize) -> Range<usize> {
    match block_idx {
        0 => 0..arr_offset,
        1 => arr_tail..len,
        _ => 0..0,
    }
}

/// Boundary kernel of the blocked strategy
pub struct VecColsTail<T: Element, F> {
    pub out: DevicePtr<T>,
    pub input: DevicePtr<T>,
    pub arr_offset: usize,
    pub arr_tail: usize,
    pub len: usize,
    pub row_len: usize,
    pub op: Arc<F>,
    pub vecs: VecArgs<T>,
}

impl<T: Element, F: LinewiseFn<T>> BlockKernel for VecColsTail<T, F> {
    fn name(&self) -> &'static str {
        "linewise_vec_cols_tail"
    }

    fn run_block(&self, ctx: &BlockCtx) -> Result<()> {
        let layout = VecLayout::scalar::<T>();
        let region = boundary_region(ctx.block_idx, self.arr_offset, self.arr_tail, self.len);
        let mut args: Args<T> = smallvec![T::zero(); self.vecs.len()];
        // one element per thread; a region longer than the block is walked in block-sized chunks
        for chunk in region.clone().step_by(ctx.block_dim) {
            for pos in chunk..(chunk + ctx.block_dim).min(region.end) {
                unsafe {
                    vector_cols(
                        self.out.as_mut_ptr(),
                        self.input.as_ptr(),
                        pos,
                        pos + 1,
                        layout,
                        ctx.warp_size,
                        self.row_len,
                        pos / self.row_len,
                        pos % self.row_len,
                        &*self.op,
                        &self.vecs,
                        &mut args,
                    );
                }
            }
        }
        Ok(())
    }
}

/// Main kernel of the striped strategy
pub struct VecRowsMain<T: Element, F> {
    pub out: DevicePtr<T>,
    pub input: DevicePtr<T>,
    pub layout: VecLayout,
    pub arr_offset: usize,
    /// Elements in the aligned body
    pub aligned_len: usize,
    pub row_len: usize,
    pub op: Arc<F>,
    pub vecs: VecArgs<T>,
}

impl<T: Element, F: LinewiseFn<T>> BlockKernel for VecRowsMain<T, F> {
    fn name(&self) -> &'static str {
        "linewise_vec_rows_main"
    }

    fn run_block(&self, ctx: &BlockCtx) -> Result<()> {
        let vec_elems = self.layout.elems();
        let work = ctx.block_dim * vec_elems;
        let block_offset = (self.arr_offset + work * ctx.block_idx) % self.row_len;

        let mut block = StripedBlock::new(ctx, self.vecs.len(), vec_elems)?;
        unsafe { block.load(&self.vecs, block_offset, self.row_len, ctx.block_dim) };

        let out = unsafe { self.out.as_mut_ptr().add(self.arr_offset) };
        let input = unsafe { self.input.as_ptr().add(self.arr_offset) };
        let len_vecs = self.aligned_len / vec_elems;
        let stride = ctx.grid_threads();
        for tid in 0..ctx.block_dim {
            let (args, scratch) = block.thread(tid);
            unsafe {
                vector_rows(
                    out,
                    input,
                    ctx.block_idx * ctx.block_dim + tid,
                    stride,
                    len_vecs,
                    self.layout,
                    &*self.op,
                    args,
                    scratch,
                );
            }
        }
        Ok(())
    }
}

/// Boundary kernel of the striped strategy
pub struct VecRowsTail<T: Element, F> {
    pub out: DevicePtr<T>,
    pub input: DevicePtr<T>,
    pub arr_offset: usize,
    pub arr_tail: usize,
    pub len: usize,
    pub row_len: usize,
    pub op: Arc<F>,
    pub vecs: VecArgs<T>,
}

impl<T: Element, F: LinewiseFn<T>> BlockKernel for VecRowsTail<T, F> {
    fn name(&self) -> &'static str {
        "linewise_vec_rows_tail"
    }

    fn run_block(&self, ctx: &BlockCtx) -> Result<()> {
        let layout = VecLayout::scalar::<T>();
        let region = boundary_region(ctx.block_idx, self.arr_offset, self.arr_tail, self.len);
        let mut block = StripedBlock::new(ctx, self.vecs.len(), 1)?;
        for chunk in region.clone().step_by(ctx.block_dim) {
            let chunk_len = (region.end - chunk).min(ctx.block_dim);
            unsafe { block.load(&self.vecs, chunk % self.row_len, self.row_len, ctx.block_dim) };
            let out = unsafe { self.out.as_mut_ptr().add(chunk) };
            let input = unsafe { self.input.as_ptr().add(chunk) };
            for tid in 0..chunk_len {
                let (args, scratch) = block.thread(tid);
                unsafe { vector_rows(out, input, tid, ctx.block_dim, chunk_len, layout, &*self.op, args, scratch) };
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::pow2::VecWidth;
    use crate::ops::BinaryOp;

    #[test]
    fn test_vector_cols_crosses_rows_inside_a_transaction() {
        // row_len 3 < 4 elements per transaction: several boundaries per load
        let input: Vec<f32> = (0..12).map(|x| x as f32).collect();
        let mut out = vec![0.0f32; 12];
        let rows = [100.0f32, 200.0, 300.0, 400.0];
        let vecs = [DevicePtr::<f32>::new(rows.as_ptr() as u64)];
        let layout = VecLayout::new::<f32>(VecWidth::B16).unwrap();
        let mut args = [0.0f32];
        // a single-lane "warp" walks the whole buffer
        unsafe {
            vector_cols(out.as_mut_ptr(), input.as_ptr(), 0, 12, layout, 1, 3, 0, 0, &BinaryOp::Add, &vecs, &mut args);
        }
        let expected: Vec<f32> = (0..12).map(|i| i as f32 + rows[i / 3]).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_load_vec_wraps_around_row() {
        let vec: Vec<i32> = (0..5).collect();
        let mut stage = SharedStage::new(8);
        let mut regs = vec![TxN::zeroed(2); 4];
        unsafe { load_vec(&mut stage, DevicePtr::new(vec.as_ptr() as u64), 3, 5, 4, 2, &mut regs) };
        let staged: Vec<i32> = regs.iter().flat_map(|r| r.as_slice().to_vec()).collect();
        assert_eq!(staged, vec![3, 4, 0, 1, 2, 3, 4, 0]);
    }

    #[test]
    fn test_vector_rows_reuses_args_every_stride() {
        let input = vec![1i64; 8];
        let mut out = vec![0i64; 8];
        let layout = VecLayout::new::<i64>(VecWidth::B16).unwrap();
        let args = [TxN::from_slice(&[10i64, 20])];
        let mut scratch = [0i64];
        unsafe {
            vector_rows(out.as_mut_ptr(), input.as_ptr(), 1, 2, 4, layout, &BinaryOp::Mul, &args, &mut scratch);
        }
        assert_eq!(out, vec![0, 0, 10, 20, 0, 0, 10, 20]);
    }
}
