//! Linewise broadcast algorithm contract and orchestrator
//!
//! Applies one or more broadcast vectors across a flat `row_len x n_rows`
//! matrix: `out[i] = op(in[i], v0[idx(i)], v1[idx(i)], ...)`.
//!
//! # Algorithm Overview
//!
//! ```text
//! 1. Pick the widest transaction (<= max_vec_width) at which `in` and `out`
//!    have the same address offset, halving down to one element.
//! 2. Split the buffer into head | aligned body | tail at that width.
//! 3. along_lines == false  -> vectorCols (one value per row, blocked)
//!    along_lines == true   -> vectorRows (one value per row offset, striped)
//! 4. Enqueue up to two kernels on the client's stream:
//!      main      over the aligned body with wide transactions
//!      boundary  two blocks, block 0 = head, block 1 = tail, scalar width
//! ```
//!
//! Every backend implements [`LinewiseAlgorithm`] with the same work
//! decomposition; this module owns the planning so the backends only launch.

use std::sync::Arc;

use super::aligned::AlignedSplit;
use super::grid::{
    BOUNDARY_BLOCKS, OPTIMAL_SM_OCCUPANCY, blocked_grid, boundary_block_size, optimal_grid_size,
    striped_grid, striped_period,
};
use super::pow2::VecWidth;
use super::vectorized::VecLayout;
use crate::dtype::{Element, IndexType};
use crate::error::{Error, Result, fail_fast};
use crate::ops::LinewiseFn;
use crate::runtime::{DevicePtr, DeviceProperties, LaunchConfig, Runtime, RuntimeClient};

/// Tuning parameters of the linewise engine
///
/// None of these affect results; they only change how work is spread over
/// the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinewiseConfig {
    /// Widest transaction the engine may use
    pub max_vec_width: VecWidth,
    /// Threads per block of the main kernels
    pub block_size: u32,
    /// Block waves per multiprocessor targeted by the grid sizing
    pub occupancy: u32,
}

impl LinewiseConfig {
    /// 16-byte transactions, 256-thread blocks, 16 waves per multiprocessor
    pub const DEFAULT: Self = Self {
        max_vec_width: VecWidth::B16,
        block_size: 256,
        occupancy: OPTIMAL_SM_OCCUPANCY,
    };

    /// Small blocks and a shallow grid, for small devices and tests
    pub const SMALL: Self = Self {
        max_vec_width: VecWidth::B16,
        block_size: 64,
        occupancy: 2,
    };

    /// Check the configuration against a device
    pub fn validate(&self, props: &DeviceProperties) -> Result<()> {
        props.validate()?;
        if self.block_size == 0
            || self.block_size % props.warp_size != 0
            || self.block_size > props.max_threads_per_block
        {
            return Err(Error::InvalidArgument {
                arg: "block_size",
                reason: format!(
                    "{} is not a positive multiple of the warp size {} within the device limit {}",
                    self.block_size, props.warp_size, props.max_threads_per_block
                ),
            });
        }
        if self.occupancy == 0 {
            return Err(Error::InvalidArgument {
                arg: "occupancy",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for LinewiseConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Work distribution of the main kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// One broadcast value per row; each warp owns a contiguous chunk
    VecCols,
    /// One broadcast value per position in a row; threads stride over the grid
    VecRows,
}

impl Strategy {
    /// Strategy for a broadcast axis
    pub fn for_axis(along_lines: bool) -> Self {
        if along_lines { Self::VecRows } else { Self::VecCols }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VecCols => f.write_str("vectorCols"),
            Self::VecRows => f.write_str("vectorRows"),
        }
    }
}

/// Launch of the main (aligned body) kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MainLaunch {
    /// Launch shape
    pub config: LaunchConfig,
    /// Scalars handled by one thread (blocked strategy); the transaction size otherwise
    pub elems_per_thread: usize,
}

/// Everything a backend needs to enqueue one linewise call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinewisePlan {
    /// Work distribution
    pub strategy: Strategy,
    /// Head/body/tail partition at the chosen width
    pub split: AlignedSplit,
    /// Length of one row (the flat period of the broadcast)
    pub row_len: usize,
    /// Number of rows
    pub n_rows: usize,
    /// Number of broadcast vectors
    pub n_vecs: usize,
    /// Main kernel, absent when the aligned body is empty
    pub main: Option<MainLaunch>,
    /// Boundary kernel, absent when head and tail are empty
    pub boundary: Option<LaunchConfig>,
}

/// Shared memory of one striped block: one staging buffer, or two
/// alternating ones when more than one vector is staged
pub fn stage_bytes(work: usize, elem_size: usize, n_vecs: usize) -> u32 {
    (work * elem_size * n_vecs.min(2)) as u32
}

/// Widest transaction at which `in_addr` and `out_addr` have the same offset
///
/// Starts at `max` (or one element, if that is wider) and halves while the
/// two offsets differ and the width still exceeds one element.
pub fn select_vec_width(in_addr: u64, out_addr: u64, elem_size: usize, max: VecWidth) -> Result<VecWidth> {
    let scalar = VecWidth::scalar(elem_size).ok_or_else(|| Error::InvalidArgument {
        arg: "elem_size",
        reason: format!("no transaction width carries {}-byte elements", elem_size),
    })?;
    let mut width = max.max(scalar);
    while width.bytes() > elem_size && !width.are_same_align_offsets(in_addr, out_addr) {
        width = width.halve(elem_size);
    }
    Ok(width)
}

impl LinewisePlan {
    /// Plan one call on a device
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        props: &DeviceProperties,
        config: &LinewiseConfig,
        elem_size: usize,
        in_addr: u64,
        out_addr: u64,
        row_len: usize,
        n_rows: usize,
        along_lines: bool,
        n_vecs: usize,
    ) -> Result<Self> {
        config.validate(props)?;
        let len = row_len.checked_mul(n_rows).ok_or(Error::IndexOverflow {
            index_type: "usize",
            what: "row_len * n_rows",
        })?;
        let width = select_vec_width(in_addr, out_addr, elem_size, config.max_vec_width)?;
        let layout = VecLayout::for_elem_size(width, elem_size)?;
        let split = AlignedSplit::new(in_addr, len, layout)?;
        let strategy = Strategy::for_axis(along_lines);

        let block_size = config.block_size;
        let vec_elems = layout.elems();
        let occupancy_target = optimal_grid_size(props, block_size, config.occupancy);

        let main = if split.aligned_len() == 0 {
            None
        } else {
            Some(match strategy {
                Strategy::VecCols => {
                    let g = blocked_grid(split.aligned_len(), block_size, vec_elems, occupancy_target);
                    MainLaunch {
                        config: LaunchConfig::new(g.grid_dim, block_size, 0),
                        elems_per_thread: g.elems_per_thread,
                    }
                }
                Strategy::VecRows => {
                    let grid_dim = striped_grid(
                        split.aligned_len(),
                        row_len,
                        block_size,
                        vec_elems,
                        occupancy_target,
                        props.max_grid_dim,
                    )
                    .ok_or_else(|| {
                        Error::backend_limitation(
                            "linewise",
                            "vectorRows",
                            format!(
                                "striped period {} for row length {} exceeds the grid limit {}",
                                striped_period(row_len, block_size as u64 * vec_elems as u64),
                                row_len,
                                props.max_grid_dim
                            ),
                        )
                    })?;
                    let work = block_size as usize * vec_elems;
                    MainLaunch {
                        config: LaunchConfig::new(grid_dim, block_size, stage_bytes(work, elem_size, n_vecs)),
                        elems_per_thread: vec_elems,
                    }
                }
            })
        };

        let boundary = split.has_boundary().then(|| {
            let block = boundary_block_size(props.warp_size, width.bytes());
            let shared = match strategy {
                Strategy::VecCols => 0,
                Strategy::VecRows => stage_bytes(block as usize, elem_size, n_vecs),
            };
            LaunchConfig::new(BOUNDARY_BLOCKS, block, shared)
        });

        Ok(Self {
            strategy,
            split,
            row_len,
            n_rows,
            n_vecs,
            main,
            boundary,
        })
    }

    /// Transaction layout of the main kernel
    #[inline]
    pub fn layout(&self) -> VecLayout {
        self.split.layout()
    }

    /// Number of kernels this plan enqueues
    pub fn launches(&self) -> usize {
        self.main.is_some() as usize + self.boundary.is_some() as usize
    }
}

/// Backend contract: enqueue the kernels of a [`LinewisePlan`]
///
/// Implementations must honour the plan exactly: the main kernel covers
/// `plan.split.body()` and the boundary kernel covers `head()` (block 0) and
/// `tail()` (block 1), all on the client's stream, main first. They return
/// as soon as the launches are queued.
pub trait LinewiseAlgorithm<R: Runtime>: RuntimeClient<R> {
    /// Enqueue the plan
    ///
    /// # Safety
    ///
    /// `out` and `input` must be valid for `plan.split.len()` elements and
    /// every vector for the length its axis requires, until the stream has
    /// executed the launches.
    unsafe fn launch_linewise<T, F>(
        &self,
        plan: &LinewisePlan,
        out: DevicePtr<T>,
        input: DevicePtr<T>,
        op: Arc<F>,
        vecs: &[DevicePtr<T>],
    ) -> Result<()>
    where
        T: Element,
        F: LinewiseFn<T>;
}

/// Orchestrator of the linewise engine
///
/// Stateless: each call plans, enqueues and returns without waiting.
pub struct MatrixLinewiseOp;

impl MatrixLinewiseOp {
    /// Enqueue `out[i] = op(in[i], vecs[..][idx(i)])` with the default configuration
    ///
    /// `along_lines == false` broadcasts one value per row (each vector holds
    /// `n_rows` values); `along_lines == true` broadcasts along the row (each
    /// vector holds `row_len` values). `out` may equal `input`.
    ///
    /// # Safety
    ///
    /// `out` and `input` must hold at least `row_len * n_rows` elements and
    /// each vector the length its axis requires. Nothing beyond pointer
    /// alignment and extents is checked.
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn run<R, C, T, I, F>(
        client: &C,
        out: DevicePtr<T>,
        input: DevicePtr<T>,
        row_len: I,
        n_rows: I,
        along_lines: bool,
        op: F,
        vecs: &[DevicePtr<T>],
    ) -> Result<()>
    where
        R: Runtime,
        C: LinewiseAlgorithm<R>,
        T: Element,
        I: IndexType,
        F: LinewiseFn<T>,
    {
        unsafe {
            Self::run_with_config(
                client,
                &LinewiseConfig::DEFAULT,
                out,
                input,
                row_len,
                n_rows,
                along_lines,
                op,
                vecs,
            )
        }
    }

    /// [`MatrixLinewiseOp::run`] with explicit tuning
    ///
    /// # Safety
    ///
    /// Same contract as [`MatrixLinewiseOp::run`].
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn run_with_config<R, C, T, I, F>(
        client: &C,
        config: &LinewiseConfig,
        out: DevicePtr<T>,
        input: DevicePtr<T>,
        row_len: I,
        n_rows: I,
        along_lines: bool,
        op: F,
        vecs: &[DevicePtr<T>],
    ) -> Result<()>
    where
        R: Runtime,
        C: LinewiseAlgorithm<R>,
        T: Element,
        I: IndexType,
        F: LinewiseFn<T>,
    {
        let len = I::checked_total(row_len, n_rows)?;
        let row_len = row_len.to_extent("row_len")?;
        let n_rows = n_rows.to_extent("n_rows")?;
        if len == 0 {
            return Ok(());
        }

        T::DTYPE.check_elem_size(std::mem::size_of::<T>(), "linewise")?;
        check_ptr(out, "out")?;
        check_ptr(input, "in")?;
        for &v in vecs {
            check_ptr(v, "vector")?;
        }

        let elem_size = std::mem::size_of::<T>();
        let plan = LinewisePlan::new(
            client.properties(),
            config,
            elem_size,
            input.addr(),
            out.addr(),
            row_len,
            n_rows,
            along_lines,
            vecs.len(),
        )?;

        tracing::debug!(
            runtime = R::name(),
            dtype = %T::DTYPE,
            strategy = %plan.strategy,
            width = %plan.layout().width(),
            row_len,
            n_rows,
            n_vecs = vecs.len(),
            aligned_offset = plan.split.aligned_offset(),
            aligned_end = plan.split.aligned_end(),
            main_grid = plan.main.map(|m| m.config.grid_dim),
            elems_per_thread = plan.main.map(|m| m.elems_per_thread),
            boundary = plan.boundary.is_some(),
            "linewise plan"
        );

        unsafe { client.launch_linewise(&plan, out, input, Arc::new(op), vecs) }
    }

    /// [`MatrixLinewiseOp::run`] that aborts the process on any error
    ///
    /// # Safety
    ///
    /// Same contract as [`MatrixLinewiseOp::run`].
    #[track_caller]
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn run_or_abort<R, C, T, I, F>(
        client: &C,
        out: DevicePtr<T>,
        input: DevicePtr<T>,
        row_len: I,
        n_rows: I,
        along_lines: bool,
        op: F,
        vecs: &[DevicePtr<T>],
    ) where
        R: Runtime,
        C: LinewiseAlgorithm<R>,
        T: Element,
        I: IndexType,
        F: LinewiseFn<T>,
    {
        fail_fast(unsafe { Self::run(client, out, input, row_len, n_rows, along_lines, op, vecs) })
    }
}

fn check_ptr<T>(ptr: DevicePtr<T>, what: &'static str) -> Result<()> {
    if ptr.is_null() {
        return Err(Error::InvalidArgument {
            arg: what,
            reason: "null device pointer".to_string(),
        });
    }
    if !ptr.is_elem_aligned() {
        return Err(Error::Misaligned {
            what,
            addr: ptr.addr(),
            align: std::mem::size_of::<T>(),
        });
    }
    Ok(())
}
