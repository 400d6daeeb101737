//! Simulated SIMT execution
//!
//! A launch runs `grid_dim` blocks. Blocks are independent and run in
//! parallel (with the `rayon` feature); the threads of one block run in
//! lock-step phases on a single host thread, so a block-wide barrier is simply
//! the boundary between two phases. Shared memory is modelled by
//! [`SharedStage`], which makes the scatter/barrier/gather protocol explicit.

use std::cell::Cell;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::LaunchConfig;

/// Per-block execution context (`blockIdx`, `blockDim`, `gridDim`)
#[derive(Debug)]
pub struct BlockCtx {
    /// Index of this block in the grid
    pub block_idx: usize,
    /// Threads per block
    pub block_dim: usize,
    /// Blocks in the grid
    pub grid_dim: usize,
    /// Threads per warp
    pub warp_size: usize,
    shared_mem_bytes: usize,
    shared_used: Cell<usize>,
}

impl BlockCtx {
    fn new(block_idx: usize, cfg: &LaunchConfig, warp_size: u32) -> Self {
        Self {
            block_idx,
            block_dim: cfg.block_dim as usize,
            grid_dim: cfg.grid_dim as usize,
            warp_size: warp_size as usize,
            shared_mem_bytes: cfg.shared_mem_bytes as usize,
            shared_used: Cell::new(0),
        }
    }

    /// Threads in the whole grid
    #[inline]
    pub fn grid_threads(&self) -> usize {
        self.block_dim * self.grid_dim
    }

    /// Carve a staging buffer of `len` elements out of the block's dynamic shared memory
    ///
    /// Fails like an out-of-bounds shared access would on hardware if the
    /// launch did not reserve enough.
    pub fn shared_stage<T: Element>(&self, len: usize) -> Result<SharedStage<T>> {
        let bytes = len * std::mem::size_of::<T>();
        let used = self.shared_used.get() + bytes;
        if used > self.shared_mem_bytes {
            return Err(Error::DeviceFault {
                kernel: "shared_stage",
                reason: format!(
                    "block {} needs {} bytes of shared memory, launch reserved {}",
                    self.block_idx, used, self.shared_mem_bytes
                ),
            });
        }
        self.shared_used.set(used);
        Ok(SharedStage::new(len))
    }
}

/// A kernel expressed as the work of one block
pub trait BlockKernel: Send + Sync {
    /// Kernel name used in diagnostics
    fn name(&self) -> &'static str;

    /// Execute every thread of block `ctx.block_idx`
    fn run_block(&self, ctx: &BlockCtx) -> Result<()>;
}

/// Run `kernel` over the whole grid described by `cfg`
pub fn execute_grid<K: BlockKernel + ?Sized>(cfg: &LaunchConfig, warp_size: u32, kernel: &K) -> Result<()> {
    let run = |block_idx: u32| kernel.run_block(&BlockCtx::new(block_idx as usize, cfg, warp_size));

    #[cfg(feature = "rayon")]
    {
        (0..cfg.grid_dim).into_par_iter().try_for_each(run)
    }

    #[cfg(not(feature = "rayon"))]
    {
        (0..cfg.grid_dim).try_for_each(run)
    }
}

/// Phase of a [`SharedStage`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StagePhase {
    /// Threads write their own slots; nobody reads
    Scatter,
    /// Every write is visible; nobody writes
    Gather,
}

/// Shared-memory staging buffer with an explicit `Scatter -> Barrier -> Gather` protocol
///
/// Writes are legal only while scattering and reads only after the barrier.
/// Breaking the protocol is a data race on real hardware; here it traps the
/// kernel, which surfaces as a device fault at the next synchronization.
#[derive(Debug)]
pub struct SharedStage<T> {
    slots: Vec<T>,
    phase: StagePhase,
}

impl<T: Element> SharedStage<T> {
    /// A zero-filled stage of `len` slots in the scatter phase
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![T::zero(); len],
            phase: StagePhase::Scatter,
        }
    }

    /// Current phase
    #[inline]
    pub fn phase(&self) -> StagePhase {
        self.phase
    }

    /// Number of slots
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the stage has no slots
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Store `value` into `slot`
    #[inline]
    pub fn write(&mut self, slot: usize, value: T) {
        assert!(
            self.phase == StagePhase::Scatter,
            "shared stage written after barrier (slot {})",
            slot
        );
        self.slots[slot] = value;
    }

    /// Block-wide barrier: every prior write becomes visible
    pub fn barrier(&mut self) {
        assert!(
            self.phase == StagePhase::Scatter,
            "shared stage barrier reached twice without reset"
        );
        self.phase = StagePhase::Gather;
    }

    /// Contiguous read of `len` slots starting at `start`
    #[inline]
    pub fn read(&self, start: usize, len: usize) -> &[T] {
        assert!(
            self.phase == StagePhase::Gather,
            "shared stage read before barrier (slot {})",
            start
        );
        &self.slots[start..start + len]
    }

    /// Rearm the stage for the next scatter
    pub fn reset(&mut self) {
        self.phase = StagePhase::Scatter;
    }
}
