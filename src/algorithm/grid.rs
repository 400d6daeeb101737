//! Grid-sizing policy for the linewise kernels
//!
//! Two rules:
//!
//! - **Blocked** (`vectorCols`): never launch more blocks than there is work,
//!   never fewer than needed to fill the device; if the body is large, each
//!   thread takes more elements.
//! - **Striped** (`vectorRows`): the grid must also be a multiple of
//!   `row_len / gcd(block_work, row_len)`, so that `grid * block_work` is a
//!   multiple of `row_len` and every thread sees the same in-row offset on every
//!   grid-stride iteration.

use crate::runtime::DeviceProperties;

/// Target number of resident block waves per multiprocessor
pub const OPTIMAL_SM_OCCUPANCY: u32 = 16;

/// Number of blocks in a boundary (head/tail) launch
pub const BOUNDARY_BLOCKS: u32 = 2;

/// Greatest common divisor
#[inline]
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// `ceil(a / b)`
#[inline]
pub fn ceil_div(a: u64, b: u64) -> u64 {
    a.div_ceil(b)
}

/// Grid size that keeps every multiprocessor saturated with several waves of blocks
///
/// `occupancy * sm_count * max_threads_per_block / block_size`, at least 1.
pub fn optimal_grid_size(props: &DeviceProperties, block_size: u32, occupancy: u32) -> u32 {
    let per_wave = (props.sm_count as u64 * props.max_threads_per_block as u64) / block_size as u64;
    (occupancy as u64 * per_wave).clamp(1, props.max_grid_dim as u64) as u32
}

/// Launch shape of the blocked main kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockedGrid {
    /// Number of blocks
    pub grid_dim: u32,
    /// Scalars processed by one thread (a multiple of `vec_elems`)
    pub elems_per_thread: usize,
}

/// Grid for the blocked (`vectorCols`) strategy over an aligned body of `aligned_len` scalars
pub fn blocked_grid(aligned_len: usize, block_size: u32, vec_elems: usize, occupancy_target: u32) -> BlockedGrid {
    let block_work = block_size as u64 * vec_elems as u64;
    let max_blocks = ceil_div(aligned_len as u64, block_work).max(1);
    let grid_dim = max_blocks.min(occupancy_target.max(1) as u64);
    let elems_per_thread = ceil_div(aligned_len as u64, grid_dim * block_work) * vec_elems as u64;
    BlockedGrid {
        grid_dim: grid_dim as u32,
        elems_per_thread: elems_per_thread as usize,
    }
}

/// Smallest grid period that realigns the striped work with row boundaries
///
/// `lcm(block_work, row_len) / block_work`.
#[inline]
pub fn striped_period(row_len: usize, block_work: u64) -> u64 {
    let row_len = row_len.max(1) as u64;
    row_len / gcd(block_work, row_len)
}

/// Grid for the striped (`vectorRows`) strategy
///
/// Always an exact multiple of [`striped_period`]: the smaller of "enough blocks
/// to cover the body once" and "the occupancy target", each rounded up to the
/// period. Returns `None` when even one period exceeds `max_grid_dim`.
pub fn striped_grid(
    aligned_len: usize,
    row_len: usize,
    block_size: u32,
    vec_elems: usize,
    occupancy_target: u32,
    max_grid_dim: u32,
) -> Option<u32> {
    let block_work = block_size as u64 * vec_elems as u64;
    let period = striped_period(row_len, block_work);
    let cover = ceil_div(aligned_len as u64, block_work).max(1);
    let cover = ceil_div(cover, period) * period;
    let occupy = ceil_div(occupancy_target.max(1) as u64, period) * period;
    let grid = cover.min(occupy);
    if grid > max_grid_dim as u64 {
        let fitted = (max_grid_dim as u64 / period) * period;
        return (fitted > 0).then_some(fitted as u32);
    }
    Some(grid as u32)
}

/// Block size of the boundary kernels: at least one warp, at least one wide transaction
#[inline]
pub fn boundary_block_size(warp_size: u32, vec_bytes: usize) -> u32 {
    warp_size.max(vec_bytes as u32)
}
