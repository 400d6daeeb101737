//! Launchers for the kernels in `linewise.cu`
//!
//! Symbols are `linewise_<cols|rows>_<main|tail>_<dtype>_n<vecs>`, main
//! kernels suffixed with `_w<bytes>` for the transaction width. The
//! operation is passed as its index in [`BinaryOp::ALL`].

use cudarc::driver::PushKernelArg;
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::loader::{get_kernel_function, get_or_load_module, kernel_name, launch_config};
use crate::algorithm::linewise::Strategy;
use crate::device_try;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::ops::BinaryOp;
use crate::runtime::LaunchConfig;

/// PTX module holding the linewise kernels
pub const LINEWISE_MODULE: &str = "linewise";

/// Vector arguments compiled into each kernel
pub const MAX_DEVICE_VECS: usize = 2;

/// Which of the two kernels of a strategy
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KernelRole {
    /// Aligned body at the given transaction width in bytes
    Main { width_bytes: usize },
    /// Head and tail, one element at a time
    Boundary,
}

/// Kernel-table code of an operation
pub fn op_code(op: BinaryOp) -> i32 {
    BinaryOp::ALL.iter().position(|&o| o == op).unwrap_or(0) as i32
}

/// Widest transaction instantiated for any dtype
pub const MAX_KERNEL_WIDTH: usize = 16;

/// Symbol of one instantiated kernel
///
/// Main kernels exist for every power-of-two width from the element size up
/// to [`MAX_KERNEL_WIDTH`]; other widths have no instance for `dtype`.
pub fn linewise_symbol(strategy: Strategy, role: KernelRole, dtype: DType, n_vecs: usize) -> Result<String> {
    if n_vecs > MAX_DEVICE_VECS {
        return Err(Error::backend_limitation(
            "cuda",
            "linewise",
            format!("{} broadcast vectors (at most {})", n_vecs, MAX_DEVICE_VECS),
        ));
    }
    let axis = match strategy {
        Strategy::VecCols => "cols",
        Strategy::VecRows => "rows",
    };
    match role {
        KernelRole::Main { width_bytes } => {
            if !width_bytes.is_power_of_two() || width_bytes < dtype.size_in_bytes() || width_bytes > MAX_KERNEL_WIDTH {
                return Err(Error::UnsupportedDType {
                    dtype,
                    op: "linewise transaction width",
                });
            }
            Ok(format!(
                "{}_n{}_w{}",
                kernel_name(&format!("linewise_{}_main", axis), dtype),
                n_vecs,
                width_bytes
            ))
        }
        KernelRole::Boundary => Ok(format!(
            "{}_n{}",
            kernel_name(&format!("linewise_{}_tail", axis), dtype),
            n_vecs
        )),
    }
}

/// Pointers and operation shared by every linewise kernel
#[derive(Copy, Clone, Debug)]
pub struct LinewiseKernelArgs {
    /// Output base address
    pub out: u64,
    /// Input base address
    pub input: u64,
    /// Operation folded over the vectors
    pub op: BinaryOp,
    /// Broadcast vectors; unused slots are null
    pub vecs: [u64; MAX_DEVICE_VECS],
}

/// Launch one linewise kernel on `stream`
///
/// `extents` are the kernel's `u64` scalars between the data pointers and the
/// operation code, in declaration order.
///
/// # Safety
///
/// The pointers in `args` must be valid device allocations covering every
/// element the kernel touches, until the stream has executed the launch.
#[allow(clippy::too_many_arguments)]
pub unsafe fn launch_linewise_kernel(
    context: &Arc<CudaContext>,
    stream: &CudaStream,
    device_index: usize,
    symbol: &str,
    cfg: &LaunchConfig,
    args: &LinewiseKernelArgs,
    extents: &[u64],
) -> Result<()> {
    let module = get_or_load_module(context, device_index, LINEWISE_MODULE)?;
    let func = get_kernel_function(&module, symbol)?;
    let op = op_code(args.op);

    tracing::trace!(kernel = symbol, grid = cfg.grid_dim, block = cfg.block_dim, shared = cfg.shared_mem_bytes, "launch");

    let mut builder = stream.launch_builder(&func);
    builder.arg(&args.out);
    builder.arg(&args.input);
    for extent in extents {
        builder.arg(extent);
    }
    builder.arg(&op);
    builder.arg(&args.vecs[0]);
    builder.arg(&args.vecs[1]);

    device_try!(unsafe { builder.launch(launch_config(cfg)) })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_match_kernel_source() {
        assert_eq!(
            linewise_symbol(Strategy::VecCols, KernelRole::Main { width_bytes: 16 }, DType::F32, 1).unwrap(),
            "linewise_cols_main_f32_n1_w16"
        );
        assert_eq!(
            linewise_symbol(Strategy::VecRows, KernelRole::Boundary, DType::I8, 2).unwrap(),
            "linewise_rows_tail_i8_n2"
        );
    }

    #[test]
    fn test_uninstantiated_symbols_rejected() {
        // f64 kernels start at 8-byte transactions
        let err = linewise_symbol(Strategy::VecCols, KernelRole::Main { width_bytes: 4 }, DType::F64, 1).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDType { dtype: DType::F64, .. }), "{err:?}");
        let err = linewise_symbol(Strategy::VecRows, KernelRole::Main { width_bytes: 32 }, DType::U8, 0).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDType { .. }), "{err:?}");
        let err = linewise_symbol(Strategy::VecRows, KernelRole::Boundary, DType::F32, 3).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }), "{err:?}");
    }

    #[test]
    fn test_op_codes_follow_table_order() {
        assert_eq!(op_code(BinaryOp::Add), 0);
        assert_eq!(op_code(BinaryOp::Max), 5);
    }
}
