//! CUDA implementation of the linewise algorithm contract
//!
//! Same decomposition as the CPU backend; the operator must name a
//! [`BinaryOp`](crate::ops::BinaryOp) because device code cannot call host
//! closures, and at most two vectors are compiled into the kernels.

use std::sync::Arc;

use super::CudaRuntime;
use super::client::CudaClient;
use super::kernels::{KernelRole, LinewiseKernelArgs, MAX_DEVICE_VECS, launch_linewise_kernel, linewise_symbol};
use crate::algorithm::linewise::{LinewiseAlgorithm, LinewisePlan, Strategy};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::LinewiseFn;
use crate::runtime::{DevicePtr, LaunchConfig};

impl LinewiseAlgorithm<CudaRuntime> for CudaClient {
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
        F: LinewiseFn<T>,
    {
        let op = op.device_op().ok_or_else(|| {
            Error::backend_limitation("cuda", "linewise", "only named BinaryOp operators run on the device")
        })?;
        if vecs.len() > MAX_DEVICE_VECS {
            return Err(Error::backend_limitation(
                "cuda",
                "linewise",
                format!("{} broadcast vectors (at most {})", vecs.len(), MAX_DEVICE_VECS),
            ));
        }

        let mut vec_addrs = [0u64; MAX_DEVICE_VECS];
        for (slot, v) in vec_addrs.iter_mut().zip(vecs) {
            *slot = v.addr();
        }
        let args = LinewiseKernelArgs {
            out: out.addr(),
            input: input.addr(),
            op,
            vecs: vec_addrs,
        };

        let split = plan.split;
        let row_len = plan.row_len as u64;
        let launch = |role: KernelRole, cfg: &LaunchConfig, extents: &[u64]| -> Result<()> {
            let symbol = linewise_symbol(plan.strategy, role, T::DTYPE, vecs.len())?;
            unsafe { launch_linewise_kernel(&self.context, &self.stream, self.device.index, &symbol, cfg, &args, extents) }
        };

        if let Some(main) = plan.main {
            let role = KernelRole::Main {
                width_bytes: plan.layout().bytes(),
            };
            match plan.strategy {
                Strategy::VecCols => launch(
                    role,
                    &main.config,
                    &[
                        split.aligned_offset() as u64,
                        split.aligned_end() as u64,
                        row_len,
                        main.elems_per_thread as u64,
                    ],
                )?,
                Strategy::VecRows => launch(
                    role,
                    &main.config,
                    &[split.aligned_offset() as u64, split.aligned_len() as u64, row_len],
                )?,
            }
        }

        if let Some(boundary) = plan.boundary {
            launch(
                KernelRole::Boundary,
                &boundary,
                &[
                    split.aligned_offset() as u64,
                    split.aligned_end() as u64,
                    split.len() as u64,
                    row_len,
                ],
            )?;
        }
        Ok(())
    }
}
