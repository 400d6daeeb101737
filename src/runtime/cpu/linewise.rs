//! CPU implementation of the linewise algorithm contract

use std::sync::Arc;

use super::client::CpuClient;
use super::kernels::{VecArgs, VecColsMain, VecColsTail, VecRowsMain, VecRowsTail};
use super::runtime::CpuRuntime;
use crate::algorithm::linewise::{LinewiseAlgorithm, LinewisePlan, Strategy};
use crate::device_try;
use crate::dtype::Element;
use crate::error::Result;
use crate::ops::LinewiseFn;
use crate::runtime::DevicePtr;

impl LinewiseAlgorithm<CpuRuntime> for CpuClient {
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
        let vecs: VecArgs<T> = vecs.iter().copied().collect();
        let split = plan.split;

        if let Some(main) = plan.main {
            match plan.strategy {
                Strategy::VecCols => device_try!(self.launch(
                    main.config,
                    VecColsMain {
                        out,
                        input,
                        layout: split.layout(),
                        arr_offset: split.aligned_offset(),
                        arr_end: split.aligned_end(),
                        row_len: plan.row_len,
                        elems_per_thread: main.elems_per_thread,
                        op: op.clone(),
                        vecs: vecs.clone(),
                    }
                ))?,
                Strategy::VecRows => device_try!(self.launch(
                    main.config,
                    VecRowsMain {
                        out,
                        input,
                        layout: split.layout(),
                        arr_offset: split.aligned_offset(),
                        aligned_len: split.aligned_len(),
                        row_len: plan.row_len,
                        op: op.clone(),
                        vecs: vecs.clone(),
                    }
                ))?,
            }
        }

        if let Some(boundary) = plan.boundary {
            match plan.strategy {
                Strategy::VecCols => device_try!(self.launch(
                    boundary,
                    VecColsTail {
                        out,
                        input,
                        arr_offset: split.aligned_offset(),
                        arr_tail: split.aligned_end(),
                        len: split.len(),
                        row_len: plan.row_len,
                        op,
                        vecs,
                    }
                ))?,
                Strategy::VecRows => device_try!(self.launch(
                    boundary,
                    VecRowsTail {
                        out,
                        input,
                        arr_offset: split.aligned_offset(),
                        arr_tail: split.aligned_end(),
                        len: split.len(),
                        row_len: plan.row_len,
                        op,
                        vecs,
                    }
                ))?,
            }
        }
        Ok(())
    }
}
