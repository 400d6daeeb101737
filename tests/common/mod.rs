//! Common test utilities
#![allow(dead_code)]

use linewise::algorithm::LinewiseConfig;
use linewise::dtype::Element;
use linewise::error::Result;
use linewise::ops::{Layout, LinewiseFn, MatrixView, MatrixViewMut, VectorView, linewise_op_with_config};
use linewise::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use linewise::runtime::{DeviceBuffer, DeviceProperties, Runtime};
#[cfg(feature = "cuda")]
use linewise::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device);
    (client, device)
}

/// CPU client reporting a small device, so grids stay shallow and every
/// kernel runs several grid-stride iterations
pub fn create_small_cpu_client() -> CpuClient {
    let device = CpuDevice::with_properties(DeviceProperties {
        sm_count: 2,
        ..DeviceProperties::default()
    });
    CpuClient::new(device)
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    if !linewise::runtime::cuda::is_cuda_available() {
        return None;
    }
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device);
    Some((client, device))
}

/// `0, 1, 2, ...` wrapped into the range of `T`
pub fn iota<T: Element>(n: usize, modulus: usize) -> Vec<T> {
    (0..n).map(|i| T::from_f64((i % modulus) as f64)).collect()
}

/// Assert two slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose<T: Element>(a: &[T], b: &[T], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let (x, y) = (x.to_f64(), y.to_f64());
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// One linewise call on buffers whose data starts `in_offset` / `out_offset`
/// elements past a 256-byte aligned allocation
pub struct OffsetCase<'a, T: Element> {
    pub input: &'a [T],
    pub row_len: usize,
    pub n_rows: usize,
    pub along_lines: bool,
    pub vecs: &'a [Vec<T>],
    pub in_offset: usize,
    /// `None` runs in place
    pub out_offset: Option<usize>,
}

impl<T: Element> OffsetCase<'_, T> {
    /// Run on `client`, synchronize and return the output matrix
    pub fn run<R, F>(&self, client: &R::Client, config: &LinewiseConfig, op: F) -> Result<Vec<T>>
    where
        R: Runtime,
        R::Client: linewise::algorithm::LinewiseAlgorithm<R>,
        F: LinewiseFn<T>,
    {
        let mut padded = vec![T::zero(); self.in_offset];
        padded.extend_from_slice(self.input);
        let mut in_buf = DeviceBuffer::<R, T>::from_slice(client, &padded)?;

        let vec_bufs = self
            .vecs
            .iter()
            .map(|v| DeviceBuffer::<R, T>::from_slice(client, v))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<VectorView<'_, R, T>> = vec_bufs.iter().map(VectorView::from).collect();

        let len = self.input.len();
        match self.out_offset {
            None => {
                {
                    let mut inout =
                        MatrixViewMut::with_offset(&mut in_buf, self.in_offset, self.n_rows, self.row_len, Layout::RowMajor)?;
                    let ptr = inout.ptr();
                    let input = unsafe { MatrixView::<R, T>::from_raw(ptr, self.n_rows, self.row_len, Layout::RowMajor)? };
                    linewise_op_with_config(client, config, &mut inout, &input, self.along_lines, op, &views)?;
                }
                in_buf.read_range(client, self.in_offset, len)
            }
            Some(out_offset) => {
                let mut out_buf = DeviceBuffer::<R, T>::zeros(client, out_offset + len)?;
                {
                    let input = MatrixView::with_offset(&in_buf, self.in_offset, self.n_rows, self.row_len, Layout::RowMajor)?;
                    let mut out =
                        MatrixViewMut::with_offset(&mut out_buf, out_offset, self.n_rows, self.row_len, Layout::RowMajor)?;
                    linewise_op_with_config(client, config, &mut out, &input, self.along_lines, op, &views)?;
                }
                out_buf.read_range(client, out_offset, len)
            }
        }
    }
}
