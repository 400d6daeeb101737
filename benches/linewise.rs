//! Linewise throughput on the CPU backend
//!
//! Both strategies over square-ish f32 matrices, aligned and offset by one
//! element, plus a many-short-rows case where rows end inside transactions.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use linewise::ops::{BinaryOp, Layout, MatrixView, MatrixViewMut, VectorView, linewise_op};
use linewise::runtime::cpu::{CpuClient, CpuRuntime};
use linewise::runtime::{DeviceBuffer, Runtime, RuntimeClient};

fn client() -> CpuClient {
    CpuRuntime::default_client(&CpuRuntime::default_device())
}

fn bench_case(c: &mut Criterion, group_name: &str, shapes: &[(usize, usize)]) {
    let client = client();
    let mut group = c.benchmark_group(group_name);

    for &(n_rows, n_cols) in shapes {
        let len = n_rows * n_cols;
        group.throughput(Throughput::Bytes((2 * len * std::mem::size_of::<f32>()) as u64));

        let data: Vec<f32> = (0..len + 1).map(|i| (i % 251) as f32).collect();
        let in_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &data).unwrap();
        let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, len + 1).unwrap();
        let per_row = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &vec![2.0; n_rows]).unwrap();
        let per_col = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &vec![3.0; n_cols]).unwrap();

        for offset in [0usize, 1] {
            for along_lines in [false, true] {
                let strategy = if along_lines { "vectorRows" } else { "vectorCols" };
                let id = BenchmarkId::new(format!("{strategy}/offset{offset}"), format!("{n_rows}x{n_cols}"));
                let vec_buf = if along_lines { &per_col } else { &per_row };
                group.bench_function(id, |b| {
                    let input = MatrixView::with_offset(&in_buf, offset, n_rows, n_cols, Layout::RowMajor).unwrap();
                    let mut out =
                        MatrixViewMut::with_offset(&mut out_buf, offset, n_rows, n_cols, Layout::RowMajor).unwrap();
                    let vecs = [VectorView::from(vec_buf)];
                    b.iter(|| {
                        linewise_op(&client, &mut out, &input, along_lines, black_box(BinaryOp::Mul), &vecs).unwrap();
                        client.synchronize().unwrap();
                    });
                });
            }
        }
    }

    group.finish();
}

fn bench_square(c: &mut Criterion) {
    bench_case(c, "linewise_square", &[(256, 256), (1024, 1024)]);
}

fn bench_short_rows(c: &mut Criterion) {
    bench_case(c, "linewise_short_rows", &[(65536, 3), (32768, 33)]);
}

criterion_group!(benches, bench_square, bench_short_rows);
criterion_main!(benches);
