//! Integration tests for the linewise engine on the CPU backend
//!
//! Every result is compared against `ops::reference::linewise_host`.

mod common;

use std::sync::Arc;

use common::{OffsetCase, assert_allclose, create_cpu_client, create_small_cpu_client, iota};
use linewise::algorithm::grid::striped_period;
use linewise::algorithm::{LinewiseConfig, LinewisePlan, MatrixLinewiseOp, Strategy};
use linewise::dtype::Element;
use linewise::error::Error;
use linewise::ops::reference::linewise_host;
use linewise::ops::{
    BinaryOp, Layout, LinewiseFn, MatrixView, MatrixViewMut, VectorView, linewise_fn, linewise_op, linewise_op_inplace,
    matrix_vector_op,
};
use linewise::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
use linewise::runtime::{DeviceBuffer, DevicePtr, DeviceProperties, RuntimeClient};

const ROW_LENS: [usize; 9] = [1, 2, 3, 7, 16, 31, 32, 33, 257];
const N_ROWS: [usize; 3] = [1, 5, 1000];

/// (input offset, output offset) in elements; `None` is in place.
/// For 4-byte elements these are byte offsets 0, 4 and 8.
const OFFSETS: [(usize, Option<usize>); 9] = [
    (0, Some(0)),
    (1, Some(1)),
    (2, Some(2)),
    (0, Some(1)),
    (1, Some(2)),
    (2, Some(0)),
    (0, None),
    (1, None),
    (2, None),
];

fn broadcast_vecs<T: Element>(len: usize, count: usize) -> Vec<Vec<T>> {
    (0..count)
        .map(|k| (0..len).map(|j| T::from_f64(((j * (k + 3)) % 7 + 1) as f64)).collect())
        .collect()
}

fn check_case<T, F>(client: &CpuClient, config: &LinewiseConfig, case: &OffsetCase<'_, T>, op: F)
where
    T: Element,
    F: LinewiseFn<T> + Clone,
{
    let host_vecs: Vec<&[T]> = case.vecs.iter().map(|v| v.as_slice()).collect();
    let expected = linewise_host(case.input, case.row_len, case.n_rows, case.along_lines, &op, &host_vecs).unwrap();
    let got = case.run::<CpuRuntime, F>(client, config, op).unwrap();
    assert_allclose(
        &got,
        &expected,
        0.0,
        0.0,
        &format!(
            "row_len={} n_rows={} along_lines={} in_offset={} out_offset={:?}",
            case.row_len, case.n_rows, case.along_lines, case.in_offset, case.out_offset
        ),
    );
}

fn sweep<T, F>(client: &CpuClient, config: &LinewiseConfig, n_vecs: usize, op: F)
where
    T: Element,
    F: LinewiseFn<T> + Clone,
{
    for &row_len in &ROW_LENS {
        for &n_rows in &N_ROWS {
            let input = iota::<T>(row_len * n_rows, 97);
            for along_lines in [false, true] {
                let vecs = broadcast_vecs::<T>(if along_lines { row_len } else { n_rows }, n_vecs);
                for &(in_offset, out_offset) in &OFFSETS {
                    let case = OffsetCase {
                        input: &input,
                        row_len,
                        n_rows,
                        along_lines,
                        vecs: &vecs,
                        in_offset,
                        out_offset,
                    };
                    check_case(client, config, &case, op.clone());
                }
            }
        }
    }
}

#[test]
fn test_alignment_sweep_f32_closure() {
    let client = create_small_cpu_client();
    let axpy = linewise_fn(|x: f32, v: &[f32]| x * v[0] + v[1]);
    sweep::<f32, _>(&client, &LinewiseConfig::SMALL, 2, axpy);
}

#[test]
fn test_alignment_sweep_f32_default_config() {
    let (client, _) = create_cpu_client();
    sweep::<f32, _>(&client, &LinewiseConfig::DEFAULT, 1, BinaryOp::Sub);
}

#[test]
fn test_alignment_sweep_u8_single_vector() {
    // 1-byte elements: up to 16 per transaction, so rows end inside transactions
    let client = create_small_cpu_client();
    sweep::<u8, _>(&client, &LinewiseConfig::SMALL, 1, BinaryOp::Max);
}

#[test]
fn test_alignment_sweep_f64_no_vectors() {
    let client = create_small_cpu_client();
    let double = linewise_fn(|x: f64, _: &[f64]| x + x);
    sweep::<f64, _>(&client, &LinewiseConfig::SMALL, 0, double);
}

#[test]
fn test_per_row_subtract_end_to_end() {
    let (client, _) = create_cpu_client();
    let m: Vec<f32> = (1..=12).map(|x| x as f32).collect();
    let m_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &m).unwrap();
    let v_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[10.0, 20.0, 30.0]).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();

    let input = MatrixView::new(&m_buf, 3, 4, Layout::RowMajor).unwrap();
    let mut out = MatrixViewMut::new(&mut out_buf, 3, 4, Layout::RowMajor).unwrap();
    matrix_vector_op(&client, &mut out, &input, &[(&v_buf).into()], false, BinaryOp::Sub).unwrap();

    assert_eq!(
        out_buf.to_vec(&client).unwrap(),
        vec![-9.0, -8.0, -7.0, -6.0, -15.0, -14.0, -13.0, -12.0, -21.0, -20.0, -19.0, -18.0]
    );
}

#[test]
fn test_matrix_vector_op_col_major() {
    let (client, _) = create_cpu_client();
    let (n_rows, n_cols) = (5usize, 3usize);
    // logical m[r][c] = 10 * r + c, stored column by column
    let logical = |r: usize, c: usize| (10 * r + c) as i32;
    let storage: Vec<i32> = (0..n_cols)
        .flat_map(|c| (0..n_rows).map(move |r| logical(r, c)))
        .collect();
    let per_col = [100, 200, 300];
    let per_row = [1, 2, 3, 4, 5];

    let m_buf = DeviceBuffer::<CpuRuntime, i32>::from_slice(&client, &storage).unwrap();
    let col_buf = DeviceBuffer::<CpuRuntime, i32>::from_slice(&client, &per_col).unwrap();
    let row_buf = DeviceBuffer::<CpuRuntime, i32>::from_slice(&client, &per_row).unwrap();
    let mut along = DeviceBuffer::<CpuRuntime, i32>::zeros(&client, n_rows * n_cols).unwrap();
    let mut across = DeviceBuffer::<CpuRuntime, i32>::zeros(&client, n_rows * n_cols).unwrap();

    let input = MatrixView::new(&m_buf, n_rows, n_cols, Layout::ColMajor).unwrap();
    {
        let mut out = MatrixViewMut::new(&mut along, n_rows, n_cols, Layout::ColMajor).unwrap();
        matrix_vector_op(&client, &mut out, &input, &[(&col_buf).into()], true, BinaryOp::Add).unwrap();
    }
    {
        let mut out = MatrixViewMut::new(&mut across, n_rows, n_cols, Layout::ColMajor).unwrap();
        matrix_vector_op(&client, &mut out, &input, &[(&row_buf).into()], false, BinaryOp::Mul).unwrap();
    }

    let along = along.to_vec(&client).unwrap();
    let across = across.to_vec(&client).unwrap();
    for c in 0..n_cols {
        for r in 0..n_rows {
            let i = c * n_rows + r;
            assert_eq!(along[i], logical(r, c) + per_col[c], "along rows at ({r}, {c})");
            assert_eq!(across[i], logical(r, c) * per_row[r], "across rows at ({r}, {c})");
        }
    }
}

#[test]
fn test_multiply_by_ones_is_identity() {
    let client = create_small_cpu_client();
    for &(in_offset, out_offset) in &OFFSETS {
        let input = iota::<i32>(33 * 7, 1000);
        let ones = vec![vec![1i32; 33]];
        let case = OffsetCase {
            input: &input,
            row_len: 33,
            n_rows: 7,
            along_lines: true,
            vecs: &ones,
            in_offset,
            out_offset,
        };
        let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, BinaryOp::Mul).unwrap();
        assert_eq!(got, input);
    }
}

#[test]
fn test_passthrough_operator_is_idempotent() {
    let client = create_small_cpu_client();
    let keep = linewise_fn(|x: i64, _: &[i64]| x);
    let input = iota::<i64>(31 * 9, 500);
    let vecs = vec![vec![7i64; 9]];
    let case = OffsetCase {
        input: &input,
        row_len: 31,
        n_rows: 9,
        along_lines: false,
        vecs: &vecs,
        in_offset: 1,
        out_offset: None,
    };
    let once = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, keep).unwrap();
    let twice_case = OffsetCase { input: &once, ..case };
    let twice = twice_case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, keep).unwrap();
    assert_eq!(once, input);
    assert_eq!(twice, once);
}

#[test]
fn test_head_and_tail_are_written() {
    // 8-byte offset at 16-byte width: 2-element head, 1-element tail
    let props = DeviceProperties::default();
    let plan = LinewisePlan::new(&props, &LinewiseConfig::SMALL, 4, 0x1008, 0x2008, 7, 5, false, 1).unwrap();
    assert_eq!(plan.split.head(), 0..2);
    assert_eq!(plan.split.tail(), 34..35);
    assert_eq!(plan.launches(), 2);

    let client = create_small_cpu_client();
    let input = iota::<f32>(35, 1000);
    let vecs = vec![vec![1000.0f32, 2000.0, 3000.0, 4000.0, 5000.0]];
    let case = OffsetCase {
        input: &input,
        row_len: 7,
        n_rows: 5,
        along_lines: false,
        vecs: &vecs,
        in_offset: 2,
        out_offset: Some(2),
    };
    let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, BinaryOp::Add).unwrap();
    for (i, &x) in got.iter().enumerate() {
        assert_eq!(x, i as f32 + vecs[0][i / 7], "element {i}");
    }
}

#[test]
fn test_buffer_shorter_than_head_runs_boundary_only() {
    let plan = LinewisePlan::new(&DeviceProperties::default(), &LinewiseConfig::DEFAULT, 4, 0x1004, 0x1004, 2, 1, true, 1)
        .unwrap();
    assert!(plan.main.is_none());
    assert_eq!(plan.launches(), 1);

    let client = create_small_cpu_client();
    let input = vec![1.0f32, 2.0];
    let vecs = vec![vec![0.5f32, 0.25]];
    let case = OffsetCase {
        input: &input,
        row_len: 2,
        n_rows: 1,
        along_lines: true,
        vecs: &vecs,
        in_offset: 1,
        out_offset: None,
    };
    let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::DEFAULT, BinaryOp::Mul).unwrap();
    assert_eq!(got, vec![0.5, 0.5]);
}

#[test]
fn test_striped_grid_is_period_multiple() {
    let props = DeviceProperties {
        sm_count: 3,
        ..DeviceProperties::default()
    };
    for config in [LinewiseConfig::DEFAULT, LinewiseConfig::SMALL] {
        for &row_len in &ROW_LENS {
            for &n_rows in &N_ROWS {
                let plan =
                    LinewisePlan::new(&props, &config, 4, 0x1000, 0x4000, row_len, n_rows, true, 2).unwrap();
                assert_eq!(plan.strategy, Strategy::VecRows);
                let Some(main) = plan.main else { continue };
                let work = config.block_size as u64 * plan.layout().elems() as u64;
                assert_eq!(
                    main.config.grid_dim as u64 % striped_period(row_len, work),
                    0,
                    "row_len={row_len} n_rows={n_rows}"
                );
            }
        }
    }
}

#[test]
fn test_striped_period_beyond_grid_limit_is_backend_limitation() {
    let props = DeviceProperties {
        max_grid_dim: 100,
        ..DeviceProperties::default()
    };
    let err = LinewisePlan::new(&props, &LinewiseConfig::DEFAULT, 4, 0x1000, 0x1000, 257, 1000, true, 1).unwrap_err();
    assert!(matches!(err, Error::BackendLimitation { .. }), "{err:?}");
    // the blocked strategy has no period constraint
    assert!(LinewisePlan::new(&props, &LinewiseConfig::DEFAULT, 4, 0x1000, 0x1000, 257, 1000, false, 1).is_ok());
}

#[test]
fn test_vector_length_mismatch() {
    let (client, _) = create_cpu_client();
    let m_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();
    let v_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 4).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();
    let input = MatrixView::new(&m_buf, 3, 4, Layout::RowMajor).unwrap();
    let mut out = MatrixViewMut::new(&mut out_buf, 3, 4, Layout::RowMajor).unwrap();

    // per-row broadcast needs 3 values
    let err = matrix_vector_op(&client, &mut out, &input, &[(&v_buf).into()], false, BinaryOp::Add).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }), "{err:?}");
    assert!(matrix_vector_op(&client, &mut out, &input, &[(&v_buf).into()], true, BinaryOp::Add).is_ok());
}

#[test]
fn test_views_must_fit_their_buffers() {
    let (client, _) = create_cpu_client();
    let buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();
    assert!(MatrixView::with_offset(&buf, 1, 3, 4, Layout::RowMajor).is_err());
    assert!(VectorView::with_offset(&buf, 10, 3).is_err());
    assert!(MatrixView::with_offset(&buf, 2, 2, 5, Layout::ColMajor).is_ok());
}

#[test]
fn test_output_shape_must_match_input() {
    let (client, _) = create_cpu_client();
    let m_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 12).unwrap();
    let input = MatrixView::new(&m_buf, 3, 4, Layout::RowMajor).unwrap();
    let mut out = MatrixViewMut::new(&mut out_buf, 4, 3, Layout::RowMajor).unwrap();
    let err = linewise_op(&client, &mut out, &input, true, BinaryOp::Add, &[]).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { .. }));

    let mut out = MatrixViewMut::new(&mut out_buf, 3, 4, Layout::ColMajor).unwrap();
    let err = linewise_op(&client, &mut out, &input, true, BinaryOp::Add, &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { arg: "layout", .. }));
}

#[test]
fn test_extents_overflowing_index_type() {
    let (client, _) = create_cpu_client();
    let buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 16).unwrap();
    let err = MatrixView::<CpuRuntime, f32, i32>::new(&buf, 65536, 65536, Layout::RowMajor).unwrap_err();
    assert!(matches!(err, Error::IndexOverflow { index_type: "i32", .. }), "{err:?}");

    let err = unsafe {
        MatrixLinewiseOp::run::<CpuRuntime, _, f32, i32, _>(
            &client,
            buf.ptr(),
            buf.ptr(),
            i32::MAX,
            2,
            false,
            BinaryOp::Add,
            &[],
        )
    }
    .unwrap_err();
    assert!(matches!(err, Error::IndexOverflow { .. }));
}

#[test]
fn test_narrow_index_types_run() {
    let (client, _) = create_cpu_client();
    let m = iota::<f32>(6, 100);
    let m_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &m).unwrap();
    let v_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[1.0, 2.0, 3.0]).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 6).unwrap();
    {
        let input = MatrixView::<CpuRuntime, f32, u32>::new(&m_buf, 2, 3, Layout::RowMajor).unwrap();
        let mut out = MatrixViewMut::<CpuRuntime, f32, u32>::new(&mut out_buf, 2, 3, Layout::RowMajor).unwrap();
        assert_eq!(input.line_len(), 3);
        assert_eq!(input.n_lines(), 2);
        matrix_vector_op(&client, &mut out, &input, &[(&v_buf).into()], true, BinaryOp::Add).unwrap();
    }
    assert_eq!(out_buf.to_vec(&client).unwrap(), vec![1.0, 3.0, 5.0, 4.0, 6.0, 8.0]);
}

#[test]
fn test_misaligned_and_null_pointers_rejected() {
    let (client, _) = create_cpu_client();
    let buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 16).unwrap();
    let odd = DevicePtr::<f32>::new(buf.ptr().addr() + 2);

    let err = unsafe {
        MatrixLinewiseOp::run::<CpuRuntime, _, f32, usize, _>(&client, buf.ptr(), odd, 4, 2, true, BinaryOp::Add, &[])
    }
    .unwrap_err();
    assert!(matches!(err, Error::Misaligned { what: "in", align: 4, .. }), "{err:?}");

    let err = unsafe {
        MatrixLinewiseOp::run::<CpuRuntime, _, f32, usize, _>(
            &client,
            DevicePtr::null(),
            buf.ptr(),
            4,
            2,
            true,
            BinaryOp::Add,
            &[],
        )
    }
    .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { arg: "out", .. }));
}

#[test]
fn test_invalid_config_rejected() {
    let (client, _) = create_cpu_client();
    let m_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 64).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 64).unwrap();
    let input = MatrixView::new(&m_buf, 8, 8, Layout::RowMajor).unwrap();
    let mut out = MatrixViewMut::new(&mut out_buf, 8, 8, Layout::RowMajor).unwrap();
    for block_size in [0, 48, 2048] {
        let config = LinewiseConfig {
            block_size,
            ..LinewiseConfig::DEFAULT
        };
        let err = linewise::ops::linewise_op_with_config(&client, &config, &mut out, &input, true, BinaryOp::Add, &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "block_size", .. }), "{err:?}");
    }
}

#[test]
fn test_empty_matrix_enqueues_nothing() {
    let (client, _) = create_cpu_client();
    let buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 4).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 4).unwrap();
    let input = MatrixView::new(&buf, 0, 4, Layout::RowMajor).unwrap();
    let mut out = MatrixViewMut::new(&mut out_buf, 0, 4, Layout::RowMajor).unwrap();
    linewise_op(&client, &mut out, &input, true, BinaryOp::Add, &[(&buf).into()]).unwrap();
    assert_eq!(client.stream().pending(), 0);
}

#[test]
fn test_launches_are_stream_ordered() {
    let (client, _) = create_cpu_client();
    let m = iota::<f64>(257 * 40, 1000);
    let mut buf = DeviceBuffer::<CpuRuntime, f64>::from_slice(&client, &m).unwrap();
    let rows = DeviceBuffer::<CpuRuntime, f64>::from_slice(&client, &vec![2.0; 40]).unwrap();
    let cols = DeviceBuffer::<CpuRuntime, f64>::from_slice(&client, &vec![3.0; 257]).unwrap();
    {
        let mut inout = MatrixViewMut::new(&mut buf, 40, 257, Layout::RowMajor).unwrap();
        // (x * 2 + 3) * 2 without intermediate synchronization
        linewise_op_inplace(&client, &mut inout, false, BinaryOp::Mul, &[(&rows).into()]).unwrap();
        linewise_op_inplace(&client, &mut inout, true, BinaryOp::Add, &[(&cols).into()]).unwrap();
        linewise_op_inplace(&client, &mut inout, false, BinaryOp::Mul, &[(&rows).into()]).unwrap();
    }
    let expected: Vec<f64> = m.iter().map(|x| (x * 2.0 + 3.0) * 2.0).collect();
    assert_eq!(buf.to_vec(&client).unwrap(), expected);
}

#[test]
fn test_launch_returns_before_kernel_runs() {
    let client = CpuClient::new(CpuDevice::new());
    assert!(client.stream().is_async());

    let gate = Arc::new(parking_lot::Mutex::new(()));
    let held = gate.lock();
    let kernel_gate = gate.clone();
    let gated = linewise_fn(move |x: f32, v: &[f32]| {
        let _open = kernel_gate.lock();
        x + v[0]
    });

    let m_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    let v_buf = DeviceBuffer::<CpuRuntime, f32>::from_slice(&client, &[10.0]).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, f32>::zeros(&client, 4).unwrap();
    {
        let input = MatrixView::new(&m_buf, 1, 4, Layout::RowMajor).unwrap();
        let mut out = MatrixViewMut::new(&mut out_buf, 1, 4, Layout::RowMajor).unwrap();
        linewise_op(&client, &mut out, &input, false, gated, &[(&v_buf).into()]).unwrap();
    }
    assert!(client.stream().pending() > 0);

    drop(held);
    client.synchronize().unwrap();
    assert_eq!(client.stream().pending(), 0);
    assert_eq!(out_buf.to_vec(&client).unwrap(), vec![11.0, 12.0, 13.0, 14.0]);
}

#[test]
fn test_kernel_fault_reported_at_synchronize() {
    let (client, _) = create_cpu_client();
    let m_buf = DeviceBuffer::<CpuRuntime, i32>::from_slice(&client, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    let mut out_buf = DeviceBuffer::<CpuRuntime, i32>::zeros(&client, 8).unwrap();
    let faulty = linewise_fn(|x: i32, _: &[i32]| {
        if x == 5 {
            panic!("bad element");
        }
        x
    });
    {
        let input = MatrixView::new(&m_buf, 2, 4, Layout::RowMajor).unwrap();
        let mut out = MatrixViewMut::new(&mut out_buf, 2, 4, Layout::RowMajor).unwrap();
        // enqueueing succeeds; the fault surfaces later
        linewise_op(&client, &mut out, &input, true, faulty, &[]).unwrap();
    }
    let err = client.synchronize().unwrap_err();
    assert!(matches!(err, Error::DeviceFault { .. }), "{err:?}");
    assert!(err.is_device_error());

    // reported once; the stream keeps working
    client.synchronize().unwrap();
    {
        let input = MatrixView::new(&m_buf, 2, 4, Layout::RowMajor).unwrap();
        let mut out = MatrixViewMut::new(&mut out_buf, 2, 4, Layout::RowMajor).unwrap();
        linewise_op(&client, &mut out, &input, true, BinaryOp::Add, &[]).unwrap();
    }
    assert_eq!(out_buf.to_vec(&client).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_many_vectors_fold_in_order() {
    let client = create_small_cpu_client();
    let input = iota::<f64>(33 * 12, 1000);
    let vecs = broadcast_vecs::<f64>(33, 4);
    let case = OffsetCase {
        input: &input,
        row_len: 33,
        n_rows: 12,
        along_lines: true,
        vecs: &vecs,
        in_offset: 1,
        out_offset: Some(0),
    };
    let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, BinaryOp::Sub).unwrap();
    for (i, &x) in got.iter().enumerate() {
        let j = i % 33;
        let expected = input[i] - vecs[0][j] - vecs[1][j] - vecs[2][j] - vecs[3][j];
        assert_eq!(x, expected, "element {i}");
    }
}

#[test]
fn test_integer_min_max() {
    let client = create_small_cpu_client();
    let input = iota::<i16>(7 * 33, 50);
    let vecs = vec![vec![20i16; 33]];
    for (op, f) in [(BinaryOp::Min, i16::min as fn(i16, i16) -> i16), (BinaryOp::Max, i16::max)] {
        let case = OffsetCase {
            input: &input,
            row_len: 33,
            n_rows: 7,
            along_lines: true,
            vecs: &vecs,
            in_offset: 2,
            out_offset: Some(1),
        };
        let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, op).unwrap();
        let expected: Vec<i16> = input.iter().map(|&x| f(x, 20)).collect();
        assert_eq!(got, expected, "{op}");
    }
}

#[test]
fn test_u8_add_wraps_on_both_strategies() {
    let client = create_small_cpu_client();
    let input = vec![200u8; 37 * 9];
    for along_lines in [false, true] {
        let vecs = vec![vec![100u8; if along_lines { 37 } else { 9 }]];
        let case = OffsetCase {
            input: &input,
            row_len: 37,
            n_rows: 9,
            along_lines,
            vecs: &vecs,
            in_offset: 3,
            out_offset: Some(1),
        };
        let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, BinaryOp::Add).unwrap();
        assert!(got.iter().all(|&x| x == 44), "along_lines={along_lines}: {got:?}");
    }
}

#[test]
fn test_i32_overflow_and_zero_divisor_are_defined() {
    let client = create_small_cpu_client();
    let input = vec![i32::MIN; 5 * 40];
    let cases: [(BinaryOp, i32, i32); 4] = [
        (BinaryOp::Sub, 1, i32::MAX),
        (BinaryOp::Mul, 2, 0),
        (BinaryOp::Div, 0, 0),
        (BinaryOp::Div, -1, i32::MIN),
    ];
    for (op, v, expected) in cases {
        let vecs = vec![vec![v; 5]];
        let case = OffsetCase {
            input: &input,
            row_len: 40,
            n_rows: 5,
            along_lines: false,
            vecs: &vecs,
            in_offset: 1,
            out_offset: None,
        };
        let got = case.run::<CpuRuntime, _>(&client, &LinewiseConfig::SMALL, op).unwrap();
        assert!(got.iter().all(|&x| x == expected), "{op} {v}: {got:?}");
    }
}

#[cfg(feature = "cuda")]
mod cuda_tests {
    use super::*;
    use linewise::runtime::cuda::{CudaClient, CudaRuntime};

    const CUDA_ROW_LENS: [usize; 5] = [1, 3, 31, 33, 257];

    fn check_cuda_case<T, F>(client: &CudaClient, case: &OffsetCase<'_, T>, op: F)
    where
        T: Element,
        F: LinewiseFn<T> + Clone,
    {
        let host_vecs: Vec<&[T]> = case.vecs.iter().map(|v| v.as_slice()).collect();
        let expected = linewise_host(case.input, case.row_len, case.n_rows, case.along_lines, &op, &host_vecs).unwrap();
        let got = case.run::<CudaRuntime, F>(client, &LinewiseConfig::DEFAULT, op).unwrap();
        assert_allclose(
            &got,
            &expected,
            0.0,
            0.0,
            &format!(
                "cuda row_len={} n_rows={} along_lines={} in_offset={} out_offset={:?}",
                case.row_len, case.n_rows, case.along_lines, case.in_offset, case.out_offset
            ),
        );
    }

    fn cuda_sweep<T, F>(client: &CudaClient, n_vecs: usize, vec_value: Option<T>, modulus: usize, op: F)
    where
        T: Element,
        F: LinewiseFn<T> + Clone,
    {
        for &row_len in &CUDA_ROW_LENS {
            for &n_rows in &N_ROWS {
                let input = iota::<T>(row_len * n_rows, modulus);
                for along_lines in [false, true] {
                    let vec_len = if along_lines { row_len } else { n_rows };
                    let vecs = match vec_value {
                        Some(v) => vec![vec![v; vec_len]; n_vecs],
                        None => broadcast_vecs::<T>(vec_len, n_vecs),
                    };
                    for &(in_offset, out_offset) in &OFFSETS {
                        let case = OffsetCase {
                            input: &input,
                            row_len,
                            n_rows,
                            along_lines,
                            vecs: &vecs,
                            in_offset,
                            out_offset,
                        };
                        check_cuda_case(client, &case, op.clone());
                    }
                }
            }
        }
    }

    #[test]
    fn test_cuda_alignment_sweep_f32_two_vectors() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        cuda_sweep::<f32, _>(&client, 2, None, 97, BinaryOp::Sub);
    }

    #[test]
    fn test_cuda_alignment_sweep_f64_no_vectors() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        cuda_sweep::<f64, _>(&client, 0, None, 97, BinaryOp::Mul);
    }

    #[test]
    fn test_cuda_u8_add_wraps_like_host() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        cuda_sweep::<u8, _>(&client, 1, Some(200), 256, BinaryOp::Add);
    }

    #[test]
    fn test_cuda_i32_zero_divisor_like_host() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        cuda_sweep::<i32, _>(&client, 2, Some(0), 97, BinaryOp::Div);
    }

    #[test]
    fn test_cuda_i16_min_max() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        cuda_sweep::<i16, _>(&client, 1, None, 50, BinaryOp::Min);
        cuda_sweep::<i16, _>(&client, 1, None, 50, BinaryOp::Max);
    }

    #[test]
    fn test_cuda_rejects_host_closures() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        let input = iota::<f32>(64, 97);
        let vecs = broadcast_vecs::<f32>(8, 1);
        let case = OffsetCase {
            input: &input,
            row_len: 8,
            n_rows: 8,
            along_lines: true,
            vecs: &vecs,
            in_offset: 0,
            out_offset: Some(0),
        };
        let scale = linewise_fn(|x: f32, v: &[f32]| x * v[0]);
        let err = case.run::<CudaRuntime, _>(&client, &LinewiseConfig::DEFAULT, scale).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }), "{err:?}");
    }

    #[test]
    fn test_cuda_rejects_more_than_two_vectors() {
        let Some((client, _)) = common::create_cuda_client() else {
            println!("CUDA not available, skipping test");
            return;
        };
        let input = iota::<f32>(64, 97);
        let vecs = broadcast_vecs::<f32>(8, 3);
        let case = OffsetCase {
            input: &input,
            row_len: 8,
            n_rows: 8,
            along_lines: false,
            vecs: &vecs,
            in_offset: 1,
            out_offset: Some(1),
        };
        let err = case.run::<CudaRuntime, _>(&client, &LinewiseConfig::DEFAULT, BinaryOp::Add).unwrap_err();
        assert!(matches!(err, Error::BackendLimitation { .. }), "{err:?}");
    }
}
