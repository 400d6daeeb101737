//! Naive host implementation of the linewise operator
//!
//! One scalar at a time, no alignment handling, no parallelism. Used as the
//! ground truth for the device kernels.

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::LinewiseFn;

/// `out[i] = op(input[i], vecs[..][idx(i)])` over a flat `row_len x n_rows` matrix
///
/// `idx(i)` is the position in the row (`i % row_len`) when `along_lines`,
/// the row index (`i / row_len`) otherwise.
pub fn linewise_host<T, F>(
    input: &[T],
    row_len: usize,
    n_rows: usize,
    along_lines: bool,
    op: &F,
    vecs: &[&[T]],
) -> Result<Vec<T>>
where
    T: Element,
    F: LinewiseFn<T> + ?Sized,
{
    let len = row_len.checked_mul(n_rows).ok_or(Error::IndexOverflow {
        index_type: "usize",
        what: "row_len * n_rows",
    })?;
    if input.len() != len {
        return Err(Error::shape_mismatch(&[n_rows, row_len], &[input.len()]));
    }
    let vec_len = if along_lines { row_len } else { n_rows };
    if let Some(v) = vecs.iter().find(|v| v.len() != vec_len) {
        return Err(Error::shape_mismatch(&[vec_len], &[v.len()]));
    }

    let mut args = vec![T::zero(); vecs.len()];
    let out = input
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let idx = if along_lines { i % row_len } else { i / row_len };
            for (a, v) in args.iter_mut().zip(vecs) {
                *a = v[idx];
            }
            op.apply(x, &args)
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::BinaryOp;

    #[test]
    fn test_per_row_subtract() {
        let m: Vec<f32> = (1..=12).map(|x| x as f32).collect();
        let out = linewise_host(&m, 4, 3, false, &BinaryOp::Sub, &[&[10.0, 20.0, 30.0]]).unwrap();
        assert_eq!(
            out,
            vec![-9.0, -8.0, -7.0, -6.0, -15.0, -14.0, -13.0, -12.0, -21.0, -20.0, -19.0, -18.0]
        );
    }

    #[test]
    fn test_along_lines_uses_row_position() {
        let m = vec![1i32; 6];
        let out = linewise_host(&m, 3, 2, true, &BinaryOp::Mul, &[&[2, 3, 4]]).unwrap();
        assert_eq!(out, vec![2, 3, 4, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_wrong_vector_length() {
        let m = vec![0u8; 6];
        assert!(matches!(
            linewise_host(&m, 3, 2, true, &BinaryOp::Add, &[&[1, 2]]),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
