//! Forward pooling of embedding rows.
//!
//! Every (sample, slot) row of a CSR batch owns `feature_num` looked-up row
//! indices. Pooling reduces the corresponding embedding vectors into one
//! `dim`-wide output vector per row. Each output element is accumulated from
//! `0.0` in item order, which fixes the float summation order.

use crate::error::{LayerError, LayerResult};

/// Trait for reducing the embeddings of one row.
pub trait Pooling: Send + Sync {
    /// Pools the table rows `rows` of `values` into `out` (`dim` long).
    fn pool(&self, values: &[f32], dim: usize, rows: &[usize], out: &mut [f32]);

    /// Scale applied to a row's upstream gradient for each of its
    /// `feature_num` items.
    fn grad_scale(&self, feature_num: usize) -> f32;
}

/// Sum pooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumPooling;

impl Pooling for SumPooling {
    fn pool(&self, values: &[f32], dim: usize, rows: &[usize], out: &mut [f32]) {
        sum_rows(values, dim, rows, out);
    }

    fn grad_scale(&self, _feature_num: usize) -> f32 {
        1.0
    }
}

/// Mean pooling.
///
/// Divides the sum by `feature_num` only when more than one item
/// contributed, so single-item rows match [`SumPooling`] exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanPooling;

impl Pooling for MeanPooling {
    fn pool(&self, values: &[f32], dim: usize, rows: &[usize], out: &mut [f32]) {
        sum_rows(values, dim, rows, out);
        if rows.len() > 1 {
            let count = rows.len() as f32;
            for o in out.iter_mut() {
                *o /= count;
            }
        }
    }

    fn grad_scale(&self, feature_num: usize) -> f32 {
        if feature_num > 1 {
            1.0 / feature_num as f32
        } else {
            1.0
        }
    }
}

fn sum_rows(values: &[f32], dim: usize, rows: &[usize], out: &mut [f32]) {
    out.fill(0.0);
    for &row in rows {
        let src = &values[row * dim..(row + 1) * dim];
        for (o, v) in out.iter_mut().zip(src) {
            *o += v;
        }
    }
}

/// Pools a whole batch.
///
/// `row_offset` delimits the rows of `row_indices`; `out` receives one
/// `dim`-wide vector per row. Rows with no items pool to zero.
///
/// # Errors
///
/// Returns [`LayerError::DimensionMismatch`] if `out` does not hold
/// `(row_offset.len() - 1) * dim` values or `row_indices` is shorter than
/// the last offset.
pub fn forward_pool(
    pooling: &dyn Pooling,
    row_offset: &[usize],
    row_indices: &[usize],
    values: &[f32],
    dim: usize,
    out: &mut [f32],
) -> LayerResult<()> {
    let num_rows = row_offset.len().saturating_sub(1);
    if out.len() != num_rows * dim {
        return Err(LayerError::DimensionMismatch {
            what: "embedding_feature",
            expected: num_rows * dim,
            actual: out.len(),
        });
    }
    let nnz = row_offset.last().copied().unwrap_or(0);
    if row_indices.len() < nnz {
        return Err(LayerError::DimensionMismatch {
            what: "row_indices",
            expected: nnz,
            actual: row_indices.len(),
        });
    }

    for (window, out_row) in row_offset.windows(2).zip(out.chunks_exact_mut(dim)) {
        pooling.pool(values, dim, &row_indices[window[0]..window[1]], out_row);
    }
    Ok(())
}
