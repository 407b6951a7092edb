//! Backward distribution of the upstream gradient.
//!
//! Every item of a row receives the same gradient, so the per-row gradient
//! `wgrad[row]` is the upstream `top_grad[row]` scaled by the pooling's
//! [`grad_scale`](crate::pooling::Pooling::grad_scale).

use crate::error::{LayerError, LayerResult};
use crate::pooling::Pooling;

/// Writes `wgrad[row] = top_grad[row] * scale(feature_num(row))` for every
/// row delimited by `row_offset`.
///
/// # Errors
///
/// Returns [`LayerError::DimensionMismatch`] if `top_grad` or `wgrad` does
/// not hold `(row_offset.len() - 1) * dim` values.
pub fn backward_distribute(
    pooling: &dyn Pooling,
    row_offset: &[usize],
    top_grad: &[f32],
    dim: usize,
    wgrad: &mut [f32],
) -> LayerResult<()> {
    let expected = row_offset.len().saturating_sub(1) * dim;
    if top_grad.len() != expected {
        return Err(LayerError::DimensionMismatch {
            what: "top_grad",
            expected,
            actual: top_grad.len(),
        });
    }
    if wgrad.len() != expected {
        return Err(LayerError::DimensionMismatch {
            what: "wgrad",
            expected,
            actual: wgrad.len(),
        });
    }

    for ((window, grad_row), out_row) in row_offset
        .windows(2)
        .zip(top_grad.chunks_exact(dim))
        .zip(wgrad.chunks_exact_mut(dim))
    {
        let scale = pooling.grad_scale(window[1] - window[0]);
        for (o, g) in out_row.iter_mut().zip(grad_row) {
            *o = g * scale;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::{MeanPooling, SumPooling};

    const ROW_OFFSET: [usize; 4] = [0, 3, 3, 4];

    fn top_grad() -> Vec<f32> {
        vec![3.0, 6.0, 1.0, 1.0, 2.0, -2.0]
    }

    #[test]
    fn test_sum_copies_gradient() {
        let mut wgrad = vec![0.0; 6];
        backward_distribute(&SumPooling, &ROW_OFFSET, &top_grad(), 2, &mut wgrad).unwrap();
        assert_eq!(wgrad, top_grad());
    }

    #[test]
    fn test_mean_scales_multi_item_rows() {
        let mut sum = vec![0.0; 6];
        let mut mean = vec![0.0; 6];
        backward_distribute(&SumPooling, &ROW_OFFSET, &top_grad(), 2, &mut sum).unwrap();
        backward_distribute(&MeanPooling, &ROW_OFFSET, &top_grad(), 2, &mut mean).unwrap();

        // Row 0 has three items; rows 1 and 2 are passed through.
        assert_eq!(&mean[..2], &[3.0 * (1.0 / 3.0), 6.0 * (1.0 / 3.0)]);
        assert_eq!(&mean[2..], &sum[2..]);
    }

    #[test]
    fn test_length_checked() {
        let mut wgrad = vec![0.0; 6];
        let err = backward_distribute(&SumPooling, &ROW_OFFSET, &[0.0; 4], 2, &mut wgrad)
            .unwrap_err();
        assert!(matches!(
            err,
            LayerError::DimensionMismatch {
                what: "top_grad",
                expected: 6,
                actual: 4
            }
        ));
    }
}
