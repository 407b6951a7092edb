//! Nesterov accelerated momentum.
//!
//! The accumulator follows the same recurrence as [`Momentum`](crate::Momentum)
//! with coefficient `mu`, but the value moves by the look-ahead difference
//! between the new and old accumulators.

use crate::{OptimizerConfig, OptimizerError, SparseOptimizer, StateSlot};

/// Nesterov momentum optimizer.
///
/// Updates a touched element as:
/// ```text
/// accm_old = accm
/// accm     = mu * accm_old - learning_rate * gradient
/// value    = value + (-mu * accm_old + (1 + mu) * accm)
/// ```
#[derive(Debug, Clone)]
pub struct Nesterov {
    learning_rate: f32,
    mu: f32,
    dim: usize,
    /// Accumulator, `[num_rows, dim]`.
    accm: Vec<f32>,
    config: OptimizerConfig,
}

impl Nesterov {
    /// Returns the current accumulator state.
    pub fn accumulator(&self) -> &[f32] {
        &self.accm
    }
}

impl SparseOptimizer for Nesterov {
    fn new(config: OptimizerConfig, num_rows: usize, dim: usize) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Nesterov { learning_rate, mu } => {
                config.validate()?;
                Ok(Self {
                    learning_rate,
                    mu,
                    dim,
                    accm: vec![0.0; num_rows * dim],
                    config,
                })
            }
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Nesterov".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn begin_step(&mut self) {}

    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]) {
        let start = row * self.dim;
        let accm = &mut self.accm[start..start + self.dim];

        for ((e, g), acc) in embedding.iter_mut().zip(gradients).zip(accm.iter_mut()) {
            let old = *acc;
            let new = self.mu * old - self.learning_rate * g;
            *acc = new;
            *e += -self.mu * old + (1.0 + self.mu) * new;
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn state_slots(&self) -> Vec<StateSlot<'_>> {
        vec![StateSlot {
            name: "accm",
            values: &self.accm,
        }]
    }

    fn reset_state(&mut self) {
        self.accm.fill(0.0);
    }
}
