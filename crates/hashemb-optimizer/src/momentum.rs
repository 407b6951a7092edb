//! Momentum optimizer.
//!
//! Momentum keeps a velocity per table element that decays by a constant
//! factor and accumulates the scaled negative gradient.
//!
//! # Example
//!
//! ```
//! use hashemb_optimizer::{Momentum, OptimizerConfig, SparseOptimizer};
//!
//! let mut momentum = Momentum::new(OptimizerConfig::momentum(0.1), 4, 3).unwrap();
//! let mut row = vec![1.0, 2.0, 3.0];
//! momentum.begin_step();
//! momentum.apply_row(0, &mut row, &[1.0, 1.0, 1.0]);
//! assert!((row[0] - 0.9).abs() < 1e-6);
//! ```

use crate::{OptimizerConfig, OptimizerError, SparseOptimizer, StateSlot};

/// Momentum optimizer.
///
/// Updates a touched element as:
/// ```text
/// velocity = factor * velocity - learning_rate * gradient
/// value    = value + velocity
/// ```
#[derive(Debug, Clone)]
pub struct Momentum {
    learning_rate: f32,
    factor: f32,
    dim: usize,
    /// Velocity buffer, `[num_rows, dim]`.
    velocity: Vec<f32>,
    config: OptimizerConfig,
}

impl Momentum {
    /// Returns the current velocity state.
    pub fn velocity(&self) -> &[f32] {
        &self.velocity
    }
}

impl SparseOptimizer for Momentum {
    fn new(config: OptimizerConfig, num_rows: usize, dim: usize) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Momentum {
                learning_rate,
                factor,
            } => {
                config.validate()?;
                Ok(Self {
                    learning_rate,
                    factor,
                    dim,
                    velocity: vec![0.0; num_rows * dim],
                    config,
                })
            }
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Momentum".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn begin_step(&mut self) {}

    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]) {
        let start = row * self.dim;
        let velocity = &mut self.velocity[start..start + self.dim];

        for ((e, g), mo) in embedding.iter_mut().zip(gradients).zip(velocity.iter_mut()) {
            *mo = self.factor * *mo - self.learning_rate * g;
            *e += *mo;
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn state_slots(&self) -> Vec<StateSlot<'_>> {
        vec![StateSlot {
            name: "velocity",
            values: &self.velocity,
        }]
    }

    fn reset_state(&mut self) {
        self.velocity.fill(0.0);
    }
}
