//! Adam optimizer.
//!
//! Adam (Adaptive Moment Estimation) keeps exponential moving averages of
//! the gradients (first moment) and squared gradients (second moment) for
//! every table element. Bias correction is folded into a single per-step
//! rate computed once in [`begin_step`](crate::SparseOptimizer::begin_step).
//!
//! # Example
//!
//! ```
//! use hashemb_optimizer::{Adam, OptimizerConfig, SparseOptimizer};
//!
//! let mut adam = Adam::new(OptimizerConfig::adam(0.001), 10, 3).unwrap();
//! let mut row = vec![1.0, 2.0, 3.0];
//! adam.begin_step();
//! adam.apply_row(4, &mut row, &[0.1, 0.2, 0.3]);
//! assert_eq!(adam.timestep(), 1);
//! ```

use crate::{OptimizerConfig, OptimizerError, SparseOptimizer, StateSlot};

/// Adam optimizer with adaptive learning rates and momentum.
///
/// Each step updates a touched element as:
/// ```text
/// t       = t + 1                                    (once per step)
/// alpha_t = lr * sqrt(1 - beta2^t) / (1 - beta1^t)   (once per step)
/// m       = beta1 * m + (1 - beta1) * g
/// v       = beta2 * v + (1 - beta2) * g * g
/// value   = value - alpha_t * m / (sqrt(v) + epsilon)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    dim: usize,
    /// First moment estimates, `[num_rows, dim]`.
    m: Vec<f32>,
    /// Second moment estimates, `[num_rows, dim]`.
    v: Vec<f32>,
    /// Number of steps begun so far.
    t: u64,
    /// Bias-corrected rate of the current step.
    alpha_t: f32,
    config: OptimizerConfig,
}

impl Adam {
    /// Returns the current first moment state.
    pub fn first_moment(&self) -> &[f32] {
        &self.m
    }

    /// Returns the current second moment state.
    pub fn second_moment(&self) -> &[f32] {
        &self.v
    }

    /// Returns the current timestep.
    pub fn timestep(&self) -> u64 {
        self.t
    }

    /// Returns the bias-corrected rate of the current step.
    pub fn alpha_t(&self) -> f32 {
        self.alpha_t
    }
}

/// Computes `lr * sqrt(1 - beta2^t) / (1 - beta1^t)` in double precision.
pub fn bias_corrected_rate(learning_rate: f32, beta1: f32, beta2: f32, t: u64) -> f32 {
    let t = t as f64;
    let lr = f64::from(learning_rate);
    let rate = lr * (1.0 - f64::from(beta2).powf(t)).sqrt() / (1.0 - f64::from(beta1).powf(t));
    rate as f32
}

impl SparseOptimizer for Adam {
    fn new(config: OptimizerConfig, num_rows: usize, dim: usize) -> Result<Self, OptimizerError> {
        match config {
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                config.validate()?;
                Ok(Self {
                    learning_rate,
                    beta1,
                    beta2,
                    epsilon,
                    dim,
                    m: vec![0.0; num_rows * dim],
                    v: vec![0.0; num_rows * dim],
                    t: 0,
                    alpha_t: 0.0,
                    config,
                })
            }
            _ => Err(OptimizerError::ConfigMismatch {
                expected: "Adam".to_string(),
                got: config.name().to_string(),
            }),
        }
    }

    fn begin_step(&mut self) {
        self.t += 1;
        self.alpha_t = bias_corrected_rate(self.learning_rate, self.beta1, self.beta2, self.t);
    }

    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]) {
        let start = row * self.dim;
        let end = start + self.dim;
        let m = &mut self.m[start..end];
        let v = &mut self.v[start..end];

        for (((e, g), mi), vi) in embedding
            .iter_mut()
            .zip(gradients)
            .zip(m.iter_mut())
            .zip(v.iter_mut())
        {
            *mi = self.beta1 * *mi + (1.0 - self.beta1) * g;
            *vi = self.beta2 * *vi + (1.0 - self.beta2) * g * g;
            *e += -self.alpha_t * *mi / (vi.sqrt() + self.epsilon);
        }
    }

    fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn state_slots(&self) -> Vec<StateSlot<'_>> {
        vec![
            StateSlot {
                name: "m",
                values: &self.m,
            },
            StateSlot {
                name: "v",
                values: &self.v,
            },
        ]
    }

    fn reset_state(&mut self) {
        self.m.fill(0.0);
        self.v.fill(0.0);
        self.t = 0;
        self.alpha_t = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adam(num_rows: usize, dim: usize) -> Adam {
        Adam::new(OptimizerConfig::adam(0.1), num_rows, dim).unwrap()
    }

    #[test]
    fn test_alpha_first_step() {
        let mut adam = adam(1, 1);
        adam.begin_step();
        let lr = f64::from(0.1f32);
        let expected = (lr * (1.0 - f64::from(0.999f32)).sqrt() / (1.0 - f64::from(0.9f32))) as f32;
        assert_eq!(adam.alpha_t(), expected);
        assert!((adam.alpha_t() - 0.0316).abs() < 1e-3);
    }

    #[test]
    fn test_adam_single_update() {
        let mut adam = adam(2, 2);
        let mut row = vec![1.0, 2.0];
        adam.begin_step();
        adam.apply_row(1, &mut row, &[1.0, -1.0]);

        // m = 0.1 * g, v = 0.001 * g^2, step = alpha * m / (sqrt(v) + eps)
        let m = 1.0f32 - 0.9;
        let v = (1.0f32 - 0.999) * 1.0 * 1.0;
        let step = adam.alpha_t() * m / (v.sqrt() + 1e-8);
        assert!((row[0] - (1.0 - step)).abs() < 1e-6);
        assert!((row[1] - (2.0 + step)).abs() < 1e-6);
        assert_eq!(&adam.first_moment()[2..], &[m, -m]);
    }

    #[test]
    fn test_adam_only_touches_given_row() {
        let mut adam = adam(3, 2);
        let mut row = vec![0.0, 0.0];
        adam.begin_step();
        adam.apply_row(1, &mut row, &[0.5, 0.5]);

        assert_eq!(&adam.first_moment()[..2], &[0.0, 0.0]);
        assert_eq!(&adam.first_moment()[4..], &[0.0, 0.0]);
        assert!(adam.first_moment()[2] > 0.0);
        assert!(adam.second_moment()[3] > 0.0);
    }

    #[test]
    fn test_adam_timestep_increment() {
        let mut adam = adam(1, 1);
        assert_eq!(adam.timestep(), 0);
        adam.begin_step();
        adam.begin_step();
        assert_eq!(adam.timestep(), 2);
        assert_eq!(adam.alpha_t(), bias_corrected_rate(0.1, 0.9, 0.999, 2));
    }

    #[test]
    fn test_alpha_approaches_learning_rate() {
        let late = bias_corrected_rate(0.1, 0.9, 0.999, 100_000);
        assert!((late - 0.1).abs() < 1e-6);
        assert!(bias_corrected_rate(0.1, 0.9, 0.999, 10) < late);
    }

    #[test]
    fn test_adam_zero_gradient() {
        let mut adam = adam(1, 3);
        let mut row = vec![1.0, 2.0, 3.0];
        adam.begin_step();
        adam.apply_row(0, &mut row, &[0.0, 0.0, 0.0]);
        assert_eq!(row, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_adam_config_mismatch() {
        let result = Adam::new(OptimizerConfig::momentum(0.01), 1, 1);
        assert!(matches!(
            result,
            Err(OptimizerError::ConfigMismatch { .. })
        ));
    }

    #[test]
    fn test_adam_reset_state() {
        let mut adam = adam(1, 2);
        let mut row = vec![1.0, 2.0];
        adam.begin_step();
        adam.apply_row(0, &mut row, &[1.0, 1.0]);

        adam.reset_state();
        assert_eq!(adam.timestep(), 0);
        assert_eq!(adam.first_moment(), &[0.0, 0.0]);
        assert_eq!(adam.second_moment(), &[0.0, 0.0]);
        assert_eq!(adam.state_slots().len(), 2);
    }
}
