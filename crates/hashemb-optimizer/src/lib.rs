//! Sparse embedding optimizers.
//!
//! This crate provides the row-wise update rules used by the reference
//! sparse embedding layer. Each optimizer owns state arrays shaped like the
//! embedding table (`[num_rows, dim]`, zero-initialized) and only ever
//! touches the rows it is handed, so rows absent from a batch keep their
//! values and state bit-for-bit.
//!
//! # Available Optimizers
//!
//! - [`Adam`] - Adaptive Moment Estimation with a per-step bias-corrected rate
//! - [`Momentum`] - Classical momentum
//! - [`Nesterov`] - Nesterov accelerated momentum
//!
//! # Example
//!
//! ```
//! use hashemb_optimizer::{create_optimizer, OptimizerConfig};
//!
//! let config = OptimizerConfig::momentum(0.1);
//! let mut optimizer = create_optimizer(config, 4, 2).unwrap();
//!
//! let mut row = vec![1.0, 2.0];
//! optimizer.begin_step();
//! optimizer.apply_row(3, &mut row, &[1.0, 1.0]);
//! assert!(row[0] < 1.0);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod adam;
mod momentum;
mod nesterov;

pub use adam::{bias_corrected_rate, Adam};
pub use momentum::Momentum;
pub use nesterov::Nesterov;

/// Default Adam first-moment decay.
pub const DEFAULT_ADAM_BETA1: f32 = 0.9;
/// Default Adam second-moment decay.
pub const DEFAULT_ADAM_BETA2: f32 = 0.999;
/// Default Adam epsilon.
pub const DEFAULT_ADAM_EPSILON: f32 = 1e-8;
/// Default momentum factor.
pub const DEFAULT_MOMENTUM_FACTOR: f32 = 0.9;
/// Default Nesterov momentum coefficient.
pub const DEFAULT_NESTEROV_MU: f32 = 0.9;

/// Errors that can occur when working with optimizers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    /// Configuration type does not match the optimizer type.
    #[error("Config mismatch: expected {expected}, got {got}")]
    ConfigMismatch { expected: String, got: String },

    /// Invalid configuration parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The optimizer selector names no supported optimizer.
    #[error("Unsupported optimizer: {0}")]
    UnsupportedOptimizer(String),
}

/// Optimizer selector.
///
/// The integer codes are those of the original construction interface:
/// `0` Adam, `1` Momentum, `2` Nesterov.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    /// Adam.
    Adam,
    /// Momentum.
    Momentum,
    /// Nesterov momentum.
    Nesterov,
}

impl OptimizerKind {
    /// Returns the integer selector code.
    pub fn code(self) -> i32 {
        match self {
            OptimizerKind::Adam => 0,
            OptimizerKind::Momentum => 1,
            OptimizerKind::Nesterov => 2,
        }
    }
}

impl TryFrom<i32> for OptimizerKind {
    type Error = OptimizerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OptimizerKind::Adam),
            1 => Ok(OptimizerKind::Momentum),
            2 => Ok(OptimizerKind::Nesterov),
            other => Err(OptimizerError::UnsupportedOptimizer(format!(
                "selector {other}"
            ))),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(OptimizerKind::Adam),
            "momentum" => Ok(OptimizerKind::Momentum),
            "nesterov" => Ok(OptimizerKind::Nesterov),
            _ => Err(OptimizerError::UnsupportedOptimizer(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Adam => write!(f, "adam"),
            OptimizerKind::Momentum => write!(f, "momentum"),
            OptimizerKind::Nesterov => write!(f, "nesterov"),
        }
    }
}

/// Configuration for the supported optimizers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizerConfig {
    /// Adam configuration.
    Adam {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Exponential decay rate for first moment estimates.
        beta1: f32,
        /// Exponential decay rate for second moment estimates.
        beta2: f32,
        /// Small constant for numerical stability.
        epsilon: f32,
    },

    /// Momentum configuration.
    Momentum {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Decay applied to the velocity each step.
        factor: f32,
    },

    /// Nesterov configuration.
    Nesterov {
        /// Learning rate for gradient updates.
        learning_rate: f32,
        /// Momentum coefficient.
        mu: f32,
    },
}

impl OptimizerConfig {
    /// Adam with the default betas and epsilon.
    pub fn adam(learning_rate: f32) -> Self {
        OptimizerConfig::Adam {
            learning_rate,
            beta1: DEFAULT_ADAM_BETA1,
            beta2: DEFAULT_ADAM_BETA2,
            epsilon: DEFAULT_ADAM_EPSILON,
        }
    }

    /// Momentum with the default factor.
    pub fn momentum(learning_rate: f32) -> Self {
        OptimizerConfig::Momentum {
            learning_rate,
            factor: DEFAULT_MOMENTUM_FACTOR,
        }
    }

    /// Nesterov with the default coefficient.
    pub fn nesterov(learning_rate: f32) -> Self {
        OptimizerConfig::Nesterov {
            learning_rate,
            mu: DEFAULT_NESTEROV_MU,
        }
    }

    /// Default configuration for `kind`.
    pub fn with_defaults(kind: OptimizerKind, learning_rate: f32) -> Self {
        match kind {
            OptimizerKind::Adam => Self::adam(learning_rate),
            OptimizerKind::Momentum => Self::momentum(learning_rate),
            OptimizerKind::Nesterov => Self::nesterov(learning_rate),
        }
    }

    /// Returns the optimizer selector.
    pub fn kind(&self) -> OptimizerKind {
        match self {
            OptimizerConfig::Adam { .. } => OptimizerKind::Adam,
            OptimizerConfig::Momentum { .. } => OptimizerKind::Momentum,
            OptimizerConfig::Nesterov { .. } => OptimizerKind::Nesterov,
        }
    }

    /// Returns the name of the optimizer type.
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Adam { .. } => "Adam",
            OptimizerConfig::Momentum { .. } => "Momentum",
            OptimizerConfig::Nesterov { .. } => "Nesterov",
        }
    }

    /// Returns the learning rate for the optimizer.
    pub fn learning_rate(&self) -> f32 {
        match self {
            OptimizerConfig::Adam { learning_rate, .. } => *learning_rate,
            OptimizerConfig::Momentum { learning_rate, .. } => *learning_rate,
            OptimizerConfig::Nesterov { learning_rate, .. } => *learning_rate,
        }
    }

    /// Checks that every hyper-parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InvalidParameter`] for a non-finite learning
    /// rate, a decay outside `[0, 1)`, or a negative epsilon.
    pub fn validate(&self) -> Result<(), OptimizerError> {
        let lr = self.learning_rate();
        if !lr.is_finite() {
            return Err(OptimizerError::InvalidParameter(format!(
                "learning_rate must be finite, got {lr}"
            )));
        }
        let check_decay = |name: &str, value: f32| {
            if (0.0..1.0).contains(&value) {
                Ok(())
            } else {
                Err(OptimizerError::InvalidParameter(format!(
                    "{name} must be in [0, 1), got {value}"
                )))
            }
        };
        match *self {
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => {
                check_decay("beta1", beta1)?;
                check_decay("beta2", beta2)?;
                if !(epsilon >= 0.0) {
                    return Err(OptimizerError::InvalidParameter(format!(
                        "epsilon must be non-negative, got {epsilon}"
                    )));
                }
                Ok(())
            }
            OptimizerConfig::Momentum { factor, .. } => check_decay("factor", factor),
            OptimizerConfig::Nesterov { mu, .. } => check_decay("mu", mu),
        }
    }
}

/// A named, read-only view of one optimizer state array.
#[derive(Debug, Clone, Copy)]
pub struct StateSlot<'a> {
    /// Name of the state array, e.g. `"m"` or `"velocity"`.
    pub name: &'static str,
    /// Row-major state values, shaped like the embedding table.
    pub values: &'a [f32],
}

/// Trait for sparse embedding optimizers.
///
/// An update is driven in two phases: [`begin_step`] once per
/// `update_params` call, then [`apply_row`] once for every unique row the
/// batch touched, with that row's aggregated gradient.
///
/// [`begin_step`]: SparseOptimizer::begin_step
/// [`apply_row`]: SparseOptimizer::apply_row
pub trait SparseOptimizer: Sized {
    /// Creates an optimizer with zeroed state for a `[num_rows, dim]` table.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::ConfigMismatch`] if the configuration is for
    /// another optimizer, or [`OptimizerError::InvalidParameter`] if it fails
    /// [`OptimizerConfig::validate`].
    fn new(config: OptimizerConfig, num_rows: usize, dim: usize) -> Result<Self, OptimizerError>;

    /// Advances per-step state such as Adam's step counter.
    fn begin_step(&mut self);

    /// Updates one embedding row in place.
    ///
    /// # Panics
    ///
    /// May panic if `row` is out of range or `embedding`/`gradients` are not
    /// `dim` long.
    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]);

    /// Returns a reference to the optimizer's configuration.
    fn config(&self) -> &OptimizerConfig;

    /// Returns every state array.
    fn state_slots(&self) -> Vec<StateSlot<'_>>;

    /// Zeroes every state array and step counter.
    fn reset_state(&mut self);
}

/// Dynamic dispatch version of the [`SparseOptimizer`] trait.
pub trait SparseOptimizerDyn {
    /// Advances per-step state.
    fn begin_step(&mut self);

    /// Updates one embedding row in place.
    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]);

    /// Returns a reference to the optimizer's configuration.
    fn config(&self) -> &OptimizerConfig;

    /// Returns every state array.
    fn state_slots(&self) -> Vec<StateSlot<'_>>;

    /// Zeroes every state array and step counter.
    fn reset_state(&mut self);
}

impl<T: SparseOptimizer> SparseOptimizerDyn for T {
    fn begin_step(&mut self) {
        SparseOptimizer::begin_step(self)
    }

    fn apply_row(&mut self, row: usize, embedding: &mut [f32], gradients: &[f32]) {
        SparseOptimizer::apply_row(self, row, embedding, gradients)
    }

    fn config(&self) -> &OptimizerConfig {
        SparseOptimizer::config(self)
    }

    fn state_slots(&self) -> Vec<StateSlot<'_>> {
        SparseOptimizer::state_slots(self)
    }

    fn reset_state(&mut self) {
        SparseOptimizer::reset_state(self)
    }
}

impl fmt::Debug for dyn SparseOptimizerDyn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseOptimizer")
            .field("config", self.config())
            .finish()
    }
}

/// Creates an optimizer for a `[num_rows, dim]` table from the given
/// configuration.
///
/// # Example
///
/// ```
/// use hashemb_optimizer::{create_optimizer, OptimizerConfig, OptimizerKind};
///
/// let optimizer = create_optimizer(OptimizerConfig::adam(0.001), 1000, 16).unwrap();
/// assert_eq!(optimizer.config().kind(), OptimizerKind::Adam);
/// ```
pub fn create_optimizer(
    config: OptimizerConfig,
    num_rows: usize,
    dim: usize,
) -> Result<Box<dyn SparseOptimizerDyn>, OptimizerError> {
    Ok(match config.kind() {
        OptimizerKind::Adam => Box::new(Adam::new(config, num_rows, dim)?),
        OptimizerKind::Momentum => Box::new(Momentum::new(config, num_rows, dim)?),
        OptimizerKind::Nesterov => Box::new(Nesterov::new(config, num_rows, dim)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_config_name() {
        assert_eq!(OptimizerConfig::adam(0.001).name(), "Adam");
        assert_eq!(OptimizerConfig::momentum(0.01).name(), "Momentum");
        assert_eq!(OptimizerConfig::nesterov(0.01).name(), "Nesterov");
    }

    #[test]
    fn test_defaults() {
        match OptimizerConfig::adam(0.001) {
            OptimizerConfig::Adam {
                beta1,
                beta2,
                epsilon,
                ..
            } => {
                assert_eq!(beta1, 0.9);
                assert_eq!(beta2, 0.999);
                assert_eq!(epsilon, 1e-8);
            }
            other => panic!("unexpected config {other:?}"),
        }
        assert_eq!(
            OptimizerConfig::with_defaults(OptimizerKind::Nesterov, 0.5),
            OptimizerConfig::Nesterov {
                learning_rate: 0.5,
                mu: 0.9
            }
        );
    }

    #[test]
    fn test_selector_codes() {
        for kind in [
            OptimizerKind::Adam,
            OptimizerKind::Momentum,
            OptimizerKind::Nesterov,
        ] {
            assert_eq!(OptimizerKind::try_from(kind.code()).unwrap(), kind);
            assert_eq!(kind.to_string().parse::<OptimizerKind>().unwrap(), kind);
        }
        assert!(matches!(
            OptimizerKind::try_from(3),
            Err(OptimizerError::UnsupportedOptimizer(_))
        ));
        assert!("sgd".parse::<OptimizerKind>().is_err());
        assert_eq!("ADAM".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
    }

    #[test]
    fn test_validate() {
        assert!(OptimizerConfig::adam(0.001).validate().is_ok());
        assert!(OptimizerConfig::adam(f32::NAN).validate().is_err());
        assert!(OptimizerConfig::Momentum {
            learning_rate: 0.1,
            factor: 1.0
        }
        .validate()
        .is_err());
        assert!(OptimizerConfig::Adam {
            learning_rate: 0.1,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: -1.0
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_create_all_optimizer_types() {
        for config in [
            OptimizerConfig::adam(0.001),
            OptimizerConfig::momentum(0.01),
            OptimizerConfig::nesterov(0.01),
        ] {
            let optimizer = create_optimizer(config.clone(), 8, 4).unwrap();
            assert_eq!(optimizer.config(), &config);
            for slot in optimizer.state_slots() {
                assert_eq!(slot.values.len(), 32);
                assert!(slot.values.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_optimizer_config_serialization() {
        let config = OptimizerConfig::adam(0.001);
        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: OptimizerConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);

        let kind: OptimizerKind = serde_json::from_str("\"nesterov\"").unwrap();
        assert_eq!(kind, OptimizerKind::Nesterov);
    }
}
