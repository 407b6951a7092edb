//! Construction parameters of the sparse embedding layer.

use std::fmt;
use std::str::FromStr;

use hashemb_optimizer::OptimizerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, LayerResult};
use crate::pooling::{MeanPooling, Pooling, SumPooling};

/// How the embeddings of one (sample, slot) row are reduced.
///
/// Integer selectors: `0` sum, `1` mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combiner {
    /// Elementwise sum.
    #[default]
    Sum,
    /// Elementwise sum divided by the feature count when it exceeds one.
    Mean,
}

impl Combiner {
    /// Returns the integer selector code.
    pub fn code(self) -> i32 {
        match self {
            Combiner::Sum => 0,
            Combiner::Mean => 1,
        }
    }

    /// Returns the pooling strategy for this combiner.
    pub fn pooling(self) -> &'static dyn Pooling {
        match self {
            Combiner::Sum => &SumPooling,
            Combiner::Mean => &MeanPooling,
        }
    }
}

impl TryFrom<i32> for Combiner {
    type Error = LayerError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Combiner::Sum),
            1 => Ok(Combiner::Mean),
            other => Err(LayerError::UnsupportedCombiner(format!("selector {other}"))),
        }
    }
}

impl FromStr for Combiner {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sum" => Ok(Combiner::Sum),
            "mean" => Ok(Combiner::Mean),
            _ => Err(LayerError::UnsupportedCombiner(s.to_string())),
        }
    }
}

impl fmt::Display for Combiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combiner::Sum => write!(f, "sum"),
            Combiner::Mean => write!(f, "mean"),
        }
    }
}

/// Shape and behavior of a [`SparseEmbeddingHashCpu`](crate::SparseEmbeddingHashCpu).
///
/// # Example
///
/// ```
/// use hashemb_layers::{Combiner, SparseEmbeddingConfig};
/// use hashemb_optimizer::OptimizerConfig;
///
/// let config = SparseEmbeddingConfig {
///     batch_size: 2,
///     max_feature_num: 4,
///     vocabulary_size: 100,
///     embedding_vec_size: 8,
///     slot_num: 2,
///     combiner: Combiner::Mean,
///     optimizer: OptimizerConfig::adam(0.001),
///     label_dim: 1,
/// };
/// config.validate().unwrap();
/// assert_eq!(config.capacity(), 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseEmbeddingConfig {
    /// Samples per batch.
    pub batch_size: usize,
    /// Average keys per sample budgeted for; the batch holds at most
    /// `batch_size * max_feature_num` keys.
    pub max_feature_num: usize,
    /// Rows in the embedding table.
    pub vocabulary_size: usize,
    /// Embedding dimension.
    pub embedding_vec_size: usize,
    /// Slots per sample.
    pub slot_num: usize,
    /// Pooling mode.
    #[serde(default)]
    pub combiner: Combiner,
    /// Update rule for touched rows.
    pub optimizer: OptimizerConfig,
    /// Number of 4-byte label fields per sample in the batch source.
    #[serde(default = "default_label_dim")]
    pub label_dim: usize,
}

fn default_label_dim() -> usize {
    1
}

impl SparseEmbeddingConfig {
    /// Maximum number of keys in one batch.
    pub fn capacity(&self) -> usize {
        self.batch_size * self.max_feature_num
    }

    /// Number of (sample, slot) rows in one batch.
    pub fn num_rows(&self) -> usize {
        self.batch_size * self.slot_num
    }

    /// Checks every size and the optimizer hyper-parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::InvalidConfig`] for a zero size, or the
    /// optimizer's own validation error.
    pub fn validate(&self) -> LayerResult<()> {
        let sizes = [
            ("batch_size", self.batch_size),
            ("max_feature_num", self.max_feature_num),
            ("vocabulary_size", self.vocabulary_size),
            ("embedding_vec_size", self.embedding_vec_size),
            ("slot_num", self.slot_num),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(LayerError::InvalidConfig {
                    message: format!("{name} must be positive"),
                });
            }
        }
        self.optimizer.validate()?;
        Ok(())
    }
}
