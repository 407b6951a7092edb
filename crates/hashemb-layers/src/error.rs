//! Error types for the hashemb-layers crate.
//!
//! [`LayerError`] wraps the errors of the lower crates so that a single
//! `?` works across table loading, batch reading, key lookup and optimizer
//! construction.

use hashemb_checkpoint::CheckpointError;
use hashemb_data::DataError;
use hashemb_hash_table::HashTableError;
use hashemb_optimizer::OptimizerError;
use thiserror::Error;

/// Error type for layer operations.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Key lookup or insertion failed.
    #[error(transparent)]
    HashTable(#[from] HashTableError),

    /// Reading a batch failed.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Loading the embedding table failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Building the optimizer failed.
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// A buffer has the wrong length.
    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The buffer being checked
        what: &'static str,
        /// The expected length
        expected: usize,
        /// The actual length
        actual: usize,
    },

    /// `backward` or `update_params` was called before `forward`
    /// produced a batch.
    #[error("No batch loaded: forward must succeed before backward or update_params")]
    NoBatchLoaded,

    /// The combiner selector names no supported combiner.
    #[error("Unsupported combiner: {0}")]
    UnsupportedCombiner(String),

    /// Configuration error for the layer.
    #[error("Configuration error: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },
}

impl LayerError {
    /// Returns `true` if the batch source was exhausted cleanly.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, LayerError::Data(err) if err.is_end_of_stream())
    }
}

/// Result type alias for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;
