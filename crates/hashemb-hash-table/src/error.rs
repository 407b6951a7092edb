//! Error types for key-index table operations.

use thiserror::Error;

/// Errors that can occur during key-index table operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashTableError {
    /// The number of keys doesn't match the number of indices.
    #[error("key count ({key_count}) doesn't match index count ({index_count})")]
    CountMismatch {
        /// Number of keys provided.
        key_count: usize,
        /// Number of index slots provided.
        index_count: usize,
    },

    /// A key was inserted twice.
    #[error("key {key} is already present in the table")]
    DuplicateKey {
        /// The key that was already registered.
        key: i128,
    },

    /// The requested key was not found in the table.
    #[error("key {key} not found")]
    KeyNotFound {
        /// The key that was not found.
        key: i128,
    },
}

/// A specialized Result type for key-index table operations.
pub type Result<T> = std::result::Result<T, HashTableError>;
