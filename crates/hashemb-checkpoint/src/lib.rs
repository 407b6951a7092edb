//! Embedding table checkpoints for the reference sparse embedding layer.
//!
//! This crate restores the dense embedding table the layer trains from a
//! fixed tile-format checkpoint, and writes the same format back out.
//!
//! # Core Components
//!
//! - [`EmbeddingTable`]: Keys, row indices and row-major values
//! - [`TileCheckpointer`]: Restore/save of the tile format
//!
//! # Example
//!
//! ```no_run
//! use hashemb_checkpoint::{EmbeddingTable, TileCheckpointer};
//! use std::path::Path;
//!
//! fn main() -> hashemb_checkpoint::Result<()> {
//!     let table = EmbeddingTable::new(vec![7i64, 9], vec![0.1, 0.2, 0.3, 0.4], 2)?;
//!     let checkpointer = TileCheckpointer::<i64>::new(2, 2);
//!     checkpointer.save(Path::new("/tmp/table.bin"), &table)?;
//!
//!     let restored = checkpointer.restore(Path::new("/tmp/table.bin"))?;
//!     assert_eq!(restored.row(1), &[0.3, 0.4]);
//!     Ok(())
//! }
//! ```

pub mod checkpointer;
pub mod table;

pub use checkpointer::TileCheckpointer;
pub use table::EmbeddingTable;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// I/O error on a checkpoint file.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a checkpoint stream.
    #[error("I/O error: {0}")]
    Stream(#[from] std::io::Error),

    /// Checkpoint file not found.
    #[error("Checkpoint not found: {0}")]
    NotFound(PathBuf),

    /// The checkpoint holds fewer bytes than the configured table needs.
    #[error("Checkpoint is {actual} bytes, but the embedding table needs {required}")]
    FileTooSmall {
        /// Bytes needed for the configured table.
        required: u64,
        /// Bytes available.
        actual: u64,
    },

    /// Table shape is inconsistent.
    #[error("Invalid embedding table: {0}")]
    InvalidTable(String),
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_end_to_end_checkpoint_workflow() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.bin");

        let vocabulary_size = 50;
        let dim = 8;
        let keys: Vec<u64> = (0..vocabulary_size as u64).map(|i| i * 1_000_003).collect();
        let values: Vec<f32> = (0..vocabulary_size * dim).map(|i| i as f32 * 0.25).collect();
        let table = EmbeddingTable::new(keys, values, dim).unwrap();

        let checkpointer = TileCheckpointer::<u64>::new(vocabulary_size, dim);
        checkpointer.save(&path, &table).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert_eq!(size, checkpointer.required_size());

        let restored = checkpointer.restore(&path).unwrap();
        assert_eq!(restored.keys(), table.keys());
        assert_eq!(restored.row(49), table.row(49));
    }

    #[test]
    fn test_error_display() {
        let err = CheckpointError::FileTooSmall {
            required: 10,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "Checkpoint is 4 bytes, but the embedding table needs 10"
        );
    }
}
