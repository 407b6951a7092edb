//! Error types for CSR batch I/O.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing CSR batch files.
#[derive(Error, Debug)]
pub enum DataError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The batch file could not be opened or created.
    #[error("failed to open CSR file {path}: {source}")]
    Open {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The stream ended cleanly before the first byte of a batch.
    #[error("CSR stream exhausted at byte offset {offset}")]
    EndOfStream {
        /// Byte offset where the next batch would have started.
        offset: u64,
    },

    /// The stream ended in the middle of a record.
    #[error("unexpected end of CSR stream at byte offset {offset}")]
    UnexpectedEof {
        /// Byte offset of the truncated read.
        offset: u64,
    },

    /// A slot declared a negative number of features.
    #[error("negative feature count {count} at byte offset {offset}")]
    NegativeFeatureCount {
        /// The decoded count.
        count: i32,
        /// Byte offset of the count field.
        offset: u64,
    },

    /// A batch holds more keys than its buffers were sized for.
    #[error("batch needs at least {required} keys but capacity is {capacity}")]
    CapacityExceeded {
        /// Number of keys the batch needs so far.
        required: usize,
        /// Number of keys the batch buffers can hold.
        capacity: usize,
    },

    /// A batch or sample doesn't match the configured layout.
    #[error("invalid batch layout: {0}")]
    InvalidLayout(String),
}

impl DataError {
    /// Returns `true` if the stream simply has no more batches.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, DataError::EndOfStream { .. })
    }
}

/// Result type for CSR batch I/O.
pub type Result<T> = std::result::Result<T, DataError>;
