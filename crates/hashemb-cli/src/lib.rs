//! hashemb CLI Library
//!
//! This crate provides the command-line interface for the reference sparse
//! embedding layer:
//!
//! - **Generate**: Write a synthetic checkpoint, CSR batch file and layer
//!   config
//! - **Run**: Drive forward/backward/update cycles and report checksums
//!
//! # Example
//!
//! ```bash
//! # Generate fixtures
//! hashemb generate --output-dir /tmp/hashemb --vocabulary-size 1000 --num-batches 4
//!
//! # Run four training steps
//! hashemb run --config /tmp/hashemb/config.json \
//!     --checkpoint /tmp/hashemb/table.bin --data /tmp/hashemb/data.bin --batches 4
//! ```

pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

pub use commands::{BatchSummary, GenerateCommand, RunCommand, RunSummary};

/// hashemb - reference sparse embedding layer
///
/// Generates fixtures for, and drives, a hash-indexed sparse embedding layer
/// with sum/mean pooling and Adam, Momentum or Nesterov updates.
#[derive(Parser, Debug)]
#[command(name = "hashemb")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a synthetic embedding checkpoint, batch file and config
    Generate(GenerateCommand),

    /// Run forward, backward and update over a batch file
    Run(RunCommand),
}

/// Integer width of the feature keys in checkpoints and batch files.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Signed 32-bit keys
    I32,
    /// Unsigned 32-bit keys
    U32,
    /// Signed 64-bit keys
    #[default]
    I64,
    /// Unsigned 64-bit keys
    U64,
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::I32 => write!(f, "i32"),
            KeyType::U32 => write!(f, "u32"),
            KeyType::I64 => write!(f, "i64"),
            KeyType::U64 => write!(f, "u64"),
        }
    }
}

/// Result type alias for CLI operations
pub type CliResult<T> = anyhow::Result<T>;
