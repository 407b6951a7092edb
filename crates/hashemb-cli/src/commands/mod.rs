//! CLI Command Implementations
//!
//! - [`generate`]: Synthetic checkpoint and batch file generation
//! - [`run`]: Forward/backward/update driver

mod generate;
mod run;

pub use generate::GenerateCommand;
pub use run::{BatchSummary, RunCommand, RunSummary};
