//! Run Command Implementation
//!
//! Drives the sparse embedding layer over a batch file: for every batch a
//! forward pass, a backward pass that feeds the pooled output back as the
//! upstream gradient, and a parameter update. Reports per-batch statistics
//! and table checksums as JSON.

use anyhow::{Context, Result};
use clap::Args;
use hashemb_checkpoint::TileCheckpointer;
use hashemb_hash_table::HashKey;
use hashemb_layers::{Combiner, SparseEmbeddingConfig, SparseEmbeddingHashCpu};
use hashemb_optimizer::{OptimizerConfig, OptimizerKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::KeyType;

/// Statistics of one forward/backward/update cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Zero-based batch number
    pub batch: usize,
    /// Keys in the batch
    pub nnz: usize,
    /// Distinct table rows the batch updated
    pub unique_rows: usize,
    /// Sum of the pooled output
    pub output_checksum: f64,
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Key width used to read the inputs
    pub key_type: KeyType,
    /// Effective layer configuration
    pub config: SparseEmbeddingConfig,
    /// One entry per completed batch
    pub batches: Vec<BatchSummary>,
    /// Table checksum before the first update
    pub initial_table_checksum: f64,
    /// Table checksum after the last update
    pub final_table_checksum: f64,
}

/// Run training steps over a batch file
///
/// The layer configuration comes from `--config`; `--combiner`,
/// `--optimizer` and `--learning-rate` override it.
///
/// # Example
///
/// ```bash
/// hashemb run \
///     --config /tmp/hashemb/config.json \
///     --checkpoint /tmp/hashemb/table.bin \
///     --data /tmp/hashemb/data.bin \
///     --batches 4 \
///     --output /tmp/hashemb/summary.json
/// ```
#[derive(Args, Debug, Clone)]
pub struct RunCommand {
    /// Layer configuration (JSON)
    #[arg(long, short = 'c', env = "HASHEMB_CONFIG")]
    pub config: PathBuf,

    /// Embedding table checkpoint
    #[arg(long, env = "HASHEMB_CHECKPOINT")]
    pub checkpoint: PathBuf,

    /// CSR batch file
    #[arg(long, short = 'd', env = "HASHEMB_DATA")]
    pub data: PathBuf,

    /// Number of batches to process
    #[arg(long, short = 'n', default_value = "1")]
    pub batches: usize,

    /// Key width
    #[arg(long, value_enum, default_value = "i64")]
    pub key_type: KeyType,

    /// Override the configured pooling mode
    #[arg(long)]
    pub combiner: Option<Combiner>,

    /// Override the configured optimizer, with its default hyper-parameters
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,

    /// Override the configured learning rate
    #[arg(long)]
    pub learning_rate: Option<f32>,

    /// Write the summary here instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Save the trained table to this checkpoint
    #[arg(long)]
    pub save_checkpoint: Option<PathBuf>,
}

impl RunCommand {
    /// Execute the run command
    pub fn run(&self) -> Result<()> {
        let summary = self.summarize()?;
        let json = serde_json::to_string_pretty(&summary)?;

        match &self.output {
            Some(path) => {
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write summary to {path:?}"))?;
                info!("Summary written to {:?}", path);
            }
            None => println!("{json}"),
        }
        Ok(())
    }

    /// Runs the requested batches and returns the summary.
    pub fn summarize(&self) -> Result<RunSummary> {
        let config = self.load_config()?;
        match self.key_type {
            KeyType::I32 => self.summarize_with::<i32>(config),
            KeyType::U32 => self.summarize_with::<u32>(config),
            KeyType::I64 => self.summarize_with::<i64>(config),
            KeyType::U64 => self.summarize_with::<u64>(config),
        }
    }

    /// Reads `--config` and applies the overrides.
    pub fn load_config(&self) -> Result<SparseEmbeddingConfig> {
        let text = std::fs::read_to_string(&self.config)
            .with_context(|| format!("Failed to read config {:?}", self.config))?;
        let mut config: SparseEmbeddingConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {:?}", self.config))?;

        if let Some(combiner) = self.combiner {
            config.combiner = combiner;
        }
        let learning_rate = self
            .learning_rate
            .unwrap_or_else(|| config.optimizer.learning_rate());
        match self.optimizer {
            Some(kind) => config.optimizer = OptimizerConfig::with_defaults(kind, learning_rate),
            None => set_learning_rate(&mut config.optimizer, learning_rate),
        }

        config.validate().context("Invalid layer configuration")?;
        Ok(config)
    }

    fn summarize_with<K: HashKey>(&self, config: SparseEmbeddingConfig) -> Result<RunSummary> {
        let mut layer = SparseEmbeddingHashCpu::<K>::new(config.clone(), &self.checkpoint, &self.data)
            .context("Failed to create the sparse embedding layer")?;
        let initial_table_checksum = layer.table().checksum();

        let mut batches = Vec::with_capacity(self.batches);
        for batch in 0..self.batches {
            match layer.forward() {
                Ok(()) => {}
                Err(err) if err.is_end_of_stream() => {
                    warn!(requested = self.batches, read = batch, "Batch file exhausted");
                    break;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("Forward pass of batch {batch} failed"))
                }
            }
            layer
                .backward_from_output()
                .with_context(|| format!("Backward pass of batch {batch} failed"))?;
            layer
                .update_params()
                .with_context(|| format!("Update of batch {batch} failed"))?;

            batches.push(BatchSummary {
                batch,
                nnz: layer.batch().nnz(),
                unique_rows: layer.aggregator().num_groups(),
                output_checksum: layer.embedding_feature().iter().map(|&v| f64::from(v)).sum(),
            });
        }

        let final_table_checksum = layer.table().checksum();
        info!(
            batches = batches.len(),
            initial_table_checksum, final_table_checksum, "Run finished"
        );

        if let Some(path) = &self.save_checkpoint {
            TileCheckpointer::<K>::new(config.vocabulary_size, config.embedding_vec_size)
                .save(path, layer.table())
                .with_context(|| format!("Failed to save checkpoint to {path:?}"))?;
        }

        Ok(RunSummary {
            key_type: self.key_type,
            config,
            batches,
            initial_table_checksum,
            final_table_checksum,
        })
    }
}

fn set_learning_rate(optimizer: &mut OptimizerConfig, value: f32) {
    match optimizer {
        OptimizerConfig::Adam { learning_rate, .. }
        | OptimizerConfig::Momentum { learning_rate, .. }
        | OptimizerConfig::Nesterov { learning_rate, .. } => *learning_rate = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_learning_rate() {
        let mut optimizer = OptimizerConfig::momentum(0.1);
        set_learning_rate(&mut optimizer, 0.5);
        assert_eq!(optimizer, OptimizerConfig::momentum(0.5));
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        let config = SparseEmbeddingConfig {
            batch_size: 2,
            max_feature_num: 2,
            vocabulary_size: 4,
            embedding_vec_size: 2,
            slot_num: 1,
            combiner: Combiner::Sum,
            optimizer: OptimizerConfig::adam(0.001),
            label_dim: 1,
        };
        std::fs::write(&config_path, serde_json::to_string(&config).unwrap()).unwrap();

        let mut cmd = RunCommand {
            config: config_path,
            checkpoint: PathBuf::from("unused"),
            data: PathBuf::from("unused"),
            batches: 1,
            key_type: KeyType::I64,
            combiner: Some(Combiner::Mean),
            optimizer: None,
            learning_rate: Some(0.01),
            output: None,
            save_checkpoint: None,
        };
        let loaded = cmd.load_config().unwrap();
        assert_eq!(loaded.combiner, Combiner::Mean);
        assert_eq!(loaded.optimizer, OptimizerConfig::adam(0.01));

        cmd.optimizer = Some(OptimizerKind::Momentum);
        cmd.learning_rate = None;
        let loaded = cmd.load_config().unwrap();
        assert_eq!(loaded.optimizer, OptimizerConfig::momentum(0.001));
    }

    #[test]
    fn test_missing_config() {
        let cmd = RunCommand {
            config: PathBuf::from("/nonexistent/config.json"),
            checkpoint: PathBuf::from("unused"),
            data: PathBuf::from("unused"),
            batches: 1,
            key_type: KeyType::I64,
            combiner: None,
            optimizer: None,
            learning_rate: None,
            output: None,
            save_checkpoint: None,
        };
        let err = cmd.load_config().unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
