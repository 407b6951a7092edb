//! Generate Command Implementation
//!
//! Writes a reproducible synthetic dataset: an embedding checkpoint
//! (`table.bin`), a CSR batch file (`data.bin`) and a layer config
//! (`config.json`) that ties the two together.

use anyhow::{Context, Result};
use clap::Args;
use hashemb_checkpoint::{EmbeddingTable, TileCheckpointer};
use hashemb_data::{CsrBatchWriter, DataSetHeader};
use hashemb_hash_table::HashKey;
use hashemb_layers::{Combiner, SparseEmbeddingConfig};
use hashemb_optimizer::{OptimizerConfig, OptimizerKind};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::KeyType;

/// File name of the generated checkpoint.
pub const TABLE_FILE: &str = "table.bin";
/// File name of the generated batch file.
pub const DATA_FILE: &str = "data.bin";
/// File name of the generated layer config.
pub const CONFIG_FILE: &str = "config.json";

/// Generate a synthetic checkpoint and batch file
///
/// Keys are distinct and stored in shuffled order, so row order differs from
/// key order. Each sample draws at most `max_feature_num` keys across its
/// slots, with repeats, so batches exercise duplicate aggregation.
///
/// # Example
///
/// ```bash
/// hashemb generate \
///     --output-dir /tmp/hashemb \
///     --vocabulary-size 1000 \
///     --embedding-vec-size 16 \
///     --num-batches 4
/// ```
#[derive(Args, Debug, Clone)]
pub struct GenerateCommand {
    /// Directory receiving table.bin, data.bin and config.json
    #[arg(long, short = 'o', env = "HASHEMB_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Rows in the embedding table
    #[arg(long, default_value = "1024")]
    pub vocabulary_size: usize,

    /// Embedding dimension
    #[arg(long, default_value = "16")]
    pub embedding_vec_size: usize,

    /// Samples per batch
    #[arg(long, default_value = "64")]
    pub batch_size: usize,

    /// Slots per sample
    #[arg(long, default_value = "4")]
    pub slot_num: usize,

    /// Maximum keys per sample
    #[arg(long, default_value = "8")]
    pub max_feature_num: usize,

    /// Label fields per sample
    #[arg(long, default_value = "1")]
    pub label_dim: usize,

    /// Number of batches to write
    #[arg(long, default_value = "8")]
    pub num_batches: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Key width
    #[arg(long, value_enum, default_value = "i64")]
    pub key_type: KeyType,

    /// Pooling mode written to config.json
    #[arg(long, default_value = "sum")]
    pub combiner: Combiner,

    /// Optimizer written to config.json
    #[arg(long, default_value = "adam")]
    pub optimizer: OptimizerKind,

    /// Learning rate written to config.json
    #[arg(long, default_value = "0.001")]
    pub learning_rate: f32,
}

impl GenerateCommand {
    /// Execute the generate command
    pub fn run(&self) -> Result<()> {
        info!("Generating synthetic dataset in {:?}", self.output_dir);

        let config = self.layer_config();
        config.validate().context("Invalid generator parameters")?;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create {:?}", self.output_dir))?;

        match self.key_type {
            KeyType::I32 => self.write_files::<i32>(),
            KeyType::U32 => self.write_files::<u32>(),
            KeyType::I64 => self.write_files::<i64>(),
            KeyType::U64 => self.write_files::<u64>(),
        }?;

        let config_path = self.output_dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(&config)?;
        std::fs::write(&config_path, json)
            .with_context(|| format!("Failed to write {config_path:?}"))?;

        info!(
            vocabulary_size = self.vocabulary_size,
            samples = self.batch_size * self.num_batches,
            key_type = %self.key_type,
            "Dataset generated"
        );
        Ok(())
    }

    /// The layer config matching the generated files.
    pub fn layer_config(&self) -> SparseEmbeddingConfig {
        SparseEmbeddingConfig {
            batch_size: self.batch_size,
            max_feature_num: self.max_feature_num,
            vocabulary_size: self.vocabulary_size,
            embedding_vec_size: self.embedding_vec_size,
            slot_num: self.slot_num,
            combiner: self.combiner,
            optimizer: OptimizerConfig::with_defaults(self.optimizer, self.learning_rate),
            label_dim: self.label_dim,
        }
    }

    fn write_files<K: HashKey>(&self) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut keys = (0..self.vocabulary_size as u64)
            .map(|i| K::try_from_u64(i * 7 + 3))
            .collect::<Option<Vec<K>>>()
            .with_context(|| {
                format!(
                    "vocabulary of {} does not fit in {} keys",
                    self.vocabulary_size, self.key_type
                )
            })?;
        keys.shuffle(&mut rng);

        let values = (0..self.vocabulary_size * self.embedding_vec_size)
            .map(|_| rng.gen_range(-0.05f32..0.05))
            .collect();
        let table = EmbeddingTable::new(keys, values, self.embedding_vec_size)?;
        let table_path = self.output_dir.join(TABLE_FILE);
        TileCheckpointer::<K>::new(self.vocabulary_size, self.embedding_vec_size)
            .save(&table_path, &table)?;

        self.write_samples(&mut rng, table.keys(), &self.output_dir.join(DATA_FILE))
    }

    fn write_samples<K: HashKey>(&self, rng: &mut StdRng, keys: &[K], path: &Path) -> Result<()> {
        let num_samples = self.batch_size * self.num_batches;
        let header = DataSetHeader::new(
            num_samples as i64,
            self.label_dim as i64,
            self.slot_num as i64,
        );
        let mut writer = CsrBatchWriter::<K>::create(path, header)?;

        let per_slot = (self.max_feature_num / self.slot_num).max(1);
        let mut labels = vec![0i32; self.label_dim];
        let mut slots: Vec<Vec<K>> = vec![Vec::new(); self.slot_num];

        for _ in 0..num_samples {
            for label in labels.iter_mut() {
                *label = rng.gen_range(0..2);
            }
            let mut budget = self.max_feature_num;
            for slot in slots.iter_mut() {
                slot.clear();
                let count = rng.gen_range(0..=per_slot.min(budget));
                budget -= count;
                slot.extend((0..count).map(|_| keys[rng.gen_range(0..keys.len())]));
            }
            writer.write_sample(&labels, &slots)?;
        }

        writer.finish()?;
        info!(path = %path.display(), samples = num_samples, "Wrote batch file");
        Ok(())
    }
}
