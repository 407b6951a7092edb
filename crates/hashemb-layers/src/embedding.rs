//! Reference sparse embedding layer.
//!
//! This module provides [`SparseEmbeddingHashCpu`], which ties together the
//! key index, the batch reader, pooling, backward distribution, gradient
//! aggregation and the optimizer into the forward / backward / update cycle.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use hashemb_checkpoint::{EmbeddingTable, TileCheckpointer};
use hashemb_data::{CsrBatch, CsrBatchReader};
use hashemb_hash_table::{HashKey, KeyIndexTable};
use hashemb_optimizer::{create_optimizer, SparseOptimizerDyn};

use crate::aggregate::SparseGradientAggregator;
use crate::backward::backward_distribute;
use crate::config::SparseEmbeddingConfig;
use crate::error::{LayerError, LayerResult};
use crate::pooling::forward_pool;

/// Sparse embedding layer over a hash-indexed table.
///
/// Every per-batch buffer is sized once at construction for the worst-case
/// batch and refilled on each call.
///
/// # Example
///
/// ```no_run
/// use hashemb_layers::{Combiner, SparseEmbeddingConfig, SparseEmbeddingHashCpu};
/// use hashemb_optimizer::OptimizerConfig;
///
/// fn main() -> hashemb_layers::LayerResult<()> {
///     let config = SparseEmbeddingConfig {
///         batch_size: 1024,
///         max_feature_num: 26,
///         vocabulary_size: 100_000,
///         embedding_vec_size: 64,
///         slot_num: 26,
///         combiner: Combiner::Sum,
///         optimizer: OptimizerConfig::adam(0.001),
///         label_dim: 1,
///     };
///     let mut layer =
///         SparseEmbeddingHashCpu::<i64>::new(config, "table.bin", "train.bin")?;
///
///     layer.forward()?;
///     layer.backward_from_output()?;
///     layer.update_params()?;
///     Ok(())
/// }
/// ```
pub struct SparseEmbeddingHashCpu<K: HashKey, R: Read = BufReader<File>> {
    config: SparseEmbeddingConfig,
    table: EmbeddingTable<K>,
    key_index: KeyIndexTable<K>,
    reader: CsrBatchReader<K, R>,
    batch: CsrBatch<K>,
    row_indices: Vec<usize>,
    embedding_feature: Vec<f32>,
    wgrad: Vec<f32>,
    aggregator: SparseGradientAggregator,
    optimizer: Box<dyn SparseOptimizerDyn>,
    /// Aggregated gradient of the group being applied.
    group_grad: Vec<f32>,
    batch_loaded: bool,
    batches_read: u64,
    steps: u64,
}

impl<K: HashKey> SparseEmbeddingHashCpu<K> {
    /// Loads the table from `checkpoint_path` and opens the batch source at
    /// `csr_path`.
    ///
    /// # Errors
    ///
    /// * [`LayerError::InvalidConfig`] / [`LayerError::Optimizer`] - The
    ///   configuration is rejected
    /// * [`LayerError::Checkpoint`] - The table can't be loaded
    /// * [`LayerError::Data`] - The batch source can't be opened
    /// * [`LayerError::HashTable`] - The checkpoint holds a duplicate key
    pub fn new<P, Q>(config: SparseEmbeddingConfig, checkpoint_path: P, csr_path: Q) -> LayerResult<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        config.validate()?;
        let table = TileCheckpointer::<K>::new(config.vocabulary_size, config.embedding_vec_size)
            .restore(checkpoint_path.as_ref())?;
        let reader = CsrBatchReader::open(csr_path, config.label_dim)?;
        Self::from_parts(config, table, reader)
    }
}

impl<K: HashKey, R: Read> SparseEmbeddingHashCpu<K, R> {
    /// Builds the layer from an already loaded table and batch reader.
    pub fn from_parts(
        config: SparseEmbeddingConfig,
        table: EmbeddingTable<K>,
        reader: CsrBatchReader<K, R>,
    ) -> LayerResult<Self> {
        config.validate()?;
        if table.vocabulary_size() != config.vocabulary_size
            || table.dim() != config.embedding_vec_size
        {
            return Err(LayerError::InvalidConfig {
                message: format!(
                    "table is {}x{}, config expects {}x{}",
                    table.vocabulary_size(),
                    table.dim(),
                    config.vocabulary_size,
                    config.embedding_vec_size
                ),
            });
        }

        let header = *reader.header();
        if header.slot_num != config.slot_num as i64 {
            tracing::warn!(
                header_slot_num = header.slot_num,
                slot_num = config.slot_num,
                "Batch source header disagrees with the configured slot count"
            );
        }

        let key_index = KeyIndexTable::from_keys(table.keys())?;
        let optimizer = create_optimizer(
            config.optimizer.clone(),
            config.vocabulary_size,
            config.embedding_vec_size,
        )?;

        let capacity = config.capacity();
        let output_len = config.num_rows() * config.embedding_vec_size;

        tracing::info!(
            vocabulary_size = config.vocabulary_size,
            dim = config.embedding_vec_size,
            batch_size = config.batch_size,
            slot_num = config.slot_num,
            combiner = %config.combiner,
            optimizer = %config.optimizer.kind(),
            "Created sparse embedding layer"
        );

        Ok(Self {
            batch: CsrBatch::new(config.batch_size, config.slot_num, config.max_feature_num),
            row_indices: Vec::with_capacity(capacity),
            embedding_feature: vec![0.0; output_len],
            wgrad: vec![0.0; output_len],
            aggregator: SparseGradientAggregator::with_capacity(capacity),
            group_grad: vec![0.0; config.embedding_vec_size],
            table,
            key_index,
            reader,
            optimizer,
            config,
            batch_loaded: false,
            batches_read: 0,
            steps: 0,
        })
    }

    /// Reads the next batch, resolves its keys and pools the embeddings
    /// into [`embedding_feature`](Self::embedding_feature).
    ///
    /// Clears [`wgrad`](Self::wgrad).
    ///
    /// # Errors
    ///
    /// * [`LayerError::Data`] - The batch can't be read; check
    ///   [`LayerError::is_end_of_stream`] for a clean end of input
    /// * [`LayerError::HashTable`] - A key is not in the table
    pub fn forward(&mut self) -> LayerResult<()> {
        self.batch_loaded = false;
        self.reader.read_batch(&mut self.batch)?;

        let nnz = self.batch.nnz();
        self.row_indices.clear();
        self.row_indices.resize(nnz, 0);
        self.key_index.get(self.batch.keys(), &mut self.row_indices)?;

        forward_pool(
            self.config.combiner.pooling(),
            self.batch.row_offset(),
            &self.row_indices,
            self.table.values(),
            self.config.embedding_vec_size,
            &mut self.embedding_feature,
        )?;
        self.wgrad.fill(0.0);

        self.batch_loaded = true;
        self.batches_read += 1;
        tracing::debug!(batch = self.batches_read, nnz, "Forward pass");
        Ok(())
    }

    /// Distributes `top_grad`, one `embedding_vec_size` vector per
    /// (sample, slot) row, into [`wgrad`](Self::wgrad).
    ///
    /// # Errors
    ///
    /// * [`LayerError::NoBatchLoaded`] - No batch has been read
    /// * [`LayerError::DimensionMismatch`] - `top_grad` has the wrong length
    pub fn backward(&mut self, top_grad: &[f32]) -> LayerResult<()> {
        if !self.batch_loaded {
            return Err(LayerError::NoBatchLoaded);
        }
        backward_distribute(
            self.config.combiner.pooling(),
            self.batch.row_offset(),
            top_grad,
            self.config.embedding_vec_size,
            &mut self.wgrad,
        )
    }

    /// Runs [`backward`](Self::backward) with the pooled output as the
    /// upstream gradient.
    pub fn backward_from_output(&mut self) -> LayerResult<()> {
        if !self.batch_loaded {
            return Err(LayerError::NoBatchLoaded);
        }
        backward_distribute(
            self.config.combiner.pooling(),
            self.batch.row_offset(),
            &self.embedding_feature,
            self.config.embedding_vec_size,
            &mut self.wgrad,
        )
    }

    /// Aggregates [`wgrad`](Self::wgrad) per unique table row and applies
    /// the optimizer to those rows only.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::NoBatchLoaded`] if no batch has been read.
    pub fn update_params(&mut self) -> LayerResult<()> {
        if !self.batch_loaded {
            return Err(LayerError::NoBatchLoaded);
        }
        self.aggregator
            .aggregate(self.batch.row_offset(), &self.row_indices)?;

        let dim = self.config.embedding_vec_size;
        self.optimizer.begin_step();
        for group in self.aggregator.groups() {
            self.aggregator
                .gradient_for(group, &self.wgrad, dim, &mut self.group_grad);
            self.optimizer.apply_row(
                group.row_index,
                self.table.row_mut(group.row_index),
                &self.group_grad,
            );
        }

        self.steps += 1;
        tracing::debug!(
            step = self.steps,
            unique_rows = self.aggregator.num_groups(),
            "Updated parameters"
        );
        Ok(())
    }

    /// Pooled output of the current batch, `[batch_size * slot_num, dim]`.
    pub fn embedding_feature(&self) -> &[f32] {
        &self.embedding_feature
    }

    /// Per-row gradient of the current batch, `[batch_size * slot_num, dim]`.
    pub fn wgrad(&self) -> &[f32] {
        &self.wgrad
    }

    /// Key of every table row.
    pub fn hash_table_keys(&self) -> &[K] {
        self.table.keys()
    }

    /// Row index of every table row.
    pub fn hash_table_value_index(&self) -> &[usize] {
        self.table.row_indices()
    }

    /// Table values, row-major.
    pub fn hash_table_values(&self) -> &[f32] {
        self.table.values()
    }

    /// The embedding table.
    pub fn table(&self) -> &EmbeddingTable<K> {
        &self.table
    }

    /// The key to row index mapping.
    pub fn key_index(&self) -> &KeyIndexTable<K> {
        &self.key_index
    }

    /// The most recently read batch.
    pub fn batch(&self) -> &CsrBatch<K> {
        &self.batch
    }

    /// Row index of every key of the current batch.
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Aggregation state of the last update.
    pub fn aggregator(&self) -> &SparseGradientAggregator {
        &self.aggregator
    }

    /// The optimizer and its state.
    pub fn optimizer(&self) -> &dyn SparseOptimizerDyn {
        self.optimizer.as_ref()
    }

    /// The layer configuration.
    pub fn config(&self) -> &SparseEmbeddingConfig {
        &self.config
    }

    /// Number of completed `update_params` calls.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Number of batches read by `forward`.
    pub fn batches_read(&self) -> u64 {
        self.batches_read
    }

    /// Consumes the layer, returning the trained table.
    pub fn into_table(self) -> EmbeddingTable<K> {
        self.table
    }
}

impl<K: HashKey, R: Read> fmt::Debug for SparseEmbeddingHashCpu<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseEmbeddingHashCpu")
            .field("config", &self.config)
            .field("reader", &self.reader)
            .field("batch_loaded", &self.batch_loaded)
            .field("batches_read", &self.batches_read)
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Combiner;
    use hashemb_data::{CsrBatchWriter, DataSetHeader};
    use hashemb_optimizer::OptimizerConfig;
    use std::io::Cursor;

    fn config(combiner: Combiner) -> SparseEmbeddingConfig {
        SparseEmbeddingConfig {
            batch_size: 1,
            max_feature_num: 3,
            vocabulary_size: 4,
            embedding_vec_size: 2,
            slot_num: 1,
            combiner,
            optimizer: OptimizerConfig::momentum(0.1),
            label_dim: 1,
        }
    }

    fn table() -> EmbeddingTable<u32> {
        EmbeddingTable::new(
            vec![10, 11, 12, 13],
            vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0],
            2,
        )
        .unwrap()
    }

    fn reader(rows: &[&[u32]]) -> CsrBatchReader<u32, Cursor<Vec<u8>>> {
        let header = DataSetHeader::new(rows.len() as i64, 1, 1);
        let mut writer = CsrBatchWriter::<u32, _>::new(Vec::new(), header).unwrap();
        for row in rows {
            writer.write_sample(&[0], &[*row]).unwrap();
        }
        let bytes = writer.finish().unwrap();
        CsrBatchReader::new(Cursor::new(bytes), 1).unwrap()
    }

    #[test]
    fn test_forward_sum_and_mean() {
        for (combiner, expected) in [
            (Combiner::Sum, [7.0f32, 7.0]),
            (Combiner::Mean, [7.0 / 3.0, 7.0 / 3.0]),
        ] {
            let mut layer =
                SparseEmbeddingHashCpu::from_parts(config(combiner), table(), reader(&[&[12, 10, 12]]))
                    .unwrap();
            layer.forward().unwrap();
            assert_eq!(layer.row_indices(), &[2, 0, 2]);
            assert_eq!(layer.embedding_feature(), &expected);
        }
    }

    #[test]
    fn test_backward_before_forward() {
        let mut layer =
            SparseEmbeddingHashCpu::from_parts(config(Combiner::Sum), table(), reader(&[&[10]]))
                .unwrap();
        assert!(matches!(
            layer.backward(&[1.0, 1.0]),
            Err(LayerError::NoBatchLoaded)
        ));
        assert!(matches!(
            layer.update_params(),
            Err(LayerError::NoBatchLoaded)
        ));
    }

    #[test]
    fn test_update_touches_only_looked_up_rows() {
        let mut layer =
            SparseEmbeddingHashCpu::from_parts(config(Combiner::Sum), table(), reader(&[&[12, 10, 12]]))
                .unwrap();
        layer.forward().unwrap();
        layer.backward(&[1.0, 1.0]).unwrap();
        layer.update_params().unwrap();

        let values = layer.hash_table_values();
        // Row 0 once: velocity -0.1. Row 2 twice: velocity -0.2.
        assert!((values[0] - 0.9).abs() < 1e-6);
        assert_eq!(&values[2..4], &[2.0, 2.0]);
        assert!((values[4] - 2.8).abs() < 1e-6);
        assert_eq!(&values[6..], &[4.0, 4.0]);
        assert_eq!(layer.steps(), 1);
        assert_eq!(layer.aggregator().num_groups(), 2);
    }

    #[test]
    fn test_unknown_key() {
        let mut layer =
            SparseEmbeddingHashCpu::from_parts(config(Combiner::Sum), table(), reader(&[&[99]]))
                .unwrap();
        let err = layer.forward().unwrap_err();
        assert!(matches!(err, LayerError::HashTable(_)));
        assert!(matches!(
            layer.backward_from_output(),
            Err(LayerError::NoBatchLoaded)
        ));
    }

    #[test]
    fn test_table_shape_checked() {
        let mut config = config(Combiner::Sum);
        config.vocabulary_size = 5;
        let err = SparseEmbeddingHashCpu::from_parts(config, table(), reader(&[&[10]])).unwrap_err();
        assert!(matches!(err, LayerError::InvalidConfig { .. }));
    }
}
