//! Reference sparse embedding layer.
//!
//! This crate provides a CPU implementation of a hash-indexed sparse
//! embedding layer, written for exactness rather than speed. It includes:
//!
//! - **Pooling**: Sum and mean reduction of the embeddings of each
//!   (sample, slot) row
//! - **Backward**: Distribution of the upstream gradient to every row
//! - **Aggregation**: Stable sort and unduplication of looked-up rows so each
//!   table row is updated once per batch
//! - **Layer**: [`SparseEmbeddingHashCpu`], driving forward, backward and
//!   optimizer updates over a CSR batch source
//!
//! # Quick Start
//!
//! ```
//! use std::io::Cursor;
//!
//! use hashemb_checkpoint::EmbeddingTable;
//! use hashemb_data::{CsrBatchReader, CsrBatchWriter, DataSetHeader};
//! use hashemb_layers::{Combiner, SparseEmbeddingConfig, SparseEmbeddingHashCpu};
//! use hashemb_optimizer::OptimizerConfig;
//!
//! let mut writer = CsrBatchWriter::<u32, _>::new(Vec::new(), DataSetHeader::new(1, 1, 1)).unwrap();
//! writer.write_sample(&[0], &[[7u32, 9]]).unwrap();
//! let reader = CsrBatchReader::new(Cursor::new(writer.finish().unwrap()), 1).unwrap();
//!
//! let table = EmbeddingTable::new(vec![7u32, 9], vec![1.0, 2.0, 3.0, 4.0], 2).unwrap();
//! let config = SparseEmbeddingConfig {
//!     batch_size: 1,
//!     max_feature_num: 2,
//!     vocabulary_size: 2,
//!     embedding_vec_size: 2,
//!     slot_num: 1,
//!     combiner: Combiner::Sum,
//!     optimizer: OptimizerConfig::adam(0.001),
//!     label_dim: 1,
//! };
//!
//! let mut layer = SparseEmbeddingHashCpu::from_parts(config, table, reader).unwrap();
//! layer.forward().unwrap();
//! assert_eq!(layer.embedding_feature(), &[4.0, 6.0]);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod aggregate;
pub mod backward;
pub mod config;
pub mod embedding;
pub mod error;
pub mod pooling;

// Re-export main types at crate level
pub use aggregate::{DedupGroup, SparseGradientAggregator};
pub use backward::backward_distribute;
pub use config::{Combiner, SparseEmbeddingConfig};
pub use embedding::SparseEmbeddingHashCpu;
pub use error::{LayerError, LayerResult};
pub use pooling::{forward_pool, MeanPooling, Pooling, SumPooling};

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```
/// use hashemb_layers::prelude::*;
/// ```
pub mod prelude {
    pub use crate::aggregate::{DedupGroup, SparseGradientAggregator};
    pub use crate::config::{Combiner, SparseEmbeddingConfig};
    pub use crate::embedding::SparseEmbeddingHashCpu;
    pub use crate::error::{LayerError, LayerResult};
    pub use crate::pooling::{MeanPooling, Pooling, SumPooling};
    pub use hashemb_optimizer::{OptimizerConfig, OptimizerKind};
}
