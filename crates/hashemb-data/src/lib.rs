//! CSR batch ingestion for the reference sparse embedding layer.
//!
//! Training data arrives as a flat binary stream: a fixed-size header, then
//! per sample a label region and, per slot, a feature count followed by that
//! many fixed-width keys. This crate reads that stream one batch at a time
//! into reusable compressed-row buffers.
//!
//! # Overview
//!
//! - [`DataSetHeader`] - The 32-byte file header
//! - [`CsrBatch`] - Row offsets and flattened keys of one batch
//! - [`CsrBatchReader`] - Sequential batch loader with a byte cursor
//! - [`CsrBatchWriter`] - Writer for the same layout
//!
//! # Example
//!
//! ```
//! use hashemb_data::{CsrBatch, CsrBatchReader, CsrBatchWriter, DataSetHeader};
//! use std::io::Cursor;
//!
//! let header = DataSetHeader::new(2, 1, 1);
//! let mut writer = CsrBatchWriter::<i64, _>::new(Vec::new(), header).unwrap();
//! writer.write_sample(&[1], &[vec![7i64, 8]]).unwrap();
//! writer.write_sample(&[0], &[vec![9i64]]).unwrap();
//! let bytes = writer.finish().unwrap();
//!
//! let mut reader = CsrBatchReader::<i64, _>::new(Cursor::new(bytes), 1).unwrap();
//! let mut batch = CsrBatch::new(2, 1, 2);
//! reader.read_batch(&mut batch).unwrap();
//! assert_eq!(batch.row_offset(), &[0, 2, 3]);
//! assert_eq!(batch.keys(), &[7, 8, 9]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
mod error;
pub mod header;
pub mod reader;
pub mod writer;

pub use batch::CsrBatch;
pub use error::{DataError, Result};
pub use header::{DataSetHeader, HEADER_SIZE};
pub use reader::CsrBatchReader;
pub use writer::CsrBatchWriter;
