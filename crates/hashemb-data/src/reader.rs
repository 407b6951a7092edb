//! Sequential CSR batch reader.
//!
//! # File Layout
//!
//! ```text
//! DataSetHeader                          32 bytes
//! per sample (batch_size per batch):
//!     label[label_dim]                   label_dim * 4 bytes, skipped
//!     per slot (slot_num):
//!         nnz                            i32, little-endian
//!         key[nnz]                       nnz * K::WIDTH bytes, little-endian
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hashemb_data::{CsrBatch, CsrBatchReader};
//!
//! let mut reader = CsrBatchReader::<i64>::open("data/train.bin", 1).unwrap();
//! let mut batch = CsrBatch::new(1024, 26, 26);
//! while reader.read_batch(&mut batch).is_ok() {
//!     println!("batch with {} keys", batch.nnz());
//! }
//! ```

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::marker::PhantomData;
use std::path::Path;

use hashemb_hash_table::HashKey;

use crate::batch::CsrBatch;
use crate::error::{DataError, Result};
use crate::header::{DataSetHeader, HEADER_SIZE};

/// Reads CSR batches one after another from a byte stream.
///
/// The reader keeps a byte cursor so that each [`read_batch`] call continues
/// where the previous one stopped.
///
/// [`read_batch`]: CsrBatchReader::read_batch
pub struct CsrBatchReader<K: HashKey, R: Read = BufReader<File>> {
    reader: R,
    header: DataSetHeader,
    label_dim: usize,
    offset: u64,
    scratch: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K: HashKey, R: Read> std::fmt::Debug for CsrBatchReader<K, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrBatchReader")
            .field("header", &self.header)
            .field("label_dim", &self.label_dim)
            .field("offset", &self.offset)
            .field("key_width", &K::WIDTH)
            .finish()
    }
}

impl<K: HashKey> CsrBatchReader<K> {
    /// Opens a CSR batch file and reads its header.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Open`] if the file cannot be opened, or
    /// [`DataError::UnexpectedEof`] if it is shorter than the header.
    pub fn open<P: AsRef<Path>>(path: P, label_dim: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), label_dim, "Opening CSR batch file");
        Self::new(BufReader::new(file), label_dim)
    }
}

impl<K: HashKey, R: Read> CsrBatchReader<K, R> {
    /// Wraps a stream positioned at the start of the header.
    ///
    /// A header whose `label_dim` disagrees with `label_dim` is logged and
    /// otherwise ignored; the configured value drives parsing.
    pub fn new(mut reader: R, label_dim: usize) -> Result<Self> {
        let header = DataSetHeader::read_from(&mut reader)?;
        if header.label_dim != label_dim as i64 {
            tracing::warn!(
                header_label_dim = header.label_dim,
                label_dim,
                "CSR header label_dim differs from configuration"
            );
        }
        Ok(Self {
            reader,
            header,
            label_dim,
            offset: HEADER_SIZE as u64,
            scratch: Vec::new(),
            _key: PhantomData,
        })
    }

    /// Returns the header read when the stream was opened.
    pub fn header(&self) -> &DataSetHeader {
        &self.header
    }

    /// Returns the byte offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.offset
    }

    /// Reads exactly one batch into `batch`, replacing its contents.
    ///
    /// The batch's `batch_size` and `slot_num` decide how many samples and
    /// slots are consumed.
    ///
    /// # Errors
    ///
    /// * [`DataError::EndOfStream`] - The stream ended before the batch started
    /// * [`DataError::UnexpectedEof`] - The stream ended inside the batch
    /// * [`DataError::NegativeFeatureCount`] - A slot count was negative
    /// * [`DataError::CapacityExceeded`] - The batch holds too many keys
    ///
    /// After an error the contents of `batch` are unspecified.
    pub fn read_batch(&mut self, batch: &mut CsrBatch<K>) -> Result<()> {
        batch.clear();
        let label_bytes = self.label_dim * 4;

        for sample in 0..batch.batch_size() {
            for slot in 0..batch.slot_num() {
                let at_batch_start = sample == 0 && slot == 0;
                if slot == 0 {
                    self.fill_scratch(label_bytes, at_batch_start)?;
                }

                let count_offset = self.offset;
                let mut count_bytes = [0u8; 4];
                let at_batch_start = at_batch_start && label_bytes == 0;
                self.read_exact_tracked(&mut count_bytes, at_batch_start)?;
                let count = i32::from_le_bytes(count_bytes);
                if count < 0 {
                    return Err(DataError::NegativeFeatureCount {
                        count,
                        offset: count_offset,
                    });
                }
                let count = count as usize;

                batch.reserve_keys(count)?;
                self.fill_scratch(count * K::WIDTH, false)?;
                batch.push_encoded_row(&self.scratch)?;
            }
        }

        // A batch with zero slots still skips its label regions.
        if batch.slot_num() == 0 {
            for sample in 0..batch.batch_size() {
                self.fill_scratch(label_bytes, sample == 0)?;
            }
        }

        tracing::trace!(nnz = batch.nnz(), offset = self.offset, "Read CSR batch");
        Ok(())
    }

    fn fill_scratch(&mut self, len: usize, at_batch_start: bool) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(len, 0);
        let result = self.read_exact_tracked(&mut scratch, at_batch_start);
        self.scratch = scratch;
        result
    }

    /// Reads `buf.len()` bytes, classifying a short read as a clean end of
    /// stream only when nothing of the current batch has been read.
    fn read_exact_tracked(&mut self, buf: &mut [u8], at_batch_start: bool) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DataError::Io(e)),
            }
        }
        let start = self.offset;
        self.offset += filled as u64;

        if filled == buf.len() {
            Ok(())
        } else if filled == 0 && at_batch_start {
            Err(DataError::EndOfStream { offset: start })
        } else {
            Err(DataError::UnexpectedEof {
                offset: self.offset,
            })
        }
    }
}
