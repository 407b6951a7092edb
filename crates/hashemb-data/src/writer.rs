//! CSR batch file writer.
//!
//! Produces files in the layout consumed by [`CsrBatchReader`]. Used to
//! build fixtures and synthetic datasets.
//!
//! [`CsrBatchReader`]: crate::CsrBatchReader

use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use hashemb_hash_table::HashKey;

use crate::error::{DataError, Result};
use crate::header::DataSetHeader;

/// Writes a header followed by samples.
pub struct CsrBatchWriter<K: HashKey, W: Write = BufWriter<File>> {
    writer: W,
    header: DataSetHeader,
    samples_written: u64,
    _key: PhantomData<K>,
}

impl<K: HashKey> CsrBatchWriter<K> {
    /// Creates (or truncates) a CSR batch file and writes its header.
    pub fn create<P: AsRef<Path>>(path: P, header: DataSetHeader) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<K: HashKey, W: Write> CsrBatchWriter<K, W> {
    /// Writes `header` to `writer` and returns a writer for the samples.
    pub fn new(mut writer: W, header: DataSetHeader) -> Result<Self> {
        header.write_to(&mut writer)?;
        Ok(Self {
            writer,
            header,
            samples_written: 0,
            _key: PhantomData,
        })
    }

    /// Appends one sample: its label fields, then one key list per slot.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidLayout`] if the label or slot count
    /// disagrees with the header.
    pub fn write_sample<S: AsRef<[K]>>(&mut self, labels: &[i32], slots: &[S]) -> Result<()> {
        if labels.len() as i64 != self.header.label_dim {
            return Err(DataError::InvalidLayout(format!(
                "expected {} labels, got {}",
                self.header.label_dim,
                labels.len()
            )));
        }
        if slots.len() as i64 != self.header.slot_num {
            return Err(DataError::InvalidLayout(format!(
                "expected {} slots, got {}",
                self.header.slot_num,
                slots.len()
            )));
        }

        for label in labels {
            self.writer.write_all(&label.to_le_bytes())?;
        }
        for slot in slots {
            let keys = slot.as_ref();
            let count = i32::try_from(keys.len()).map_err(|_| {
                DataError::InvalidLayout(format!("slot with {} keys", keys.len()))
            })?;
            self.writer.write_all(&count.to_le_bytes())?;
            for &key in keys {
                self.writer.write_all(key.to_le_bytes().as_ref())?;
            }
        }
        self.samples_written += 1;
        Ok(())
    }

    /// Returns the number of samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        if self.samples_written as i64 != self.header.number_of_records {
            tracing::warn!(
                written = self.samples_written,
                declared = self.header.number_of_records,
                "CSR header record count differs from samples written"
            );
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}
