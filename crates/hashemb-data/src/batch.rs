//! Compressed-row batches of sparse feature keys.
//!
//! A [`CsrBatch`] holds one batch of `batch_size` samples with `slot_num`
//! slots each. Row `r = sample * slot_num + slot` owns the keys
//! `keys[row_offset[r]..row_offset[r + 1]]`.
//!
//! # Example
//!
//! ```
//! use hashemb_data::CsrBatch;
//!
//! let mut batch = CsrBatch::<i64>::new(1, 2, 4);
//! batch.push_row(&[10, 11, 12]).unwrap();
//! batch.push_row(&[]).unwrap();
//!
//! assert!(batch.is_complete());
//! assert_eq!(batch.row_offset(), &[0, 3, 3]);
//! assert_eq!(batch.feature_num(0), 3);
//! assert_eq!(batch.row(1), &[] as &[i64]);
//! ```

use hashemb_hash_table::HashKey;

use crate::error::{DataError, Result};

/// One batch of CSR-encoded sparse features.
///
/// The buffers are reserved once for the worst case
/// (`batch_size * max_feature_num` keys) and refilled in place for every
/// batch, so reading a batch never reallocates.
#[derive(Debug, Clone)]
pub struct CsrBatch<K: HashKey> {
    batch_size: usize,
    slot_num: usize,
    capacity: usize,
    row_offset: Vec<usize>,
    keys: Vec<K>,
}

impl<K: HashKey> CsrBatch<K> {
    /// Creates an empty batch sized for `batch_size * max_feature_num` keys.
    pub fn new(batch_size: usize, slot_num: usize, max_feature_num: usize) -> Self {
        let capacity = batch_size * max_feature_num;
        let mut row_offset = Vec::with_capacity(batch_size * slot_num + 1);
        row_offset.push(0);
        Self {
            batch_size,
            slot_num,
            capacity,
            row_offset,
            keys: Vec::with_capacity(capacity),
        }
    }

    /// Builds a complete batch from explicit rows, in row order.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidLayout`] if `rows` doesn't contain exactly
    /// `batch_size * slot_num` rows, or [`DataError::CapacityExceeded`] if
    /// the rows hold more keys than the batch capacity.
    pub fn from_rows<R: AsRef<[K]>>(
        batch_size: usize,
        slot_num: usize,
        max_feature_num: usize,
        rows: &[R],
    ) -> Result<Self> {
        let mut batch = Self::new(batch_size, slot_num, max_feature_num);
        if rows.len() != batch.num_rows() {
            return Err(DataError::InvalidLayout(format!(
                "expected {} rows, got {}",
                batch.num_rows(),
                rows.len()
            )));
        }
        for row in rows {
            batch.push_row(row.as_ref())?;
        }
        Ok(batch)
    }

    /// Drops the current contents, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.row_offset.clear();
        self.row_offset.push(0);
        self.keys.clear();
    }

    /// Checks that `additional` more keys fit in the batch.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::CapacityExceeded`] if they don't.
    pub fn reserve_keys(&self, additional: usize) -> Result<()> {
        let required = self.keys.len() + additional;
        if required > self.capacity {
            return Err(DataError::CapacityExceeded {
                required,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Appends the next row.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidLayout`] if the batch already holds all of
    /// its rows, or [`DataError::CapacityExceeded`] if the keys don't fit.
    pub fn push_row(&mut self, keys: &[K]) -> Result<()> {
        self.start_row()?;
        self.reserve_keys(keys.len())?;
        self.keys.extend_from_slice(keys);
        self.row_offset.push(self.keys.len());
        Ok(())
    }

    /// Appends the next row, decoding its keys from little-endian bytes.
    pub(crate) fn push_encoded_row(&mut self, bytes: &[u8]) -> Result<()> {
        self.start_row()?;
        self.reserve_keys(bytes.len() / K::WIDTH)?;
        for chunk in bytes.chunks_exact(K::WIDTH) {
            let mut raw = K::Bytes::default();
            raw.as_mut().copy_from_slice(chunk);
            self.keys.push(K::from_le_bytes(raw));
        }
        self.row_offset.push(self.keys.len());
        Ok(())
    }

    fn start_row(&self) -> Result<()> {
        if self.is_complete() {
            return Err(DataError::InvalidLayout(format!(
                "batch already holds all {} rows",
                self.num_rows()
            )));
        }
        Ok(())
    }

    /// Returns the number of samples per batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns the number of slots per sample.
    pub fn slot_num(&self) -> usize {
        self.slot_num
    }

    /// Returns the number of (sample, slot) rows a complete batch holds.
    pub fn num_rows(&self) -> usize {
        self.batch_size * self.slot_num
    }

    /// Returns the maximum number of keys the batch can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total number of keys, `row_offset[last]`.
    pub fn nnz(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` once every row has been pushed.
    pub fn is_complete(&self) -> bool {
        self.row_offset.len() == self.num_rows() + 1
    }

    /// Returns the cumulative row offsets.
    pub fn row_offset(&self) -> &[usize] {
        &self.row_offset
    }

    /// Returns all keys, row after row.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Returns the keys of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` has not been pushed yet.
    pub fn row(&self, row: usize) -> &[K] {
        &self.keys[self.row_offset[row]..self.row_offset[row + 1]]
    }

    /// Returns the number of keys in row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` has not been pushed yet.
    pub fn feature_num(&self, row: usize) -> usize {
        self.row_offset[row + 1] - self.row_offset[row]
    }
}
