//! Dense embedding value table.

use hashemb_hash_table::HashKey;

use crate::{CheckpointError, Result};

/// The embedding table restored from a checkpoint.
///
/// Three parallel arrays indexed by row: the feature key of each row, the
/// row index itself (`row_indices[i] == i`), and the row-major values of
/// shape `[vocabulary_size, dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable<K: HashKey> {
    keys: Vec<K>,
    row_indices: Vec<usize>,
    values: Vec<f32>,
    dim: usize,
}

impl<K: HashKey> EmbeddingTable<K> {
    /// Creates a table from keys and row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::InvalidTable`] if `dim` is zero or
    /// `values.len() != keys.len() * dim`.
    pub fn new(keys: Vec<K>, values: Vec<f32>, dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(CheckpointError::InvalidTable(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if values.len() != keys.len() * dim {
            return Err(CheckpointError::InvalidTable(format!(
                "{} keys of dimension {} need {} values, got {}",
                keys.len(),
                dim,
                keys.len() * dim,
                values.len()
            )));
        }
        let row_indices = (0..keys.len()).collect();
        Ok(Self {
            keys,
            row_indices,
            values,
            dim,
        })
    }

    /// Returns the number of rows.
    pub fn vocabulary_size(&self) -> usize {
        self.keys.len()
    }

    /// Returns the embedding dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the key of every row.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Returns the row index of every row.
    pub fn row_indices(&self) -> &[usize] {
        &self.row_indices
    }

    /// Returns all values, row-major.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Returns all values, row-major, for in-place updates.
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Returns the values of row `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= vocabulary_size()`.
    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Returns the values of row `index` for in-place updates.
    ///
    /// # Panics
    ///
    /// Panics if `index >= vocabulary_size()`.
    pub fn row_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.values[index * self.dim..(index + 1) * self.dim]
    }

    /// Sums every value in the table, in row-major order.
    pub fn checksum(&self) -> f64 {
        self.values.iter().map(|&v| f64::from(v)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows() {
        let mut table =
            EmbeddingTable::new(vec![10i64, 20, 30], vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0], 2)
                .unwrap();
        assert_eq!(table.vocabulary_size(), 3);
        assert_eq!(table.row_indices(), &[0, 1, 2]);
        assert_eq!(table.row(1), &[2.0, 2.0]);

        table.row_mut(2)[0] = 5.0;
        assert_eq!(table.values(), &[1.0, 1.0, 2.0, 2.0, 5.0, 3.0]);
        assert!((table.checksum() - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_shape_validation() {
        assert!(EmbeddingTable::new(vec![1u32, 2], vec![0.0; 3], 2).is_err());
        assert!(EmbeddingTable::<u32>::new(vec![], vec![], 0).is_err());
    }
}
