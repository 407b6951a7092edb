//! Key-index hash table for embedding storage.
//!
//! This crate maps sparse feature keys to dense row indices of an embedding
//! value table. Lookups are total: a key that was never registered is an
//! error, and every registered key owns exactly one row.
//!
//! # Overview
//!
//! - [`HashKey`] - Fixed-width integer keys as stored in checkpoint and batch files
//! - [`KeyIndexTable`] - The key to row-index mapping
//! - [`HashTableError`] - Duplicate-key and missing-key failures
//!
//! # Example
//!
//! ```
//! use hashemb_hash_table::KeyIndexTable;
//!
//! let keys: Vec<u64> = vec![1001, 1002, 1003];
//! let table = KeyIndexTable::from_keys(&keys).unwrap();
//!
//! let mut rows = vec![0; 2];
//! table.get(&[1003, 1001], &mut rows).unwrap();
//! assert_eq!(rows, vec![2, 0]);
//! ```

mod error;
mod key;
mod key_index;

pub use error::{HashTableError, Result};
pub use key::HashKey;
pub use key_index::KeyIndexTable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_mapping_over_vocabulary() {
        let keys: Vec<i64> = (0..64).map(|i| i * 31 + 7).collect();
        let table = KeyIndexTable::from_keys(&keys).unwrap();
        assert_eq!(table.len(), keys.len());

        let mut rows = vec![0; keys.len()];
        table.get(&keys, &mut rows).unwrap();
        assert_eq!(rows, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_error_display() {
        let err = HashTableError::KeyNotFound { key: 42 };
        assert_eq!(err.to_string(), "key 42 not found");
    }
}
