//! Key to row-index table for embedding lookups.

use hashbrown::HashMap;

use crate::error::{HashTableError, Result};
use crate::key::HashKey;

/// A hash table mapping feature keys to dense row indices.
///
/// The embedding values live in a dense `[vocabulary_size, dim]` array; this
/// table resolves the sparse feature keys of a batch to rows of that array.
/// Every key maps to exactly one row and a missing key is always an error,
/// never a default row.
///
/// # Example
///
/// ```
/// use hashemb_hash_table::KeyIndexTable;
///
/// let mut table = KeyIndexTable::<i64>::new();
/// table.insert(&[100, 200, 300], &[0, 1, 2]).unwrap();
///
/// let mut indices = vec![0; 4];
/// table.get(&[300, 100, 300, 200], &mut indices).unwrap();
/// assert_eq!(indices, vec![2, 0, 2, 1]);
///
/// assert!(table.get(&[999], &mut indices[..1]).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct KeyIndexTable<K: HashKey> {
    entries: HashMap<K, usize>,
}

impl<K: HashKey> Default for KeyIndexTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: HashKey> KeyIndexTable<K> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Creates an empty table with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Builds a table where `keys[i]` maps to row `i`.
    ///
    /// # Errors
    ///
    /// Returns [`HashTableError::DuplicateKey`] if `keys` contains a repeat.
    pub fn from_keys(keys: &[K]) -> Result<Self> {
        let mut table = Self::with_capacity(keys.len());
        for (index, &key) in keys.iter().enumerate() {
            table.insert_one(key, index)?;
        }
        Ok(table)
    }

    /// Registers `(keys[i], indices[i])` pairs.
    ///
    /// Pairs are inserted in order; on failure the pairs before the offending
    /// one remain in the table.
    ///
    /// # Errors
    ///
    /// * [`HashTableError::CountMismatch`] - If the slices differ in length
    /// * [`HashTableError::DuplicateKey`] - If a key is already present
    pub fn insert(&mut self, keys: &[K], indices: &[usize]) -> Result<()> {
        if keys.len() != indices.len() {
            return Err(HashTableError::CountMismatch {
                key_count: keys.len(),
                index_count: indices.len(),
            });
        }
        self.entries.reserve(keys.len());
        for (&key, &index) in keys.iter().zip(indices) {
            self.insert_one(key, index)?;
        }
        Ok(())
    }

    /// Registers a single key.
    ///
    /// # Errors
    ///
    /// Returns [`HashTableError::DuplicateKey`] if the key is already present.
    pub fn insert_one(&mut self, key: K, index: usize) -> Result<()> {
        match self.entries.entry(key) {
            hashbrown::hash_map::Entry::Occupied(_) => Err(HashTableError::DuplicateKey {
                key: key.to_i128(),
            }),
            hashbrown::hash_map::Entry::Vacant(slot) => {
                slot.insert(index);
                Ok(())
            }
        }
    }

    /// Resolves `keys` to row indices, in input order.
    ///
    /// Repeated keys resolve to the same index each time.
    ///
    /// # Errors
    ///
    /// * [`HashTableError::CountMismatch`] - If `out_indices` has a different length
    /// * [`HashTableError::KeyNotFound`] - On the first key that is absent
    pub fn get(&self, keys: &[K], out_indices: &mut [usize]) -> Result<()> {
        if keys.len() != out_indices.len() {
            return Err(HashTableError::CountMismatch {
                key_count: keys.len(),
                index_count: out_indices.len(),
            });
        }
        for (&key, out) in keys.iter().zip(out_indices.iter_mut()) {
            *out = self.get_one(key)?;
        }
        Ok(())
    }

    /// Resolves a single key.
    ///
    /// # Errors
    ///
    /// Returns [`HashTableError::KeyNotFound`] if the key is absent.
    pub fn get_one(&self, key: K) -> Result<usize> {
        self.entries
            .get(&key)
            .copied()
            .ok_or(HashTableError::KeyNotFound { key: key.to_i128() })
    }

    /// Returns `true` if the key is registered.
    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Returns the number of registered keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
