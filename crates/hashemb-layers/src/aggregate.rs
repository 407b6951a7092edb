//! Duplicate-index aggregation of sparse gradients.
//!
//! A batch may look up the same table row many times. Before the optimizer
//! runs, every looked-up entry is tagged with the (sample, slot) row it came
//! from, the entries are sorted by table row, and runs of equal table rows
//! are collapsed into [`DedupGroup`]s. Each group's gradient is the sum of
//! the per-row gradients of its entries, in sorted order.

use crate::error::{LayerError, LayerResult};

/// A run of sorted entries that share one table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupGroup {
    /// The table row every entry of the group looked up.
    pub row_index: usize,
    /// First entry of the group in the sorted sample ids.
    pub start: usize,
    /// One past the last entry of the group.
    pub end: usize,
}

impl DedupGroup {
    /// Number of entries in the group.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the group has no entries.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Sorts and unduplicates the looked-up row indices of a batch.
///
/// Buffers are allocated once for the batch capacity and reused.
///
/// # Example
///
/// ```
/// use hashemb_layers::SparseGradientAggregator;
///
/// let mut aggregator = SparseGradientAggregator::with_capacity(3);
/// aggregator.aggregate(&[0, 3], &[2, 0, 2]).unwrap();
///
/// let groups = aggregator.groups();
/// assert_eq!(groups.len(), 2);
/// assert_eq!((groups[0].row_index, groups[0].len()), (0, 1));
/// assert_eq!((groups[1].row_index, groups[1].len()), (2, 2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SparseGradientAggregator {
    sample_ids: Vec<usize>,
    pairs: Vec<(usize, usize)>,
    sorted_row_indices: Vec<usize>,
    sorted_sample_ids: Vec<usize>,
    groups: Vec<DedupGroup>,
}

impl SparseGradientAggregator {
    /// Creates an aggregator with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sample_ids: Vec::with_capacity(capacity),
            pairs: Vec::with_capacity(capacity),
            sorted_row_indices: Vec::with_capacity(capacity),
            sorted_sample_ids: Vec::with_capacity(capacity),
            groups: Vec::with_capacity(capacity),
        }
    }

    /// Expands `row_offset` into one owning row id per entry.
    pub fn extend_sample_ids(&mut self, row_offset: &[usize]) {
        self.sample_ids.clear();
        for (row, window) in row_offset.windows(2).enumerate() {
            self.sample_ids
                .extend(std::iter::repeat(row).take(window[1] - window[0]));
        }
    }

    /// Runs the whole aggregation for one batch.
    ///
    /// 1. Expand `row_offset` into sample ids.
    /// 2. Stable-sort `(row_index, sample_id)` pairs by row index.
    /// 3. Close a group whenever the row index changes.
    /// 4. Stable re-sort of the groups by row index.
    ///
    /// An empty batch yields no groups.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::DimensionMismatch`] if `row_indices` does not
    /// hold one index per entry of `row_offset`.
    pub fn aggregate(&mut self, row_offset: &[usize], row_indices: &[usize]) -> LayerResult<()> {
        self.extend_sample_ids(row_offset);
        if row_indices.len() != self.sample_ids.len() {
            return Err(LayerError::DimensionMismatch {
                what: "row_indices",
                expected: self.sample_ids.len(),
                actual: row_indices.len(),
            });
        }

        self.pairs.clear();
        self.pairs
            .extend(row_indices.iter().copied().zip(self.sample_ids.iter().copied()));
        self.pairs.sort_by_key(|&(row_index, _)| row_index);

        self.sorted_row_indices.clear();
        self.sorted_sample_ids.clear();
        for &(row_index, sample_id) in &self.pairs {
            self.sorted_row_indices.push(row_index);
            self.sorted_sample_ids.push(sample_id);
        }

        self.dedup();
        self.groups.sort_by_key(|group| group.row_index);
        Ok(())
    }

    fn dedup(&mut self) {
        self.groups.clear();
        let Some(&first) = self.sorted_row_indices.first() else {
            return;
        };

        let mut current = DedupGroup {
            row_index: first,
            start: 0,
            end: 0,
        };
        for (k, &row_index) in self.sorted_row_indices.iter().enumerate() {
            if row_index != current.row_index {
                current.end = k;
                self.groups.push(current);
                current = DedupGroup {
                    row_index,
                    start: k,
                    end: k,
                };
            }
        }
        current.end = self.sorted_row_indices.len();
        self.groups.push(current);
    }

    /// Sums the per-row gradients of a group's entries into `out`.
    ///
    /// Each element is accumulated from `0.0` in sorted order.
    pub fn gradient_for(&self, group: &DedupGroup, wgrad: &[f32], dim: usize, out: &mut [f32]) {
        out.fill(0.0);
        for &sample_id in &self.sorted_sample_ids[group.start..group.end] {
            let src = &wgrad[sample_id * dim..(sample_id + 1) * dim];
            for (o, g) in out.iter_mut().zip(src) {
                *o += g;
            }
        }
    }

    /// Owning row id of every entry, in batch order.
    pub fn sample_ids(&self) -> &[usize] {
        &self.sample_ids
    }

    /// Row indices after the stable sort.
    pub fn sorted_row_indices(&self) -> &[usize] {
        &self.sorted_row_indices
    }

    /// Sample ids permuted alongside [`sorted_row_indices`](Self::sorted_row_indices).
    pub fn sorted_sample_ids(&self) -> &[usize] {
        &self.sorted_sample_ids
    }

    /// Groups in ascending row-index order.
    pub fn groups(&self) -> &[DedupGroup] {
        &self.groups
    }

    /// Number of distinct row indices in the batch.
    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }
}
