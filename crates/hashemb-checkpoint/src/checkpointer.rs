//! Tile-format embedding checkpoints.
//!
//! A checkpoint is a flat sequence of `vocabulary_size` tiles. Each tile
//! holds one key followed by that row's `dim` values:
//!
//! ```text
//! key        K::WIDTH bytes, little-endian
//! value[dim] dim * 4 bytes, little-endian f32
//! ```
//!
//! Row `i` of the restored table comes from tile `i`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::marker::PhantomData;
use std::path::Path;

use hashemb_hash_table::HashKey;

use crate::table::EmbeddingTable;
use crate::{CheckpointError, Result};

/// Saves and restores [`EmbeddingTable`]s in the tile format.
///
/// # Example
///
/// ```no_run
/// use hashemb_checkpoint::TileCheckpointer;
/// use std::path::Path;
///
/// fn main() -> hashemb_checkpoint::Result<()> {
///     let checkpointer = TileCheckpointer::<i64>::new(100_000, 64);
///     let table = checkpointer.restore(Path::new("/tmp/table.bin"))?;
///     assert_eq!(table.vocabulary_size(), 100_000);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TileCheckpointer<K: HashKey> {
    vocabulary_size: usize,
    dim: usize,
    _key: PhantomData<K>,
}

impl<K: HashKey> TileCheckpointer<K> {
    /// Create a checkpointer for tables of the given shape.
    pub fn new(vocabulary_size: usize, dim: usize) -> Self {
        Self {
            vocabulary_size,
            dim,
            _key: PhantomData,
        }
    }

    /// Size of one tile in bytes.
    pub fn tile_size(&self) -> usize {
        K::WIDTH + self.dim * std::mem::size_of::<f32>()
    }

    /// Minimum checkpoint size in bytes.
    pub fn required_size(&self) -> u64 {
        self.vocabulary_size as u64 * self.tile_size() as u64
    }

    /// Restore a table from a checkpoint file.
    ///
    /// # Errors
    ///
    /// * [`CheckpointError::NotFound`] - The file doesn't exist
    /// * [`CheckpointError::FileTooSmall`] - The file is shorter than [`required_size`]
    /// * [`CheckpointError::Io`] - The file can't be read
    ///
    /// [`required_size`]: TileCheckpointer::required_size
    pub fn restore(&self, path: &Path) -> Result<EmbeddingTable<K>> {
        tracing::info!(
            path = %path.display(),
            vocabulary_size = self.vocabulary_size,
            dim = self.dim,
            "Restoring embedding table"
        );

        if !path.exists() {
            return Err(CheckpointError::NotFound(path.to_path_buf()));
        }
        let io_err = |source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let file_size = file.metadata().map_err(io_err)?.len();

        self.restore_from(BufReader::new(file), file_size)
            .map_err(|err| match err {
                CheckpointError::Stream(source) => CheckpointError::Io {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })
    }

    /// Restore a table from a stream holding `available` bytes.
    ///
    /// Exactly `vocabulary_size` tiles are read; bytes past
    /// [`required_size`](TileCheckpointer::required_size) are left unread.
    pub fn restore_from<R: Read>(&self, mut reader: R, available: u64) -> Result<EmbeddingTable<K>> {
        let required = self.required_size();
        if available < required {
            return Err(CheckpointError::FileTooSmall {
                required,
                actual: available,
            });
        }
        if available > required {
            tracing::warn!(
                required,
                actual = available,
                "Checkpoint holds more bytes than the configured table; ignoring the rest"
            );
        }

        let mut keys = Vec::with_capacity(self.vocabulary_size);
        let mut values = Vec::with_capacity(self.vocabulary_size * self.dim);
        let mut tile = vec![0u8; self.tile_size()];

        for _ in 0..self.vocabulary_size {
            reader.read_exact(&mut tile)?;
            let (key_bytes, value_bytes) = tile.split_at(K::WIDTH);

            let mut raw = K::Bytes::default();
            raw.as_mut().copy_from_slice(key_bytes);
            keys.push(K::from_le_bytes(raw));

            values.extend(
                value_bytes
                    .chunks_exact(4)
                    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            );
        }

        let table = EmbeddingTable::new(keys, values, self.dim)?;
        tracing::debug!(rows = table.vocabulary_size(), "Restored embedding table");
        Ok(table)
    }

    /// Save a table to a checkpoint file, creating parent directories.
    pub fn save(&self, path: &Path, table: &EmbeddingTable<K>) -> Result<()> {
        tracing::info!(path = %path.display(), rows = table.vocabulary_size(), "Saving embedding table");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CheckpointError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let file = File::create(path).map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut writer = BufWriter::new(file);
        self.save_to(&mut writer, table)?;
        writer.flush().map_err(|e| CheckpointError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write a table as tiles.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::InvalidTable`] if the table shape differs
    /// from this checkpointer's.
    pub fn save_to<W: Write>(&self, writer: &mut W, table: &EmbeddingTable<K>) -> Result<()> {
        if table.vocabulary_size() != self.vocabulary_size || table.dim() != self.dim {
            return Err(CheckpointError::InvalidTable(format!(
                "table is {}x{}, checkpointer expects {}x{}",
                table.vocabulary_size(),
                table.dim(),
                self.vocabulary_size,
                self.dim
            )));
        }
        for (row, &key) in table.keys().iter().enumerate() {
            writer.write_all(key.to_le_bytes().as_ref())?;
            for value in table.row(row) {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }
}
