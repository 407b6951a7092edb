//! Fixed-size header at the start of a CSR batch file.

use std::io::{Read, Write};

use crate::error::{DataError, Result};

/// Size of the encoded [`DataSetHeader`] in bytes.
pub const HEADER_SIZE: usize = 32;

/// Header written once at the start of every CSR batch file.
///
/// Four little-endian `i64` fields. The reader positions itself after the
/// header; the configured layout, not the header, drives parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataSetHeader {
    /// Number of samples in the file.
    pub number_of_records: i64,
    /// Number of 4-byte label fields per sample.
    pub label_dim: i64,
    /// Number of slots per sample.
    pub slot_num: i64,
    /// Reserved, written as zero.
    pub reserved: i64,
}

impl DataSetHeader {
    /// Creates a header with `reserved` set to zero.
    pub fn new(number_of_records: i64, label_dim: i64, slot_num: i64) -> Self {
        Self {
            number_of_records,
            label_dim,
            slot_num,
            reserved: 0,
        }
    }

    /// Decodes a header.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let field = |i: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            i64::from_le_bytes(raw)
        };
        Self {
            number_of_records: field(0),
            label_dim: field(1),
            slot_num: field(2),
            reserved: field(3),
        }
    }

    /// Encodes the header.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        let fields = [
            self.number_of_records,
            self.label_dim,
            self.slot_num,
            self.reserved,
        ];
        for (chunk, value) in bytes.chunks_exact_mut(8).zip(fields) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Reads a header from the start of a stream.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnexpectedEof`] if the stream is shorter than
    /// [`HEADER_SIZE`].
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => DataError::UnexpectedEof { offset: 0 },
            _ => DataError::Io(e),
        })?;
        Ok(Self::from_bytes(&bytes))
    }

    /// Writes the header.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}
