//! Fixed-width feature keys.

use std::fmt;
use std::hash::Hash;

/// A fixed-width integer feature key.
///
/// Checkpoints and CSR batch files store keys as raw little-endian integers
/// whose width is fixed per dataset. `HashKey` ties a Rust integer type to
/// that on-disk width so the readers and the [`KeyIndexTable`] can be
/// generic over it.
///
/// [`KeyIndexTable`]: crate::KeyIndexTable
///
/// # Example
///
/// ```
/// use hashemb_hash_table::HashKey;
///
/// let bytes = 42i64.to_le_bytes();
/// assert_eq!(<i64 as HashKey>::from_le_bytes(bytes), 42);
/// assert_eq!(<i64 as HashKey>::WIDTH, 8);
/// ```
pub trait HashKey:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Byte array holding one encoded key.
    type Bytes: AsRef<[u8]> + AsMut<[u8]> + Default + Copy;

    /// Decodes a key from its little-endian representation.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encodes the key as little-endian bytes.
    fn to_le_bytes(self) -> Self::Bytes;

    /// Widens the key for error reporting.
    fn to_i128(self) -> i128;

    /// Narrows a generated value into a key, if it fits.
    fn try_from_u64(value: u64) -> Option<Self>;
}

macro_rules! impl_hash_key {
    ($($ty:ty),*) => {
        $(
            impl HashKey for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_i128(self) -> i128 {
                    i128::from(self)
                }

                fn try_from_u64(value: u64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_hash_key!(i32, u32, i64, u64);
