//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level storage backend for KevaDB.
///
/// Backends are append-only byte stores with random reads. They carry no
/// knowledge of WAL envelopes, log records, or values; `keva_core` owns all
/// format interpretation.
///
/// All methods take `&self`: implementations use interior mutability so a
/// backend can be shared behind an `Arc` without an extra lock at the call
/// site.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, which equals the
///   size before the call
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns, all appended data survives process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::OutOfBounds`] if the read would
    /// extend past the current size, or with an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data at the end of the store and returns its offset.
    fn append(&self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes buffered writes to the operating system.
    fn flush(&self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// A stronger barrier than `flush`: after it returns, appended data
    /// survives power loss.
    fn sync(&self) -> StorageResult<()>;

    /// Returns the current size in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the store to `new_size` bytes, discarding the tail.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::InvalidTruncate`] if `new_size`
    /// exceeds the current size.
    fn truncate(&self, new_size: u64) -> StorageResult<()>;
}
