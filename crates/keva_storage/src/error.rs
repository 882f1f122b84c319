//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the store.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    OutOfBounds {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// Attempted to truncate to a size larger than the current size.
    #[error("cannot grow storage via truncate: requested {requested}, size {size}")]
    InvalidTruncate {
        /// The requested new size.
        requested: u64,
        /// The current storage size.
        size: u64,
    },
}
