//! Error types for KevaDB core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in KevaDB core operations.
///
/// A missing record is not an error: reads return `Option::None` for absent
/// keys. The variants here are faults or rejected requests.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] keva_storage::StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] keva_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No key was supplied and none could be derived from the value.
    #[error("missing key: {message}")]
    MissingKey {
        /// Description of what was expected.
        message: String,
    },

    /// The supplied or embedded key is not usable as a store key.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Description of the rejection.
        message: String,
    },

    /// The WAL is corrupted or invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The record log is corrupted or invalid.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A transaction was aborted before any of it became visible.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for the abort.
        reason: String,
    },

    /// The store id does not name a registered store.
    #[error("unknown store: {id}")]
    UnknownStore {
        /// The unregistered store id.
        id: u32,
    },

    /// A store was reopened with a different key policy.
    #[error("store {name:?} exists with a different key policy")]
    StoreConfigMismatch {
        /// Name of the store.
        name: String,
    },

    /// Another process holds the database lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database handle has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// Invalid database format or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a missing key error.
    pub fn missing_key(message: impl Into<String>) -> Self {
        Self::MissingKey {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
