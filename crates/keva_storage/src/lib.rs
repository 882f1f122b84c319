//! # Keva Storage
//!
//! Storage backend trait and implementations for KevaDB.
//!
//! This crate provides the lowest-level storage abstraction for KevaDB.
//! Backends are **opaque byte stores**: they support reading at an offset,
//! appending, truncating, and durability barriers, and never interpret the
//! bytes they hold. All record framing (WAL envelopes, log records) lives in
//! `keva_core`.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - persistent storage over a single file
//! - [`MemoryBackend`] - ephemeral storage for tests and in-memory databases
//!
//! ## Example
//!
//! ```rust
//! use keva_storage::{MemoryBackend, StorageBackend};
//!
//! let backend = MemoryBackend::new();
//! let offset = backend.append(b"hello world").unwrap();
//! let data = backend.read_at(offset, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
