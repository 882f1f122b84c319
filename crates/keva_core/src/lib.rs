//! # Keva Core
//!
//! Core storage engine for KevaDB: an embedded, durable key-value object
//! store organized as named stores with per-store key policy.
//!
//! This crate provides:
//! - WAL (Write-Ahead Log) for durability and crash recovery
//! - An append-only record log with tombstones and compaction
//! - Transaction management: atomic single and batch mutations,
//!   read-your-writes isolation, single-writer commits
//! - Key resolution: in-line key paths, out-of-line keys, and monotonic
//!   surrogate key generation
//! - The [`Database`] facade tying it all together
//!
//! ## Quick start
//!
//! ```
//! use keva_core::{Database, StoreConfig, Value};
//!
//! let db = Database::open_in_memory().unwrap();
//! let users = db.store(&StoreConfig::new("users")).unwrap();
//!
//! let key = db
//!     .put(users, Value::map([("name", Value::from("Ada"))]))
//!     .unwrap();
//! assert!(db.get(users, &key).unwrap().is_some());
//!
//! db.remove(users, &key).unwrap();
//! assert!(db.get(users, &key).unwrap().is_none());
//! ```

pub mod catalog;
pub mod config;
mod database;
mod dir;
pub mod error;
pub mod key;
pub mod log;
pub mod transaction;
pub mod types;
pub mod wal;

pub use catalog::StoreConfig;
pub use config::Config;
pub use database::Database;
pub use error::{CoreError, CoreResult};
pub use key::{Key, KeyPolicy};
pub use transaction::Transaction;
pub use types::{SequenceNumber, StoreId, TransactionId};

// Stored values come from the codec crate; re-exported for convenience.
pub use keva_codec::Value;
