//! Write-Ahead Log (WAL) for durability and crash recovery.
//!
//! All mutations reach the WAL before they are acknowledged. On open, the
//! WAL is replayed and only transactions with a `Commit` record take effect:
//! a crash before the commit marker leaves no trace, a crash after it leaves
//! the whole transaction.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! Replay distinguishes tolerated from fatal conditions:
//!
//! - **Tolerated** (treated as clean end-of-log): a truncated header or
//!   payload at the tail. These are crashes mid-write before the fsync
//!   completed; the partial record is discarded.
//! - **Fatal** (the database refuses to open): CRC mismatch, invalid magic,
//!   unknown record type, or a future format version. These indicate real
//!   corruption, and opening would risk silent data loss.

mod iterator;
mod record;
mod writer;

pub use iterator::WalIterator;
pub use record::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::WalManager;
