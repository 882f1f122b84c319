//! Transactions: atomic, isolated units of mutation.
//!
//! Every mutation path goes through a transaction; single-record operations
//! are transactions of size one, batch operations are one transaction per
//! batch. A transaction stages its writes in memory, sees its own staged
//! writes plus the committed snapshot it started from (read-your-writes),
//! and becomes visible to others only when its commit record is durable in
//! the WAL.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{StagedWrite, Transaction, TransactionState};
