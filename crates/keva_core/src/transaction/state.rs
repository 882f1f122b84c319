//! Transaction state.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::types::{SequenceNumber, StoreId, TransactionId};
use std::collections::BTreeMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can stage operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A staged mutation inside a transaction.
#[derive(Debug, Clone)]
pub enum StagedWrite {
    /// Insert or overwrite a record.
    Put {
        /// Encoded value payload.
        payload: Vec<u8>,
    },
    /// Remove a record.
    Remove,
}

/// An open transaction.
///
/// Staged writes are keyed by `(store, key)`; a later stage to the same key
/// replaces the earlier one. The staging map is ordered, so commits apply
/// writes in a deterministic key order.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    snapshot: SequenceNumber,
    state: TransactionState,
    writes: BTreeMap<(StoreId, Key), StagedWrite>,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, snapshot: SequenceNumber) -> Self {
        Self {
            id,
            snapshot,
            state: TransactionState::Active,
            writes: BTreeMap::new(),
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the snapshot sequence this transaction reads at.
    #[must_use]
    pub fn snapshot(&self) -> SequenceNumber {
        self.snapshot
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks whether the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Stages a put.
    pub fn stage_put(
        &mut self,
        store_id: StoreId,
        key: Key,
        payload: Vec<u8>,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        self.writes
            .insert((store_id, key), StagedWrite::Put { payload });
        Ok(())
    }

    /// Stages a remove.
    pub fn stage_remove(&mut self, store_id: StoreId, key: Key) -> CoreResult<()> {
        self.ensure_active()?;
        self.writes.insert((store_id, key), StagedWrite::Remove);
        Ok(())
    }

    /// Returns the staged write for a key, if any.
    #[must_use]
    pub fn staged(&self, store_id: StoreId, key: &Key) -> Option<&StagedWrite> {
        self.writes.get(&(store_id, key.clone()))
    }

    /// Iterates over staged writes in `(store, key)` order.
    pub fn staged_writes(&self) -> impl Iterator<Item = (&(StoreId, Key), &StagedWrite)> {
        self.writes.iter()
    }

    /// Returns the number of staged writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = TransactionState::Aborted;
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            TransactionState::Aborted => {
                Err(CoreError::invalid_operation("transaction already aborted"))
            }
        }
    }
}
