//! Transaction manager.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::log::{LogRecord, LogStore};
use crate::transaction::state::{StagedWrite, Transaction};
use crate::types::{SequenceNumber, StoreId, TransactionId};
use crate::wal::{WalManager, WalRecord};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Coordinates transactions over the WAL and the record log.
///
/// Guarantees:
/// - **Atomicity**: all staged writes of a transaction reach the WAL,
///   followed by a commit record, before anything is applied to the log. A
///   crash before the commit record leaves no effect; after it, recovery
///   applies the whole transaction.
/// - **Isolation**: readers resolve against the committed sequence captured
///   when their transaction began, plus their own staged writes.
/// - **Single-writer**: the commit path holds an exclusive lock, so at most
///   one transaction is committing at a time; contenders queue in arrival
///   order on the lock.
pub struct TransactionManager {
    wal: Arc<WalManager>,
    log: Arc<LogStore>,
    /// Whether to fsync the WAL on every commit.
    sync_on_commit: bool,
    next_txid: AtomicU64,
    next_seq: AtomicU64,
    committed_seq: AtomicU64,
    commit_lock: Mutex<()>,
    active_txns: RwLock<Vec<TransactionId>>,
}

impl TransactionManager {
    /// Creates a new transaction manager over empty state.
    pub fn new(wal: Arc<WalManager>, log: Arc<LogStore>, sync_on_commit: bool) -> Self {
        Self::with_state(wal, log, sync_on_commit, 1, 1, 0)
    }

    /// Creates a transaction manager initialized from recovery state.
    pub fn with_state(
        wal: Arc<WalManager>,
        log: Arc<LogStore>,
        sync_on_commit: bool,
        next_txid: u64,
        next_seq: u64,
        committed_seq: u64,
    ) -> Self {
        Self {
            wal,
            log,
            sync_on_commit,
            next_txid: AtomicU64::new(next_txid),
            next_seq: AtomicU64::new(next_seq),
            committed_seq: AtomicU64::new(committed_seq),
            commit_lock: Mutex::new(()),
            active_txns: RwLock::new(Vec::new()),
        }
    }

    /// Begins a new transaction with a snapshot of the committed state.
    pub fn begin(&self) -> CoreResult<Transaction> {
        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let snapshot = SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst));

        self.wal.append(&WalRecord::Begin { txid })?;
        self.active_txns.write().push(txid);

        Ok(Transaction::new(txid, snapshot))
    }

    /// Commits a transaction, making all staged writes durable and visible.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<SequenceNumber> {
        let _commit_guard = self.commit_lock.lock();

        if !txn.is_active() {
            return Err(CoreError::invalid_operation("transaction not active"));
        }

        let txid = txn.id();
        let sequence = SequenceNumber::new(self.next_seq.fetch_add(1, Ordering::SeqCst));

        // Stage everything in the WAL, then the commit record. Nothing is
        // applied until the whole group is durable.
        for ((store_id, key), write) in txn.staged_writes() {
            match write {
                StagedWrite::Put { payload } => {
                    self.wal.append(&WalRecord::Put {
                        txid,
                        store_id: *store_id,
                        key: key.clone(),
                        payload: payload.clone(),
                    })?;
                }
                StagedWrite::Remove => {
                    self.wal.append(&WalRecord::Remove {
                        txid,
                        store_id: *store_id,
                        key: key.clone(),
                    })?;
                }
            }
        }
        self.wal.append(&WalRecord::Commit { txid, sequence })?;

        // Durability point.
        self.wal.flush()?;
        if self.sync_on_commit {
            self.wal.sync()?;
        }

        // Apply to the record log, in key order.
        for ((store_id, key), write) in txn.staged_writes() {
            let record = match write {
                StagedWrite::Put { payload } => {
                    LogRecord::put(*store_id, key.clone(), payload.clone(), sequence)
                }
                StagedWrite::Remove => LogRecord::tombstone(*store_id, key.clone(), sequence),
            };
            self.log.append(&record)?;
        }
        self.log.flush()?;

        self.committed_seq.store(sequence.as_u64(), Ordering::SeqCst);
        self.active_txns.write().retain(|&id| id != txid);
        txn.mark_committed();

        debug!(%txid, %sequence, writes = txn.write_count(), "transaction committed");
        Ok(sequence)
    }

    /// Aborts a transaction, discarding all staged writes.
    pub fn abort(&self, txn: &mut Transaction) -> CoreResult<()> {
        if !txn.is_active() {
            return Err(CoreError::invalid_operation("transaction not active"));
        }

        let txid = txn.id();
        self.wal.append(&WalRecord::Abort { txid })?;
        self.active_txns.write().retain(|&id| id != txid);
        txn.mark_aborted();

        debug!(%txid, "transaction aborted");
        Ok(())
    }

    /// Reads a key inside a transaction.
    ///
    /// The transaction's own staged writes win; otherwise the read resolves
    /// at the transaction's snapshot.
    pub fn get(
        &self,
        txn: &Transaction,
        store_id: StoreId,
        key: &Key,
    ) -> CoreResult<Option<Vec<u8>>> {
        if let Some(write) = txn.staged(store_id, key) {
            return Ok(match write {
                StagedWrite::Put { payload } => Some(payload.clone()),
                StagedWrite::Remove => None,
            });
        }

        self.log.get(store_id, key, Some(txn.snapshot()))
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed_seq.load(Ordering::SeqCst))
    }

    /// Returns the number of open transactions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active_txns.read().len()
    }

    /// Creates a checkpoint: all committed data becomes durable in the
    /// record log, and the WAL is truncated.
    pub fn checkpoint(&self) -> CoreResult<()> {
        let _commit_guard = self.commit_lock.lock();

        self.log.sync()?;

        let sequence = self.committed_seq();
        self.wal.append(&WalRecord::Checkpoint { sequence })?;
        self.wal.flush()?;
        self.wal.clear()?;

        debug!(%sequence, "checkpoint complete");
        Ok(())
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("committed_seq", &self.committed_seq())
            .field("active_count", &self.active_count())
            .finish_non_exhaustive()
    }
}
