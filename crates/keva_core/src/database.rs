//! Database facade and recovery.

use crate::catalog::{Catalog, StoreConfig};
use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::key::{resolve_key, Key};
use crate::log::{Compactor, LogRecord, LogStore};
use crate::transaction::{Transaction, TransactionManager};
use crate::types::{SequenceNumber, StoreId, TransactionId};
use crate::wal::{WalManager, WalRecord};
use keva_codec::Value;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Largest accepted encoded value, bounded by the u32 record length fields
/// in the WAL and log formats.
const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - 1024;

/// The main database handle.
///
/// `Database` is the owning registry of named stores and the entry point
/// for every operation: store management, single-record and batch CRUD,
/// explicit transactions, checkpointing, and compaction.
///
/// # Opening a Database
///
/// ```rust,ignore
/// use keva_core::{Database, StoreConfig, Value};
///
/// let db = Database::open(Path::new("my_database"))?;
/// let users = db.store(&StoreConfig::new("users"))?;
///
/// let key = db.put(users, Value::map([("name", Value::from("Ada"))]))?;
/// assert!(db.get(users, &key)?.is_some());
///
/// db.close()?;
/// ```
///
/// For tests and ephemeral data, use [`Database::open_in_memory`].
pub struct Database {
    config: Config,
    /// Database directory (holds the lock). `None` for in-memory databases.
    dir: Option<DatabaseDir>,
    catalog: RwLock<Catalog>,
    wal: Arc<WalManager>,
    log: Arc<LogStore>,
    txns: Arc<TransactionManager>,
    is_open: RwLock<bool>,
}

impl Database {
    /// Opens a database from a directory path with default configuration.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database from a directory path.
    ///
    /// Acquires the directory lock, loads the catalog, replays the WAL, and
    /// rebuilds the log index. Opening an existing database reattaches to
    /// its stores and surrogate-key counters.
    ///
    /// # Errors
    ///
    /// Fails if another process holds the lock ([`CoreError::DatabaseLocked`]),
    /// if the on-disk format is incompatible, or on I/O errors.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        use keva_storage::FileBackend;

        let dir = DatabaseDir::open(path, config.create_if_missing)?;

        if !config.create_if_missing && dir.is_new_database() {
            return Err(CoreError::invalid_format(
                "database does not exist and create_if_missing is false",
            ));
        }
        if config.error_if_exists && !dir.is_new_database() {
            return Err(CoreError::invalid_format(
                "database already exists and error_if_exists is true",
            ));
        }

        let catalog = match dir.load_catalog()? {
            Some(catalog) => {
                if catalog.format_version.0 != config.format_version.0 {
                    return Err(CoreError::invalid_format(format!(
                        "incompatible format version: database is v{}.{}, expected v{}.{}",
                        catalog.format_version.0,
                        catalog.format_version.1,
                        config.format_version.0,
                        config.format_version.1
                    )));
                }
                catalog
            }
            None => Catalog::new(config.format_version),
        };

        // An interrupted compaction leaves a temp log behind; the real log
        // is still intact, so the leftover is simply discarded.
        dir.remove_stale_log_temp()?;

        let wal_backend = FileBackend::open_with_create_dirs(&dir.wal_path())?;
        let log_backend = FileBackend::open_with_create_dirs(&dir.log_path())?;

        Self::bootstrap(
            config,
            Some(dir),
            catalog,
            Box::new(wal_backend),
            Box::new(log_backend),
        )
    }

    /// Opens a database over explicit storage backends.
    ///
    /// Lower-level constructor used by [`Database::open_in_memory`] and by
    /// tests that preload crash images.
    pub fn open_with_backends(
        config: Config,
        wal_backend: Box<dyn keva_storage::StorageBackend>,
        log_backend: Box<dyn keva_storage::StorageBackend>,
    ) -> CoreResult<Self> {
        let catalog = Catalog::new(config.format_version);
        Self::bootstrap(config, None, catalog, wal_backend, log_backend)
    }

    /// Opens a fresh in-memory database.
    pub fn open_in_memory() -> CoreResult<Self> {
        use keva_storage::MemoryBackend;
        Self::open_with_backends(
            Config::default(),
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        )
    }

    fn bootstrap(
        config: Config,
        dir: Option<DatabaseDir>,
        mut catalog: Catalog,
        wal_backend: Box<dyn keva_storage::StorageBackend>,
        log_backend: Box<dyn keva_storage::StorageBackend>,
    ) -> CoreResult<Self> {
        let wal = Arc::new(WalManager::new(wal_backend));
        let log = Arc::new(LogStore::new(log_backend));

        log.rebuild_index()?;
        let recovery = Self::replay_wal(&wal, &log)?;

        // Surrogate counters must stay above every integer key ever written,
        // whether it came from the catalog, the log, or replayed commits.
        for (store_id, key) in log.all_keys() {
            if let Key::Integer(k) = key {
                catalog.note_integer_key(store_id, k);
            }
        }

        let txns = Arc::new(TransactionManager::with_state(
            Arc::clone(&wal),
            Arc::clone(&log),
            config.sync_on_commit,
            recovery.next_txid,
            recovery.next_seq,
            recovery.committed_seq,
        ));

        let db = Self {
            config,
            dir,
            catalog: RwLock::new(catalog),
            wal,
            log,
            txns,
            is_open: RwLock::new(true),
        };

        // Fold the replayed WAL into the log so restarts start clean.
        if recovery.wal_bytes > 0 {
            db.txns.checkpoint()?;
            db.persist_catalog()?;
        }

        Ok(db)
    }

    /// Replays the WAL, applying only committed transactions to the log.
    fn replay_wal(wal: &WalManager, log: &LogStore) -> CoreResult<RecoveryState> {
        let wal_bytes = wal.size()?;

        let mut staged: HashMap<TransactionId, Vec<WalRecord>> = HashMap::new();
        let mut commits: HashMap<TransactionId, SequenceNumber> = HashMap::new();
        let mut aborted: HashSet<TransactionId> = HashSet::new();
        let mut max_txid = 0u64;
        let mut max_seq = 0u64;
        let mut committed_seq = 0u64;

        for item in wal.iter()? {
            let (_, record) = item?;
            if let Some(txid) = record.txid() {
                max_txid = max_txid.max(txid.as_u64());
            }

            match record {
                WalRecord::Begin { txid } => {
                    staged.insert(txid, Vec::new());
                }
                WalRecord::Put { txid, .. } | WalRecord::Remove { txid, .. } => {
                    if let Some(ops) = staged.get_mut(&txid) {
                        ops.push(record);
                    }
                }
                WalRecord::Commit { txid, sequence } => {
                    commits.insert(txid, sequence);
                    max_seq = max_seq.max(sequence.as_u64());
                    committed_seq = committed_seq.max(sequence.as_u64());
                }
                WalRecord::Abort { txid } => {
                    aborted.insert(txid);
                    staged.remove(&txid);
                }
                WalRecord::Checkpoint { sequence } => {
                    max_seq = max_seq.max(sequence.as_u64());
                    committed_seq = committed_seq.max(sequence.as_u64());
                }
            }
        }

        let mut replayed = 0usize;
        let mut dropped = 0usize;
        for (txid, ops) in &staged {
            let Some(&sequence) = commits.get(txid) else {
                dropped += 1;
                continue;
            };

            for op in ops {
                let record = match op {
                    WalRecord::Put {
                        store_id,
                        key,
                        payload,
                        ..
                    } => LogRecord::put(*store_id, key.clone(), payload.clone(), sequence),
                    WalRecord::Remove { store_id, key, .. } => {
                        LogRecord::tombstone(*store_id, key.clone(), sequence)
                    }
                    _ => continue,
                };
                log.append(&record)?;
            }
            replayed += 1;
        }
        if replayed > 0 {
            log.flush()?;
        }

        if wal_bytes > 0 {
            info!(
                replayed,
                dropped,
                aborted = aborted.len(),
                committed_seq,
                "WAL recovery complete"
            );
        }

        Ok(RecoveryState {
            next_txid: max_txid + 1,
            next_seq: max_seq + 1,
            committed_seq,
            wal_bytes,
        })
    }

    // ========================================================================
    // Store management
    // ========================================================================

    /// Opens a named store, creating it if absent.
    ///
    /// Opening is idempotent: an existing store is reattached to its records
    /// and its surrogate-key counter. The key policy is fixed at creation;
    /// reopening with a different policy fails.
    pub fn store(&self, config: &StoreConfig) -> CoreResult<StoreId> {
        self.ensure_open()?;

        let (id, created) = {
            let mut catalog = self.catalog.write();
            let (id, created) = catalog.open_store(config)?;

            // A "new" store may still have recovered records, e.g. when the
            // catalog was lost but the log survived. Walk its keys so the
            // generator resumes above them.
            if created {
                for (store_id, key) in self.log.all_keys() {
                    if store_id == id {
                        if let Key::Integer(k) = key {
                            catalog.note_integer_key(id, k);
                        }
                    }
                }
            }
            (id, created)
        };

        if created {
            self.persist_catalog()?;
            debug!(name = %config.name, %id, "store created");
        }
        Ok(id)
    }

    /// Looks up a store id by name without creating it.
    #[must_use]
    pub fn lookup_store(&self, name: &str) -> Option<StoreId> {
        self.catalog.read().lookup(name)
    }

    // ========================================================================
    // Single-record operations
    // ========================================================================

    /// Stores a value, resolving its key from the store's key policy.
    ///
    /// For in-line stores the key is read from the value's key field, or
    /// generated and written back into the value when the field is absent
    /// and the store auto-increments. Returns the resolved key.
    ///
    /// A put to an existing key fully replaces the prior value.
    pub fn put(&self, store: StoreId, value: Value) -> CoreResult<Key> {
        self.ensure_open()?;

        let mut value = value;
        let key = self.resolve_for_store(store, None, &mut value)?;
        let payload = encode_value(&value)?;

        self.write_txn(|txn| txn.stage_put(store, key.clone(), payload))?;
        Ok(key)
    }

    /// Stores a value under an explicitly supplied key (out-of-line stores).
    pub fn put_with_key(&self, store: StoreId, key: Key, value: Value) -> CoreResult<Key> {
        self.ensure_open()?;

        let mut value = value;
        let key = self.resolve_for_store(store, Some(key), &mut value)?;
        let payload = encode_value(&value)?;

        self.write_txn(|txn| txn.stage_put(store, key.clone(), payload))?;
        Ok(key)
    }

    /// Fetches a value by key.
    ///
    /// Absence is an outcome, not an error: a missing or deleted key reads
    /// as `None`.
    pub fn get(&self, store: StoreId, key: &Key) -> CoreResult<Option<Value>> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let snapshot = self.txns.committed_seq();
        match self.log.get(store, key, Some(snapshot))? {
            Some(payload) => Ok(Some(keva_codec::decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Removes a record by key.
    ///
    /// Removing an absent key acknowledges without error.
    pub fn remove(&self, store: StoreId, key: &Key) -> CoreResult<()> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let key = key.clone();
        self.write_txn(|txn| txn.stage_remove(store, key.clone()))
    }

    /// Returns all live records of a store, in ascending key order.
    pub fn get_all(&self, store: StoreId) -> CoreResult<Vec<(Key, Value)>> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let snapshot = self.txns.committed_seq();
        let raw = self.log.scan(store, Some(snapshot))?;

        let mut results = Vec::with_capacity(raw.len());
        for (key, payload) in raw {
            results.push((key, keva_codec::decode(&payload)?));
        }
        Ok(results)
    }

    /// Returns the number of live records in a store.
    pub fn count(&self, store: StoreId) -> CoreResult<usize> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let snapshot = self.txns.committed_seq();
        Ok(self.log.live_keys(store, Some(snapshot)).len())
    }

    /// Checks whether a key has a live record.
    pub fn exists(&self, store: StoreId, key: &Key) -> CoreResult<bool> {
        Ok(self.get(store, key)?.is_some())
    }

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Stores multiple values as one atomic transaction.
    ///
    /// Keys are resolved for every value before anything is written; any
    /// [`CoreError::MissingKey`]/[`CoreError::InvalidKey`] aborts the whole
    /// batch with zero side effects. Either every record lands or none do.
    ///
    /// Returns the resolved keys in input order.
    pub fn put_batch(&self, store: StoreId, values: Vec<Value>) -> CoreResult<Vec<Key>> {
        self.ensure_open()?;
        let entries = values.into_iter().map(|v| (None, v)).collect();
        self.put_batch_inner(store, entries)
    }

    /// Stores multiple `(key, value)` pairs as one atomic transaction
    /// (out-of-line stores).
    pub fn put_batch_with_keys(
        &self,
        store: StoreId,
        entries: Vec<(Key, Value)>,
    ) -> CoreResult<Vec<Key>> {
        self.ensure_open()?;
        let entries = entries.into_iter().map(|(k, v)| (Some(k), v)).collect();
        self.put_batch_inner(store, entries)
    }

    fn put_batch_inner(
        &self,
        store: StoreId,
        entries: Vec<(Option<Key>, Value)>,
    ) -> CoreResult<Vec<Key>> {
        // Validate and resolve every item before the first durable write, so
        // a bad item aborts the batch with nothing applied.
        let mut resolved = Vec::with_capacity(entries.len());
        for (index, (supplied, value)) in entries.into_iter().enumerate() {
            let mut value = value;
            let key = self
                .resolve_for_store(store, supplied, &mut value)
                .map_err(|e| {
                    CoreError::transaction_aborted(format!("batch item {index}: {e}"))
                })?;
            let payload = encode_value(&value)?;
            resolved.push((key, payload));
        }

        self.write_txn(|txn| {
            for (key, payload) in &resolved {
                txn.stage_put(store, key.clone(), payload.clone())?;
            }
            Ok(())
        })?;

        Ok(resolved.into_iter().map(|(key, _)| key).collect())
    }

    /// Fetches multiple keys; each slot is `None` when the key is absent.
    pub fn get_batch(&self, store: StoreId, keys: &[Key]) -> CoreResult<Vec<Option<Value>>> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let snapshot = self.txns.committed_seq();
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match self.log.get(store, key, Some(snapshot))? {
                Some(payload) => Some(keva_codec::decode(&payload)?),
                None => None,
            };
            results.push(value);
        }
        Ok(results)
    }

    /// Removes multiple keys as one atomic transaction.
    pub fn remove_batch(&self, store: StoreId, keys: &[Key]) -> CoreResult<()> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        self.write_txn(|txn| {
            for key in keys {
                txn.stage_remove(store, key.clone())?;
            }
            Ok(())
        })
    }

    /// Removes every live record of a store in one atomic transaction.
    ///
    /// The surrogate-key counter is preserved, so keys are never reused
    /// across clears.
    pub fn clear(&self, store: StoreId) -> CoreResult<()> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        let snapshot = self.txns.committed_seq();
        let keys = self.log.live_keys(store, Some(snapshot));

        self.write_txn(|txn| {
            for key in keys {
                txn.stage_remove(store, key)?;
            }
            Ok(())
        })
    }

    // ========================================================================
    // Explicit transactions
    // ========================================================================

    /// Begins an explicit transaction.
    pub fn begin(&self) -> CoreResult<Transaction> {
        self.ensure_open()?;
        self.txns.begin()
    }

    /// Stores a value inside an open transaction, resolving its key.
    pub fn put_in_txn(
        &self,
        txn: &mut Transaction,
        store: StoreId,
        value: Value,
    ) -> CoreResult<Key> {
        self.ensure_open()?;

        let mut value = value;
        let key = self.resolve_for_store(store, None, &mut value)?;
        let payload = encode_value(&value)?;
        txn.stage_put(store, key.clone(), payload)?;
        Ok(key)
    }

    /// Removes a key inside an open transaction.
    pub fn remove_in_txn(
        &self,
        txn: &mut Transaction,
        store: StoreId,
        key: &Key,
    ) -> CoreResult<()> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;
        txn.stage_remove(store, key.clone())
    }

    /// Reads a key inside an open transaction (read-your-writes).
    pub fn get_in_txn(
        &self,
        txn: &Transaction,
        store: StoreId,
        key: &Key,
    ) -> CoreResult<Option<Value>> {
        self.ensure_open()?;
        self.catalog.read().def(store)?;

        match self.txns.get(txn, store, key)? {
            Some(payload) => Ok(Some(keva_codec::decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Commits an explicit transaction.
    pub fn commit(&self, txn: &mut Transaction) -> CoreResult<SequenceNumber> {
        self.ensure_open()?;
        let sequence = self.txns.commit(txn)?;
        self.maybe_compact();
        Ok(sequence)
    }

    /// Aborts an explicit transaction.
    pub fn abort(&self, txn: &mut Transaction) -> CoreResult<()> {
        self.ensure_open()?;
        self.txns.abort(txn)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Creates a checkpoint: committed data becomes durable in the record
    /// log, the WAL is truncated, and the catalog (with surrogate counters)
    /// is persisted.
    pub fn checkpoint(&self) -> CoreResult<()> {
        self.ensure_open()?;

        self.txns.checkpoint()?;
        self.catalog.write().last_checkpoint = Some(self.txns.committed_seq());
        self.persist_catalog()
    }

    /// Compacts the record log, dropping obsolete versions and tombstones.
    ///
    /// Compaction never changes logical state. Persistent databases rewrite
    /// into a temp file and atomically swap it in; in-memory databases
    /// rewrite in place. Fails if any transaction is open, since open
    /// snapshots may still need old versions.
    pub fn compact(&self) -> CoreResult<()> {
        self.ensure_open()?;

        if self.txns.active_count() > 0 {
            return Err(CoreError::invalid_operation(
                "cannot compact while transactions are open",
            ));
        }

        // Checkpoint first: afterwards the log alone carries all state, so
        // the rewrite below is the only thing recovery could depend on.
        self.checkpoint()?;

        let records = self.log.scan_records()?;
        let before_bytes = self.log.size()?;
        let (live, stats) = Compactor::new().compact(records);

        match &self.dir {
            Some(dir) => {
                use keva_storage::{FileBackend, StorageBackend};

                let temp = FileBackend::open_with_create_dirs(&dir.log_temp_path())?;
                for record in &live {
                    temp.append(&record.encode())?;
                }
                temp.sync()?;
                drop(temp);

                dir.swap_log_temp()?;
                self.log
                    .swap_backend(Box::new(FileBackend::open(&dir.log_path())?))?;
            }
            None => self.log.rewrite_in_place(&live)?,
        }

        self.persist_catalog()?;

        info!(
            input = stats.input_records,
            output = stats.output_records,
            tombstones = stats.tombstones_dropped,
            reclaimed = before_bytes.saturating_sub(self.log.size()?),
            "log compacted"
        );
        Ok(())
    }

    /// Compacts opportunistically when the garbage ratio crosses the
    /// configured threshold. Failures are logged, never surfaced: the
    /// triggering operation already committed.
    fn maybe_compact(&self) {
        if self.txns.active_count() > 0 {
            return;
        }

        let (size, ratio) = match (self.log.size(), self.log.garbage_ratio()) {
            (Ok(size), Ok(ratio)) => (size, ratio),
            _ => return,
        };
        if size < self.config.compaction_min_bytes || ratio < self.config.compaction_threshold {
            return;
        }

        if let Err(e) = self.compact() {
            warn!("opportunistic compaction failed: {e}");
        }
    }

    /// Returns the current committed sequence number.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.txns.committed_seq()
    }

    /// Closes the database, persisting the catalog and flushing all state.
    ///
    /// Idempotent; operations after close fail with
    /// [`CoreError::DatabaseClosed`].
    pub fn close(&self) -> CoreResult<()> {
        let mut is_open = self.is_open.write();
        if !*is_open {
            return Ok(());
        }

        self.persist_catalog()?;
        self.wal.flush()?;
        self.wal.sync()?;
        self.log.flush()?;
        self.log.sync()?;

        *is_open = false;
        Ok(())
    }

    /// Checks whether the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    /// Returns the database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn ensure_open(&self) -> CoreResult<()> {
        if *self.is_open.read() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    /// Resolves a write's key against the store's policy, allocating a
    /// surrogate when the policy calls for one.
    fn resolve_for_store(
        &self,
        store: StoreId,
        supplied: Option<Key>,
        value: &mut Value,
    ) -> CoreResult<Key> {
        let mut catalog = self.catalog.write();
        let policy = catalog.def(store)?.policy.clone();

        let key = resolve_key(&policy, supplied, value, || {
            catalog.allocate_surrogate(store).map(Key::Integer)
        })?;

        // Explicit integer keys push the counter up so later surrogates
        // never collide.
        if let Key::Integer(k) = key {
            catalog.note_integer_key(store, k);
        }
        Ok(key)
    }

    /// Runs staged writes inside a fresh transaction, committing on success
    /// and aborting on failure.
    fn write_txn<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut txn = self.txns.begin()?;
        match f(&mut txn) {
            Ok(result) => match self.txns.commit(&mut txn) {
                Ok(_) => {
                    self.maybe_compact();
                    Ok(result)
                }
                Err(e) => {
                    if txn.is_active() {
                        let _ = self.txns.abort(&mut txn);
                    }
                    Err(e)
                }
            },
            Err(e) => {
                let _ = self.txns.abort(&mut txn);
                Err(e)
            }
        }
    }

    fn persist_catalog(&self) -> CoreResult<()> {
        if let Some(ref dir) = self.dir {
            dir.save_catalog(&self.catalog.read())?;
        }
        Ok(())
    }
}

/// Encodes a value for storage, rejecting payloads the record formats
/// cannot carry.
fn encode_value(value: &Value) -> CoreResult<Vec<u8>> {
    let payload = keva_codec::encode(value)?;
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(CoreError::invalid_operation(format!(
            "value payload too large: {} bytes",
            payload.len()
        )));
    }
    Ok(payload)
}

/// State recovered from WAL replay.
struct RecoveryState {
    next_txid: u64,
    next_seq: u64,
    committed_seq: u64,
    wal_bytes: u64,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("error while closing database on drop: {e}");
        }
    }
}


/// End-to-end scenarios mirroring the observed store contract.
#[cfg(test)]
mod scenario_tests {
    use super::*;

    fn person(id: Option<i64>, name: &str) -> Value {
        let mut fields = vec![("name", Value::from(name))];
        if let Some(id) = id {
            fields.push(("id", Value::from(id)));
        }
        Value::map(fields)
    }

    #[test]
    fn basic_crud_with_in_line_keys() {
        let db = Database::open_in_memory().unwrap();
        let store = db.store(&StoreConfig::new("spec-store-simple")).unwrap();

        // Store a well-formed object; the insert key is its id.
        let key = db.put(store, person(Some(1), "John")).unwrap();
        assert_eq!(key, Key::Integer(1));

        // Fetch it back.
        let fetched = db.get(store, &Key::Integer(1)).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&Value::Text("John".into())));

        // Overwrite under the same key.
        db.put(store, person(Some(1), "James")).unwrap();
        let fetched = db.get(store, &Key::Integer(1)).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&Value::Text("James".into())));

        // Store an object without an id: a key is generated.
        let generated = db.put(store, person(None, "Joe")).unwrap();
        let fetched = db.get(store, &generated).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&Value::Text("Joe".into())));

        // Two live objects in total.
        assert_eq!(db.get_all(store).unwrap().len(), 2);

        // Delete one and it reads as absent.
        db.remove(store, &Key::Integer(1)).unwrap();
        assert!(db.get(store, &Key::Integer(1)).unwrap().is_none());

        db.clear(store).unwrap();
        assert_eq!(db.get_all(store).unwrap().len(), 0);
    }

    #[test]
    fn basic_crud_with_out_of_line_keys() {
        let db = Database::open_in_memory().unwrap();
        let store = db
            .store(&StoreConfig::new("spec-store-simple-out-of-line").out_of_line())
            .unwrap();

        let key = db
            .put_with_key(store, Key::Integer(1), person(None, "John"))
            .unwrap();
        assert_eq!(key, Key::Integer(1));

        let fetched = db.get(store, &Key::Integer(1)).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&Value::Text("John".into())));

        db.put_with_key(store, Key::Integer(1), person(None, "James"))
            .unwrap();
        let fetched = db.get(store, &Key::Integer(1)).unwrap().unwrap();
        assert_eq!(fetched.get("name"), Some(&Value::Text("James".into())));

        db.remove(store, &Key::Integer(1)).unwrap();
        assert!(db.get(store, &Key::Integer(1)).unwrap().is_none());
    }

    #[test]
    fn batch_operations() {
        let db = Database::open_in_memory().unwrap();
        let store = db.store(&StoreConfig::new("spec-store-simple")).unwrap();

        let keys = db
            .put_batch(
                store,
                vec![
                    person(Some(1), "John"),
                    person(Some(2), "Joe"),
                    person(Some(3), "James"),
                ],
            )
            .unwrap();
        assert_eq!(
            keys,
            vec![Key::Integer(1), Key::Integer(2), Key::Integer(3)]
        );

        let fetched = db
            .get_batch(store, &[Key::Integer(1), Key::Integer(2), Key::Integer(3)])
            .unwrap();
        let names: Vec<&Value> = fetched
            .iter()
            .map(|v| v.as_ref().unwrap().get("name").unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                &Value::Text("John".into()),
                &Value::Text("Joe".into()),
                &Value::Text("James".into())
            ]
        );

        db.remove_batch(store, &[Key::Integer(1), Key::Integer(2)])
            .unwrap();
        let remaining = db.get_all(store).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(
            remaining[0].1.get("name"),
            Some(&Value::Text("James".into()))
        );
    }
}
