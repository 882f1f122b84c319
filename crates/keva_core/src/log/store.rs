//! Record log store with a versioned in-memory index.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::log::record::LogRecord;
use crate::types::{SequenceNumber, StoreId};
use keva_storage::StorageBackend;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// One version of a key in the log.
#[derive(Debug, Clone, Copy)]
struct VersionEntry {
    offset: u64,
    sequence: SequenceNumber,
    size: u32,
    tombstone: bool,
}

#[derive(Debug, Default)]
struct IndexState {
    /// Versions of every key, ascending by sequence.
    map: BTreeMap<(StoreId, Key), Vec<VersionEntry>>,
    /// Bytes occupied by the latest live version of each key.
    live_bytes: u64,
}

impl IndexState {
    fn note_append(&mut self, store_id: StoreId, key: &Key, entry: VersionEntry) {
        let versions = self.map.entry((store_id, key.clone())).or_default();

        let is_latest = versions
            .last()
            .map_or(true, |last| entry.sequence >= last.sequence);

        if is_latest {
            if let Some(last) = versions.last() {
                if !last.tombstone {
                    self.live_bytes = self.live_bytes.saturating_sub(u64::from(last.size));
                }
            }
            if !entry.tombstone {
                self.live_bytes += u64::from(entry.size);
            }
            versions.push(entry);
        } else {
            // Replay can deliver an already-superseded version (the WAL is
            // re-applied over an existing log). It lands in sequence order
            // and counts as garbage, never as live bytes.
            let pos = versions.partition_point(|v| v.sequence <= entry.sequence);
            versions.insert(pos, entry);
        }
    }
}

/// Durable, ordered storage of records with point lookup and key-ordered
/// scans.
///
/// The log itself is an opaque append-only byte store; all structure lives
/// in the index, which maps `(store, key)` to the versions written for that
/// key. Reads resolve against a snapshot sequence so that a reader keeps
/// seeing the state it started from even while newer commits land.
pub struct LogStore {
    backend: RwLock<Box<dyn StorageBackend>>,
    index: RwLock<IndexState>,
}

impl LogStore {
    /// Creates a log store over a backend.
    ///
    /// For backends with existing data, call [`LogStore::rebuild_index`]
    /// before serving reads.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend: RwLock::new(backend),
            index: RwLock::new(IndexState::default()),
        }
    }

    /// Appends a record and indexes it. Returns the record's offset.
    pub fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        let encoded = record.encode();
        let backend = self.backend.read();
        let offset = backend.append(&encoded)?;

        self.index.write().note_append(
            record.store_id,
            &record.key,
            VersionEntry {
                offset,
                sequence: record.sequence,
                size: encoded.len() as u32,
                tombstone: record.is_tombstone(),
            },
        );

        Ok(offset)
    }

    /// Point lookup of a key's payload at a snapshot.
    ///
    /// With `snapshot = None` the latest committed version is read. Returns
    /// `None` for absent keys and for keys whose visible version is a
    /// tombstone.
    pub fn get(
        &self,
        store_id: StoreId,
        key: &Key,
        snapshot: Option<SequenceNumber>,
    ) -> CoreResult<Option<Vec<u8>>> {
        let entry = {
            let index = self.index.read();
            let Some(versions) = index.map.get(&(store_id, key.clone())) else {
                return Ok(None);
            };
            match visible_version(versions, snapshot) {
                Some(entry) => entry,
                None => return Ok(None),
            }
        };

        if entry.tombstone {
            return Ok(None);
        }

        let record = self.read_at(entry.offset)?;
        Ok(Some(record.payload))
    }

    /// Scans all live records of a store at a snapshot, in ascending key
    /// order.
    pub fn scan(
        &self,
        store_id: StoreId,
        snapshot: Option<SequenceNumber>,
    ) -> CoreResult<Vec<(Key, Vec<u8>)>> {
        let visible: Vec<(Key, u64)> = {
            let index = self.index.read();
            index
                .map
                .range(store_range(store_id))
                .filter_map(|((_, key), versions)| {
                    visible_version(versions, snapshot)
                        .filter(|entry| !entry.tombstone)
                        .map(|entry| (key.clone(), entry.offset))
                })
                .collect()
        };

        let mut results = Vec::with_capacity(visible.len());
        for (key, offset) in visible {
            let record = self.read_at(offset)?;
            results.push((key, record.payload));
        }
        Ok(results)
    }

    /// Returns the live keys of a store at a snapshot, in ascending order.
    pub fn live_keys(
        &self,
        store_id: StoreId,
        snapshot: Option<SequenceNumber>,
    ) -> Vec<Key> {
        let index = self.index.read();
        index
            .map
            .range(store_range(store_id))
            .filter_map(|((_, key), versions)| {
                visible_version(versions, snapshot)
                    .filter(|entry| !entry.tombstone)
                    .map(|_| key.clone())
            })
            .collect()
    }

    /// Returns every key ever written to a store, tombstoned or not.
    ///
    /// Recovery uses this to re-derive surrogate counters: a key that was
    /// deleted must still never be generated again.
    pub fn all_keys(&self) -> Vec<(StoreId, Key)> {
        let index = self.index.read();
        index.map.keys().cloned().collect()
    }

    /// Reads and decodes the record at an offset.
    pub fn read_at(&self, offset: u64) -> CoreResult<LogRecord> {
        let backend = self.backend.read();
        let size = backend.size()?;

        if offset + 4 > size {
            return Err(CoreError::log_corruption("offset beyond log"));
        }
        let len_bytes = backend.read_at(offset, 4)?;
        let record_len = u32::from_le_bytes(len_bytes.try_into().unwrap()) as u64;

        if offset + record_len > size {
            return Err(CoreError::log_corruption("record extends beyond log"));
        }

        let data = backend.read_at(offset, record_len as usize)?;
        LogRecord::decode(&data)
    }

    /// Reads every record in the log, in file order.
    pub fn scan_records(&self) -> CoreResult<Vec<LogRecord>> {
        let backend = self.backend.read();
        let size = backend.size()?;

        let mut records = Vec::new();
        for_each_record(backend.as_ref(), size, |_, record| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Rebuilds the in-memory index from the log contents.
    ///
    /// A truncated final record is tolerated (crash mid-append after the WAL
    /// already made the commit durable; replay re-applies it). Checksum
    /// failures elsewhere are fatal.
    pub fn rebuild_index(&self) -> CoreResult<()> {
        let mut state = IndexState::default();
        {
            let backend = self.backend.read();
            let size = backend.size()?;
            for_each_record(backend.as_ref(), size, |offset, record| {
                state.note_append(
                    record.store_id,
                    &record.key,
                    VersionEntry {
                        offset,
                        sequence: record.sequence,
                        size: record.encoded_size() as u32,
                        tombstone: record.is_tombstone(),
                    },
                );
                Ok(())
            })?;
        }

        *self.index.write() = state;
        Ok(())
    }

    /// Replaces the backend (after a compaction rewrite) and reindexes.
    pub fn swap_backend(&self, backend: Box<dyn StorageBackend>) -> CoreResult<()> {
        *self.backend.write() = backend;
        self.rebuild_index()
    }

    /// Rewrites the log in place to the given records.
    ///
    /// Only safe for backends without crash durability concerns (memory);
    /// file-backed databases rewrite to a temp file and swap instead.
    pub fn rewrite_in_place(&self, records: &[LogRecord]) -> CoreResult<()> {
        {
            let backend = self.backend.read();
            backend.truncate(0)?;
            for record in records {
                backend.append(&record.encode())?;
            }
        }
        self.rebuild_index()
    }

    /// Flushes buffered writes to the operating system.
    pub fn flush(&self) -> CoreResult<()> {
        Ok(self.backend.read().flush()?)
    }

    /// Syncs the log to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        Ok(self.backend.read().sync()?)
    }

    /// Returns the log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.read().size()?)
    }

    /// Fraction of log bytes occupied by obsolete versions and tombstones.
    pub fn garbage_ratio(&self) -> CoreResult<f64> {
        let total = self.size()?;
        if total == 0 {
            return Ok(0.0);
        }
        let live = self.index.read().live_bytes;
        Ok(1.0 - (live as f64 / total as f64))
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("indexed_keys", &self.index.read().map.len())
            .finish_non_exhaustive()
    }
}

/// Picks the version visible at a snapshot: the last one with a sequence at
/// or below it (or the last overall when no snapshot is given).
fn visible_version(
    versions: &[VersionEntry],
    snapshot: Option<SequenceNumber>,
) -> Option<VersionEntry> {
    match snapshot {
        None => versions.last().copied(),
        Some(seq) => {
            let pos = versions.partition_point(|v| v.sequence <= seq);
            pos.checked_sub(1).map(|i| versions[i])
        }
    }
}

/// Range over one store's keys in the index map.
fn store_range(store_id: StoreId) -> (Bound<(StoreId, Key)>, Bound<(StoreId, Key)>) {
    let lower = Bound::Included((store_id, Key::Integer(i64::MIN)));
    let upper = match store_id.as_u32().checked_add(1) {
        Some(next) => Bound::Excluded((StoreId::new(next), Key::Integer(i64::MIN))),
        None => Bound::Unbounded,
    };
    (lower, upper)
}

/// Walks the log decoding each record; a truncated tail ends the walk.
fn for_each_record<F>(backend: &dyn StorageBackend, size: u64, mut f: F) -> CoreResult<()>
where
    F: FnMut(u64, LogRecord) -> CoreResult<()>,
{
    const MIN_RECORD: u64 = 21; // prefix + crc; any real record is larger

    let mut offset = 0u64;
    while offset < size {
        if offset + 4 > size {
            break;
        }
        let len_bytes = backend.read_at(offset, 4)?;
        let record_len = u64::from(u32::from_le_bytes(len_bytes.try_into().unwrap()));

        if record_len < MIN_RECORD {
            return Err(CoreError::log_corruption(format!(
                "implausible record length {record_len} at offset {offset}"
            )));
        }
        if offset + record_len > size {
            break; // torn tail
        }

        let data = backend.read_at(offset, record_len as usize)?;
        f(offset, LogRecord::decode(&data)?)?;
        offset += record_len;
    }
    Ok(())
}
