//! WAL manager: append-only writes and recovery reads.

use crate::error::CoreResult;
use crate::wal::iterator::WalIterator;
use crate::wal::record::{WalRecord, WAL_MAGIC, WAL_VERSION};
use keva_storage::StorageBackend;

/// Envelope header size: magic (4) + version (2) + type (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

/// CRC trailer size.
pub(crate) const CRC_SIZE: usize = 4;

/// Manages WAL writes and reads over a storage backend.
///
/// Appends are atomic per record (the envelope is built in memory and handed
/// to the backend in one call). The commit path flushes the WAL before
/// acknowledging, which is the durability point of every transaction.
pub struct WalManager {
    backend: Box<dyn StorageBackend>,
}

impl WalManager {
    /// Creates a new WAL manager.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Appends a record to the WAL and returns its offset.
    pub fn append(&self, record: &WalRecord) -> CoreResult<u64> {
        let payload = record.encode_payload();

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        Ok(self.backend.append(&data)?)
    }

    /// Flushes buffered WAL writes to the operating system.
    pub fn flush(&self) -> CoreResult<()> {
        Ok(self.backend.flush()?)
    }

    /// Syncs the WAL to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        Ok(self.backend.sync()?)
    }

    /// Returns the current WAL size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Returns a streaming iterator over WAL records.
    ///
    /// Used during recovery; records are read one at a time so memory use is
    /// independent of WAL size.
    pub fn iter(&self) -> CoreResult<WalIterator<'_>> {
        WalIterator::new(self.backend.as_ref())
    }

    /// Reads all records from the WAL.
    ///
    /// Convenience for tests and small WALs; recovery uses `iter()`.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, WalRecord)>> {
        self.iter()?.collect()
    }

    /// Clears the WAL after a checkpoint.
    ///
    /// All committed data must already be durable in the record log.
    pub fn clear(&self) -> CoreResult<()> {
        Ok(self.backend.truncate(0)?)
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::types::{SequenceNumber, StoreId, TransactionId};
    use keva_storage::MemoryBackend;

    fn create_wal() -> WalManager {
        WalManager::new(Box::new(MemoryBackend::new()))
    }

    #[test]
    fn append_and_read_single() {
        let wal = create_wal();
        let record = WalRecord::Begin {
            txid: TransactionId::new(1),
        };
        wal.append(&record).unwrap();

        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, record);
    }

    #[test]
    fn read_empty_wal() {
        let wal = create_wal();
        assert!(wal.read_all().unwrap().is_empty());
    }

    #[test]
    fn full_transaction_sequence() {
        let wal = create_wal();
        let txid = TransactionId::new(1);

        wal.append(&WalRecord::Begin { txid }).unwrap();
        wal.append(&WalRecord::Put {
            txid,
            store_id: StoreId::new(1),
            key: Key::Integer(1),
            payload: vec![10, 20, 30],
        })
        .unwrap();
        wal.append(&WalRecord::Commit {
            txid,
            sequence: SequenceNumber::new(1),
        })
        .unwrap();

        let aborted = TransactionId::new(2);
        wal.append(&WalRecord::Begin { txid: aborted }).unwrap();
        wal.append(&WalRecord::Remove {
            txid: aborted,
            store_id: StoreId::new(1),
            key: Key::Text("gone".into()),
        })
        .unwrap();
        wal.append(&WalRecord::Abort { txid: aborted }).unwrap();

        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(records[0].1.txid(), Some(txid));
        assert_eq!(records[5].1.txid(), Some(aborted));
    }

    #[test]
    fn offsets_are_increasing() {
        let wal = create_wal();

        let o1 = wal
            .append(&WalRecord::Begin {
                txid: TransactionId::new(1),
            })
            .unwrap();
        let o2 = wal
            .append(&WalRecord::Begin {
                txid: TransactionId::new(2),
            })
            .unwrap();

        assert_eq!(o1, 0);
        assert!(o2 > o1);

        let records = wal.read_all().unwrap();
        assert_eq!(records[0].0, o1);
        assert_eq!(records[1].0, o2);
    }

    #[test]
    fn clear_empties_the_wal() {
        let wal = create_wal();
        wal.append(&WalRecord::Checkpoint {
            sequence: SequenceNumber::new(1),
        })
        .unwrap();
        assert!(wal.size().unwrap() > 0);

        wal.clear().unwrap();
        assert_eq!(wal.size().unwrap(), 0);
        assert!(wal.read_all().unwrap().is_empty());
    }
}
