//! Streaming WAL record iterator.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
use crate::wal::writer::{CRC_SIZE, HEADER_SIZE};
use keva_storage::StorageBackend;

/// A streaming iterator over WAL records.
///
/// Reads one record per step directly from the backend, so memory use stays
/// constant regardless of WAL size. Yields `(offset, record)` pairs.
///
/// Tolerated vs. fatal conditions follow the recovery policy documented in
/// [`crate::wal`]: a truncated record at the tail ends iteration cleanly; a
/// checksum mismatch, bad magic, unknown type, or future version yields an
/// error.
pub struct WalIterator<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> WalIterator<'a> {
    /// Creates an iterator over the full WAL.
    pub(crate) fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        let size = backend.size()?;
        Ok(Self {
            backend,
            size,
            offset: 0,
            finished: false,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        if self.finished || self.offset >= self.size {
            self.finished = true;
            return Ok(None);
        }

        let record_offset = self.offset;
        let remaining = (self.size - self.offset) as usize;

        // A header that doesn't fit is a crash mid-write: clean end-of-log.
        if remaining < HEADER_SIZE {
            self.finished = true;
            return Ok(None);
        }

        let header = self.backend.read_at(self.offset, HEADER_SIZE)?;

        if header[0..4] != WAL_MAGIC {
            self.finished = true;
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {record_offset}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            self.finished = true;
            return Err(CoreError::wal_corruption(format!(
                "unsupported WAL version: {version}"
            )));
        }

        let Some(record_type) = WalRecordType::from_byte(header[6]) else {
            self.finished = true;
            return Err(CoreError::wal_corruption(format!(
                "unknown record type {} at offset {record_offset}",
                header[6]
            )));
        };

        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;

        // A payload that doesn't fit is likewise a truncated tail.
        if remaining < total_len {
            self.finished = true;
            return Ok(None);
        }

        let envelope = self.backend.read_at(self.offset, total_len)?;

        let stored_crc = u32::from_le_bytes(
            envelope[total_len - CRC_SIZE..]
                .try_into()
                .expect("CRC trailer is 4 bytes"),
        );
        let computed_crc = crc32fast::hash(&envelope[..total_len - CRC_SIZE]);
        if stored_crc != computed_crc {
            self.finished = true;
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let payload = &envelope[HEADER_SIZE..HEADER_SIZE + payload_len];
        let record = WalRecord::decode_payload(record_type, payload)?;

        self.offset += total_len as u64;
        Ok(Some((record_offset, record)))
    }
}

impl Iterator for WalIterator<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use crate::wal::WalManager;
    use keva_storage::MemoryBackend;

    /// Encodes a record with its full envelope, as `WalManager::append` does.
    fn envelope(record: &WalRecord) -> Vec<u8> {
        let payload = record.encode_payload();
        let mut data = Vec::new();
        data.extend_from_slice(&WAL_MAGIC);
        data.extend_from_slice(&WAL_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());
        data
    }

    fn begin(txid: u64) -> WalRecord {
        WalRecord::Begin {
            txid: TransactionId::new(txid),
        }
    }

    fn wal_over(image: Vec<u8>) -> WalManager {
        WalManager::new(Box::new(MemoryBackend::with_data(image)))
    }

    #[test]
    fn iterates_all_records() {
        let wal = WalManager::new(Box::new(MemoryBackend::new()));
        for i in 0..5 {
            wal.append(&begin(i)).unwrap();
        }

        let records: Vec<_> = wal.iter().unwrap().map(Result::unwrap).collect();
        assert_eq!(records.len(), 5);
        assert_eq!(records[4].1, begin(4));
    }

    #[test]
    fn truncated_tail_ends_iteration_cleanly() {
        let commit = WalRecord::Commit {
            txid: TransactionId::new(1),
            sequence: SequenceNumber::new(1),
        };

        let mut image = envelope(&begin(1));
        let first_len = image.len();
        image.extend_from_slice(&envelope(&commit));

        // Cut the image mid-payload in the second record, as a crash during
        // the commit write would.
        image.truncate(first_len + HEADER_SIZE + 2);

        let records: Vec<_> = wal_over(image)
            .iter()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records.len(), 1, "torn tail record must be dropped");
        assert_eq!(records[0].1, begin(1));
    }

    #[test]
    fn truncated_header_ends_iteration_cleanly() {
        let mut image = envelope(&begin(1));
        image.extend_from_slice(&envelope(&begin(2))[..HEADER_SIZE - 3]);

        let records: Vec<_> = wal_over(image)
            .iter()
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn corrupted_record_is_fatal() {
        let mut image = envelope(&begin(1));
        image[HEADER_SIZE + 2] ^= 0xFF;

        let result: CoreResult<Vec<_>> = wal_over(image).iter().unwrap().collect();
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let result: CoreResult<Vec<_>> = wal_over(b"NOPEnopeNOPEnope".to_vec())
            .iter()
            .unwrap()
            .collect();
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }

    #[test]
    fn future_version_is_fatal() {
        let mut image = envelope(&begin(1));
        let bumped = (WAL_VERSION + 1).to_le_bytes();
        image[4] = bumped[0];
        image[5] = bumped[1];

        let result: CoreResult<Vec<_>> = wal_over(image).iter().unwrap().collect();
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }
}
