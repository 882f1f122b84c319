//! Record log entry types.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::types::{SequenceNumber, StoreId};

/// Flags for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogRecordFlags(u8);

impl LogRecordFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Record is a tombstone (key deleted).
    pub const TOMBSTONE: Self = Self(0x01);

    /// Creates flags from a raw byte.
    #[must_use]
    pub const fn from_byte(b: u8) -> Self {
        Self(b)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Checks whether the tombstone flag is set.
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        self.0 & 0x01 != 0
    }
}

/// An entry in the record log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Store this record belongs to.
    pub store_id: StoreId,
    /// Record key.
    pub key: Key,
    /// Record flags.
    pub flags: LogRecordFlags,
    /// Encoded value payload (empty for tombstones).
    pub payload: Vec<u8>,
    /// Sequence number of the commit that wrote this record.
    pub sequence: SequenceNumber,
}

impl LogRecord {
    /// Fixed prefix: record_len (4) + store_id (4) + flags (1) + sequence (8).
    const PREFIX_SIZE: usize = 17;
    /// CRC trailer size.
    const CRC_SIZE: usize = 4;

    /// Creates a new put record.
    #[must_use]
    pub fn put(
        store_id: StoreId,
        key: Key,
        payload: Vec<u8>,
        sequence: SequenceNumber,
    ) -> Self {
        Self {
            store_id,
            key,
            flags: LogRecordFlags::NONE,
            payload,
            sequence,
        }
    }

    /// Creates a tombstone record.
    #[must_use]
    pub fn tombstone(store_id: StoreId, key: Key, sequence: SequenceNumber) -> Self {
        Self {
            store_id,
            key,
            flags: LogRecordFlags::TOMBSTONE,
            payload: Vec::new(),
            sequence,
        }
    }

    /// Returns whether this record is a tombstone.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.flags.is_tombstone()
    }

    /// Returns the encoded size of this record in bytes.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::PREFIX_SIZE + self.key.encoded_len() + self.payload.len() + Self::CRC_SIZE
    }

    /// Encodes the record to bytes.
    ///
    /// Layout: `record_len (4) | store_id (4) | flags (1) | sequence (8) |
    /// key (var) | payload | crc32 (4)`, lengths little-endian, the CRC
    /// computed over everything before it.
    pub fn encode(&self) -> Vec<u8> {
        let record_len = self.encoded_size();
        let mut buf = Vec::with_capacity(record_len);

        buf.extend_from_slice(&(record_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.store_id.as_u32().to_le_bytes());
        buf.push(self.flags.as_byte());
        buf.extend_from_slice(&self.sequence.as_u64().to_le_bytes());
        self.key.write_to(&mut buf);
        buf.extend_from_slice(&self.payload);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Decodes a record from bytes, verifying its checksum.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < Self::PREFIX_SIZE + Self::CRC_SIZE {
            return Err(CoreError::log_corruption("record too short"));
        }

        let record_len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
        if record_len < Self::PREFIX_SIZE + Self::CRC_SIZE || data.len() < record_len {
            return Err(CoreError::log_corruption("incomplete record"));
        }

        let stored_crc =
            u32::from_le_bytes(data[record_len - Self::CRC_SIZE..record_len].try_into().unwrap());
        let computed_crc = crc32fast::hash(&data[..record_len - Self::CRC_SIZE]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let store_id = StoreId::new(u32::from_le_bytes(data[4..8].try_into().unwrap()));
        let flags = LogRecordFlags::from_byte(data[8]);
        let sequence = SequenceNumber::new(u64::from_le_bytes(data[9..17].try_into().unwrap()));

        let mut cursor = Self::PREFIX_SIZE;
        let key = Key::read_from(&data[..record_len - Self::CRC_SIZE], &mut cursor)
            .map_err(|e| CoreError::log_corruption(e.to_string()))?;
        let payload = data[cursor..record_len - Self::CRC_SIZE].to_vec();

        Ok(Self {
            store_id,
            key,
            flags,
            payload,
            sequence,
        })
    }
}
