//! WAL record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::types::{SequenceNumber, StoreId, TransactionId};

/// Magic bytes identifying a WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"KWAL";

/// Current WAL format version.
pub const WAL_VERSION: u16 = 1;

/// Type of WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Begin a new transaction.
    Begin = 1,
    /// Put (insert or overwrite) a record.
    Put = 2,
    /// Remove a record.
    Remove = 3,
    /// Commit a transaction.
    Commit = 4,
    /// Abort a transaction.
    Abort = 5,
    /// Checkpoint marker.
    Checkpoint = 6,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Put),
            3 => Some(Self::Remove),
            4 => Some(Self::Commit),
            5 => Some(Self::Abort),
            6 => Some(Self::Checkpoint),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A WAL record representing one logged event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// Begin a new transaction.
    Begin {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Put (insert or overwrite) a record.
    Put {
        /// Transaction ID.
        txid: TransactionId,
        /// Store containing the record.
        store_id: StoreId,
        /// Record key.
        key: Key,
        /// Encoded value payload.
        payload: Vec<u8>,
    },

    /// Remove a record.
    Remove {
        /// Transaction ID.
        txid: TransactionId,
        /// Store containing the record.
        store_id: StoreId,
        /// Record key.
        key: Key,
    },

    /// Commit a transaction.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
    },

    /// Abort a transaction.
    Abort {
        /// Transaction ID.
        txid: TransactionId,
    },

    /// Checkpoint marker for WAL truncation.
    Checkpoint {
        /// Sequence number at checkpoint.
        sequence: SequenceNumber,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Begin { .. } => WalRecordType::Begin,
            Self::Put { .. } => WalRecordType::Put,
            Self::Remove { .. } => WalRecordType::Remove,
            Self::Commit { .. } => WalRecordType::Commit,
            Self::Abort { .. } => WalRecordType::Abort,
            Self::Checkpoint { .. } => WalRecordType::Checkpoint,
        }
    }

    /// Returns the transaction ID if this record carries one.
    #[must_use]
    pub fn txid(&self) -> Option<TransactionId> {
        match self {
            Self::Begin { txid }
            | Self::Put { txid, .. }
            | Self::Remove { txid, .. }
            | Self::Commit { txid, .. }
            | Self::Abort { txid } => Some(*txid),
            Self::Checkpoint { .. } => None,
        }
    }

    /// Serializes the record payload (without the envelope).
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Begin { txid } | Self::Abort { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }

            Self::Put {
                txid,
                store_id,
                key,
                payload,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&store_id.as_u32().to_le_bytes());
                key.write_to(&mut buf);
                let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
                buf.extend_from_slice(&len.to_le_bytes());
                buf.extend_from_slice(&payload[..len as usize]);
            }

            Self::Remove {
                txid,
                store_id,
                key,
            } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&store_id.as_u32().to_le_bytes());
                key.write_to(&mut buf);
            }

            Self::Commit { txid, sequence } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }

            Self::Checkpoint { sequence } => {
                buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
            }
        }

        buf
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = 0;

        let record = match record_type {
            WalRecordType::Begin => Self::Begin {
                txid: TransactionId::new(read_u64(payload, &mut cursor)?),
            },

            WalRecordType::Put => {
                let txid = TransactionId::new(read_u64(payload, &mut cursor)?);
                let store_id = StoreId::new(read_u32(payload, &mut cursor)?);
                let key = Key::read_from(payload, &mut cursor)
                    .map_err(|e| CoreError::wal_corruption(e.to_string()))?;
                let len = read_u32(payload, &mut cursor)? as usize;
                let end = cursor
                    .checked_add(len)
                    .filter(|&end| end <= payload.len())
                    .ok_or_else(|| CoreError::wal_corruption("truncated put payload"))?;
                let data = payload[cursor..end].to_vec();
                cursor = end;
                Self::Put {
                    txid,
                    store_id,
                    key,
                    payload: data,
                }
            }

            WalRecordType::Remove => {
                let txid = TransactionId::new(read_u64(payload, &mut cursor)?);
                let store_id = StoreId::new(read_u32(payload, &mut cursor)?);
                let key = Key::read_from(payload, &mut cursor)
                    .map_err(|e| CoreError::wal_corruption(e.to_string()))?;
                Self::Remove {
                    txid,
                    store_id,
                    key,
                }
            }

            WalRecordType::Commit => Self::Commit {
                txid: TransactionId::new(read_u64(payload, &mut cursor)?),
                sequence: SequenceNumber::new(read_u64(payload, &mut cursor)?),
            },

            WalRecordType::Abort => Self::Abort {
                txid: TransactionId::new(read_u64(payload, &mut cursor)?),
            },

            WalRecordType::Checkpoint => Self::Checkpoint {
                sequence: SequenceNumber::new(read_u64(payload, &mut cursor)?),
            },
        };

        if cursor != payload.len() {
            return Err(CoreError::wal_corruption(format!(
                "trailing bytes in {:?} record: consumed {cursor} of {}",
                record_type,
                payload.len()
            )));
        }

        Ok(record)
    }
}

fn read_u32(payload: &[u8], cursor: &mut usize) -> CoreResult<u32> {
    let end = *cursor + 4;
    let bytes: [u8; 4] = payload
        .get(*cursor..end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
    *cursor = end;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u64(payload: &[u8], cursor: &mut usize) -> CoreResult<u64> {
    let end = *cursor + 8;
    let bytes: [u8; 8] = payload
        .get(*cursor..end)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CoreError::wal_corruption("unexpected end of payload"))?;
    *cursor = end;
    Ok(u64::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: &WalRecord) -> WalRecord {
        let payload = record.encode_payload();
        WalRecord::decode_payload(record.record_type(), &payload).unwrap()
    }

    #[test]
    fn record_type_bytes_roundtrip() {
        for t in [
            WalRecordType::Begin,
            WalRecordType::Put,
            WalRecordType::Remove,
            WalRecordType::Commit,
            WalRecordType::Abort,
            WalRecordType::Checkpoint,
        ] {
            assert_eq!(WalRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(WalRecordType::from_byte(0), None);
        assert_eq!(WalRecordType::from_byte(200), None);
    }

    #[test]
    fn all_records_roundtrip() {
        let records = [
            WalRecord::Begin {
                txid: TransactionId::new(42),
            },
            WalRecord::Put {
                txid: TransactionId::new(1),
                store_id: StoreId::new(5),
                key: Key::Integer(-3),
                payload: vec![0xCA, 0xFE, 0xBA, 0xBE],
            },
            WalRecord::Put {
                txid: TransactionId::new(1),
                store_id: StoreId::new(5),
                key: Key::Text("user-1".into()),
                payload: Vec::new(),
            },
            WalRecord::Remove {
                txid: TransactionId::new(99),
                store_id: StoreId::new(10),
                key: Key::Integer(7),
            },
            WalRecord::Commit {
                txid: TransactionId::new(7),
                sequence: SequenceNumber::new(100),
            },
            WalRecord::Abort {
                txid: TransactionId::new(8),
            },
            WalRecord::Checkpoint {
                sequence: SequenceNumber::new(500),
            },
        ];

        for record in records {
            assert_eq!(roundtrip(&record), record);
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let record = WalRecord::Begin {
            txid: TransactionId::new(1),
        };
        let mut payload = record.encode_payload();
        payload.push(0);

        let result = WalRecord::decode_payload(WalRecordType::Begin, &payload);
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let record = WalRecord::Put {
            txid: TransactionId::new(1),
            store_id: StoreId::new(1),
            key: Key::Integer(1),
            payload: vec![1, 2, 3],
        };
        let payload = record.encode_payload();

        let result = WalRecord::decode_payload(WalRecordType::Put, &payload[..payload.len() - 2]);
        assert!(matches!(result, Err(CoreError::WalCorruption { .. })));
    }
}
