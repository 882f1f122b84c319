//! Log compaction.
//!
//! Compaction merges the raw record stream down to the latest committed
//! version of each key, dropping obsolete versions and tombstones.
//!
//! ## Invariants
//!
//! - Compaction **must not** change logical state
//! - The latest committed version per `(store, key)` wins
//! - Output is sorted by `(store, key)` for deterministic rewrites

use crate::log::record::LogRecord;
use std::collections::HashMap;

/// Result of a compaction pass.
#[derive(Debug)]
pub struct CompactionStats {
    /// Number of records in the input.
    pub input_records: usize,
    /// Number of records in the output.
    pub output_records: usize,
    /// Number of tombstones dropped.
    pub tombstones_dropped: usize,
    /// Number of obsolete versions dropped.
    pub obsolete_dropped: usize,
    /// Bytes reclaimed (input size minus output size).
    pub bytes_reclaimed: usize,
}

/// Merges a record stream down to its live records.
#[derive(Debug, Default)]
pub struct Compactor;

impl Compactor {
    /// Creates a new compactor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Compacts a set of records, producing deduplicated live output.
    #[must_use]
    pub fn compact(&self, records: Vec<LogRecord>) -> (Vec<LogRecord>, CompactionStats) {
        let input_records = records.len();
        let input_size: usize = records.iter().map(LogRecord::encoded_size).sum();

        let mut latest: HashMap<(u32, crate::key::Key), LogRecord> = HashMap::new();
        let mut obsolete_dropped = 0usize;

        for record in records {
            let map_key = (record.store_id.as_u32(), record.key.clone());
            match latest.get(&map_key) {
                Some(existing) if existing.sequence > record.sequence => {
                    obsolete_dropped += 1;
                }
                Some(_) => {
                    latest.insert(map_key, record);
                    obsolete_dropped += 1;
                }
                None => {
                    latest.insert(map_key, record);
                }
            }
        }

        let mut tombstones_dropped = 0usize;
        let mut output: Vec<LogRecord> = Vec::with_capacity(latest.len());
        for (_, record) in latest {
            if record.is_tombstone() {
                tombstones_dropped += 1;
            } else {
                output.push(record);
            }
        }

        output.sort_by(|a, b| {
            (a.store_id, &a.key).cmp(&(b.store_id, &b.key))
        });

        let output_size: usize = output.iter().map(LogRecord::encoded_size).sum();
        let stats = CompactionStats {
            input_records,
            output_records: output.len(),
            tombstones_dropped,
            obsolete_dropped,
            bytes_reclaimed: input_size.saturating_sub(output_size),
        };

        (output, stats)
    }
}
