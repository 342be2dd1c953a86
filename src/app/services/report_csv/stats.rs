//! Ingestion statistics for a single report

use serde::{Deserialize, Serialize};

/// Counters collected while ingesting one report stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Data rows read after the header (trailer excluded)
    pub rows_read: usize,

    /// Rows mapped and stamped into records
    pub records_mapped: usize,

    /// Rows dropped for having zero impressions
    pub rows_filtered: usize,

    /// Number of batches handed to the sink
    pub batches_flushed: usize,

    /// Records handed to the sink across all batches
    pub records_flushed: usize,

    /// Whether the stream ended on a trailer row
    pub trailer_seen: bool,

    /// Header cells that matched no field of the record shape
    pub unmapped_columns: Vec<String>,
}

impl IngestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean records per flushed batch
    pub fn average_batch_size(&self) -> f64 {
        if self.batches_flushed == 0 {
            0.0
        } else {
            self.records_flushed as f64 / self.batches_flushed as f64
        }
    }

    /// Whether every mapped record reached the sink
    pub fn is_complete(&self) -> bool {
        self.records_mapped == self.records_flushed
    }

    /// Fold another report's counters into this one
    pub fn merge(&mut self, other: &IngestSummary) {
        self.rows_read += other.rows_read;
        self.records_mapped += other.records_mapped;
        self.rows_filtered += other.rows_filtered;
        self.batches_flushed += other.batches_flushed;
        self.records_flushed += other.records_flushed;
        self.trailer_seen |= other.trailer_seen;
        for column in &other.unmapped_columns {
            if !self.unmapped_columns.contains(column) {
                self.unmapped_columns.push(column.clone());
            }
        }
    }
}
