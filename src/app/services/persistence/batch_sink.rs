//! Bounded batching and the persistence hand-off

use super::entity_store::{EntityStore, StoredEntity};
use crate::Result;
use crate::app::models::MappedRecord;
use crate::app::services::report_csv::ReportRow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Receiver of flushed record batches
///
/// Called concurrently from many workers, one batch at a time per worker.
pub trait RecordSink<R>: Send + Sync {
    fn flush(&self, records: Vec<MappedRecord<R>>) -> Result<()>;
}

/// Ordered buffer that hands itself over once it holds `capacity` items
#[derive(Debug)]
pub struct Batch<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Batch<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item; returns the full batch when `capacity` is reached
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.items.push(item);
        if self.items.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.items,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Remaining partial batch, if any
    pub fn take_remaining(&mut self) -> Option<Vec<T>> {
        if self.items.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.items))
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sink writing each flushed batch to an [`EntityStore`] in one bulk upsert
pub struct BatchPersistenceSink<R> {
    store: Arc<dyn EntityStore>,
    kind: &'static str,
    batches: AtomicUsize,
    records: AtomicUsize,
    _row: PhantomData<fn(R)>,
}

impl<R: ReportRow> BatchPersistenceSink<R> {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            kind: R::REPORT_TYPE.as_str(),
            batches: AtomicUsize::new(0),
            records: AtomicUsize::new(0),
            _row: PhantomData,
        }
    }

    /// Number of bulk writes issued
    pub fn batches_flushed(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    /// Number of records handed to the store
    pub fn records_flushed(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }
}

impl<R: ReportRow> RecordSink<R> for BatchPersistenceSink<R> {
    fn flush(&self, records: Vec<MappedRecord<R>>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let entities = records
            .iter()
            .map(|record| {
                Ok(StoredEntity::new(
                    record.id(),
                    self.kind,
                    serde_json::to_value(record)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let written = self.store.bulk_upsert(entities)?;
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.records.fetch_add(written, Ordering::Relaxed);
        debug!("Flushed {} {} records", written, self.kind);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{AccountId, DateRangeKind, IngestionMetadata, ReportJob, ReportType};
    use crate::app::services::persistence::entity_store::{Filter, Pagination};
    use crate::app::services::persistence::memory_store::InMemoryEntityStore;
    use crate::app::services::report_csv::record_shapes::AccountPerformanceRow;
    use chrono::NaiveDate;

    #[test]
    fn test_batch_hands_over_at_capacity() {
        let mut batch = Batch::new(3);
        assert!(batch.push(1).is_none());
        assert!(batch.push(2).is_none());
        assert_eq!(batch.push(3), Some(vec![1, 2, 3]));
        assert!(batch.is_empty());

        batch.push(4);
        assert_eq!(batch.take_remaining(), Some(vec![4]));
        assert_eq!(batch.take_remaining(), None);
    }

    #[test]
    fn test_sink_writes_one_bulk_upsert_per_flush() {
        let store = Arc::new(InMemoryEntityStore::new());
        let sink = BatchPersistenceSink::<AccountPerformanceRow>::new(store.clone());

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let job = ReportJob::new(
            AccountId(7),
            ReportType::AccountPerformance,
            DateRangeKind::Yesterday,
            day,
            day,
            vec![],
        )
        .unwrap();
        let metadata = IngestionMetadata::from_job(&job, None);
        let records = (0..4)
            .map(|i| {
                MappedRecord::new(
                    AccountPerformanceRow::default(),
                    metadata.clone(),
                    &[i.to_string()],
                )
            })
            .collect();

        sink.flush(records).unwrap();
        sink.flush(Vec::new()).unwrap();

        assert_eq!(sink.batches_flushed(), 1);
        assert_eq!(sink.records_flushed(), 4);

        let stored = store
            .query(
                "ACCOUNT_PERFORMANCE_REPORT",
                &Filter::all().eq("account_id", 7),
                Pagination::all(),
            )
            .unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0].document["date_range_type"], "YESTERDAY");
    }
}
