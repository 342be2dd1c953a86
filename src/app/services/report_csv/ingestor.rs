//! Report ingestion: decoded stream to stamped, batched records
//!
//! The ingestor drives one report end to end on the calling thread:
//! gunzip, row source, header capture, row mapping, metadata stamping and
//! batching. Full batches go to the sink as soon as they fill; the final
//! partial batch goes once at end of stream.
//!
//! Rows reporting zero impressions are dropped unless the job sets
//! `include_zero_impressions`. Rows without an impressions value are kept.

use super::field_registry::ReportRow;
use super::row_mapper::RowMapper;
use super::row_source::StreamingRowSource;
use super::stats::IngestSummary;
use crate::app::models::{AccountId, IngestionMetadata, MappedRecord, ReportJob};
use crate::app::services::persistence::{Batch, RecordSink};
use crate::config::IngestConfig;
use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::io::{BufReader, Read};
use std::marker::PhantomData;
use tracing::{debug, warn};

/// Streaming ingestor for one record shape
#[derive(Debug, Clone)]
pub struct ReportIngestor<R: ReportRow> {
    batch_size: usize,
    buffer_size: usize,
    title_lines: usize,
    top_account_id: Option<AccountId>,
    _row: PhantomData<fn() -> R>,
}

impl<R: ReportRow> ReportIngestor<R> {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Ok(Self {
            batch_size: config.batch_size,
            buffer_size: config.buffer_size,
            title_lines: config.title_lines,
            top_account_id: config.top_account()?,
            _row: PhantomData,
        })
    }

    /// Ingest a gzip-compressed report
    pub fn ingest_gzip<Rd: Read>(
        &self,
        job: &ReportJob,
        compressed: Rd,
        sink: &dyn RecordSink<R>,
    ) -> Result<IngestSummary> {
        let decoder = GzDecoder::new(BufReader::with_capacity(self.buffer_size, compressed));
        self.ingest_csv(job, decoder, sink)
    }

    /// Ingest an already decompressed report
    ///
    /// A mapping or sink failure stops ingestion; batches flushed before the
    /// failure stay flushed and the pending partial batch is dropped.
    pub fn ingest_csv<Rd: Read>(
        &self,
        job: &ReportJob,
        reader: Rd,
        sink: &dyn RecordSink<R>,
    ) -> Result<IngestSummary> {
        if job.report_type != R::REPORT_TYPE {
            return Err(Error::data_validation(format!(
                "Job for account {} requests {} but the ingestor reads {}",
                job.account_id,
                job.report_type,
                R::REPORT_TYPE
            )));
        }

        let mut source = StreamingRowSource::new(reader, self.title_lines, self.buffer_size);
        let mut summary = IngestSummary::new();

        if !source.has_next()? {
            warn!("Report for account {} has no header row", job.account_id);
            summary.trailer_seen = source.trailer_seen();
            return Ok(summary);
        }

        let mut mapper = RowMapper::<R>::new();
        let mapped_columns = mapper.capture_header(&source.next_row()?);
        summary.unmapped_columns = mapper
            .unmapped_headers()
            .into_iter()
            .map(str::to_string)
            .collect();
        debug!(
            "Account {}: {} of {} columns mapped",
            job.account_id,
            mapped_columns,
            mapped_columns + summary.unmapped_columns.len()
        );

        let metadata = IngestionMetadata::from_job(job, self.top_account_id);
        let mut batch = Batch::new(self.batch_size);

        while source.has_next()? {
            let row = source.next_row()?;
            summary.rows_read += 1;

            let mapped = mapper.map_row(&row)?;
            if !job.include_zero_impressions && mapped.impressions() == Some(0) {
                summary.rows_filtered += 1;
                continue;
            }

            let natural_key = mapped.natural_key();
            let record = MappedRecord::new(mapped, metadata.clone(), &natural_key);
            summary.records_mapped += 1;

            if let Some(full) = batch.push(record) {
                Self::flush(sink, full, &mut summary)?;
            }
        }

        if let Some(remaining) = batch.take_remaining() {
            Self::flush(sink, remaining, &mut summary)?;
        }

        summary.trailer_seen = source.trailer_seen();
        debug!(
            "Account {}: {} rows in {} batches, {} zero-impression rows dropped",
            job.account_id,
            summary.records_flushed,
            summary.batches_flushed,
            summary.rows_filtered
        );
        Ok(summary)
    }

    fn flush(
        sink: &dyn RecordSink<R>,
        records: Vec<MappedRecord<R>>,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let count = records.len();
        sink.flush(records)?;
        summary.batches_flushed += 1;
        summary.records_flushed += count;
        Ok(())
    }
}
