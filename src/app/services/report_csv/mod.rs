//! Report CSV pipeline: decoded report stream to typed records
//!
//! ## Architecture
//!
//! - [`field_registry`] - static per-shape column registries and the [`ReportRow`] trait
//! - [`record_shapes`] - the shipped record shapes
//! - [`row_source`] - lazy row sequence with trailer detection
//! - [`row_mapper`] - header capture and per-row coercion
//! - [`ingestor`] - gunzip, map, stamp and batch one report
//! - [`stats`] - per-report counters
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use report_ingestor::app::services::persistence::{BatchPersistenceSink, InMemoryEntityStore};
//! use report_ingestor::app::services::report_csv::{AccountPerformanceRow, ReportIngestor};
//! use report_ingestor::{IngestConfig, ReportJob};
//!
//! # fn example(job: ReportJob, gzip_bytes: &[u8]) -> report_ingestor::Result<()> {
//! let ingestor = ReportIngestor::<AccountPerformanceRow>::new(&IngestConfig::default())?;
//! let sink = BatchPersistenceSink::<AccountPerformanceRow>::new(Arc::new(InMemoryEntityStore::new()));
//! let summary = ingestor.ingest_gzip(&job, gzip_bytes, &sink)?;
//!
//! println!("{} records in {} batches", summary.records_flushed, summary.batches_flushed);
//! # Ok(())
//! # }
//! ```

pub mod field_registry;
pub mod ingestor;
pub mod record_shapes;
pub mod row_mapper;
pub mod row_source;
pub mod stats;

#[cfg(test)]
pub mod tests;

pub use field_registry::{FieldDescriptor, FieldKind, FieldValue, ReportRow};
pub use ingestor::ReportIngestor;
pub use record_shapes::{AccountPerformanceRow, CampaignPerformanceRow, PerformanceMetrics};
pub use row_mapper::RowMapper;
pub use row_source::StreamingRowSource;
pub use stats::IngestSummary;
