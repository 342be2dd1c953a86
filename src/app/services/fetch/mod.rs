//! Concurrent report acquisition
//!
//! ## Architecture
//!
//! - [`api`] - the remote service contract, sessions and fetch errors
//! - [`task`] - per-account retry/backoff state machine
//! - [`handlers`] - in-memory ingestion or on-disk download of a report body
//! - [`coordinator`] - worker pool, dispatch and outcome collection
//! - [`latch`] / [`outcome`] - completion barrier and result sets
//! - [`directory_source`] - file-backed implementations of the service contract
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use report_ingestor::app::services::fetch::{DirectoryReportSource, FetchCoordinator, SessionTemplate};
//! use report_ingestor::app::services::persistence::{BatchPersistenceSink, InMemoryEntityStore};
//! use report_ingestor::app::services::report_csv::AccountPerformanceRow;
//! use report_ingestor::{IngestConfig, ReportJob};
//!
//! # async fn example(jobs: Vec<ReportJob>) -> report_ingestor::Result<()> {
//! let source = Arc::new(DirectoryReportSource::new("./reports")?);
//! let mut coordinator = FetchCoordinator::new(IngestConfig::default(), source, SessionTemplate::default());
//! coordinator.initialize()?;
//!
//! let sink = Arc::new(BatchPersistenceSink::<AccountPerformanceRow>::new(Arc::new(InMemoryEntityStore::new())));
//! let report = coordinator.run_in_memory::<AccountPerformanceRow>(jobs, sink).await?;
//! println!("{} ok, {} failed", report.successes.len(), report.failures.len());
//!
//! coordinator.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod coordinator;
pub mod directory_source;
pub mod handlers;
pub mod latch;
pub mod outcome;
pub mod task;

#[cfg(test)]
pub mod tests;

pub use api::{AccountSession, FetchError, RawReportStream, ReportFetchApi, SessionTemplate};
pub use coordinator::FetchCoordinator;
pub use directory_source::{DirectoryReportSource, DownloadedReportSource};
pub use handlers::{
    AccountIngestion, DownloadedReport, InMemoryHandler, OnDiskHandler, ReportHandler,
};
pub use latch::CompletionLatch;
pub use outcome::{FailedAccount, RunOutcomes, RunReport};
pub use task::{AccountFetchTask, AttemptFailure, TaskReport, TaskState};
