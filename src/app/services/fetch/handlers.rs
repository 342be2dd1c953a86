//! Report handlers: what a task does with an opened report body
//!
//! Handlers run on the blocking thread pool. They either stream the body
//! straight into the ingestion pipeline ([`InMemoryHandler`]) or save it to
//! disk for later processing ([`OnDiskHandler`]).

use super::task::AttemptFailure;
use crate::app::models::{AccountId, ReportJob, ReportType};
use crate::app::services::persistence::RecordSink;
use crate::app::services::report_csv::{IngestSummary, ReportIngestor, ReportRow};
use crate::Result;
use crate::config::IngestConfig;
use crate::constants::{DOWNLOAD_TEMP_SUFFIX, GUNZIP_SUFFIX, download_temp_prefix};
use flate2::read::GzDecoder;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Consumer of one opened report body
pub trait ReportHandler: Send + Sync + 'static {
    type Output: Send + 'static;

    fn handle(
        &self,
        job: &ReportJob,
        body: Box<dyn Read + Send>,
    ) -> std::result::Result<Self::Output, AttemptFailure>;
}

// =============================================================================
// In-memory ingestion
// =============================================================================

/// Per-account result of streaming a report into the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountIngestion {
    pub account_id: AccountId,
    pub report_type: ReportType,
    pub summary: IngestSummary,
}

/// Streams the gzip body through the row pipeline into a shared sink
pub struct InMemoryHandler<R: ReportRow> {
    ingestor: ReportIngestor<R>,
    sink: Arc<dyn RecordSink<R>>,
}

impl<R: ReportRow> InMemoryHandler<R> {
    pub fn new(config: &IngestConfig, sink: Arc<dyn RecordSink<R>>) -> Result<Self> {
        Ok(Self {
            ingestor: ReportIngestor::new(config)?,
            sink,
        })
    }
}

impl<R: ReportRow> ReportHandler for InMemoryHandler<R> {
    type Output = AccountIngestion;

    fn handle(
        &self,
        job: &ReportJob,
        body: Box<dyn Read + Send>,
    ) -> std::result::Result<AccountIngestion, AttemptFailure> {
        // Partial flushes cannot be undone, so ingestion failures are final
        let summary = self
            .ingestor
            .ingest_gzip(job, body, self.sink.as_ref())
            .map_err(|e| AttemptFailure::Permanent(format!("{:#}", anyhow::Error::new(e))))?;

        Ok(AccountIngestion {
            account_id: job.account_id,
            report_type: job.report_type,
            summary,
        })
    }
}

// =============================================================================
// On-disk download
// =============================================================================

/// Raw and decompressed files saved for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedReport {
    pub account_id: AccountId,
    pub report_type: ReportType,
    pub raw_path: PathBuf,
    pub gunzip_path: PathBuf,
    pub raw_bytes: u64,
    pub gunzip_bytes: u64,
}

/// Saves the body to a named temporary file, then decompresses it alongside
pub struct OnDiskHandler {
    temp_dir: Option<PathBuf>,
    buffer_size: usize,
}

impl OnDiskHandler {
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            buffer_size: config.buffer_size,
        }
    }

    fn gunzip(&self, raw_path: &Path) -> std::io::Result<(PathBuf, u64)> {
        let gunzip_path = PathBuf::from(format!("{}{}", raw_path.display(), GUNZIP_SUFFIX));
        let input = File::open(raw_path)?;
        let mut decoder = GzDecoder::new(BufReader::with_capacity(self.buffer_size, input));
        let mut output = BufWriter::with_capacity(self.buffer_size, File::create(&gunzip_path)?);

        let written = match std::io::copy(&mut decoder, &mut output).and_then(|n| {
            output.flush()?;
            Ok(n)
        }) {
            Ok(n) => n,
            Err(e) => {
                drop(output);
                let _ = std::fs::remove_file(&gunzip_path);
                return Err(e);
            }
        };

        Ok((gunzip_path, written))
    }
}

impl ReportHandler for OnDiskHandler {
    type Output = DownloadedReport;

    fn handle(
        &self,
        job: &ReportJob,
        mut body: Box<dyn Read + Send>,
    ) -> std::result::Result<DownloadedReport, AttemptFailure> {
        let prefix = download_temp_prefix(job.report_type.as_str(), &job.account_id.to_string());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(DOWNLOAD_TEMP_SUFFIX);

        let temp_file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| AttemptFailure::Transient(format!("Failed to create download file: {}", e)))?;

        // The unkept temp file is removed on drop, so a failed copy leaves nothing behind
        let mut writer = BufWriter::with_capacity(self.buffer_size, temp_file);
        let raw_bytes = std::io::copy(&mut body, &mut writer)
            .map_err(|e| AttemptFailure::Transient(format!("Report download interrupted: {}", e)))?;
        let temp_file = writer.into_inner().map_err(|e| {
            AttemptFailure::Transient(format!("Failed to flush download: {}", e.error()))
        })?;

        let (_, raw_path) = temp_file.keep().map_err(|e| {
            AttemptFailure::Transient(format!("Failed to keep download: {}", e.error))
        })?;
        debug!(
            "Saved {} bytes for account {} to {}",
            raw_bytes,
            job.account_id,
            raw_path.display()
        );

        let (gunzip_path, gunzip_bytes) = self.gunzip(&raw_path).map_err(|e| {
            AttemptFailure::Permanent(format!(
                "Failed to decompress {}: {}",
                raw_path.display(),
                e
            ))
        })?;

        Ok(DownloadedReport {
            account_id: job.account_id,
            report_type: job.report_type,
            raw_path,
            gunzip_path,
            raw_bytes,
            gunzip_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::persistence::{BatchPersistenceSink, InMemoryEntityStore};
    use crate::app::services::report_csv::AccountPerformanceRow;
    use crate::app::services::report_csv::tests::{account_job, account_report, gzip};
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_handler_flushes_into_sink() {
        let store = Arc::new(InMemoryEntityStore::new());
        let sink = Arc::new(BatchPersistenceSink::<AccountPerformanceRow>::new(store.clone()));
        let config = IngestConfig::default().with_batch_size(4);
        let handler = InMemoryHandler::<AccountPerformanceRow>::new(&config, sink.clone()).unwrap();

        let body = gzip(&account_report(9, true));
        let output = handler
            .handle(&account_job(3), Box::new(std::io::Cursor::new(body)))
            .unwrap();

        assert_eq!(output.account_id, AccountId(3));
        assert_eq!(output.summary.records_flushed, 9);
        assert_eq!(sink.batches_flushed(), 3);
        assert_eq!(store.count(AccountPerformanceRow::REPORT_TYPE.as_str()).unwrap(), 9);
    }

    #[test]
    fn test_in_memory_handler_failures_are_permanent() {
        let store = Arc::new(InMemoryEntityStore::new());
        let sink = Arc::new(BatchPersistenceSink::<AccountPerformanceRow>::new(store));
        let handler =
            InMemoryHandler::<AccountPerformanceRow>::new(&IngestConfig::default(), sink).unwrap();

        let failure = handler
            .handle(&account_job(3), Box::new(&b"not gzip at all"[..]))
            .unwrap_err();
        assert!(matches!(failure, AttemptFailure::Permanent(_)));
    }

    #[test]
    fn test_on_disk_handler_keeps_raw_and_gunzip_files() {
        let dir = TempDir::new().unwrap();
        let config = IngestConfig::default().with_temp_dir(dir.path());
        let handler = OnDiskHandler::new(&config);
        let text = account_report(2, true);

        let report = handler
            .handle(&account_job(77), Box::new(std::io::Cursor::new(gzip(&text))))
            .unwrap();

        let name = report.raw_path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("reportDownload-ACCOUNT_PERFORMANCE_REPORT-77-"));
        assert!(name.ends_with(".report"));
        assert!(report.gunzip_path.to_string_lossy().ends_with(".report.gunzip"));
        assert_eq!(std::fs::read_to_string(&report.gunzip_path).unwrap(), text);
        assert_eq!(report.gunzip_bytes, text.len() as u64);
        assert!(report.raw_path.starts_with(dir.path()));
    }

    #[test]
    fn test_on_disk_handler_rejects_corrupt_payload() {
        let dir = TempDir::new().unwrap();
        let handler = OnDiskHandler::new(&IngestConfig::default().with_temp_dir(dir.path()));

        let failure = handler
            .handle(&account_job(1), Box::new(&b"plain text"[..]))
            .unwrap_err();

        assert!(matches!(failure, AttemptFailure::Permanent(_)));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().to_string_lossy().ends_with(GUNZIP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }
}
