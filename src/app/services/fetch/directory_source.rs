//! File-backed report sources
//!
//! [`DirectoryReportSource`] serves reports from a directory tree laid out as
//! `<root>/<account id>/<REPORT_TYPE>.csv.gz`, which lets the CLI replay
//! exported reports without network access. [`DownloadedReportSource`] serves
//! raw files saved by an earlier download run.

use super::api::{AccountSession, FetchError, RawReportStream, ReportFetchApi};
use super::handlers::DownloadedReport;
use crate::app::models::{AccountId, ReportJob, ReportType};
use crate::constants::REPORT_FILE_EXTENSION;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use walkdir::WalkDir;

/// Status reported when an account has no report file
pub const STATUS_NOT_FOUND: u16 = 404;

fn check_session(session: &AccountSession, job: &ReportJob) -> std::result::Result<(), FetchError> {
    if session.client_account_id != job.account_id {
        return Err(FetchError::detailed(
            "AuthorizationError.CUSTOMER_MISMATCH",
            format!(
                "session for {} used to fetch {}",
                session.client_account_id, job.account_id
            ),
        ));
    }
    Ok(())
}

async fn open_report(path: &Path) -> std::result::Result<RawReportStream, FetchError> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let file = file.into_std().await;
    debug!("Opened report file {} ({} bytes)", path.display(), length);
    Ok(RawReportStream::ok(Box::new(file), Some(length)))
}

// =============================================================================
// Directory tree source
// =============================================================================

/// Reports stored under one directory per account
#[derive(Debug, Clone)]
pub struct DirectoryReportSource {
    root: PathBuf,
}

impl DirectoryReportSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::configuration(format!(
                "Report source {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of one account's report of `report_type`
    pub fn report_path(&self, account_id: AccountId, report_type: ReportType) -> PathBuf {
        self.root
            .join(account_id.to_string())
            .join(format!("{}.{}", report_type.as_str(), REPORT_FILE_EXTENSION))
    }

    /// Accounts with a directory under the root, sorted and deduplicated
    pub fn list_accounts(&self) -> Result<Vec<AccountId>> {
        let mut accounts = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                Error::io(
                    format!("Failed to scan {}", self.root.display()),
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop")),
                )
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            match AccountId::from_str(&entry.file_name().to_string_lossy()) {
                Ok(account_id) => accounts.push(account_id),
                Err(_) => debug!("Skipping non-account directory {}", entry.path().display()),
            }
        }

        accounts.sort();
        accounts.dedup();
        Ok(accounts)
    }
}

#[async_trait]
impl ReportFetchApi for DirectoryReportSource {
    async fn fetch_report(
        &self,
        session: &AccountSession,
        job: &ReportJob,
    ) -> std::result::Result<RawReportStream, FetchError> {
        check_session(session, job)?;

        let account_dir = self.root.join(job.account_id.to_string());
        if !account_dir.is_dir() {
            return Err(FetchError::detailed(
                "SelectorError.UNKNOWN_ACCOUNT",
                job.account_id.to_string(),
            ));
        }

        let path = self.report_path(job.account_id, job.report_type);
        if !path.is_file() {
            return Ok(RawReportStream::with_status(
                STATUS_NOT_FOUND,
                format!("{} not found", path.display()),
            ));
        }

        open_report(&path).await
    }
}

// =============================================================================
// Downloaded files source
// =============================================================================

/// Raw report files saved by a previous download run
#[derive(Debug, Clone, Default)]
pub struct DownloadedReportSource {
    files: HashMap<(AccountId, ReportType), PathBuf>,
}

impl DownloadedReportSource {
    pub fn new(downloads: &[DownloadedReport]) -> Self {
        Self {
            files: downloads
                .iter()
                .map(|d| ((d.account_id, d.report_type), d.raw_path.clone()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl ReportFetchApi for DownloadedReportSource {
    async fn fetch_report(
        &self,
        session: &AccountSession,
        job: &ReportJob,
    ) -> std::result::Result<RawReportStream, FetchError> {
        check_session(session, job)?;

        let path = self
            .files
            .get(&(job.account_id, job.report_type))
            .ok_or_else(|| {
                FetchError::detailed(
                    "DownloadError.NOT_DOWNLOADED",
                    format!("{} {}", job.account_id, job.report_type),
                )
            })?;

        open_report(path).await
    }
}
