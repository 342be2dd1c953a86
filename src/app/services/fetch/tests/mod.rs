//! Test utilities for the fetch layer
//!
//! [`ScriptedFetchApi`] replays a per-account script of responses and counts
//! attempts, so retry and isolation behaviour can be asserted exactly.

use crate::app::models::{AccountId, ReportJob};
use crate::app::services::fetch::api::{AccountSession, FetchError, RawReportStream, ReportFetchApi};
use crate::app::services::report_csv::tests::{account_report, gzip};
use crate::config::IngestConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

mod task_tests;

/// One scripted response
#[derive(Debug, Clone)]
pub enum Step {
    /// OK response with a report of this many rows
    Report(usize),
    /// OK status with a body that is not gzip
    Garbage,
    /// Response with a non-OK status
    Status(u16),
    /// Retryable service error
    Transient,
    /// Non-retryable detailed error
    Rejected,
    /// Sleep, then answer with a report of this many rows
    Slow(Duration, usize),
}

/// Fetch API answering from per-account scripts
///
/// The last step of a script repeats once the script is used up.
#[derive(Default)]
pub struct ScriptedFetchApi {
    scripts: HashMap<AccountId, Vec<Step>>,
    attempts: Mutex<HashMap<AccountId, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetchApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, account: u64, steps: Vec<Step>) -> Self {
        self.scripts.insert(AccountId(account), steps);
        self
    }

    pub fn attempts(&self, account: u64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&AccountId(account))
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, account_id: AccountId) -> Step {
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(account_id).or_insert(0);
        let index = *count;
        *count += 1;

        match self.scripts.get(&account_id) {
            Some(steps) if !steps.is_empty() => steps[index.min(steps.len() - 1)].clone(),
            _ => Step::Rejected,
        }
    }
}

#[async_trait]
impl ReportFetchApi for ScriptedFetchApi {
    async fn fetch_report(
        &self,
        session: &AccountSession,
        job: &ReportJob,
    ) -> Result<RawReportStream, FetchError> {
        assert_eq!(session.client_account_id, job.account_id);
        let step = self.next_step(job.account_id);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let response = match step {
            Step::Report(rows) => Ok(report_stream(rows)),
            Step::Garbage => Ok(RawReportStream::ok(Box::new(&b"<html>oops</html>"[..]), None)),
            Step::Status(status) => Ok(RawReportStream::with_status(status, "scripted status")),
            Step::Transient => Err(FetchError::report_service("scripted outage")),
            Step::Rejected => Err(FetchError::detailed(
                "ReportDefinitionError.INVALID_FIELD_NAME_FOR_REPORT",
                "Bogus",
            )),
            Step::Slow(delay, rows) => {
                tokio::time::sleep(delay).await;
                Ok(report_stream(rows))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

pub fn report_stream(rows: usize) -> RawReportStream {
    let bytes = gzip(&account_report(rows, true));
    let length = bytes.len() as u64;
    RawReportStream::ok(Box::new(std::io::Cursor::new(bytes)), Some(length))
}

/// Configuration with millisecond backoff so retry tests stay fast
pub fn fast_config() -> IngestConfig {
    IngestConfig::default()
        .with_num_threads(4)
        .with_retries_count(5)
        .with_backoff_interval_ms(1)
        .with_batch_size(5)
}
