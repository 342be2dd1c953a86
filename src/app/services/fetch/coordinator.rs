//! Fetch coordinator: bounded concurrent dispatch of per-account tasks
//!
//! The coordinator owns the worker pool (a semaphore sized by
//! `num_threads`), spawns one task per job, waits on a completion latch and
//! returns the collected successes and failures. One account failing never
//! affects the others.

use super::api::{ReportFetchApi, SessionTemplate};
use super::directory_source::DownloadedReportSource;
use super::handlers::{
    AccountIngestion, DownloadedReport, InMemoryHandler, OnDiskHandler, ReportHandler,
};
use super::latch::CompletionLatch;
use super::outcome::{FailedAccount, RunOutcomes, RunReport};
use super::task::AccountFetchTask;
use crate::app::models::{AccountId, ReportJob};
use crate::app::services::persistence::RecordSink;
use crate::app::services::report_csv::ReportRow;
use crate::config::IngestConfig;
use crate::{Error, Result};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Settles a task's outcome exactly once and always counts the latch down
///
/// If the task ends without settling (panic or abort), a failure is recorded
/// on drop so the run still completes with every account accounted for.
struct TaskCompletion<T> {
    account_id: AccountId,
    latch: Arc<CompletionLatch>,
    outcomes: Arc<RunOutcomes<T>>,
    progress: Option<ProgressBar>,
    settled: bool,
}

impl<T> TaskCompletion<T> {
    fn new(
        account_id: AccountId,
        latch: Arc<CompletionLatch>,
        outcomes: Arc<RunOutcomes<T>>,
        progress: Option<ProgressBar>,
    ) -> Self {
        Self {
            account_id,
            latch,
            outcomes,
            progress,
            settled: false,
        }
    }

    fn succeed(mut self, output: T) {
        self.outcomes.record_success(output);
        self.settled = true;
    }

    fn fail(mut self, reason: impl Into<String>, attempts: u32) {
        self.outcomes.record_failure(FailedAccount {
            account_id: self.account_id,
            reason: reason.into(),
            attempts,
        });
        self.settled = true;
    }
}

impl<T> Drop for TaskCompletion<T> {
    fn drop(&mut self) {
        if !self.settled {
            self.outcomes.record_failure(FailedAccount {
                account_id: self.account_id,
                reason: "Task ended without an outcome".to_string(),
                attempts: 0,
            });
        }
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        self.latch.count_down();
    }
}

/// Concurrent report fetcher
pub struct FetchCoordinator {
    config: Arc<IngestConfig>,
    api: Arc<dyn ReportFetchApi>,
    sessions: SessionTemplate,
    pool: Option<Arc<Semaphore>>,
    cancellation_token: CancellationToken,
    progress: Option<ProgressBar>,
}

impl FetchCoordinator {
    pub fn new(
        config: IngestConfig,
        api: Arc<dyn ReportFetchApi>,
        sessions: SessionTemplate,
    ) -> Self {
        Self {
            config: Arc::new(config),
            api,
            sessions,
            pool: None,
            cancellation_token: CancellationToken::new(),
            progress: None,
        }
    }

    /// Share an external cancellation token (e.g. Ctrl+C)
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Advance `progress` once per settled account
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Validate configuration and create the worker pool
    pub fn initialize(&mut self) -> Result<()> {
        self.config.validate()?;
        if self.pool.is_none() {
            debug!("Creating worker pool with {} workers", self.config.num_threads);
            self.pool = Some(Arc::new(Semaphore::new(self.config.num_threads)));
        }
        Ok(())
    }

    /// Close the worker pool; later runs fail with `PoolUnavailable`
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close();
            debug!("Worker pool closed");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.as_ref().is_some_and(|pool| !pool.is_closed())
    }

    /// Fetch every job and stream each report into `sink`
    pub async fn run_in_memory<R: ReportRow>(
        &self,
        jobs: Vec<ReportJob>,
        sink: Arc<dyn RecordSink<R>>,
    ) -> Result<RunReport<AccountIngestion>> {
        let handler = Arc::new(InMemoryHandler::new(&self.config, sink)?);
        self.dispatch(self.api.clone(), jobs, handler).await
    }

    /// Fetch every job into raw and decompressed files
    pub async fn run_to_files(&self, jobs: Vec<ReportJob>) -> Result<RunReport<DownloadedReport>> {
        let handler = Arc::new(OnDiskHandler::new(&self.config));
        self.dispatch(self.api.clone(), jobs, handler).await
    }

    /// Push files saved by [`run_to_files`](Self::run_to_files) through the row pipeline
    pub async fn ingest_files<R: ReportRow>(
        &self,
        job_template: &ReportJob,
        downloads: &[DownloadedReport],
        sink: Arc<dyn RecordSink<R>>,
    ) -> Result<RunReport<AccountIngestion>> {
        let jobs = downloads
            .iter()
            .filter(|download| download.report_type == job_template.report_type)
            .map(|download| job_template.for_account(download.account_id))
            .collect();
        let source: Arc<dyn ReportFetchApi> = Arc::new(DownloadedReportSource::new(downloads));
        let handler = Arc::new(InMemoryHandler::new(&self.config, sink)?);
        self.dispatch(source, jobs, handler).await
    }

    async fn dispatch<H: ReportHandler>(
        &self,
        api: Arc<dyn ReportFetchApi>,
        jobs: Vec<ReportJob>,
        handler: Arc<H>,
    ) -> Result<RunReport<H::Output>> {
        let pool = self
            .pool
            .clone()
            .filter(|pool| !pool.is_closed())
            .ok_or_else(|| {
                Error::pool_unavailable("Coordinator is not initialized or was shut down")
            })?;

        let start = Instant::now();
        let latch = Arc::new(CompletionLatch::new(jobs.len()));
        let outcomes = Arc::new(RunOutcomes::new());
        let mut workers = JoinSet::new();

        info!(
            "Dispatching {} report jobs to {} workers",
            jobs.len(),
            self.config.num_threads
        );

        for (worker_id, job) in jobs.into_iter().enumerate() {
            let completion = TaskCompletion::new(
                job.account_id,
                latch.clone(),
                outcomes.clone(),
                self.progress.clone(),
            );
            let session = self.sessions.for_account(job.account_id);
            let task = AccountFetchTask::new(
                job,
                session,
                api.clone(),
                handler.clone(),
                self.config.clone(),
                self.cancellation_token.clone(),
            );
            let pool = pool.clone();
            let cancellation_token = self.cancellation_token.clone();

            workers.spawn(async move {
                let _permit = tokio::select! {
                    _ = cancellation_token.cancelled() => {
                        completion.fail("Cancelled while waiting for a worker", 0);
                        return;
                    }
                    permit = pool.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            completion.fail("Worker pool closed", 0);
                            return;
                        }
                    },
                };

                debug!("Worker {} started", worker_id);
                let report = task.run().await;
                match report.outcome {
                    Ok(output) => completion.succeed(output),
                    Err(reason) => completion.fail(reason, report.attempts),
                }
            });
        }

        latch.wait().await;

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Fetch worker ended abnormally: {}", e);
            }
        }

        let report = outcomes.drain_into_report(start.elapsed());
        info!(
            "Fetch run finished in {:.2?}: {} succeeded, {} failed",
            report.elapsed,
            report.successes.len(),
            report.failures.len()
        );
        for failure in &report.failures {
            error!(
                "Account {} failed after {} attempts: {}",
                failure.account_id, failure.attempts, failure.reason
            );
        }

        Ok(report)
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
