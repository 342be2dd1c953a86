//! Per-account fetch task
//!
//! Each task owns its job and session and walks a small state machine:
//!
//! ```text
//! Idle -> Fetching{0} -> Success -> Done
//!              |-> NonRetryableFailure -> Done
//!              |-> RetryWait{0, d} -> Fetching{1} -> ...
//!              '-> (attempts exhausted) -> Done
//! ```
//!
//! Attempts are zero-based. After a transient failure of attempt `n` the task
//! sleeps `backoff * (n + 1)` unless `n + 1` reached the retry limit, in which
//! case it stops without sleeping.

use super::api::{AccountSession, FetchError, ReportFetchApi};
use super::handlers::ReportHandler;
use crate::app::models::{AccountId, ReportJob};
use crate::config::IngestConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Why a single attempt did not produce an output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Another attempt may succeed
    Transient(String),
    /// Retrying cannot help
    Permanent(String),
}

impl AttemptFailure {
    pub fn reason(&self) -> &str {
        match self {
            AttemptFailure::Transient(reason) | AttemptFailure::Permanent(reason) => reason,
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl From<FetchError> for AttemptFailure {
    fn from(error: FetchError) -> Self {
        if error.is_retryable() {
            AttemptFailure::Transient(error.to_string())
        } else {
            AttemptFailure::Permanent(error.to_string())
        }
    }
}

/// Lifecycle state of a fetch task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Fetching { attempt: u32 },
    RetryWait { attempt: u32, delay: Duration },
    Success,
    NonRetryableFailure,
    Done,
}

/// Final result of one task, with the states it passed through
#[derive(Debug)]
pub struct TaskReport<T> {
    pub account_id: AccountId,
    pub attempts: u32,
    pub outcome: Result<T, String>,
    pub history: Vec<TaskState>,
}

/// Fetch-and-handle loop for a single account
pub struct AccountFetchTask<H: ReportHandler> {
    job: ReportJob,
    session: AccountSession,
    api: Arc<dyn ReportFetchApi>,
    handler: Arc<H>,
    config: Arc<IngestConfig>,
    cancellation_token: CancellationToken,
    state: TaskState,
    history: Vec<TaskState>,
}

impl<H: ReportHandler> AccountFetchTask<H> {
    pub fn new(
        job: ReportJob,
        session: AccountSession,
        api: Arc<dyn ReportFetchApi>,
        handler: Arc<H>,
        config: Arc<IngestConfig>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            job,
            session,
            api,
            handler,
            config,
            cancellation_token,
            state: TaskState::Idle,
            history: vec![TaskState::Idle],
        }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    fn transition(&mut self, next: TaskState) {
        debug!(
            "Account {} task: {:?} -> {:?}",
            self.job.account_id, self.state, next
        );
        self.history.push(next.clone());
        self.state = next;
    }

    /// Drive the task to `Done`
    pub async fn run(mut self) -> TaskReport<H::Output> {
        let account_id = self.job.account_id;
        let mut attempts = 0;
        let outcome: Result<H::Output, String>;

        loop {
            match self.state.clone() {
                TaskState::Idle => {
                    if self.cancellation_token.is_cancelled() {
                        outcome = Err("Cancelled before the first attempt".to_string());
                        break;
                    }
                    self.transition(TaskState::Fetching { attempt: 0 });
                }
                TaskState::Fetching { attempt } => {
                    attempts = attempt + 1;
                    match self.attempt().await {
                        Ok(output) => {
                            self.transition(TaskState::Success);
                            outcome = Ok(output);
                            break;
                        }
                        Err(AttemptFailure::Permanent(reason)) => {
                            error!("Account {} failed permanently: {}", account_id, reason);
                            self.transition(TaskState::NonRetryableFailure);
                            outcome = Err(reason);
                            break;
                        }
                        Err(AttemptFailure::Transient(reason)) => {
                            if attempt + 1 >= self.config.retries_count {
                                warn!(
                                    "Account {} gave up after {} attempts: {}",
                                    account_id, attempts, reason
                                );
                                outcome = Err(reason);
                                break;
                            }
                            let delay = self.config.backoff_for_attempt(attempt);
                            warn!(
                                "Account {} attempt {} failed, retrying in {:?}: {}",
                                account_id, attempts, delay, reason
                            );
                            self.transition(TaskState::RetryWait { attempt, delay });
                        }
                    }
                }
                TaskState::RetryWait { attempt, delay } => {
                    tokio::select! {
                        _ = self.cancellation_token.cancelled() => {
                            warn!("Account {} interrupted during backoff", account_id);
                            outcome = Err(format!("Interrupted after {} attempts", attempts));
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {
                            self.transition(TaskState::Fetching { attempt: attempt + 1 });
                        }
                    }
                }
                TaskState::Success | TaskState::NonRetryableFailure | TaskState::Done => {
                    outcome = Err("Task was already finished".to_string());
                    break;
                }
            }
        }

        self.transition(TaskState::Done);
        TaskReport {
            account_id,
            attempts,
            outcome,
            history: self.history,
        }
    }

    /// One fetch plus handling of the opened body
    async fn attempt(&self) -> Result<H::Output, AttemptFailure> {
        let stream = self.api.fetch_report(&self.session, &self.job).await;

        let stream = match stream.and_then(|stream| stream.into_checked()) {
            Ok(stream) => stream,
            Err(FetchError::Detailed {
                error_type,
                trigger,
            }) => {
                error!(
                    "Report request for account {} rejected: {} (trigger: {})",
                    self.job.account_id, error_type, trigger
                );
                return Err(AttemptFailure::Permanent(format!(
                    "{} (trigger: {})",
                    error_type, trigger
                )));
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Account {} report opened ({:?} bytes)",
            self.job.account_id, stream.content_length
        );

        let handler = self.handler.clone();
        let job = self.job.clone();
        match tokio::task::spawn_blocking(move || handler.handle(&job, stream.body)).await {
            Ok(result) => result,
            Err(join_error) => Err(AttemptFailure::Permanent(format!(
                "Report handler aborted: {}",
                join_error
            ))),
        }
    }
}
