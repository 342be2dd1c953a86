//! Tests for the per-account retry state machine

use super::{ScriptedFetchApi, Step, fast_config};
use crate::app::models::AccountId;
use crate::app::services::fetch::api::SessionTemplate;
use crate::app::services::fetch::handlers::{AccountIngestion, InMemoryHandler};
use crate::app::services::fetch::task::{AccountFetchTask, TaskReport, TaskState};
use crate::app::services::report_csv::AccountPerformanceRow;
use crate::app::services::report_csv::tests::{RecordingSink, account_job};
use crate::config::IngestConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

async fn run_task(
    api: Arc<ScriptedFetchApi>,
    config: IngestConfig,
    token: CancellationToken,
) -> (TaskReport<AccountIngestion>, Arc<RecordingSink<AccountPerformanceRow>>) {
    let sink = Arc::new(RecordingSink::<AccountPerformanceRow>::new());
    let handler =
        Arc::new(InMemoryHandler::<AccountPerformanceRow>::new(&config, sink.clone()).unwrap());
    let task = AccountFetchTask::new(
        account_job(1),
        SessionTemplate::default().for_account(AccountId(1)),
        api,
        handler,
        Arc::new(config),
        token,
    );
    (task.run().await, sink)
}

fn retry_delays(report: &TaskReport<AccountIngestion>) -> Vec<Duration> {
    report
        .history
        .iter()
        .filter_map(|state| match state {
            TaskState::RetryWait { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_first_attempt_success() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Report(7)]));
    let (report, sink) = run_task(api.clone(), fast_config(), CancellationToken::new()).await;

    assert_eq!(report.attempts, 1);
    assert_eq!(
        report.history,
        vec![
            TaskState::Idle,
            TaskState::Fetching { attempt: 0 },
            TaskState::Success,
            TaskState::Done
        ]
    );
    assert_eq!(report.outcome.unwrap().summary.records_flushed, 7);
    assert_eq!(sink.sizes(), vec![5, 2]);
}

#[tokio::test]
async fn test_persistent_transient_failure_uses_every_attempt() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Transient]));
    let (report, sink) = run_task(api.clone(), fast_config(), CancellationToken::new()).await;

    assert!(report.outcome.is_err());
    assert_eq!(report.attempts, 5);
    assert_eq!(api.attempts(1), 5);
    assert_eq!(
        retry_delays(&report),
        vec![1, 2, 3, 4].into_iter().map(Duration::from_millis).collect::<Vec<_>>()
    );
    assert_eq!(report.history.last(), Some(&TaskState::Done));
    assert!(sink.sizes().is_empty());
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let api = Arc::new(ScriptedFetchApi::new().script(
        1,
        vec![Step::Transient, Step::Status(503), Step::Report(3)],
    ));
    let (report, _) = run_task(api.clone(), fast_config(), CancellationToken::new()).await;

    assert_eq!(report.attempts, 3);
    assert_eq!(report.outcome.unwrap().summary.records_flushed, 3);
}

#[tokio::test]
async fn test_rejected_request_is_not_retried() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Rejected, Step::Report(3)]));
    let (report, _) = run_task(api.clone(), fast_config(), CancellationToken::new()).await;

    assert_eq!(api.attempts(1), 1);
    assert!(report.history.contains(&TaskState::NonRetryableFailure));
    assert!(report.outcome.unwrap_err().contains("INVALID_FIELD_NAME_FOR_REPORT"));
}

#[tokio::test]
async fn test_ingestion_failure_is_not_retried() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Garbage, Step::Report(3)]));
    let (report, _) = run_task(api.clone(), fast_config(), CancellationToken::new()).await;

    assert_eq!(api.attempts(1), 1);
    assert!(report.outcome.is_err());
}

#[tokio::test]
async fn test_single_attempt_limit_never_sleeps() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Transient]));
    let config = fast_config().with_retries_count(1).with_backoff_interval_ms(60_000);

    let started = Instant::now();
    let (report, _) = run_task(api.clone(), config, CancellationToken::new()).await;

    assert_eq!(report.attempts, 1);
    assert!(retry_delays(&report).is_empty());
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Transient]));
    let config = fast_config().with_backoff_interval_ms(60_000);
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let (report, _) = run_task(api.clone(), config, token).await;

    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(api.attempts(1), 1);
    assert!(report.outcome.unwrap_err().contains("Interrupted"));
}

#[tokio::test]
async fn test_cancelled_task_never_fetches() {
    let api = Arc::new(ScriptedFetchApi::new().script(1, vec![Step::Report(1)]));
    let token = CancellationToken::new();
    token.cancel();

    let (report, _) = run_task(api.clone(), fast_config(), token).await;

    assert_eq!(api.attempts(1), 0);
    assert_eq!(report.attempts, 0);
    assert!(report.outcome.is_err());
}
