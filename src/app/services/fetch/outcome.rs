//! Run outcome collection
//!
//! Tasks append their result exactly once; the coordinator drains both
//! collections after the completion barrier releases.

use crate::app::models::AccountId;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// An account whose report could not be fetched or ingested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAccount {
    pub account_id: AccountId,
    pub reason: String,
    pub attempts: u32,
}

/// Append-only success and failure collections shared by all tasks of a run
#[derive(Debug)]
pub struct RunOutcomes<T> {
    successes: Mutex<Vec<T>>,
    failures: Mutex<Vec<FailedAccount>>,
}

impl<T> Default for RunOutcomes<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RunOutcomes<T> {
    pub fn new() -> Self {
        Self {
            successes: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn record_success(&self, output: T) {
        self.successes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output);
    }

    pub fn record_failure(&self, failure: FailedAccount) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    /// Move everything collected so far into a report
    pub fn drain_into_report(&self, elapsed: Duration) -> RunReport<T> {
        let successes =
            std::mem::take(&mut *self.successes.lock().unwrap_or_else(PoisonError::into_inner));
        let mut failures =
            std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner));
        failures.sort_by_key(|failure| failure.account_id);

        RunReport {
            successes,
            failures,
            elapsed,
        }
    }
}

/// Result of one coordinator run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport<T> {
    pub successes: Vec<T>,
    pub failures: Vec<FailedAccount>,
    pub elapsed: Duration,
}

impl<T> RunReport<T> {
    /// Number of accounts that reached a final outcome
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_account_ids(&self) -> Vec<AccountId> {
        self.failures.iter().map(|f| f.account_id).collect()
    }
}
