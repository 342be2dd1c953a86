//! Report Fetch API contract
//!
//! The fetch layer talks to the reporting service through [`ReportFetchApi`].
//! A call either yields a [`RawReportStream`] (which may still carry a non-OK
//! status) or a [`FetchError`] classified as retryable or not.

use crate::app::models::{AccountId, ReportJob};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

/// HTTP-equivalent status of a successful report response
pub const STATUS_OK: u16 = 200;

/// Failure raised by a report fetch
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// Transport or file I/O failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Request rejected by client-side validation
    #[error("Request validation failed: {message}")]
    Validation { message: String },

    /// Generic report service failure
    #[error("Report service error: {message}")]
    ReportService { message: String },

    /// Response arrived with a non-OK status
    #[error("Report service returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Structurally invalid request; retrying cannot succeed
    #[error("Report request rejected ({error_type}): {trigger}")]
    Detailed { error_type: String, trigger: String },
}

impl FetchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn report_service(message: impl Into<String>) -> Self {
        Self::ReportService {
            message: message.into(),
        }
    }

    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    pub fn detailed(error_type: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self::Detailed {
            error_type: error_type.into(),
            trigger: trigger.into(),
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Detailed { .. })
    }
}

/// An opened report response, owned by the task that requested it
pub struct RawReportStream {
    pub status: u16,
    pub message: Option<String>,
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl RawReportStream {
    /// OK response carrying a gzip-compressed CSV body
    pub fn ok(body: Box<dyn Read + Send>, content_length: Option<u64>) -> Self {
        Self {
            status: STATUS_OK,
            message: None,
            content_length,
            body,
        }
    }

    /// Error response without a body
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            content_length: Some(0),
            body: Box::new(std::io::empty()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Convert a non-OK response into its fetch error
    pub fn into_checked(self) -> Result<Self, FetchError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(FetchError::http_status(
                self.status,
                self.message.unwrap_or_default(),
            ))
        }
    }
}

impl fmt::Debug for RawReportStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawReportStream")
            .field("status", &self.status)
            .field("message", &self.message)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Immutable session settings shared by all tasks of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTemplate {
    pub user_agent: String,
    pub manager_account_id: Option<AccountId>,
    pub properties: BTreeMap<String, String>,
}

impl SessionTemplate {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    pub fn with_manager_account(mut self, account_id: AccountId) -> Self {
        self.manager_account_id = Some(account_id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Session owned by a single account's task
    pub fn for_account(&self, account_id: AccountId) -> AccountSession {
        AccountSession {
            client_account_id: account_id,
            user_agent: self.user_agent.clone(),
            manager_account_id: self.manager_account_id,
            properties: self.properties.clone(),
        }
    }
}

/// Per-account session value; never shared between tasks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSession {
    pub client_account_id: AccountId,
    pub user_agent: String,
    pub manager_account_id: Option<AccountId>,
    pub properties: BTreeMap<String, String>,
}

/// Remote reporting service
#[async_trait]
pub trait ReportFetchApi: Send + Sync {
    /// Request one report for the session's account
    async fn fetch_report(
        &self,
        session: &AccountSession,
        job: &ReportJob,
    ) -> Result<RawReportStream, FetchError>;
}
