//! Configuration management and validation.
//!
//! Provides the ingestion configuration consumed by the fetch coordinator, the
//! per-account tasks and the row pipeline. Values are layered: built-in defaults,
//! then an optional TOML file, then `REPORT_INGESTOR_*` environment variables, and
//! finally command line overrides applied by the CLI.

use crate::app::models::{AccountId, ReportType};
use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_BACKOFF_INTERVAL_MS, DEFAULT_BATCH_SIZE,
    DEFAULT_BUFFER_SIZE, DEFAULT_NUM_THREADS, DEFAULT_RETRIES_COUNT, DEFAULT_TITLE_LINES,
    ENV_PREFIX,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Global configuration for report ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Size of the worker pool (concurrent account tasks)
    pub num_threads: usize,

    /// Maximum fetch attempts per account
    pub retries_count: u32,

    /// Base backoff in milliseconds; attempt `n` (zero-based) waits `base * (n + 1)`
    pub backoff_interval_ms: u64,

    /// Records buffered per batch before a flush
    pub batch_size: usize,

    /// Buffer size for byte copies and buffered readers
    pub buffer_size: usize,

    /// Report title lines preceding the header row
    pub title_lines: usize,

    /// Directory for raw and decompressed report files (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,

    /// Manager account stamped on every record as the top-level account
    pub top_account_id: Option<String>,

    /// Request rows with zero impressions
    pub include_zero_impressions: bool,

    /// Per report type column inclusion lists; a missing entry means all columns
    pub report_columns: HashMap<ReportType, Vec<String>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            num_threads: DEFAULT_NUM_THREADS,
            retries_count: DEFAULT_RETRIES_COUNT,
            backoff_interval_ms: DEFAULT_BACKOFF_INTERVAL_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            title_lines: DEFAULT_TITLE_LINES,
            temp_dir: None,
            top_account_id: None,
            include_zero_impressions: false,
            report_columns: HashMap::new(),
        }
    }
}

impl IngestConfig {
    /// Set the worker pool size
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the maximum number of fetch attempts per account
    pub fn with_retries_count(mut self, retries_count: u32) -> Self {
        self.retries_count = retries_count;
        self
    }

    /// Set the base backoff interval in milliseconds
    pub fn with_backoff_interval_ms(mut self, backoff_interval_ms: u64) -> Self {
        self.backoff_interval_ms = backoff_interval_ms;
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the byte copy buffer size
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the number of title lines to skip before the header row
    pub fn with_title_lines(mut self, title_lines: usize) -> Self {
        self.title_lines = title_lines;
        self
    }

    /// Set the directory for downloaded report files
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Set the manager account stamped on every record
    pub fn with_top_account_id(mut self, top_account_id: impl Into<String>) -> Self {
        self.top_account_id = Some(top_account_id.into());
        self
    }

    /// Restrict the columns requested for a report type
    pub fn with_report_columns(mut self, report_type: ReportType, columns: Vec<String>) -> Self {
        self.report_columns.insert(report_type, columns);
        self
    }

    /// Backoff delay before the retry following a zero-based `attempt`
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_interval_ms.saturating_mul(u64::from(attempt) + 1))
    }

    /// Manager account parsed from its configured text form
    pub fn top_account(&self) -> Result<Option<AccountId>> {
        self.top_account_id
            .as_deref()
            .map(AccountId::from_str)
            .transpose()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == 0 {
            return Err(Error::configuration("num_threads must be greater than 0"));
        }
        if self.retries_count == 0 {
            return Err(Error::configuration("retries_count must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(Error::configuration("batch_size must be greater than 0"));
        }
        if self.buffer_size == 0 {
            return Err(Error::configuration("buffer_size must be greater than 0"));
        }
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() && !temp_dir.is_dir() {
                return Err(Error::configuration(format!(
                    "temp_dir {} is not a directory",
                    temp_dir.display()
                )));
            }
        }
        self.top_account()?;
        Ok(())
    }

    /// Default configuration file location (`<config dir>/report-ingestor/config.toml`)
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| Error::configuration("Could not determine the user config directory"))
    }

    /// Load configuration from a TOML file, missing keys fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::io(format!("Failed to read config file {}", path.display()), e)
        })?;
        let config: IngestConfig = toml::from_str(&text)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Layered loading: defaults, then the optional file, then environment variables
    pub fn load_layered(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `REPORT_INGESTOR_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("NUM_THREADS") {
            self.num_threads = parse_env("NUM_THREADS", &value)?;
        }
        if let Some(value) = var("RETRIES_COUNT") {
            self.retries_count = parse_env("RETRIES_COUNT", &value)?;
        }
        if let Some(value) = var("BACKOFF_INTERVAL_MS") {
            self.backoff_interval_ms = parse_env("BACKOFF_INTERVAL_MS", &value)?;
        }
        if let Some(value) = var("BATCH_SIZE") {
            self.batch_size = parse_env("BATCH_SIZE", &value)?;
        }
        if let Some(value) = var("BUFFER_SIZE") {
            self.buffer_size = parse_env("BUFFER_SIZE", &value)?;
        }
        if let Some(value) = var("TITLE_LINES") {
            self.title_lines = parse_env("TITLE_LINES", &value)?;
        }
        if let Some(value) = var("TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = var("TOP_ACCOUNT_ID") {
            self.top_account_id = Some(value);
        }
        if let Some(value) = var("INCLUDE_ZERO_IMPRESSIONS") {
            self.include_zero_impressions = parse_env("INCLUDE_ZERO_IMPRESSIONS", &value)?;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse::<T>().map_err(|_| {
        Error::configuration(format!(
            "Invalid value '{}' for {}{}",
            value, ENV_PREFIX, name
        ))
    })
}
