//! Report Ingestor Library
//!
//! A Rust library for acquiring large tabular reports from a remote reporting API,
//! one report per (account, report type, date range), and turning them into typed,
//! batched records ready for storage.
//!
//! This library provides tools for:
//! - Fetching reports for thousands of accounts on a bounded worker pool with retry/backoff
//! - Streaming gzip decompression and row-by-row CSV reading with trailer detection
//! - Mapping CSV columns onto statically declared record shapes, including
//!   locale-ambiguous numbers and micro-unit monetary columns
//! - Handing bounded batches of records to a pluggable entity store
//! - Isolating per-account failures so one bad account never stalls a run

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod date_parser;
        pub mod date_ranges;
        pub mod fetch;
        pub mod job_planner;
        pub mod number_parser;
        pub mod persistence;
        pub mod report_csv;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{AccountId, DateRangeKind, MappedRecord, ReportJob, ReportType};
pub use app::services::fetch::{FetchCoordinator, FetchError, RunReport};
pub use config::IngestConfig;

/// Result type alias for the report ingestor
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for report acquisition and ingestion
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV reading error
    #[error("CSV parsing error: {message}")]
    CsvParsing {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Data validation error
    #[error("Data validation error: {message}")]
    DataValidation { message: String },

    /// Number text could not be interpreted in any supported format
    #[error("Unrecognized number format: '{input}'")]
    NumberFormat { input: String },

    /// A row cell could not be coerced into its destination field
    #[error("Error mapping column #{column} ('{header}') with contents '{content}': {reason}")]
    RowMapping {
        column: usize,
        header: String,
        content: String,
        reason: String,
    },

    /// Rows were mapped before a header row was captured
    #[error("Header row has not been captured")]
    HeaderNotCaptured,

    /// A row was requested from an already drained row source
    #[error("Row source is exhausted")]
    SequenceExhausted,

    /// Entity store rejected an operation
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// JSON serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Worker pool is not accepting work
    #[error("Worker pool unavailable: {reason}")]
    PoolUnavailable { reason: String },

    /// Processing interrupted
    #[error("Processing interrupted: {reason}")]
    ProcessingInterrupted { reason: String },

    /// Unknown report type name
    #[error("Unknown report type: {name}")]
    UnknownReportType { name: String },

    /// Unknown date range name
    #[error("Unknown date range type: {name}")]
    UnknownDateRange { name: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a CSV parsing error with context
    pub fn csv_parsing(message: impl Into<String>, source: Option<csv::Error>) -> Self {
        Self::CsvParsing {
            message: message.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a data validation error
    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Create a number format error
    pub fn number_format(input: impl Into<String>) -> Self {
        Self::NumberFormat {
            input: input.into(),
        }
    }

    /// Create a row mapping error for a single cell
    pub fn row_mapping(
        column: usize,
        header: impl Into<String>,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::RowMapping {
            column,
            header: header.into(),
            content: content.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            message: message.into(),
            source,
        }
    }

    /// Create a pool unavailable error
    pub fn pool_unavailable(reason: impl Into<String>) -> Self {
        Self::PoolUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a processing interrupted error
    pub fn processing_interrupted(reason: impl Into<String>) -> Self {
        Self::ProcessingInterrupted {
            reason: reason.into(),
        }
    }

    /// Create an unknown report type error
    pub fn unknown_report_type(name: impl Into<String>) -> Self {
        Self::UnknownReportType { name: name.into() }
    }

    /// Create an unknown date range error
    pub fn unknown_date_range(name: impl Into<String>) -> Self {
        Self::UnknownDateRange { name: name.into() }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::CsvParsing {
            message: "CSV parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization {
            message: "JSON serialization failed".to_string(),
            source: error,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration {
            message: format!("Invalid configuration file: {}", error),
        }
    }
}
