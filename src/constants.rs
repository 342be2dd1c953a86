//! Application constants for the report ingestor
//!
//! This module contains default values, wire tokens and naming conventions
//! used throughout the acquisition and ingestion pipeline.

// =============================================================================
// Worker Pool and Retry Defaults
// =============================================================================

/// Default number of concurrent account fetch tasks
pub const DEFAULT_NUM_THREADS: usize = 20;

/// Default maximum number of fetch attempts per account
pub const DEFAULT_RETRIES_COUNT: u32 = 5;

/// Default base backoff interval between attempts in milliseconds
pub const DEFAULT_BACKOFF_INTERVAL_MS: u64 = 5000;

// =============================================================================
// Ingestion Defaults
// =============================================================================

/// Default number of records buffered before a batch is flushed
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default buffer size for byte copies and buffered readers
pub const DEFAULT_BUFFER_SIZE: usize = 0x1000;

/// Default number of report title lines preceding the header row
pub const DEFAULT_TITLE_LINES: usize = 0;

// =============================================================================
// Report Wire Format
// =============================================================================

/// First-cell token (case-insensitive) marking the trailer row of a report
pub const TRAILER_TOKEN: &str = "total";

/// Divisor converting micro-unit monetary values into currency units
pub const MICRO_UNITS: i64 = 1_000_000;

/// Cell content the reporting service emits for "no value"
pub const EMPTY_CELL_MARKER: &str = "--";

/// Significant digits kept when re-expressing a parsed float as an exact decimal
pub const NUMERIC_SIGNIFICANT_DIGITS: usize = 12;

/// Hours added to a parsed calendar date before interpreting it in UTC
pub const DATE_NOON_OFFSET_HOURS: i64 = 12;

// =============================================================================
// File Naming
// =============================================================================

/// Prefix of raw report temp files written by the on-disk variant
pub const DOWNLOAD_TEMP_PREFIX: &str = "reportDownload-";

/// Suffix of raw report temp files written by the on-disk variant
pub const DOWNLOAD_TEMP_SUFFIX: &str = ".report";

/// Suffix appended to a raw report path for its decompressed copy
pub const GUNZIP_SUFFIX: &str = ".gunzip";

/// Extension of compressed reports in a local report directory
pub const REPORT_FILE_EXTENSION: &str = "csv.gz";

/// Extension of entity store files written by the JSON lines store
pub const JSONL_EXTENSION: &str = "jsonl";

// =============================================================================
// Configuration
// =============================================================================

/// Prefix of environment variables overriding configuration values
pub const ENV_PREFIX: &str = "REPORT_INGESTOR_";

/// Application directory name under the platform config directory
pub const APP_DIR_NAME: &str = "report-ingestor";

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Build the raw temp file prefix for one report download
pub fn download_temp_prefix(report_type: &str, account_id: &str) -> String {
    format!("{}{}-{}-", DOWNLOAD_TEMP_PREFIX, report_type, account_id)
}

/// Check whether a first cell marks the trailer row
pub fn is_trailer_cell(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case(TRAILER_TOKEN)
}
