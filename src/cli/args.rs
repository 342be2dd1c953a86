//! Command-line argument definitions for the report ingestor
//!
//! This module defines the CLI interface using the clap derive API. Both
//! subcommands share [`RunArgs`] for source, accounts, period and tuning.

use crate::app::models::{AccountId, DateRangeKind, ReportType};
use crate::app::services::date_parser;
use crate::{Error, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// CLI arguments for the report ingestor
#[derive(Debug, Clone, Parser)]
#[command(
    name = "report-ingestor",
    version,
    about = "Fetch tabular performance reports for many accounts and ingest them as records",
    long_about = "Fetches one gzip-compressed CSV report per account on a bounded worker pool with \
                  retry and backoff, maps every row onto a typed record shape and hands bounded \
                  batches to an entity store. One failing account never stops the others."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Stream reports straight into a JSON lines entity store
    Ingest(IngestArgs),
    /// Save raw and decompressed reports to disk
    Download(DownloadArgs),
}

/// Options shared by every run
#[derive(Debug, Clone, clap::Args)]
pub struct RunArgs {
    /// Directory laid out as `<account id>/<REPORT_TYPE>.csv.gz`
    #[arg(
        short = 's',
        long = "source",
        value_name = "DIR",
        help = "Directory holding one sub-directory of reports per account"
    )]
    pub source: PathBuf,

    /// Accounts to fetch; every account directory under the source when omitted
    #[arg(
        short = 'a',
        long = "accounts",
        value_name = "LIST",
        help = "Comma-separated account ids (dashes allowed)"
    )]
    pub accounts: Option<AccountList>,

    #[arg(
        short = 't',
        long = "report-type",
        value_name = "TYPE",
        default_value = "ACCOUNT_PERFORMANCE_REPORT",
        help = "Report definition to fetch"
    )]
    pub report_type: ReportType,

    #[arg(
        short = 'r',
        long = "date-range",
        value_name = "RANGE",
        default_value = "LAST_MONTH",
        help = "Predefined date range (CUSTOM_DATE needs --start and --end)"
    )]
    pub date_range: DateRangeKind,

    #[arg(long = "start", value_name = "DATE", help = "First day (YYYYMMDD or YYYY-MM-DD)")]
    pub start: Option<String>,

    #[arg(long = "end", value_name = "DATE", help = "Last day (YYYYMMDD or YYYY-MM-DD)")]
    pub end: Option<String>,

    /// TOML configuration file; `<config dir>/report-ingestor/config.toml` when omitted
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    pub config_file: Option<PathBuf>,

    #[arg(short = 'j', long = "threads", value_name = "COUNT", help = "Worker pool size")]
    pub threads: Option<usize>,

    #[arg(long = "retries", value_name = "COUNT", help = "Maximum fetch attempts per account")]
    pub retries: Option<u32>,

    #[arg(long = "backoff-ms", value_name = "MS", help = "Base retry backoff in milliseconds")]
    pub backoff_ms: Option<u64>,

    #[arg(long = "batch-size", value_name = "COUNT", help = "Records per persistence batch")]
    pub batch_size: Option<usize>,

    #[arg(
        long = "top-account",
        value_name = "ID",
        help = "Manager account stamped on every record"
    )]
    pub top_account: Option<String>,

    #[arg(long = "include-zero-impressions", help = "Request rows with zero impressions")]
    pub include_zero_impressions: bool,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    #[arg(
        long = "output-format",
        value_enum,
        default_value = "human",
        help = "Output format for the run summary"
    )]
    pub output_format: OutputFormat,
}

/// Arguments for the ingest command
#[derive(Debug, Clone, Parser)]
pub struct IngestArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        default_value = "./output",
        help = "Directory of the JSON lines entity store"
    )]
    pub output: PathBuf,
}

/// Arguments for the download command
#[derive(Debug, Clone, Parser)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "DIR",
        help = "Directory for downloaded files (system temp dir when omitted)"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long = "ingest-into",
        value_name = "DIR",
        help = "After downloading, ingest the saved files into this JSON lines store"
    )]
    pub ingest_into: Option<PathBuf>,
}

/// Output format options for the run summary
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON format for scripting
    Json,
}

/// Wrapper for parsing comma-separated account lists
#[derive(Debug, Clone)]
pub struct AccountList {
    pub accounts: Vec<AccountId>,
}

impl FromStr for AccountList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let accounts = s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AccountId::from_str)
            .collect::<Result<Vec<_>>>()?;

        if accounts.is_empty() {
            return Err(Error::data_validation("Account list cannot be empty"));
        }

        Ok(AccountList { accounts })
    }
}

impl RunArgs {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Explicit period from `--start`/`--end`; both or neither must be given
    pub fn explicit_period(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        match (&self.start, &self.end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => Ok(Some((parse_day(start)?, parse_day(end)?))),
            _ => Err(Error::configuration(
                "--start and --end must be given together",
            )),
        }
    }

    /// Validate argument consistency before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            return Err(Error::configuration(format!(
                "Source path is not a directory: {}",
                self.source.display()
            )));
        }

        if let Some(config_file) = &self.config_file {
            if !config_file.exists() {
                return Err(Error::configuration(format!(
                    "Config file does not exist: {}",
                    config_file.display()
                )));
            }
        }

        if self.date_range == DateRangeKind::CustomDate && self.start.is_none() {
            return Err(Error::configuration(
                "CUSTOM_DATE needs --start and --end",
            ));
        }

        self.explicit_period()?;
        Ok(())
    }
}

fn parse_day(text: &str) -> Result<NaiveDate> {
    date_parser::parse_date(text)
        .ok_or_else(|| Error::data_validation(format!("Unrecognised date '{}'", text)))
}
