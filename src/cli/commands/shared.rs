//! Shared components for CLI commands
//!
//! Logging setup, layered configuration, run preparation and summary output
//! used by both the ingest and download commands.

use crate::app::models::{AccountId, ReportType};
use crate::app::services::fetch::{
    AccountIngestion, DirectoryReportSource, FailedAccount, FetchCoordinator, RunReport,
    SessionTemplate,
};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::IngestConfig;
use crate::{Error, Result};
use chrono::NaiveDate;
use colored::Colorize;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one CLI run, reported in human or JSON form
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub command: String,
    pub report_type: Option<ReportType>,
    pub accounts_requested: usize,
    pub accounts_succeeded: usize,
    pub failures: Vec<FailedAccount>,
    pub records_ingested: usize,
    pub batches_flushed: usize,
    /// Produced files with their sizes in bytes
    pub output_files: Vec<(String, u64)>,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn new(command: &str, report_type: ReportType, accounts_requested: usize) -> Self {
        Self {
            command: command.to_string(),
            report_type: Some(report_type),
            accounts_requested,
            ..Self::default()
        }
    }

    /// Fold an ingestion run into the summary
    pub fn absorb_ingestion(&mut self, report: &RunReport<AccountIngestion>) {
        self.accounts_succeeded = report.successes.len();
        self.records_ingested += report
            .successes
            .iter()
            .map(|ingestion| ingestion.summary.records_flushed)
            .sum::<usize>();
        self.batches_flushed += report
            .successes
            .iter()
            .map(|ingestion| ingestion.summary.batches_flushed)
            .sum::<usize>();
        self.failures.extend(report.failures.iter().cloned());
        self.elapsed_seconds += report.elapsed.as_secs_f64();
    }

    pub fn total_output_size(&self) -> u64 {
        self.output_files.iter().map(|(_, size)| size).sum()
    }

    /// Format a byte count in human-readable form
    pub fn format_size(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", bytes, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

/// Everything a command needs before dispatching jobs
#[derive(Debug)]
pub struct RunContext {
    pub config: IngestConfig,
    pub source: Arc<DirectoryReportSource>,
    pub accounts: Vec<AccountId>,
    pub period: Option<(NaiveDate, NaiveDate)>,
}

/// Set up structured logging on stderr
pub fn setup_logging(args: &RunArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("report_ingestor={}", log_level)));

    let installed = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    installed.map_err(|e| Error::configuration(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load configuration using the layered approach (file -> env -> args)
pub fn load_configuration(args: &RunArgs) -> Result<IngestConfig> {
    info!("Loading configuration");

    let default_config_path = if args.config_file.is_none() {
        IngestConfig::default_config_path().ok()
    } else {
        None
    };

    let config_file = match &args.config_file {
        Some(path) => Some(path.as_path()),
        None => default_config_path
            .as_ref()
            .filter(|path| path.exists())
            .map(|path| path.as_path()),
    };

    if let Some(config_path) = config_file {
        info!("Using config file: {}", config_path.display());
    } else {
        info!("No config file found, using defaults and environment variables");
    }

    let mut config = IngestConfig::load_layered(config_file)?;
    apply_cli_overrides(&mut config, args);
    config.validate()?;

    Ok(config)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut IngestConfig, args: &RunArgs) {
    if let Some(threads) = args.threads {
        config.num_threads = threads;
    }
    if let Some(retries) = args.retries {
        config.retries_count = retries;
    }
    if let Some(backoff_ms) = args.backoff_ms {
        config.backoff_interval_ms = backoff_ms;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(top_account) = &args.top_account {
        config.top_account_id = Some(top_account.clone());
    }
    if args.include_zero_impressions {
        config.include_zero_impressions = true;
    }
}

/// Validate arguments, load configuration and resolve the account set
pub fn prepare_run(args: &RunArgs) -> Result<RunContext> {
    args.validate()?;
    let config = load_configuration(args)?;
    let source = Arc::new(DirectoryReportSource::new(&args.source)?);

    let accounts = match &args.accounts {
        Some(list) => list.accounts.clone(),
        None => source.list_accounts()?,
    };
    if accounts.is_empty() {
        warn!("No accounts to fetch under {}", args.source.display());
    }

    Ok(RunContext {
        config,
        source,
        accounts,
        period: args.explicit_period()?,
    })
}

/// Initialized coordinator over the run's report source
pub fn build_coordinator(
    context: &RunContext,
    cancellation_token: CancellationToken,
    progress: Option<&ProgressBar>,
) -> Result<FetchCoordinator> {
    let mut sessions = SessionTemplate::new(format!(
        "{}/{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(manager) = context.config.top_account()? {
        sessions = sessions.with_manager_account(manager);
    }

    let mut coordinator =
        FetchCoordinator::new(context.config.clone(), context.source.clone(), sessions)
            .with_cancellation_token(cancellation_token);
    if let Some(progress) = progress {
        coordinator = coordinator.with_progress(progress.clone());
    }
    coordinator.initialize()?;
    Ok(coordinator)
}

/// Create a progress bar with appropriate styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} [{per_sec}] ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Print the run summary in the requested format
pub fn print_summary(format: &OutputFormat, summary: &RunSummary) -> Result<()> {
    match format {
        OutputFormat::Human => print_human_summary(summary),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
            Ok(())
        }
    }
}

fn print_human_summary(summary: &RunSummary) -> Result<()> {
    let duration = HumanDuration(Duration::from_secs_f64(summary.elapsed_seconds));
    let report_type = summary
        .report_type
        .map(|report_type| report_type.to_string())
        .unwrap_or_default();

    println!("\n{}", format!("Report {} complete", summary.command).bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   • Report type: {}", report_type);
    println!("   • Accounts requested: {}", summary.accounts_requested);
    println!(
        "   • Accounts succeeded: {}",
        summary.accounts_succeeded.to_string().green()
    );
    if summary.records_ingested > 0 {
        println!("   • Records ingested: {}", summary.records_ingested);
        println!("   • Batches flushed: {}", summary.batches_flushed);
    }
    if !summary.output_files.is_empty() {
        println!(
            "   • Total output size: {}",
            RunSummary::format_size(summary.total_output_size())
        );
    }
    println!("   • Fetch time: {}", duration);

    if !summary.failures.is_empty() {
        println!(
            "\n{}",
            format!("Failed accounts: {}", summary.failures.len()).red().bold()
        );
        for failure in &summary.failures {
            println!(
                "   • {} ({} attempts): {}",
                failure.account_id.to_string().red(),
                failure.attempts,
                failure.reason
            );
        }
    }

    if !summary.output_files.is_empty() {
        println!("\nOutput files:");
        for (path, size) in &summary.output_files {
            println!("   • {}: {}", path, RunSummary::format_size(*size));
        }
    }

    println!();
    Ok(())
}
