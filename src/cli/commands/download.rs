//! Download command: save raw and decompressed reports to disk
//!
//! With `--ingest-into` the saved files are then pushed through the row
//! pipeline into a JSON lines store on the same worker pool.

use super::ingest::RECORD_INDEX_FIELDS;
use super::shared::{
    RunContext, RunSummary, build_coordinator, create_progress_bar, prepare_run, print_summary,
    setup_logging,
};
use crate::app::models::ReportType;
use crate::app::services::job_planner;
use crate::app::services::persistence::{BatchPersistenceSink, EntityStore, JsonLinesEntityStore};
use crate::app::services::report_csv::{AccountPerformanceRow, CampaignPerformanceRow, ReportRow};
use crate::cli::args::DownloadArgs;
use crate::{Error, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the download command
pub async fn run_download(
    args: DownloadArgs,
    cancellation_token: CancellationToken,
) -> Result<RunSummary> {
    setup_logging(&args.run)?;
    let mut context = prepare_run(&args.run)?;

    if let Some(output) = &args.output {
        std::fs::create_dir_all(output).map_err(|e| {
            Error::io(
                format!("Failed to create download directory {}", output.display()),
                e,
            )
        })?;
        context.config.temp_dir = Some(output.clone());
        context.config.validate()?;
    }

    let summary = match args.run.report_type {
        ReportType::AccountPerformance => {
            download_shape::<AccountPerformanceRow>(&args, &context, cancellation_token).await?
        }
        ReportType::CampaignPerformance => {
            download_shape::<CampaignPerformanceRow>(&args, &context, cancellation_token).await?
        }
    };

    print_summary(&args.run.output_format, &summary)?;
    Ok(summary)
}

async fn download_shape<R: ReportRow>(
    args: &DownloadArgs,
    context: &RunContext,
    cancellation_token: CancellationToken,
) -> Result<RunSummary> {
    let today = Utc::now().date_naive();
    let template = job_planner::job_template::<R>(
        &context.config,
        args.run.date_range,
        context.period,
        today,
    )?;
    let jobs = job_planner::plan_jobs::<R>(
        &context.config,
        &context.accounts,
        args.run.date_range,
        context.period,
        today,
    )?;

    let progress = args
        .run
        .show_progress()
        .then(|| create_progress_bar(jobs.len() as u64, "accounts downloaded"));
    let mut coordinator = build_coordinator(context, cancellation_token, progress.as_ref())?;

    let mut summary = RunSummary::new("download", R::REPORT_TYPE, context.accounts.len());
    let downloads = match coordinator.run_to_files(jobs).await {
        Ok(downloads) => downloads,
        Err(e) => {
            coordinator.shutdown();
            return Err(e);
        }
    };

    summary.accounts_succeeded = downloads.successes.len();
    summary.failures = downloads.failures.clone();
    summary.elapsed_seconds = downloads.elapsed.as_secs_f64();
    for download in &downloads.successes {
        summary
            .output_files
            .push((download.raw_path.display().to_string(), download.raw_bytes));
        summary
            .output_files
            .push((download.gunzip_path.display().to_string(), download.gunzip_bytes));
    }

    if let Some(store_dir) = &args.ingest_into {
        info!(
            "Ingesting {} downloaded reports into {}",
            downloads.successes.len(),
            store_dir.display()
        );
        let store: Arc<dyn EntityStore> = Arc::new(JsonLinesEntityStore::open(store_dir)?);
        store.ensure_index(R::REPORT_TYPE.as_str(), RECORD_INDEX_FIELDS)?;
        let sink = Arc::new(BatchPersistenceSink::<R>::new(store));

        if let Some(progress) = &progress {
            progress.inc_length(downloads.successes.len() as u64);
        }
        let ingested = coordinator
            .ingest_files::<R>(&template, &downloads.successes, sink)
            .await;

        match ingested {
            Ok(report) => {
                let downloaded = summary.accounts_succeeded;
                summary.absorb_ingestion(&report);
                summary.accounts_succeeded = downloaded.min(report.successes.len());
            }
            Err(e) => {
                coordinator.shutdown();
                return Err(e);
            }
        }
    }

    coordinator.shutdown();
    if let Some(progress) = progress {
        progress.finish_with_message("download complete");
    }
    Ok(summary)
}
