//! Ingest command: fetch reports and stream them into a JSON lines store

use super::shared::{
    RunContext, RunSummary, build_coordinator, create_progress_bar, prepare_run, print_summary,
    setup_logging,
};
use crate::app::models::ReportType;
use crate::app::services::fetch::{AccountIngestion, RunReport};
use crate::app::services::job_planner;
use crate::app::services::persistence::{BatchPersistenceSink, EntityStore, JsonLinesEntityStore};
use crate::app::services::report_csv::{AccountPerformanceRow, CampaignPerformanceRow, ReportRow};
use crate::cli::args::{IngestArgs, RunArgs};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Fields every stored record is indexed on
pub const RECORD_INDEX_FIELDS: &[&str] = &["account_id", "date_start"];

/// Run the ingest command
pub async fn run_ingest(
    args: IngestArgs,
    cancellation_token: CancellationToken,
) -> Result<RunSummary> {
    setup_logging(&args.run)?;
    let context = prepare_run(&args.run)?;

    let store: Arc<dyn EntityStore> = Arc::new(JsonLinesEntityStore::open(&args.output)?);
    info!("Writing records to {}", args.output.display());

    let report = match args.run.report_type {
        ReportType::AccountPerformance => {
            ingest_shape::<AccountPerformanceRow>(&args.run, &context, store, cancellation_token)
                .await?
        }
        ReportType::CampaignPerformance => {
            ingest_shape::<CampaignPerformanceRow>(&args.run, &context, store, cancellation_token)
                .await?
        }
    };

    let mut summary = RunSummary::new("ingest", args.run.report_type, context.accounts.len());
    summary.absorb_ingestion(&report);
    print_summary(&args.run.output_format, &summary)?;

    Ok(summary)
}

async fn ingest_shape<R: ReportRow>(
    args: &RunArgs,
    context: &RunContext,
    store: Arc<dyn EntityStore>,
    cancellation_token: CancellationToken,
) -> Result<RunReport<AccountIngestion>> {
    let jobs = job_planner::plan_jobs::<R>(
        &context.config,
        &context.accounts,
        args.date_range,
        context.period,
        Utc::now().date_naive(),
    )?;

    store.ensure_index(R::REPORT_TYPE.as_str(), RECORD_INDEX_FIELDS)?;
    let sink = Arc::new(BatchPersistenceSink::<R>::new(store));

    let progress = args
        .show_progress()
        .then(|| create_progress_bar(jobs.len() as u64, "accounts ingested"));
    let mut coordinator = build_coordinator(context, cancellation_token, progress.as_ref())?;

    let report = coordinator.run_in_memory::<R>(jobs, sink).await;
    coordinator.shutdown();

    if let Some(progress) = progress {
        progress.finish_with_message("ingestion complete");
    }
    report
}
