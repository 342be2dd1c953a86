//! Report job planning
//!
//! Turns a report type, a date range and a set of accounts into one
//! [`ReportJob`] per account, resolving predefined ranges relative to a
//! reference day and selecting the columns to request.

use crate::app::models::{AccountId, DateRangeKind, ReportJob};
use crate::app::services::date_ranges;
use crate::app::services::report_csv::ReportRow;
use crate::config::IngestConfig;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::debug;

/// Inclusive bounds of the reporting period for `kind`
///
/// Explicit bounds are required for `CUSTOM_DATE` and override the computed
/// range for every other kind.
pub fn resolve_period(
    kind: DateRangeKind,
    explicit: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    if let Some(bounds) = explicit {
        return Ok(bounds);
    }

    date_ranges::resolve(kind, today)
        .map(|range| (range.start, range.end))
        .ok_or_else(|| {
            Error::configuration(format!(
                "Date range {} needs explicit start and end dates",
                kind
            ))
        })
}

/// Column selectors to request for shape `R`
///
/// With no configured inclusion list every column is requested. Configured
/// names may be given as report headers or as selectors.
pub fn requested_columns<R: ReportRow>(config: &IngestConfig) -> Result<Vec<String>> {
    let Some(included) = config.report_columns.get(&R::REPORT_TYPE) else {
        return Ok(R::selectors().into_iter().map(str::to_string).collect());
    };

    for name in included {
        let known = R::fields()
            .iter()
            .any(|field| field.header == name || field.selector == name);
        if !known {
            return Err(Error::configuration(format!(
                "Column '{}' is not part of {}",
                name,
                R::REPORT_TYPE
            )));
        }
    }

    Ok(R::fields()
        .iter()
        .filter(|field| {
            included
                .iter()
                .any(|name| name == field.header || name == field.selector)
        })
        .map(|field| field.selector.to_string())
        .collect())
}

/// Job for shape `R` that later gets retargeted per account
pub fn job_template<R: ReportRow>(
    config: &IngestConfig,
    kind: DateRangeKind,
    explicit: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Result<ReportJob> {
    let (start, end) = resolve_period(kind, explicit, today)?;
    let job = ReportJob::new(
        AccountId(0),
        R::REPORT_TYPE,
        kind,
        start,
        end,
        requested_columns::<R>(config)?,
    )?
    .with_zero_impressions(config.include_zero_impressions);
    Ok(job)
}

/// One job per distinct account, in account order
pub fn plan_jobs<R: ReportRow>(
    config: &IngestConfig,
    accounts: &[AccountId],
    kind: DateRangeKind,
    explicit: Option<(NaiveDate, NaiveDate)>,
    today: NaiveDate,
) -> Result<Vec<ReportJob>> {
    let template = job_template::<R>(config, kind, explicit, today)?;
    let distinct: BTreeSet<AccountId> = accounts.iter().copied().collect();

    debug!(
        "Planned {} {} jobs for {} to {}",
        distinct.len(),
        R::REPORT_TYPE,
        template.start_date,
        template.end_date
    );

    Ok(distinct
        .into_iter()
        .map(|account_id| template.for_account(account_id))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::ReportType;
    use crate::app::services::report_csv::{AccountPerformanceRow, CampaignPerformanceRow};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_plan_jobs_deduplicates_accounts() {
        let accounts = [AccountId(3), AccountId(1), AccountId(3)];
        let jobs = plan_jobs::<AccountPerformanceRow>(
            &IngestConfig::default(),
            &accounts,
            DateRangeKind::LastMonth,
            None,
            day(2024, 3, 15),
        )
        .unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].account_id, AccountId(1));
        assert_eq!(jobs[1].account_id, AccountId(3));
        assert_eq!(jobs[0].start_date, day(2024, 2, 1));
        assert_eq!(jobs[0].end_date, day(2024, 2, 29));
        assert_eq!(jobs[0].report_type, ReportType::AccountPerformance);
    }

    #[test]
    fn test_custom_date_requires_bounds() {
        let result = resolve_period(DateRangeKind::CustomDate, None, day(2024, 1, 1));
        assert!(matches!(result, Err(Error::Configuration { .. })));

        let bounds = (day(2023, 5, 1), day(2023, 5, 9));
        assert_eq!(
            resolve_period(DateRangeKind::CustomDate, Some(bounds), day(2024, 1, 1)).unwrap(),
            bounds
        );
    }

    #[test]
    fn test_inverted_custom_bounds_are_rejected() {
        let result = job_template::<AccountPerformanceRow>(
            &IngestConfig::default(),
            DateRangeKind::CustomDate,
            Some((day(2024, 2, 1), day(2024, 1, 1))),
            day(2024, 3, 1),
        );
        assert!(matches!(result, Err(Error::DataValidation { .. })));
    }

    #[test]
    fn test_all_columns_requested_by_default() {
        let columns =
            requested_columns::<CampaignPerformanceRow>(&IngestConfig::default()).unwrap();
        assert_eq!(columns.len(), CampaignPerformanceRow::fields().len());
        assert!(columns.contains(&"Amount".to_string()));
    }

    #[test]
    fn test_inclusion_list_filters_in_registry_order() {
        let config = IngestConfig::default().with_report_columns(
            ReportType::AccountPerformance,
            vec!["Clicks".to_string(), "Day".to_string()],
        );
        let columns = requested_columns::<AccountPerformanceRow>(&config).unwrap();
        assert_eq!(columns, vec!["Date".to_string(), "Clicks".to_string()]);
    }

    #[test]
    fn test_unknown_included_column_is_rejected() {
        let config = IngestConfig::default().with_report_columns(
            ReportType::AccountPerformance,
            vec!["Bogus".to_string()],
        );
        assert!(requested_columns::<AccountPerformanceRow>(&config).is_err());
    }

    #[test]
    fn test_zero_impressions_flag_is_carried() {
        let mut config = IngestConfig::default();
        config.include_zero_impressions = true;
        let job = job_template::<AccountPerformanceRow>(
            &config,
            DateRangeKind::Yesterday,
            None,
            day(2024, 3, 1),
        )
        .unwrap();
        assert!(job.include_zero_impressions);
        assert_eq!(job.start_date, day(2024, 2, 29));
    }
}
