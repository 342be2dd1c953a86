//! Data models for report acquisition and ingestion
//!
//! This module contains the core data structures shared by the fetch layer,
//! the row pipeline and the persistence hand-off: account identifiers, report
//! and date-range kinds, the immutable job descriptor and the stamped record.

use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Account Identifier
// =============================================================================

/// Numeric account identifier
///
/// Accounts are commonly written with dashes (`123-456-7890`); the dashes are
/// presentation only and are stripped on parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits: String = s.trim().chars().filter(|c| *c != '-').collect();
        digits
            .parse::<u64>()
            .map(AccountId)
            .map_err(|_| Error::data_validation(format!("Invalid account id '{}'", s)))
    }
}

// =============================================================================
// Report Type
// =============================================================================

/// Report definitions understood by the row pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "ACCOUNT_PERFORMANCE_REPORT")]
    AccountPerformance,
    #[serde(rename = "CAMPAIGN_PERFORMANCE_REPORT")]
    CampaignPerformance,
}

impl ReportType {
    /// All supported report types
    pub const ALL: [ReportType; 2] = [
        ReportType::AccountPerformance,
        ReportType::CampaignPerformance,
    ];

    /// Wire name of the report type
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::AccountPerformance => "ACCOUNT_PERFORMANCE_REPORT",
            ReportType::CampaignPerformance => "CAMPAIGN_PERFORMANCE_REPORT",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ReportType::ALL
            .into_iter()
            .find(|report_type| report_type.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::unknown_report_type(wanted))
    }
}

// =============================================================================
// Date Range Kind
// =============================================================================

/// Predefined reporting periods plus an explicit custom range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateRangeKind {
    #[serde(rename = "TODAY")]
    Today,
    #[serde(rename = "YESTERDAY")]
    Yesterday,
    #[serde(rename = "LAST_7_DAYS")]
    Last7Days,
    #[serde(rename = "LAST_14_DAYS")]
    Last14Days,
    #[serde(rename = "LAST_30_DAYS")]
    Last30Days,
    #[serde(rename = "LAST_WEEK")]
    LastWeek,
    #[serde(rename = "LAST_MONTH")]
    LastMonth,
    #[serde(rename = "THIS_MONTH")]
    ThisMonth,
    #[serde(rename = "CUSTOM_DATE")]
    CustomDate,
}

impl DateRangeKind {
    pub const ALL: [DateRangeKind; 9] = [
        DateRangeKind::Today,
        DateRangeKind::Yesterday,
        DateRangeKind::Last7Days,
        DateRangeKind::Last14Days,
        DateRangeKind::Last30Days,
        DateRangeKind::LastWeek,
        DateRangeKind::LastMonth,
        DateRangeKind::ThisMonth,
        DateRangeKind::CustomDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateRangeKind::Today => "TODAY",
            DateRangeKind::Yesterday => "YESTERDAY",
            DateRangeKind::Last7Days => "LAST_7_DAYS",
            DateRangeKind::Last14Days => "LAST_14_DAYS",
            DateRangeKind::Last30Days => "LAST_30_DAYS",
            DateRangeKind::LastWeek => "LAST_WEEK",
            DateRangeKind::LastMonth => "LAST_MONTH",
            DateRangeKind::ThisMonth => "THIS_MONTH",
            DateRangeKind::CustomDate => "CUSTOM_DATE",
        }
    }
}

impl fmt::Display for DateRangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DateRangeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        DateRangeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::unknown_date_range(wanted))
    }
}

// =============================================================================
// Report Job
// =============================================================================

/// Immutable unit of fetch work: one (account, report type, date range)
///
/// Built once per account before dispatch and consumed by exactly one fetch task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportJob {
    pub account_id: AccountId,
    pub report_type: ReportType,
    pub date_range: DateRangeKind,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Report columns to request, in header order
    pub requested_columns: Vec<String>,
    /// Keep rows whose impressions are zero; they are dropped otherwise
    #[serde(default)]
    pub include_zero_impressions: bool,
}

impl ReportJob {
    pub fn new(
        account_id: AccountId,
        report_type: ReportType,
        date_range: DateRangeKind,
        start_date: NaiveDate,
        end_date: NaiveDate,
        requested_columns: Vec<String>,
    ) -> Result<Self> {
        if start_date > end_date {
            return Err(Error::data_validation(format!(
                "Report job for account {} starts ({}) after it ends ({})",
                account_id, start_date, end_date
            )));
        }

        Ok(Self {
            account_id,
            report_type,
            date_range,
            start_date,
            end_date,
            requested_columns,
            include_zero_impressions: false,
        })
    }

    pub fn with_zero_impressions(mut self, include: bool) -> Self {
        self.include_zero_impressions = include;
        self
    }

    /// Copy of this job retargeted at another account
    pub fn for_account(&self, account_id: AccountId) -> Self {
        Self {
            account_id,
            ..self.clone()
        }
    }
}

// =============================================================================
// Mapped Record
// =============================================================================

/// Ingestion metadata stamped onto every mapped row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionMetadata {
    pub account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_account_id: Option<AccountId>,
    pub report_type: ReportType,
    pub date_range_type: DateRangeKind,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
}

impl IngestionMetadata {
    pub fn from_job(job: &ReportJob, top_account_id: Option<AccountId>) -> Self {
        Self {
            account_id: job.account_id,
            top_account_id,
            report_type: job.report_type,
            date_range_type: job.date_range,
            date_start: job.start_date,
            date_end: job.end_date,
        }
    }

    /// Deterministic identity key for a row carrying the given natural key parts
    ///
    /// Layout: `{report_type}-{account_id}-{natural...}-{date_range}-{date_start}`.
    /// Absent natural key parts are passed as empty strings and keep their slot.
    pub fn identity_key(&self, natural_key: &[String]) -> String {
        let mut key = format!("{}-{}", self.report_type, self.account_id);
        for part in natural_key {
            key.push('-');
            key.push_str(part);
        }
        key.push('-');
        key.push_str(self.date_range_type.as_str());
        key.push('-');
        key.push_str(&self.date_start.format("%Y%m%d").to_string());
        key
    }
}

/// A typed report row plus the metadata stamped on it during ingestion
///
/// Stamped exactly once at construction; no mutators are exposed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRecord<R> {
    id: String,
    #[serde(flatten)]
    metadata: IngestionMetadata,
    #[serde(flatten)]
    row: R,
}

impl<R> MappedRecord<R> {
    pub fn new(row: R, metadata: IngestionMetadata, natural_key: &[String]) -> Self {
        let id = metadata.identity_key(natural_key);
        Self { id, metadata, row }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> &IngestionMetadata {
        &self.metadata
    }

    pub fn row(&self) -> &R {
        &self.row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_job() -> ReportJob {
        ReportJob::new(
            AccountId(1234567890),
            ReportType::AccountPerformance,
            DateRangeKind::LastMonth,
            date(2024, 1, 1),
            date(2024, 1, 31),
            vec!["Day".to_string(), "Cost".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_account_id_strips_dashes() {
        assert_eq!("123-456-7890".parse::<AccountId>().unwrap(), AccountId(1234567890));
        assert_eq!(" 42 ".parse::<AccountId>().unwrap(), AccountId(42));
        assert!("abc".parse::<AccountId>().is_err());
        assert!("".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_report_type_names() {
        assert_eq!(
            "account_performance_report".parse::<ReportType>().unwrap(),
            ReportType::AccountPerformance
        );
        assert_eq!(ReportType::CampaignPerformance.to_string(), "CAMPAIGN_PERFORMANCE_REPORT");
        assert!(matches!(
            "KEYWORDS_REPORT".parse::<ReportType>(),
            Err(Error::UnknownReportType { .. })
        ));
    }

    #[test]
    fn test_date_range_names_round_trip() {
        for kind in DateRangeKind::ALL {
            assert_eq!(kind.as_str().parse::<DateRangeKind>().unwrap(), kind);
        }
        let json = serde_json::to_string(&DateRangeKind::Last7Days).unwrap();
        assert_eq!(json, "\"LAST_7_DAYS\"");
    }

    #[test]
    fn test_job_rejects_inverted_range() {
        let result = ReportJob::new(
            AccountId(1),
            ReportType::AccountPerformance,
            DateRangeKind::CustomDate,
            date(2024, 2, 1),
            date(2024, 1, 1),
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_key_is_stable() {
        let job = sample_job();
        let metadata = IngestionMetadata::from_job(&job, Some(AccountId(999)));
        let natural = vec!["2024-01-05".to_string(), String::new(), "Search".to_string()];

        let first = MappedRecord::new((), metadata.clone(), &natural);
        let second = MappedRecord::new((), metadata, &natural);

        assert_eq!(first.id(), second.id());
        assert_eq!(
            first.id(),
            "ACCOUNT_PERFORMANCE_REPORT-1234567890-2024-01-05--Search-LAST_MONTH-20240101"
        );
    }

    #[test]
    fn test_identity_key_differs_per_account() {
        let job = sample_job();
        let other = job.for_account(AccountId(42));
        let natural = vec!["2024-01-05".to_string()];

        let a = IngestionMetadata::from_job(&job, None).identity_key(&natural);
        let b = IngestionMetadata::from_job(&other, None).identity_key(&natural);
        assert_ne!(a, b);
    }
}
