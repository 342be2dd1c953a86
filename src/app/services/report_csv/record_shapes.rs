//! Record shapes for the supported report definitions

use super::field_registry::{FieldDescriptor, ReportRow, report_field};
use crate::app::models::ReportType;
use crate::app::services::date_parser::format_year_month_day;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Performance columns shared by every performance report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub day: Option<NaiveDate>,
    pub month: Option<NaiveDate>,
    pub account_descriptive_name: Option<String>,
    pub cost: Option<Decimal>,
    pub clicks: Option<i64>,
    pub impressions: Option<i64>,
    pub conversions: Option<i64>,
    pub ctr: Option<Decimal>,
    pub avg_cpm: Option<Decimal>,
    pub avg_cpc: Option<Decimal>,
    pub avg_position: Option<Decimal>,
    pub currency_code: Option<String>,
    pub device: Option<String>,
    pub click_type: Option<String>,
    pub ad_network: Option<String>,
    pub ad_network_partners: Option<String>,
}

impl PerformanceMetrics {
    /// Segment columns that identify a row within one account and period
    fn segment_key(&self) -> Vec<String> {
        let period = self
            .day
            .or(self.month)
            .map(|date| format_year_month_day(&date))
            .unwrap_or_default();

        vec![
            period,
            self.ad_network.clone().unwrap_or_default(),
            self.ad_network_partners.clone().unwrap_or_default(),
            self.device.clone().unwrap_or_default(),
            self.click_type.clone().unwrap_or_default(),
        ]
    }
}

/// Registry for the shared performance columns, followed by any extra entries
macro_rules! performance_registry {
    ($row:ty $(, $extra:expr)* $(,)?) => {
        vec![
            report_field!($row, "Day" / "Date" => metrics.day: Date),
            report_field!($row, "Month" / "Month" => metrics.month: Date),
            report_field!($row, "Account" / "AccountDescriptiveName" => metrics.account_descriptive_name: Text),
            report_field!($row, "Cost" / "Cost" => metrics.cost: Decimal, monetary),
            report_field!($row, "Clicks" / "Clicks" => metrics.clicks: Integer),
            report_field!($row, "Impressions" / "Impressions" => metrics.impressions: Integer),
            report_field!($row, "Conv. (1-per-click)" / "Conversions" => metrics.conversions: Integer),
            report_field!($row, "CTR" / "Ctr" => metrics.ctr: Decimal),
            report_field!($row, "Avg. CPM" / "AverageCpm" => metrics.avg_cpm: Decimal, monetary),
            report_field!($row, "Avg. CPC" / "AverageCpc" => metrics.avg_cpc: Decimal, monetary),
            report_field!($row, "Avg. position" / "AveragePosition" => metrics.avg_position: Decimal),
            report_field!($row, "Currency" / "AccountCurrencyCode" => metrics.currency_code: Text),
            report_field!($row, "Device" / "Device" => metrics.device: Text),
            report_field!($row, "Click type" / "ClickType" => metrics.click_type: Text),
            report_field!($row, "Network" / "AdNetworkType1" => metrics.ad_network: Text),
            report_field!($row, "Network (with search partners)" / "AdNetworkType2" => metrics.ad_network_partners: Text),
            $($extra),*
        ]
    };
}

// =============================================================================
// Account Performance
// =============================================================================

/// One row of an account performance report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountPerformanceRow {
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
}

static ACCOUNT_PERFORMANCE_FIELDS: LazyLock<Vec<FieldDescriptor<AccountPerformanceRow>>> =
    LazyLock::new(|| performance_registry!(AccountPerformanceRow));

impl ReportRow for AccountPerformanceRow {
    const REPORT_TYPE: ReportType = ReportType::AccountPerformance;

    fn fields() -> &'static [FieldDescriptor<Self>] {
        ACCOUNT_PERFORMANCE_FIELDS.as_slice()
    }

    fn natural_key(&self) -> Vec<String> {
        self.metrics.segment_key()
    }

    fn impressions(&self) -> Option<i64> {
        self.metrics.impressions
    }
}

// =============================================================================
// Campaign Performance
// =============================================================================

/// One row of a campaign performance report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignPerformanceRow {
    pub campaign_id: Option<i64>,
    pub campaign_name: Option<String>,
    pub campaign_status: Option<String>,
    pub budget: Option<Decimal>,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
}

static CAMPAIGN_PERFORMANCE_FIELDS: LazyLock<Vec<FieldDescriptor<CampaignPerformanceRow>>> =
    LazyLock::new(|| {
        performance_registry!(
            CampaignPerformanceRow,
            report_field!(CampaignPerformanceRow, "Campaign ID" / "CampaignId" => campaign_id: Integer),
            report_field!(CampaignPerformanceRow, "Campaign" / "CampaignName" => campaign_name: Text),
            report_field!(CampaignPerformanceRow, "Campaign state" / "CampaignStatus" => campaign_status: Text),
            report_field!(CampaignPerformanceRow, "Budget" / "Amount" => budget: Decimal, monetary),
        )
    });

impl ReportRow for CampaignPerformanceRow {
    const REPORT_TYPE: ReportType = ReportType::CampaignPerformance;

    fn fields() -> &'static [FieldDescriptor<Self>] {
        CAMPAIGN_PERFORMANCE_FIELDS.as_slice()
    }

    fn natural_key(&self) -> Vec<String> {
        let mut key = vec![self.campaign_id.map(|id| id.to_string()).unwrap_or_default()];
        key.extend(self.metrics.segment_key());
        key
    }

    fn impressions(&self) -> Option<i64> {
        self.metrics.impressions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::report_csv::field_registry::{FieldKind, FieldValue};

    #[test]
    fn test_registries_have_unique_headers() {
        for headers in [AccountPerformanceRow::headers(), CampaignPerformanceRow::headers()] {
            let mut sorted = headers.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), headers.len());
        }
        assert_eq!(AccountPerformanceRow::fields().len(), 16);
        assert_eq!(CampaignPerformanceRow::fields().len(), 20);
    }

    #[test]
    fn test_monetary_columns() {
        let monetary: Vec<&str> = CampaignPerformanceRow::fields()
            .iter()
            .filter(|field| field.monetary)
            .map(|field| field.header)
            .collect();
        assert_eq!(monetary, vec!["Cost", "Avg. CPM", "Avg. CPC", "Budget"]);
    }

    #[test]
    fn test_assign_checks_kind() {
        let field = AccountPerformanceRow::field_by_header("Clicks").unwrap();
        assert_eq!(field.kind, FieldKind::Integer);

        let mut row = AccountPerformanceRow::default();
        assert!((field.assign)(&mut row, FieldValue::Integer(7)));
        assert_eq!(row.metrics.clicks, Some(7));
        assert!(!(field.assign)(&mut row, FieldValue::Text("7".to_string())));
        assert_eq!(row.metrics.clicks, Some(7));
    }

    #[test]
    fn test_header_lookup_is_case_sensitive() {
        assert!(AccountPerformanceRow::field_by_header("Cost").is_some());
        assert!(AccountPerformanceRow::field_by_header("cost").is_none());
        assert!(AccountPerformanceRow::field_by_header("Campaign ID").is_none());
    }

    #[test]
    fn test_campaign_natural_key_leads_with_campaign() {
        let row = CampaignPerformanceRow {
            campaign_id: Some(555),
            metrics: PerformanceMetrics {
                day: NaiveDate::from_ymd_opt(2024, 1, 2),
                device: Some("Mobile".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            row.natural_key(),
            vec!["555", "2024-01-02", "", "", "Mobile", ""]
        );
    }

    #[test]
    fn test_flattened_serialization() {
        let row = AccountPerformanceRow {
            metrics: PerformanceMetrics {
                clicks: Some(3),
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["clicks"], 3);
        assert!(json.get("metrics").is_none());
    }
}
