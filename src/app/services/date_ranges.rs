//! Date-range resolution for predefined reporting periods
//!
//! Each [`DateRangeKind`] other than `CUSTOM_DATE` resolves to a start day, an end
//! day and, for calendar-month ranges, the month the range represents. All
//! arithmetic is relative to a reference day supplied by the caller.

use crate::app::models::DateRangeKind;
use chrono::{Datelike, Days, Months, NaiveDate};

/// A resolved reporting period (inclusive on both ends)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Month represented by the range, set for month-aligned ranges only
    pub month: Option<NaiveDate>,
}

impl ResolvedRange {
    fn days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            month: None,
        }
    }
}

/// Resolve a predefined range relative to `today`
///
/// Returns `None` for `CUSTOM_DATE`, whose bounds must be given explicitly.
pub fn resolve(kind: DateRangeKind, today: NaiveDate) -> Option<ResolvedRange> {
    let range = match kind {
        DateRangeKind::Today => ResolvedRange::days(today, today),
        DateRangeKind::Yesterday => {
            let yesterday = days_before(today, 1);
            ResolvedRange::days(yesterday, yesterday)
        }
        DateRangeKind::Last7Days => ResolvedRange::days(days_before(today, 7), today),
        DateRangeKind::Last14Days => ResolvedRange::days(days_before(today, 14), today),
        DateRangeKind::Last30Days => ResolvedRange::days(days_before(today, 30), today),
        DateRangeKind::LastWeek => {
            // Monday through Sunday of the previous week
            let same_day_last_week = days_before(today, 7);
            let offset = u64::from(today.weekday().num_days_from_monday());
            ResolvedRange::days(
                days_before(same_day_last_week, offset),
                same_day_last_week
                    .checked_add_days(Days::new(6 - offset))
                    .unwrap_or(same_day_last_week),
            )
        }
        DateRangeKind::LastMonth => {
            let last_month = months_before(today, 1);
            ResolvedRange {
                start: first_of_month(last_month),
                end: days_before(first_of_month(today), 1),
                month: Some(last_month),
            }
        }
        DateRangeKind::ThisMonth => {
            let next_month = today.checked_add_months(Months::new(1)).unwrap_or(today);
            ResolvedRange {
                start: first_of_month(today),
                end: days_before(first_of_month(next_month), 1),
                month: Some(today),
            }
        }
        DateRangeKind::CustomDate => return None,
    };
    Some(range)
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_sub_days(Days::new(days)).unwrap_or(date)
}

fn months_before(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
