//! Report date parsing and formatting
//!
//! Report cells and job parameters use three date shapes: `yyyy-MM-dd`,
//! `yyyy-MM` and `yyyyMMdd`. Parsing tries them in that order and the first
//! match wins. A parsed date is moved to noon before it is read as UTC so the
//! instant stays on the intended calendar day in every time zone.
//!
//! Parse failures are soft: callers get `None`, never an error.

use crate::constants::DATE_NOON_OFFSET_HOURS;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

static YEAR_MONTH_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").expect("valid regex"));

static YEAR_MONTH_DAY_NO_DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid regex"));

/// Accepted textual date shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `yyyy-MM-dd`
    YearMonthDay,
    /// `yyyy-MM`, day defaults to the first
    YearMonth,
    /// `yyyyMMdd`
    YearMonthDayNoDash,
}

/// Fallback chain, tried in order
pub const DATE_FORMATS: [DateFormat; 3] = [
    DateFormat::YearMonthDay,
    DateFormat::YearMonth,
    DateFormat::YearMonthDayNoDash,
];

impl DateFormat {
    /// Parse `text` strictly in this shape
    pub fn parse(&self, text: &str) -> Option<NaiveDate> {
        let (regex, has_day): (&Regex, bool) = match self {
            DateFormat::YearMonthDay => (&YEAR_MONTH_DAY_RE, true),
            DateFormat::YearMonth => (&YEAR_MONTH_RE, false),
            DateFormat::YearMonthDayNoDash => (&YEAR_MONTH_DAY_NO_DASH_RE, true),
        };

        let captures = regex.captures(text)?;
        let year: i32 = captures.get(1)?.as_str().parse().ok()?;
        let month: u32 = captures.get(2)?.as_str().parse().ok()?;
        let day: u32 = if has_day {
            captures.get(3)?.as_str().parse().ok()?
        } else {
            1
        };

        NaiveDate::from_ymd_opt(year, month, day)
    }

    /// Render a date in this shape
    pub fn format<D: Datelike>(&self, date: &D) -> String {
        match self {
            DateFormat::YearMonthDay => {
                format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
            }
            DateFormat::YearMonth => format!("{:04}-{:02}", date.year(), date.month()),
            DateFormat::YearMonthDayNoDash => {
                format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
            }
        }
    }
}

/// Parse a report date into a UTC instant at noon of that day
pub fn parse_date_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| format.parse(text))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| (midnight + Duration::hours(DATE_NOON_OFFSET_HOURS)).and_utc())
}

/// Parse a report date into its calendar day
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    parse_date_time(text).map(|instant| instant.date_naive())
}

/// `yyyyMMdd`
pub fn format_year_month_day_no_dash<D: Datelike>(date: &D) -> String {
    DateFormat::YearMonthDayNoDash.format(date)
}

/// `yyyy-MM-dd`
pub fn format_year_month_day<D: Datelike>(date: &D) -> String {
    DateFormat::YearMonthDay.format(date)
}

/// `yyyy-MM`
pub fn format_year_month<D: Datelike>(date: &D) -> String {
    DateFormat::YearMonth.format(date)
}

/// The calendar month before `now`, as `yyyy-MM`
pub fn last_month_in_year_month_format(now: DateTime<Utc>) -> String {
    let last_month = now.checked_sub_months(Months::new(1)).unwrap_or(now);
    format_year_month(&last_month)
}
