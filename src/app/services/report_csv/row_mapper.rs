//! Header capture and row-to-record mapping
//!
//! The mapper resolves each header cell against the record shape's registry once,
//! then maps every following row by column index. Unknown header cells are
//! ignored so reports that grow new columns keep loading.
//!
//! Cells bound for text fields are stored exactly as read. All other cells are
//! trimmed before coercion, and an empty or `--` cell leaves the field unset.

use super::field_registry::{FieldDescriptor, FieldKind, FieldValue, ReportRow};
use crate::app::services::{date_parser, number_parser};
use crate::constants::{EMPTY_CELL_MARKER, MICRO_UNITS};
use crate::{Error, Result};
use csv::StringRecord;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;
use tracing::debug;

/// Column-index to field mapping for one record shape
#[derive(Debug)]
pub struct RowMapper<R: ReportRow> {
    columns: Option<Vec<Option<&'static FieldDescriptor<R>>>>,
    headers: Vec<String>,
}

impl<R: ReportRow> Default for RowMapper<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ReportRow> RowMapper<R> {
    pub fn new() -> Self {
        Self {
            columns: None,
            headers: Vec::new(),
        }
    }

    /// Build the column mapping from a header row
    ///
    /// Returns the number of columns bound to a field.
    pub fn capture_header(&mut self, header: &StringRecord) -> usize {
        let mut columns = Vec::with_capacity(header.len());
        let mut ignored = Vec::new();

        for cell in header.iter() {
            let name = cell.trim();
            let descriptor = R::field_by_header(name);
            if descriptor.is_none() {
                ignored.push(name.to_string());
            }
            columns.push(descriptor);
        }

        let mapped = columns.iter().filter(|column| column.is_some()).count();
        if !ignored.is_empty() {
            debug!(
                "{}: ignoring {} unknown column(s): {:?}",
                R::REPORT_TYPE,
                ignored.len(),
                ignored
            );
        }

        self.headers = header.iter().map(|cell| cell.trim().to_string()).collect();
        self.columns = Some(columns);
        mapped
    }

    /// Header cells that did not match any field
    pub fn unmapped_headers(&self) -> Vec<&str> {
        match &self.columns {
            Some(columns) => self
                .headers
                .iter()
                .zip(columns)
                .filter(|(_, column)| column.is_none())
                .map(|(header, _)| header.as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Map one data row onto a fresh record
    ///
    /// Any coercion failure aborts the whole row with [`Error::RowMapping`]
    /// naming the column index and the raw cell content.
    pub fn map_row(&self, row: &StringRecord) -> Result<R> {
        let columns = self.columns.as_ref().ok_or(Error::HeaderNotCaptured)?;
        let mut record = R::default();

        for (index, descriptor) in columns.iter().enumerate() {
            let Some(descriptor) = descriptor else {
                continue;
            };
            let Some(raw) = row.get(index) else {
                continue;
            };

            let value = coerce_cell(descriptor, raw)
                .map_err(|reason| Error::row_mapping(index, descriptor.header, raw, reason))?;

            if let Some(value) = value {
                if !(descriptor.assign)(&mut record, value) {
                    return Err(Error::row_mapping(
                        index,
                        descriptor.header,
                        raw,
                        format!("field '{}' rejected the value", descriptor.name),
                    ));
                }
            }
        }

        Ok(record)
    }
}

/// Coerce a raw cell for `descriptor`; `Ok(None)` leaves the field unset
fn coerce_cell<R>(
    descriptor: &FieldDescriptor<R>,
    raw: &str,
) -> std::result::Result<Option<FieldValue>, String> {
    if descriptor.kind == FieldKind::Text {
        return Ok(Some(FieldValue::Text(raw.to_string())));
    }

    let cell = raw.trim();
    if cell.is_empty() || cell == EMPTY_CELL_MARKER {
        return Ok(None);
    }

    match descriptor.kind {
        FieldKind::Text => Ok(Some(FieldValue::Text(raw.to_string()))),
        FieldKind::Date => Ok(date_parser::parse_date(cell).map(FieldValue::Date)),
        FieldKind::Decimal if descriptor.monetary => {
            from_micro_units(cell).map(|value| Some(FieldValue::Decimal(value)))
        }
        FieldKind::Decimal => number_parser::parse_number(cell)
            .map(|value| Some(FieldValue::Decimal(value)))
            .map_err(|e| e.to_string()),
        FieldKind::Integer => {
            let value = if descriptor.monetary {
                from_micro_units(cell)?
            } else {
                number_parser::parse_number(cell).map_err(|e| e.to_string())?
            };
            if !value.fract().is_zero() {
                return Err(format!("expected a whole number, got {}", value));
            }
            value
                .to_i64()
                .map(|value| Some(FieldValue::Integer(value)))
                .ok_or_else(|| format!("{} is out of range", value))
        }
    }
}

/// Micro-unit integer text to currency units
fn from_micro_units(cell: &str) -> std::result::Result<Decimal, String> {
    let micros = Decimal::from_str(cell).map_err(|e| format!("invalid monetary amount: {}", e))?;
    Ok(micros / Decimal::from(MICRO_UNITS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::report_csv::record_shapes::AccountPerformanceRow;
    use chrono::NaiveDate;

    fn record(cells: &[&str]) -> StringRecord {
        StringRecord::from(cells.to_vec())
    }

    fn mapper(header: &[&str]) -> RowMapper<AccountPerformanceRow> {
        let mut mapper = RowMapper::new();
        mapper.capture_header(&record(header));
        mapper
    }

    #[test]
    fn test_map_before_header_fails() {
        let mapper = RowMapper::<AccountPerformanceRow>::new();
        assert!(matches!(
            mapper.map_row(&record(&["1"])),
            Err(Error::HeaderNotCaptured)
        ));
    }

    #[test]
    fn test_unknown_headers_are_ignored() {
        let mut mapper = RowMapper::<AccountPerformanceRow>::new();
        let mapped = mapper.capture_header(&record(&["Day", "Brand New Column", "Clicks"]));
        assert_eq!(mapped, 2);
        assert_eq!(mapper.unmapped_headers(), vec!["Brand New Column"]);

        let row = mapper.map_row(&record(&["2024-01-05", "whatever", "12"])).unwrap();
        assert_eq!(row.metrics.day, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(row.metrics.clicks, Some(12));
    }

    #[test]
    fn test_text_is_not_trimmed_but_numbers_are() {
        let mapper = mapper(&["Device", "Impressions"]);
        let row = mapper.map_row(&record(&["  Mobile ", " 1,234.0 "])).unwrap();
        assert_eq!(row.metrics.device.as_deref(), Some("  Mobile "));
        assert_eq!(row.metrics.impressions, Some(1234));
    }

    #[test]
    fn test_monetary_columns_are_divided() {
        let mapper = mapper(&["Cost", "Avg. CPC"]);
        let row = mapper.map_row(&record(&["1500000", "250000"])).unwrap();
        assert_eq!(row.metrics.cost, Some(Decimal::from_str("1.5").unwrap()));
        assert_eq!(row.metrics.avg_cpc, Some(Decimal::from_str("0.25").unwrap()));
    }

    #[test]
    fn test_percent_and_locale_decimals() {
        let mapper = mapper(&["CTR", "Avg. position"]);
        let row = mapper.map_row(&record(&["4,56%", "1,3"])).unwrap();
        assert_eq!(row.metrics.ctr, Some(Decimal::from_str("4.56").unwrap()));
        assert_eq!(row.metrics.avg_position, Some(Decimal::from_str("1.3").unwrap()));
    }

    #[test]
    fn test_empty_and_marker_cells_leave_fields_unset() {
        let mapper = mapper(&["Clicks", "Cost", "Day"]);
        let row = mapper.map_row(&record(&["", "--", " "])).unwrap();
        assert_eq!(row.metrics.clicks, None);
        assert_eq!(row.metrics.cost, None);
        assert_eq!(row.metrics.day, None);
    }

    #[test]
    fn test_bad_date_is_a_soft_failure() {
        let mapper = mapper(&["Day", "Clicks"]);
        let row = mapper.map_row(&record(&["not a date", "3"])).unwrap();
        assert_eq!(row.metrics.day, None);
        assert_eq!(row.metrics.clicks, Some(3));
    }

    #[test]
    fn test_coercion_failure_names_column_and_content() {
        let mapper = mapper(&["Day", "Clicks"]);
        let error = mapper.map_row(&record(&["2024-01-01", "lots"])).unwrap_err();
        match error {
            Error::RowMapping {
                column,
                header,
                content,
                ..
            } => {
                assert_eq!(column, 1);
                assert_eq!(header, "Clicks");
                assert_eq!(content, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fractional_integer_is_rejected() {
        let mapper = mapper(&["Clicks"]);
        assert!(mapper.map_row(&record(&["2.5"])).is_err());
    }

    #[test]
    fn test_short_rows_leave_missing_columns_unset() {
        let mapper = mapper(&["Clicks", "Impressions"]);
        let row = mapper.map_row(&record(&["4"])).unwrap();
        assert_eq!(row.metrics.clicks, Some(4));
        assert_eq!(row.metrics.impressions, None);
    }
}
