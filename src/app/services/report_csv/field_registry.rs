//! Statically declared field registries for report record shapes
//!
//! Every record shape lists its columns once: the header text the reporting
//! service emits, the destination field, the value kind and whether the column is
//! a micro-unit monetary amount. The row mapper consults the registry by column
//! index after header capture, so no name lookup happens per row.

use crate::app::models::ReportType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Value kind of a destination field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, stored verbatim (not trimmed)
    Text,
    /// Whole number
    Integer,
    /// Exact decimal
    Decimal,
    /// Calendar day
    Date,
}

/// A coerced cell value ready for assignment
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Integer(_) => FieldKind::Integer,
            FieldValue::Decimal(_) => FieldKind::Decimal,
            FieldValue::Date(_) => FieldKind::Date,
        }
    }
}

/// One registry entry: header name to destination field
pub struct FieldDescriptor<R> {
    /// Header cell text, matched case-sensitively
    pub header: &'static str,
    /// Column selector used when requesting the report
    pub selector: &'static str,
    /// Destination field name
    pub name: &'static str,
    pub kind: FieldKind,
    /// Cell holds micro units; divide by 1,000,000 before assignment
    pub monetary: bool,
    /// Store a value of `kind` into the record; false on a kind mismatch
    pub assign: fn(&mut R, FieldValue) -> bool,
}

impl<R> std::fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("header", &self.header)
            .field("selector", &self.selector)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("monetary", &self.monetary)
            .finish()
    }
}

/// A record shape the row pipeline can populate
pub trait ReportRow: Default + Clone + Serialize + Send + Sync + 'static {
    /// Report definition this shape is read from
    const REPORT_TYPE: ReportType;

    /// Registry of all mappable columns, in canonical header order
    fn fields() -> &'static [FieldDescriptor<Self>];

    /// Natural key columns distinguishing rows within one job, rendered as text
    fn natural_key(&self) -> Vec<String>;

    /// Impressions of the row, for shapes that carry the column
    fn impressions(&self) -> Option<i64> {
        None
    }

    /// Header names of every registered column
    fn headers() -> Vec<&'static str> {
        Self::fields().iter().map(|field| field.header).collect()
    }

    /// Request selectors of every registered column
    fn selectors() -> Vec<&'static str> {
        Self::fields().iter().map(|field| field.selector).collect()
    }

    /// Look up a registry entry by exact header name
    fn field_by_header(header: &str) -> Option<&'static FieldDescriptor<Self>> {
        Self::fields().iter().find(|field| field.header == header)
    }
}

/// Build a [`FieldDescriptor`] for a field path on a record type
///
/// `report_field!(Row, "Cost" / "Cost" => metrics.cost: Decimal, monetary)`
macro_rules! report_field {
    (@build $row:ty, $header:literal, $selector:literal, $monetary:expr, $kind:ident, $($path:ident).+) => {
        $crate::app::services::report_csv::field_registry::FieldDescriptor::<$row> {
            header: $header,
            selector: $selector,
            name: stringify!($($path).+),
            kind: $crate::app::services::report_csv::field_registry::FieldKind::$kind,
            monetary: $monetary,
            assign: |row: &mut $row, value: $crate::app::services::report_csv::field_registry::FieldValue| {
                match value {
                    $crate::app::services::report_csv::field_registry::FieldValue::$kind(v) => {
                        row.$($path).+ = Some(v);
                        true
                    }
                    _ => false,
                }
            },
        }
    };
    ($row:ty, $header:literal / $selector:literal => $($path:ident).+ : $kind:ident, monetary) => {
        report_field!(@build $row, $header, $selector, true, $kind, $($path).+)
    };
    ($row:ty, $header:literal / $selector:literal => $($path:ident).+ : $kind:ident) => {
        report_field!(@build $row, $header, $selector, false, $kind, $($path).+)
    };
}

pub(crate) use report_field;
