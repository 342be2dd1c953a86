//! Locale-ambiguous number parsing
//!
//! Report cells carry numbers in whatever format the account's locale produced:
//! `1,200,300.10`, `1.200.300,10`, `1 200 300.10` or `12,5%`. The separator that
//! appears first is the grouping separator. A lone comma is a decimal comma and a
//! lone dot is a decimal point.

use crate::constants::NUMERIC_SIGNIFICANT_DIGITS;
use crate::{Error, Result};
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::LazyLock;

/// Optionally signed decimal literal left after separator normalisation.
static DECIMAL_LITERAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)$").expect("valid regex"));

/// Separator convention detected in a number string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    /// Comma groups, dot is the decimal point (`1,200.10`)
    American,
    /// Dot groups, comma is the decimal point (`1.200,10`)
    Continental,
    /// No separator present
    Default,
}

impl NumberFormat {
    /// Detect the convention from the first comma and first dot
    pub fn detect(text: &str) -> Self {
        match (text.find(','), text.find('.')) {
            (None, None) => NumberFormat::Default,
            (None, Some(_)) => NumberFormat::American,
            (Some(_), None) => NumberFormat::Continental,
            (Some(comma), Some(dot)) if comma < dot => NumberFormat::American,
            (Some(_), Some(_)) => NumberFormat::Continental,
        }
    }

    /// Rewrite `text` into a plain dot-decimal literal
    fn normalize(&self, text: &str) -> String {
        match self {
            NumberFormat::American | NumberFormat::Default => text.replace(',', ""),
            NumberFormat::Continental => text.replace('.', "").replace(',', "."),
        }
    }
}

/// Parse a number string into an exact decimal with 12 significant digits
///
/// Whitespace and percent signs are dropped first. Returns
/// [`Error::NumberFormat`] when the remaining text is not a number.
pub fn parse_number(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r' | '%'))
        .collect();

    let normalized = NumberFormat::detect(&cleaned).normalize(&cleaned);
    if !DECIMAL_LITERAL_RE.is_match(&normalized) {
        return Err(Error::number_format(text));
    }

    let value: f64 = normalized
        .parse()
        .map_err(|_| Error::number_format(text))?;

    to_significant_digits(value).ok_or_else(|| Error::number_format(text))
}

/// Parse, mapping failure to `None`
pub fn parse_number_opt(text: &str) -> Option<Decimal> {
    parse_number(text).ok()
}

/// Render with exactly two fractional digits, no grouping, half-even rounding
pub fn format_human_readable(value: &Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    format!("{:.2}", rounded)
}

fn to_significant_digits(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    if value == 0.0 {
        return Some(Decimal::ZERO);
    }

    let scientific = format!("{:.*e}", NUMERIC_SIGNIFICANT_DIGITS - 1, value);
    let decimal = match Decimal::from_scientific(&scientific) {
        Ok(decimal) => decimal,
        // Below the decimal scale limit; keep what fits
        Err(_) => Decimal::from_f64(value)?,
    };
    Some(decimal.normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(text: &str) -> Decimal {
        Decimal::from_str(text).unwrap()
    }

    fn assert_close(actual: Decimal, expected: &str) {
        let diff = (actual - dec(expected)).abs();
        assert!(
            diff <= dec("0.0000001"),
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_american_continental_and_spaced_forms_agree() {
        assert_close(parse_number("1,200,300.10").unwrap(), "1200300.10");
        assert_close(parse_number("1.200.300,10").unwrap(), "1200300.10");
        assert_close(parse_number("1 200 300.10").unwrap(), "1200300.10");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(NumberFormat::detect("1,200.5"), NumberFormat::American);
        assert_eq!(NumberFormat::detect("1.200,5"), NumberFormat::Continental);
        assert_eq!(NumberFormat::detect("1200.5"), NumberFormat::American);
        assert_eq!(NumberFormat::detect("12,5"), NumberFormat::Continental);
        assert_eq!(NumberFormat::detect("1200"), NumberFormat::Default);
    }

    #[test]
    fn test_lone_separator_is_the_decimal_point() {
        assert_eq!(parse_number("12,5%").unwrap(), dec("12.5"));
        assert_eq!(parse_number("1,2").unwrap(), dec("1.2"));
        assert_eq!(parse_number("12.5").unwrap(), dec("12.5"));
        assert_eq!(parse_number("-0,75").unwrap(), dec("-0.75"));
        assert_eq!(parse_number("1200").unwrap(), dec("1200"));
    }

    #[test]
    fn test_repeated_lone_comma_is_not_a_number() {
        assert!(parse_number("1,200,300").is_err());
    }

    #[test]
    fn test_percent_and_whitespace_are_stripped() {
        assert_eq!(parse_number("12.34%").unwrap(), dec("12.34"));
        assert_eq!(parse_number(" \t5.5\r\n").unwrap(), dec("5.5"));
        assert_eq!(parse_number("-3.25 %").unwrap(), dec("-3.25"));
    }

    #[test]
    fn test_twelve_significant_digits() {
        assert_eq!(parse_number("0.1").unwrap(), dec("0.1"));
        assert_eq!(parse_number("1234567.123456789").unwrap(), dec("1234567.12346"));
        assert_eq!(parse_number("0").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_rejects_non_numbers() {
        for input in ["", "   ", "%", "abc", "1.2.3", "1,2,3,4.5.6", "inf", "NaN", "--", "1e5"] {
            assert!(
                matches!(parse_number(input), Err(Error::NumberFormat { .. })),
                "expected failure for {:?}",
                input
            );
        }
        assert_eq!(parse_number_opt("x"), None);
    }

    #[test]
    fn test_format_human_readable() {
        assert_eq!(format_human_readable(&dec("1200300.1")), "1200300.10");
        assert_eq!(format_human_readable(&dec("0")), "0.00");
        assert_eq!(format_human_readable(&dec("2.345")), "2.34");
        assert_eq!(format_human_readable(&dec("2.355")), "2.36");
        assert_eq!(format_human_readable(&dec("-7.1")), "-7.10");
    }
}
