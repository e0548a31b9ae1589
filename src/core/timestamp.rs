// LogWatch - core/timestamp.rs
//
// Best-effort timestamp extraction from raw log lines.
// Core layer: pure logic, no I/O.
//
// Matchers are tried in a fixed order and the first one that both matches
// (unanchored search) and converts to a valid datetime wins. The order
// resolves lines containing several matchable substrings, so it must not be
// rearranged for "specificity".

use chrono::{NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Field layout of a matcher's capture groups.
#[derive(Debug, Clone, Copy)]
enum FieldOrder {
    /// year, month, day, hour, minute, second
    YmdHms,
    /// year, month, day (midnight implied)
    Ymd,
    /// month, day, year, hour, minute, second
    MdyHms,
}

struct TimestampMatcher {
    regex: Regex,
    order: FieldOrder,
}

/// Matcher sources in evaluation order.
const MATCHERS: &[(&str, FieldOrder)] = &[
    // 2024-01-15 12:30:45, 2024-01-15T12:30:45, 2024/01/15 12:30:45
    (
        r"([0-9]{4})[-/]([0-9]{2})[-/]([0-9]{2})[T\s]([0-9]{2}):([0-9]{2}):([0-9]{2})",
        FieldOrder::YmdHms,
    ),
    // 2024-01-15
    (r"([0-9]{4})[-/]([0-9]{2})[-/]([0-9]{2})", FieldOrder::Ymd),
    // 01-15-2024 12:30:45
    (
        r"([0-9]{2})[-/]([0-9]{2})[-/]([0-9]{4})\s+([0-9]{2}):([0-9]{2}):([0-9]{2})",
        FieldOrder::MdyHms,
    ),
    // [2024-01-15 12:30:45
    (
        r"\[([0-9]{4})[-/]([0-9]{2})[-/]([0-9]{2})[T\s]([0-9]{2}):([0-9]{2}):([0-9]{2})",
        FieldOrder::YmdHms,
    ),
];

fn matchers() -> &'static [TimestampMatcher] {
    static CELL: OnceLock<Vec<TimestampMatcher>> = OnceLock::new();
    CELL.get_or_init(|| {
        // Sources are fixed and exercised by the unit tests below.
        MATCHERS
            .iter()
            .map(|(src, order)| TimestampMatcher {
                regex: Regex::new(src).expect("timestamp matcher: invalid regex"),
                order: *order,
            })
            .collect()
    })
}

/// Extract the first recognisable timestamp from `line`.
///
/// Returns `None` for empty/whitespace lines, lines with no matchable
/// substring, and lines whose only candidates are out-of-range values.
pub fn parse_timestamp(line: &str) -> Option<NaiveDateTime> {
    if line.trim().is_empty() {
        return None;
    }
    matchers().iter().find_map(|m| {
        let caps = m.regex.captures(line)?;
        convert(&caps, m.order)
    })
}

fn convert(caps: &Captures<'_>, order: FieldOrder) -> Option<NaiveDateTime> {
    let field = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };
    let (year, month, day, hms) = match order {
        FieldOrder::YmdHms => (
            field(1)?,
            field(2)?,
            field(3)?,
            (field(4)?, field(5)?, field(6)?),
        ),
        FieldOrder::Ymd => (field(1)?, field(2)?, field(3)?, (0, 0, 0)),
        FieldOrder::MdyHms => (
            field(3)?,
            field(1)?,
            field(2)?,
            (field(4)?, field(5)?, field(6)?),
        ),
    };
    // Year 0 is representable in chrono but is not a calendar year.
    let year = i32::try_from(year).ok().filter(|y| *y >= 1)?;
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hms.0, hms.1, hms.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_iso_with_space_and_t() {
        assert_eq!(
            parse_timestamp("2024-01-15 12:30:45 ERROR boom"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
        assert_eq!(
            parse_timestamp("2024-01-15T12:30:45Z INFO ok"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
        assert_eq!(
            parse_timestamp("2024/01/15 12:30:45 slash separated"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
    }

    #[test]
    fn test_date_only_is_midnight() {
        assert_eq!(
            parse_timestamp("2024-01-15 something happened"),
            Some(dt(2024, 1, 15, 0, 0, 0))
        );
    }

    #[test]
    fn test_us_order() {
        assert_eq!(
            parse_timestamp("01/15/2024 12:30:45 Started"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
    }

    #[test]
    fn test_bracketed() {
        assert_eq!(
            parse_timestamp("[2024-01-15 12:30:45] ERROR"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
        assert_eq!(
            parse_timestamp("[2024-01-15T23:59:59] ERROR"),
            Some(dt(2024, 1, 15, 23, 59, 59))
        );
    }

    #[test]
    fn test_timestamp_mid_line() {
        assert_eq!(
            parse_timestamp("Some prefix 2024-01-15 12:30:45 INFO Message"),
            Some(dt(2024, 1, 15, 12, 30, 45))
        );
    }

    #[test]
    fn test_out_of_range_values_fall_through() {
        assert_eq!(parse_timestamp("99-99-9999 99:99:99 Invalid"), None);
        // The full ISO form is invalid (hour 25) so the date-only matcher wins.
        assert_eq!(
            parse_timestamp("2024-01-15 25:00:00 bad hour"),
            Some(dt(2024, 1, 15, 0, 0, 0))
        );
    }

    #[test]
    fn test_first_matcher_in_order_wins() {
        // Both a date-only and a US datetime are present; date-only is tried first.
        assert_eq!(
            parse_timestamp("02/03/2024 10:11:12 replayed from 2023-12-31"),
            Some(dt(2023, 12, 31, 0, 0, 0))
        );
    }

    #[test]
    fn test_no_timestamp() {
        assert_eq!(parse_timestamp("ERROR: something broke"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   \t  "), None);
    }

    #[test]
    fn test_calendar_edges() {
        assert_eq!(
            parse_timestamp("2024-02-29 00:00:00 leap"),
            Some(dt(2024, 2, 29, 0, 0, 0))
        );
        assert_eq!(parse_timestamp("2023-02-29 leap?"), None);
        assert_eq!(
            parse_timestamp("2023-12-31 23:59:59 eoy"),
            Some(dt(2023, 12, 31, 23, 59, 59))
        );
    }

    #[test]
    fn test_year_zero_is_not_a_timestamp() {
        assert_eq!(parse_timestamp("0000-01-15 12:00:00 ERROR x"), None);
        assert_eq!(
            parse_timestamp("0001-01-15 12:00:00 ERROR x"),
            Some(dt(1, 1, 15, 12, 0, 0))
        );
    }
}
