//! Date parsing and validation.
//!
//! `parse_month_date` is the one deliberately lenient normalizer: a
//! string it cannot read becomes an empty string, never an error.

use chrono::{NaiveDate, NaiveDateTime};

use super::NormalizeError;

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Best-effort parse of a month-resolution date ("March 2021",
/// "2021年3月") or a full ISO date into canonical `YYYY-MM-DD`, pinned
/// to the first of the month. Returns "" on anything unparseable.
pub fn parse_month_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.to_string();
    }

    // Month-resolution formats need a day pinned on before chrono will
    // produce a NaiveDate.
    let padded = format!("{s} 1");
    for fmt in ["%B %Y %d", "%b %Y %d", "%Y年%m月 %d"] {
        if let Ok(d) = NaiveDate::parse_from_str(&padded, fmt) {
            return d.to_string();
        }
    }

    String::new()
}

/// Parse a snapshot crawl timestamp. Malformed timestamps are a hard
/// error — a bad `_timestamp` would silently skew the latest-wins merge.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, NormalizeError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FMT)
        .map_err(|_| NormalizeError::BadTimestamp(raw.to_string()))
}

/// Render a crawl timestamp in the snapshot-column format.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FMT).to_string()
}

/// True when `date_str` is a well-formed `YYYY-MM-DD` date (optionally
/// blank). Used to gate currency conversion on enriched rows.
pub fn validate_date_str(date_str: &str, blankable: bool) -> bool {
    if date_str.is_empty() {
        return blankable;
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").is_ok()
}
