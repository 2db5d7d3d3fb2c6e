//! Upstream timestamp parsing.
//!
//! The directory service is inconsistent about timestamp formats. Besides RFC 3339 it
//! has been seen emitting:
//! - a space instead of `T` between date and time
//! - offsets without a colon (`+0800`) or without minutes (`+08`)
//! - no offset at all (treated as UTC)
//! - bare dates (`2024-05-01`, treated as midnight UTC)
//! - compact dates (`20240501`, treated as midnight UTC)
//! - epoch seconds or milliseconds (nine digits or more)

use crate::error::{Error, Result};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime};

/// Epoch values above this are interpreted as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Shorter digit runs are never epoch values.
const EPOCH_MIN_DIGITS: usize = 9;

/// Parse a timestamp string as reported by the directory service.
pub fn parse_upstream_timestamp(raw: &str) -> Result<OffsetDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTimestamp(raw.to_string()));
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let parsed = if trimmed.len() >= EPOCH_MIN_DIGITS {
            parse_epoch(trimmed)
        } else {
            parse_compact_date(trimmed)
        };
        return parsed.ok_or_else(|| Error::InvalidTimestamp(raw.to_string()));
    }

    let normalized = normalize_offset(trimmed);

    if let Ok(ts) = OffsetDateTime::parse(&normalized, &Rfc3339) {
        return Ok(ts);
    }

    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute][optional [:[second]]][optional [.[subsecond]]]"
    );
    if let Ok(ts) = PrimitiveDateTime::parse(&normalized, naive) {
        return Ok(ts.assume_utc());
    }

    if let Ok(date) = Date::parse(&normalized, format_description!("[year]-[month]-[day]")) {
        return Ok(date.midnight().assume_utc());
    }

    Err(Error::InvalidTimestamp(raw.to_string()))
}

/// Whether an outlet with the given validity timestamp is active at `now`.
///
/// Absent and unparseable timestamps count as active; only a parseable timestamp at
/// or before `now` makes the outlet inactive.
pub fn outlet_is_active(valid_until: Option<&str>, now: OffsetDateTime) -> bool {
    match valid_until {
        None => true,
        Some(raw) => match parse_upstream_timestamp(raw) {
            Ok(expires) => expires > now,
            Err(_) => {
                tracing::debug!(valid_until = raw, "Unparseable outlet validity, keeping active");
                true
            }
        },
    }
}

fn parse_epoch(digits: &str) -> Option<OffsetDateTime> {
    let value: i64 = digits.parse().ok()?;
    if value >= EPOCH_MILLIS_THRESHOLD {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(value) * 1_000_000).ok()
    } else {
        OffsetDateTime::from_unix_timestamp(value).ok()
    }
}

/// `YYYYMMDD` at midnight UTC.
fn parse_compact_date(digits: &str) -> Option<OffsetDateTime> {
    if digits.len() != 8 {
        return None;
    }
    let year: i32 = digits[..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    let date = Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()?;
    Some(date.midnight().assume_utc())
}

/// Rewrite the irregular forms into something the RFC 3339 parser accepts.
fn normalize_offset(raw: &str) -> String {
    let mut s = raw.to_string();

    // "2024-05-01 10:00:00" -> "2024-05-01T10:00:00"
    if s.len() > 10 && s.as_bytes()[10] == b' ' {
        s.replace_range(10..11, "T");
    }
    s.retain(|c| !c.is_whitespace());

    if s.ends_with('z') {
        s.pop();
        s.push('Z');
    }

    let bytes = s.as_bytes();
    let len = bytes.len();
    // Offsets only appear after the date part; the date's own dashes must not match.
    let is_sign = |idx: usize| idx > 10 && matches!(bytes[idx], b'+' | b'-');
    let all_digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

    if len >= 5 && is_sign(len - 5) && all_digits(len - 4..len) {
        // +0800 -> +08:00
        s.insert(len - 2, ':');
    } else if len >= 3 && is_sign(len - 3) && all_digits(len - 2..len) {
        // +08 -> +08:00
        s.push_str(":00");
    }

    s
}
