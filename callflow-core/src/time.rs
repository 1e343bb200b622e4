//! Timestamp normalization and duration formatting
//!
//! The call backend stores timestamps as `YYYY-MM-DD HH:MM:SS` with no zone
//! designator even though they are UTC. Reading them as local time shifts
//! every displayed time by the reader's UTC offset, so every raw timestamp in
//! this crate goes through [`normalize_timestamp`] first.
//!
//! Nothing here returns an error: a malformed timestamp becomes `None`, and
//! formatted output falls back to [`NOT_AVAILABLE`].

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::types::CallRecord;

/// Marker shown when a time or duration cannot be computed
pub const NOT_AVAILABLE: &str = "N/A";

/// Marker appended to durations measured against the current time
pub const ONGOING_MARKER: &str = "(ongoing)";

/// Formats accepted for timestamps without a zone designator.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Length of the `YYYY-MM-DD` prefix.
const DATE_LEN: usize = 10;

/// Normalize a server timestamp to an absolute UTC instant.
///
/// Accepts naive date-times with either a space or `T` between date and
/// time (treated as UTC) and qualified instants carrying `Z` or a numeric
/// offset. Returns `None` for anything else.
pub fn normalize_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let iso = with_t_separator(trimmed);

    if let Some(body) = iso.strip_suffix('Z').or_else(|| iso.strip_suffix('z')) {
        return parse_naive_utc(body);
    }

    if has_offset(&iso) {
        DateTime::parse_from_rfc3339(&iso)
            .or_else(|_| DateTime::parse_from_str(&iso, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        parse_naive_utc(&iso)
    }
}

fn parse_naive_utc(iso: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(iso, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// [`normalize_timestamp`] over an optional raw value.
pub fn normalize_opt(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(normalize_timestamp)
}

fn with_t_separator(s: &str) -> String {
    if s.as_bytes().get(DATE_LEN) == Some(&b' ') {
        format!("{}T{}", &s[..DATE_LEN], &s[DATE_LEN + 1..])
    } else {
        s.to_string()
    }
}

fn has_offset(iso: &str) -> bool {
    iso.get(DATE_LEN..)
        .map(|time_part| time_part.contains('+') || time_part.contains('-'))
        .unwrap_or(false)
}

/// Whole seconds from `start` to `end`, or `None` if the delta is negative.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<i64> {
    // Compare before truncating: a sub-second negative delta is still negative.
    (end >= start).then(|| end.signed_duration_since(start).num_seconds())
}

/// Whole seconds between two raw timestamps.
///
/// `None` if either side fails to normalize or `end` precedes `start`.
pub fn duration_seconds(start: &str, end: &str) -> Option<i64> {
    elapsed_seconds(normalize_timestamp(start)?, normalize_timestamp(end)?)
}

/// Render a second count as `1d 1h 0m`, `1h 1m`, `1m 30s` or `42s`.
pub fn format_elapsed(total_seconds: i64) -> String {
    if total_seconds < 0 {
        return NOT_AVAILABLE.to_string();
    }

    let total_minutes = total_seconds / 60;
    let total_hours = total_minutes / 60;
    let days = total_hours / 24;

    let seconds = total_seconds % 60;
    let minutes = total_minutes % 60;
    let hours = total_hours % 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if total_hours > 0 {
        format!("{}h {}m", total_hours, minutes)
    } else if total_minutes > 0 {
        format!("{}m {}s", total_minutes, seconds)
    } else {
        format!("{}s", total_seconds)
    }
}

/// Format the duration between two raw timestamps, or [`NOT_AVAILABLE`].
pub fn format_duration(start: &str, end: &str) -> String {
    duration_seconds(start, end)
        .map(format_elapsed)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Format a raw timestamp for display (`Jan 01, 12:05 AM`, UTC).
pub fn format_timestamp(raw: Option<&str>) -> String {
    normalize_opt(raw)
        .map(|dt| dt.format("%b %d, %I:%M %p").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Length of a call, distinguishing finished calls from ones still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDuration {
    /// Measured from creation to end
    Finished(i64),
    /// Measured from creation to the time of the request
    Ongoing(i64),
    /// No usable start, or the end precedes the start
    Unavailable,
}

impl CallDuration {
    /// Elapsed seconds, if known
    pub fn seconds(&self) -> Option<i64> {
        match self {
            CallDuration::Finished(s) | CallDuration::Ongoing(s) => Some(*s),
            CallDuration::Unavailable => None,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        matches!(self, CallDuration::Ongoing(_))
    }
}

impl std::fmt::Display for CallDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallDuration::Finished(s) => write!(f, "{}", format_elapsed(*s)),
            CallDuration::Ongoing(s) => write!(f, "{} {}", format_elapsed(*s), ONGOING_MARKER),
            CallDuration::Unavailable => write!(f, "{}", NOT_AVAILABLE),
        }
    }
}

impl Serialize for CallDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Duration of a call as of `now`.
///
/// Ended calls measure creation to end. Calls without an end time are
/// measured against `now` and reported as [`CallDuration::Ongoing`].
pub fn call_duration(call: &CallRecord, now: DateTime<Utc>) -> CallDuration {
    let Some(start) = normalize_opt(call.created_at.as_deref()) else {
        return CallDuration::Unavailable;
    };

    match call.ended_at.as_deref() {
        Some(end) => normalize_timestamp(end)
            .and_then(|end| elapsed_seconds(start, end))
            .map(CallDuration::Finished)
            .unwrap_or(CallDuration::Unavailable),
        None => elapsed_seconds(start, now)
            .map(CallDuration::Ongoing)
            .unwrap_or(CallDuration::Unavailable),
    }
}
