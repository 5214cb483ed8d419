//! Time types for calendar queries.
//!
//! All instants handled by davbridge are UTC. This module provides
//! [`TimeWindow`] for query ranges, parsing of caller-supplied ISO 8601
//! instants, and the compact iCalendar UTC form used on the wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Compact UTC date-time format used by iCalendar and CalDAV filters.
pub const ICAL_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Errors produced while parsing caller-supplied instants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The value is not an RFC 3339 / ISO 8601 instant or date.
    #[error("invalid instant `{0}`: expected ISO 8601 (e.g. 2025-01-01T09:00:00Z)")]
    InvalidInstant(String),

    /// The window ends before it starts.
    #[error("time window end {end} is before start {start}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a time window, rejecting an inverted range.
    ///
    /// An empty window (`start == end`) is allowed.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if start > end {
            return Err(TimeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses a window from two ISO 8601 strings.
    ///
    /// See [`parse_instant`] for the accepted forms.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(parse_instant(start)?, parse_instant(end)?)
    }

    /// Returns `(start, end)` in the compact iCalendar UTC form.
    pub fn to_ical_range(&self) -> (String, String) {
        (format_ical_utc(self.start), format_ical_utc(self.end))
    }
}

/// Parses a caller-supplied instant.
///
/// Accepted forms:
/// - RFC 3339 with offset or `Z` (`2025-01-01T09:00:00+02:00`)
/// - naive date-time (`2025-01-01T09:00:00`), read as UTC
/// - date only (`2025-01-01`), read as midnight UTC
/// - compact iCalendar form (`20250101T090000Z`)
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>, TimeError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(midnight.and_utc());
    }

    parse_ical_utc(value).ok_or_else(|| TimeError::InvalidInstant(value.to_string()))
}

/// Formats an instant as `YYYYMMDDTHHMMSSZ`.
///
/// Sub-second precision is dropped.
pub fn format_ical_utc(dt: DateTime<Utc>) -> String {
    dt.format(ICAL_UTC_FORMAT).to_string()
}

/// Parses the compact iCalendar date-time form.
///
/// A missing trailing `Z` is read as UTC as well.
pub fn parse_ical_utc(value: &str) -> Option<DateTime<Utc>> {
    let naive = value.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}
