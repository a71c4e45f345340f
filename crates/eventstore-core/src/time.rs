//! Time representations and query windows
//!
//! Callers hand in instants, calendar dates or ISO-8601 text; everything is
//! normalized to `DateTime<Utc>` before it reaches an index.
//!
//! A [`TimeWindow`] also carries the reverse-order convention: passing a
//! `from` that is chronologically after `till` asks for the most recent
//! events first.

use std::time::SystemTime;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::ValidationError;

/// A point in time in any of the accepted representations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeInput {
    /// An absolute instant
    Instant(DateTime<Utc>),
    /// A calendar date, interpreted as midnight UTC
    Date(NaiveDate),
    /// ISO-8601 text
    Iso(String),
}

impl TimeInput {
    /// Normalize to a UTC instant
    pub fn to_instant(&self) -> Result<DateTime<Utc>, ValidationError> {
        match self {
            TimeInput::Instant(ts) => Ok(*ts),
            TimeInput::Date(date) => Ok(midnight(*date)),
            TimeInput::Iso(text) => parse_iso(text),
        }
    }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(ts: DateTime<Utc>) -> Self {
        TimeInput::Instant(ts)
    }
}

impl From<DateTime<FixedOffset>> for TimeInput {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        TimeInput::Instant(ts.with_timezone(&Utc))
    }
}

impl From<SystemTime> for TimeInput {
    fn from(ts: SystemTime) -> Self {
        TimeInput::Instant(ts.into())
    }
}

impl From<NaiveDate> for TimeInput {
    fn from(date: NaiveDate) -> Self {
        TimeInput::Date(date)
    }
}

impl From<&str> for TimeInput {
    fn from(text: &str) -> Self {
        TimeInput::Iso(text.to_string())
    }
}

impl From<String> for TimeInput {
    fn from(text: String) -> Self {
        TimeInput::Iso(text)
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Parse ISO-8601 text
///
/// Accepts RFC 3339 with any offset, a decimal comma in the fraction,
/// date-times without an offset (taken as UTC) and plain dates.
pub fn parse_iso(text: &str) -> Result<DateTime<Utc>, ValidationError> {
    let normalized = text.trim().replace(',', ".");

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    Err(ValidationError::InvalidTimestamp(text.to_string()))
}

/// Result order of a range query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn is_reverse(self) -> bool {
        self == Direction::Descending
    }
}

/// Query window with inclusive, optionally open bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    /// Where reading starts; unbounded when `None`
    pub from: Option<DateTime<Utc>>,
    /// Where reading stops; unbounded when `None`
    pub till: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn new(from: Option<DateTime<Utc>>, till: Option<DateTime<Utc>>) -> Self {
        Self { from, till }
    }

    /// The window covering all time
    pub fn all() -> Self {
        Self::default()
    }

    /// Normalize heterogeneous bounds into a window
    pub fn from_inputs(
        from: Option<TimeInput>,
        till: Option<TimeInput>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            from: from.map(|t| t.to_instant()).transpose()?,
            till: till.map(|t| t.to_instant()).transpose()?,
        })
    }

    /// Descending only when both bounds are set and `till` precedes `from`
    pub fn direction(&self) -> Direction {
        match (self.from, self.till) {
            (Some(from), Some(till)) if till < from => Direction::Descending,
            _ => Direction::Ascending,
        }
    }

    /// Chronologically earliest bound
    pub fn lower(&self) -> Option<DateTime<Utc>> {
        match self.direction() {
            Direction::Ascending => self.from,
            Direction::Descending => self.till,
        }
    }

    /// Chronologically latest bound
    pub fn upper(&self) -> Option<DateTime<Utc>> {
        match self.direction() {
            Direction::Ascending => self.till,
            Direction::Descending => self.from,
        }
    }
}
