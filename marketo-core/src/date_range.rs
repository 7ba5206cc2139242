//! Date ranges used by bulk export filters.

use crate::Error;
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive time interval, serialized as `{"startAt": ..., "endAt": ...}`.
///
/// `start_at <= end_at` always holds, deserialized values included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawDateRange")]
pub struct DateRange {
    start_at: DateTime<FixedOffset>,
    end_at: DateTime<FixedOffset>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDateRange {
    start_at: DateTime<FixedOffset>,
    end_at: DateTime<FixedOffset>,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = Error;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start_at, raw.end_at)
    }
}

impl DateRange {
    /// Creates a range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDateRange`] if `start_at` is after `end_at`.
    pub fn new(start_at: DateTime<FixedOffset>, end_at: DateTime<FixedOffset>) -> Result<Self, Error> {
        if start_at > end_at {
            return Err(Error::InvalidDateRange {
                start: start_at.to_rfc3339(),
                end: end_at.to_rfc3339(),
            });
        }
        Ok(Self { start_at, end_at })
    }

    /// Parses a range from two RFC 3339 timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParseDate`] for malformed input and
    /// [`Error::InvalidDateRange`] if start is after end.
    pub fn parse(start_at: &str, end_at: &str) -> Result<Self, Error> {
        Self::new(parse_timestamp(start_at)?, parse_timestamp(end_at)?)
    }

    /// Inclusive start.
    pub fn start_at(&self) -> DateTime<FixedOffset> {
        self.start_at
    }

    /// Inclusive end.
    pub fn end_at(&self) -> DateTime<FixedOffset> {
        self.end_at
    }

    /// Length of the range.
    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    /// Splits the range into contiguous windows no longer than
    /// [`MAX_EXPORT_RANGE_DAYS`](crate::MAX_EXPORT_RANGE_DAYS).
    ///
    /// A range that already fits is returned as is. Otherwise every window but
    /// the last spans 30 days minus one second and the next window starts 30
    /// days after the previous start. The last window always ends at `end_at`.
    ///
    /// # Example
    ///
    /// ```
    /// use marketo_core::date_range::DateRange;
    ///
    /// let range = DateRange::parse("2019-01-01T00:00:00Z", "2019-03-15T00:00:00Z").unwrap();
    /// let windows = range.split();
    /// assert_eq!(windows.len(), 3);
    /// assert_eq!(windows[0].end_at().to_rfc3339(), "2019-01-30T23:59:59+00:00");
    /// assert_eq!(windows[1].start_at().to_rfc3339(), "2019-01-31T00:00:00+00:00");
    /// ```
    pub fn split(&self) -> Vec<DateRange> {
        let window = Duration::days(crate::MAX_EXPORT_RANGE_DAYS);
        let mut ranges = Vec::new();
        let mut current = self.start_at;

        while current + window < self.end_at {
            let next = current + window;
            ranges.push(DateRange {
                start_at: current,
                end_at: next - Duration::seconds(1),
            });
            current = next;
        }

        ranges.push(DateRange {
            start_at: current,
            end_at: self.end_at,
        });
        ranges
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.start_at.to_rfc3339(), self.end_at.to_rfc3339())
    }
}

/// Parses an RFC 3339 timestamp, keeping its offset.
///
/// # Errors
///
/// Returns [`Error::ParseDate`] for malformed input.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, Error> {
    DateTime::parse_from_rfc3339(value).map_err(|source| Error::ParseDate {
        value: value.to_string(),
        source,
    })
}

/// Splits `[start_at, end_at]` into export-sized windows.
///
/// # Errors
///
/// Same as [`DateRange::parse`].
pub fn split(start_at: &str, end_at: &str) -> Result<Vec<DateRange>, Error> {
    Ok(DateRange::parse(start_at, end_at)?.split())
}
