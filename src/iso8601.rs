//! ISO-8601 temporal values as NGSI-LD understands them.
//!
//! NGSI-LD distinguishes three temporal kinds (`DateTime`, `Date`, `Time`).
//! [`parse`] classifies a textual value into one of them and [`Temporal`]
//! renders the canonical string the broker expects:
//!
//! - DateTime: `2022-01-01T12:00:00Z` (UTC, `Z` suffix, fraction only if non-zero)
//! - Date: `2022-01-01`
//! - Time: `12:00:00Z`

use std::fmt;

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

/// The three temporal kinds of NGSI-LD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalType {
    DateTime,
    Date,
    Time,
}

impl TemporalType {
    /// The `@type` tag used inside a TemporalProperty value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateTime => "DateTime",
            Self::Date => "Date",
            Self::Time => "Time",
        }
    }
}

impl fmt::Display for TemporalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed temporal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Temporal {
    pub fn temporal_type(&self) -> TemporalType {
        match self {
            Self::DateTime(_) => TemporalType::DateTime,
            Self::Date(_) => TemporalType::Date,
            Self::Time(_) => TemporalType::Time,
        }
    }

    /// Canonical ISO-8601 rendering.
    pub fn to_iso(&self) -> String {
        match self {
            Self::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Time(t) if t.nanosecond() == 0 => t.format("%H:%M:%SZ").to_string(),
            Self::Time(t) => t.format("%H:%M:%S%.fZ").to_string(),
        }
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl From<DateTime<Utc>> for Temporal {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<NaiveDate> for Temporal {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveTime> for Temporal {
    fn from(t: NaiveTime) -> Self {
        Self::Time(t)
    }
}

/// Classify and parse an ISO-8601 string.
///
/// Date-times with an offset are converted to UTC; date-times without one
/// are taken as UTC. Returns `None` when the text matches none of the
/// three kinds.
pub fn parse(text: &str) -> Option<Temporal> {
    let text = text.trim();
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_rfc3339(text) {
        return Some(Temporal::DateTime(dt.with_timezone(&Utc)));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(Temporal::DateTime(naive.and_utc()));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Temporal::Date(d));
    }
    let time = text.strip_suffix('Z').unwrap_or(text);
    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(time, fmt) {
            return Some(Temporal::Time(t));
        }
    }
    None
}
