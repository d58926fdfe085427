//! Canonical nanosecond timestamps.
//!
//! The instrument wants integer nanoseconds since the Unix epoch. Callers
//! hold times in several shapes, so everything funnels through
//! [`Timestamp`] and [`normalize`].

use crate::error::{BitsError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in time in one of the accepted representations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timestamp {
    /// Already nanoseconds since the epoch.
    Nanos(i64),
    /// Nanoseconds since the epoch, rounded to the nearest integer.
    FloatNanos(f64),
    /// A calendar instant, interpreted as UTC.
    DateTime(DateTime<Utc>),
}

impl Timestamp {
    pub fn to_nanos(&self) -> Result<i64> {
        match *self {
            Self::Nanos(ns) => Ok(ns),
            Self::FloatNanos(ns) => {
                let rounded = ns.round();
                // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
                if !rounded.is_finite() || rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                    return Err(BitsError::InvalidTimestamp {
                        kind: "float",
                        value: ns.to_string(),
                    });
                }
                Ok(rounded as i64)
            }
            Self::DateTime(dt) => dt.timestamp_nanos_opt().ok_or_else(|| BitsError::InvalidTimestamp {
                kind: "datetime",
                value: dt.to_rfc3339(),
            }),
        }
    }
}

/// Convert any accepted representation to nanoseconds since the epoch.
pub fn normalize(timestamp: impl Into<Timestamp>) -> Result<i64> {
    timestamp.into().to_nanos()
}

impl From<i64> for Timestamp {
    fn from(ns: i64) -> Self {
        Self::Nanos(ns)
    }
}

impl From<i32> for Timestamp {
    fn from(ns: i32) -> Self {
        Self::Nanos(i64::from(ns))
    }
}

impl From<u32> for Timestamp {
    fn from(ns: u32) -> Self {
        Self::Nanos(i64::from(ns))
    }
}

impl From<f64> for Timestamp {
    fn from(ns: f64) -> Self {
        Self::FloatNanos(ns)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Self::DateTime(naive.and_utc())
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::DateTime(DateTime::<Utc>::from(time))
    }
}

/// Parses integer nanoseconds, float nanoseconds, RFC 3339, or a naive
/// `YYYY-MM-DD HH:MM:SS[.fff]` datetime taken as UTC.
impl FromStr for Timestamp {
    type Err = BitsError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(ns) = trimmed.parse::<i64>() {
            return Ok(Self::Nanos(ns));
        }
        if let Ok(ns) = trimmed.parse::<f64>()
            && ns.is_finite()
        {
            return Ok(Self::FloatNanos(ns));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::DateTime(dt.with_timezone(&Utc)));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self::from(naive));
            }
        }
        Err(BitsError::InvalidTimestamp {
            kind: "string",
            value: s.to_string(),
        })
    }
}

/// Current wall-clock time in nanoseconds since the epoch.
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
