// Forecast time normalization: selected instant -> next full hour -> backend wire string

use chrono::{DateTime, Duration, Offset, Timelike, Utc};
use chrono_tz::Tz;
use std::fmt;

/// Local-time layout the backend expects, without offset or `Z`.
const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A forecast query key: the top of an hour, carried with the timezone used to render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedInstant {
    at: DateTime<Utc>,
    tz: Tz,
}

impl NormalizedInstant {
    pub fn utc(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn local(&self) -> DateTime<Tz> {
        self.at.with_timezone(&self.tz)
    }

    /// `2024-05-01T15:00:00`, in local time.
    pub fn wire_format(&self) -> String {
        self.local().format(WIRE_FORMAT).to_string()
    }

    /// The wire string encoded for a query parameter.
    pub fn query_value(&self) -> String {
        encode_query_date(&self.wire_format())
    }
}

impl fmt::Display for NormalizedInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_format())
    }
}

/// Strips a trailing UTC marker and percent-encodes colons.
pub fn encode_query_date(raw: &str) -> String {
    let trimmed = raw.strip_suffix('Z').unwrap_or(raw);
    trimmed.replace(':', "%3A")
}

#[derive(Debug, Clone, Copy)]
pub struct TimeNormalizer {
    tz: Tz,
}

impl Default for TimeNormalizer {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Paris)
    }
}

impl TimeNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Returns `None` unless `instant` is strictly after `now`; past and present
    /// instants never carry a forecast.
    pub fn normalize(&self, instant: DateTime<Utc>, now: DateTime<Utc>) -> Option<NormalizedInstant> {
        if instant <= now {
            return None;
        }

        // Truncate under the instant's own offset: the repeated hour on the
        // fall-back day is ambiguous as a zoned local time.
        let offset = instant.with_timezone(&self.tz).offset().fix();
        let local = instant.with_timezone(&offset);
        let hour_start = local.with_nanosecond(0)?.with_second(0)?.with_minute(0)?;
        let next_hour = hour_start + Duration::hours(1);

        Some(NormalizedInstant {
            at: next_hour.with_timezone(&Utc),
            tz: self.tz,
        })
    }
}
