//! Time sources and the canonical day-boundary policy.
//!
//! Every date derivation in the engine (streak walks, daily period keys,
//! time-of-day buckets) goes through a single [`DayBoundary`], which carries
//! one fixed UTC offset chosen at configuration time. Mixing timezones across
//! derivations would make streak length and daily-reset behavior ill-defined,
//! so the offset is set once and never varies per query.
//!
//! [`Clock`] abstracts "now" so tests can drive day rollovers with
//! [`ManualClock`] while production code uses [`SystemClock`].

// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(clippy::missing_panics_doc)]

use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

/// Errors from day-boundary construction.
#[derive(Debug, Error)]
pub enum ClockError {
    /// The configured UTC offset is outside the representable range.
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidOffset {
        /// The rejected offset, in minutes east of UTC.
        minutes: i32,
    },
}

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and replay.
///
/// Starts at the given instant and only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a manual clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap() = instant;
    }

    /// Advances the clock by a duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// The engine-wide calendar-day policy.
///
/// Holds the single fixed UTC offset used to map instants to local calendar
/// dates and local times of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl DayBoundary {
    /// Day boundary at UTC (offset zero).
    #[must_use]
    pub fn utc() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).unwrap(),
        }
    }

    /// Day boundary at a fixed offset east of UTC, in minutes.
    ///
    /// # Errors
    ///
    /// Returns `ClockError::InvalidOffset` if the offset is not strictly
    /// between -24h and +24h.
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ClockError> {
        let seconds = minutes.checked_mul(60).ok_or(ClockError::InvalidOffset { minutes })?;
        let offset =
            FixedOffset::east_opt(seconds).ok_or(ClockError::InvalidOffset { minutes })?;
        Ok(Self { offset })
    }

    /// The calendar date `instant` falls on under this policy.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The local time of day `instant` falls at under this policy.
    #[must_use]
    pub fn local_time(&self, instant: DateTime<Utc>) -> NaiveTime {
        instant.with_timezone(&self.offset).time()
    }

    /// The configured offset east of UTC.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod unit_tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_utc_boundary_dates() {
        let boundary = DayBoundary::utc();
        let instant = Utc.with_ymd_and_hms(2025, 8, 15, 23, 30, 0).unwrap();

        assert_eq!(
            boundary.local_date(instant),
            NaiveDate::from_ymd_opt(2025, 8, 15).unwrap()
        );
    }

    #[test]
    fn test_offset_shifts_the_date() {
        // 23:30 UTC is already the next day at UTC+8.
        let boundary = DayBoundary::from_offset_minutes(8 * 60).unwrap();
        let instant = Utc.with_ymd_and_hms(2025, 8, 15, 23, 30, 0).unwrap();

        assert_eq!(
            boundary.local_date(instant),
            NaiveDate::from_ymd_opt(2025, 8, 16).unwrap()
        );
        assert_eq!(
            boundary.local_time(instant),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(DayBoundary::from_offset_minutes(24 * 60).is_err());
        assert!(DayBoundary::from_offset_minutes(-24 * 60).is_err());
        assert!(DayBoundary::from_offset_minutes(i32::MAX).is_err());
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 8, 15, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);

        assert_eq!(clock.now(), start);

        clock.advance(Duration::days(1));
        assert_eq!(clock.now(), start + Duration::days(1));

        let later = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
