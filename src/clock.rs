use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::Ms;

/// Source of "now" for the engine. Stay dates are compared against the UTC
/// calendar date of this clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> Ms;

    fn today(&self) -> NaiveDate {
        date_of(self.now_ms())
    }
}

/// UTC calendar date of a Unix-millisecond instant.
pub fn date_of(ms: Ms) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

/// Midnight UTC at the start of `date`.
pub fn start_of_day_ms(date: NaiveDate) -> Ms {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Ms {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: Ms) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Clock reading noon UTC on `date`.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(start_of_day_ms(date) + 12 * 3_600_000)
    }

    pub fn set(&self, now: Ms) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(start_of_day_ms(date) + 12 * 3_600_000);
    }

    pub fn advance(&self, ms: Ms) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Ms {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn date_of_is_utc() {
        // 2025-03-10T23:30:00Z
        let ms = start_of_day_ms(d("2025-03-10")) + 23 * 3_600_000 + 30 * 60_000;
        assert_eq!(date_of(ms), d("2025-03-10"));
        assert_eq!(date_of(ms + 3_600_000), d("2025-03-11"));
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::at_date(d("2025-03-10"));
        assert_eq!(clock.today(), d("2025-03-10"));
        clock.advance(24 * 3_600_000);
        assert_eq!(clock.today(), d("2025-03-11"));
        clock.set_date(d("2024-01-01"));
        assert_eq!(clock.today(), d("2024-01-01"));
    }
}
