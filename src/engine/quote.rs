use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::MAX_STAY_NIGHTS;
use crate::model::DateRange;

use super::ValidationError;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub nights: u32,
    pub nightly_rate: u64,
    pub total_price: u64,
}

/// Price a stay: whole nights between check-in and check-out times the rate.
pub fn quote(range: &DateRange, nightly_rate: u64) -> Result<Quote, ValidationError> {
    let nights = range.nights();
    if nights <= 0 {
        return Err(ValidationError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    let nights = u32::try_from(nights).map_err(|_| ValidationError::StayTooLong {
        nights,
        max: MAX_STAY_NIGHTS,
    })?;
    let total_price = (nights as u64)
        .checked_mul(nightly_rate)
        .ok_or(ValidationError::PriceOverflow)?;
    Ok(Quote {
        nights,
        nightly_rate,
        total_price,
    })
}

/// Nights between two instants, rounding any partial day up.
pub fn nights_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, ValidationError> {
    let ms = end.signed_duration_since(start).num_milliseconds();
    if ms <= 0 {
        return Err(ValidationError::InvalidRange {
            start: start.date_naive(),
            end: end.date_naive(),
        });
    }
    Ok((ms + DAY_MS - 1) / DAY_MS)
}

enum Bound {
    Date(NaiveDate),
    Instant(DateTime<Utc>),
}

fn parse_bound(s: &str) -> Result<Bound, ValidationError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ValidationError::MissingDates);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Bound::Date(date));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| Bound::Instant(dt.with_timezone(&Utc)))
        .map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

fn as_instant(bound: Bound) -> Result<DateTime<Utc>, ValidationError> {
    match bound {
        Bound::Instant(i) => Ok(i),
        Bound::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or(ValidationError::DateOutOfRange(d)),
    }
}

/// Turn user-supplied check-in/check-out strings into a stay.
///
/// Plain `YYYY-MM-DD` dates are taken as-is. If either side is an RFC 3339
/// instant, both are compared as UTC instants: the stay starts on the UTC date
/// of the check-in instant and lasts `ceil(duration / 1 day)` nights.
pub fn parse_stay(start: &str, end: &str) -> Result<DateRange, ValidationError> {
    match (parse_bound(start)?, parse_bound(end)?) {
        (Bound::Date(s), Bound::Date(e)) => DateRange::new(s, e),
        (s, e) => {
            let s = as_instant(s)?;
            let e = as_instant(e)?;
            let nights = nights_between(s, e)?;
            if nights > MAX_STAY_NIGHTS {
                return Err(ValidationError::StayTooLong {
                    nights,
                    max: MAX_STAY_NIGHTS,
                });
            }
            let check_in = s.date_naive();
            let check_out = check_in
                .checked_add_days(Days::new(nights as u64))
                .ok_or(ValidationError::DateOutOfRange(check_in))?;
            DateRange::new(check_in, check_out)
        }
    }
}
