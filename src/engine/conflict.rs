use chrono::{Datelike, NaiveDate};

use crate::limits::*;
use crate::model::*;

use super::quote::parse_stay;
use super::{EngineError, ValidationError};

// ── Conflict Checker ──────────────────────────────────────────────

/// First blocked range the proposed stay conflicts with, in input order.
/// Touching counts: a check-out on a blocked check-in day is a conflict.
pub fn find_conflict(proposed: &DateRange, blocked: &[DateRange]) -> Option<DateRange> {
    blocked.iter().find(|b| proposed.conflicts_with(b)).copied()
}

pub fn has_conflict(proposed: &DateRange, blocked: &[DateRange]) -> bool {
    find_conflict(proposed, blocked).is_some()
}

/// Check dates exactly as the user typed them. Missing or unparseable dates
/// are a validation error, never a "no conflict" answer.
/// Returns the stay and the first conflicting blocked range, if any.
pub fn check_draft(
    start: Option<&str>,
    end: Option<&str>,
    blocked: &[DateRange],
) -> Result<(DateRange, Option<DateRange>), ValidationError> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ValidationError::MissingDates);
    };
    let stay = parse_stay(start, end)?;
    Ok((stay, find_conflict(&stay, blocked)))
}

// ── Server-side checks ────────────────────────────────────────────

fn validate_date(date: NaiveDate) -> Result<(), ValidationError> {
    if date.year() < MIN_VALID_YEAR || date.year() > MAX_VALID_YEAR {
        return Err(ValidationError::DateOutOfRange(date));
    }
    Ok(())
}

/// Bounds every stay must satisfy before it is priced or checked.
pub(crate) fn validate_range(range: &DateRange) -> Result<(), ValidationError> {
    validate_date(range.start)?;
    validate_date(range.end)?;
    let nights = range.nights();
    if nights > MAX_STAY_NIGHTS {
        return Err(ValidationError::StayTooLong {
            nights,
            max: MAX_STAY_NIGHTS,
        });
    }
    Ok(())
}

/// New stays may not check in before today.
pub(crate) fn validate_bookable(range: &DateRange, today: NaiveDate) -> Result<(), ValidationError> {
    validate_range(range)?;
    if range.start < today {
        return Err(ValidationError::StartInPast {
            start: range.start,
            today,
        });
    }
    Ok(())
}

pub(crate) fn validate_guests(guests: u32, capacity: u32) -> Result<(), ValidationError> {
    if guests == 0 {
        return Err(ValidationError::NoGuests);
    }
    if guests > capacity {
        return Err(ValidationError::CapacityExceeded { guests, capacity });
    }
    Ok(())
}

pub(crate) fn validate_text(value: &str, name: &'static str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(name));
    }
    if value.len() > max {
        return Err(ValidationError::FieldTooLong(name));
    }
    Ok(())
}

/// Authoritative check against the farm's current reservations. Caller holds
/// the farm's write lock and inserts under the same lock.
pub(crate) fn check_no_conflict(farm: &FarmState, range: &DateRange, now: Ms) -> Result<(), EngineError> {
    // touching() yields in check-in order, so the earliest conflict is reported.
    match farm.touching(range).find(|r| r.blocks_dates(now)) {
        Some(existing) => Err(EngineError::Conflict {
            farm_id: farm.id,
            range: existing.range,
        }),
        None => Ok(()),
    }
}
