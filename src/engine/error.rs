use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::DateRange;

/// Malformed or out-of-policy input. Raised before anything is locked or
/// written; client-side checks raise the same variants without a network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingDates,
    InvalidDate(String),
    InvalidRange { start: NaiveDate, end: NaiveDate },
    DateOutOfRange(NaiveDate),
    StartInPast { start: NaiveDate, today: NaiveDate },
    StayTooLong { nights: i64, max: i64 },
    MissingField(&'static str),
    FieldTooLong(&'static str),
    NoGuests,
    CapacityExceeded { guests: u32, capacity: u32 },
    InvalidRating(i64),
    InvalidCapacity(u32),
    InvalidRate(u64),
    PriceOverflow,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingDates => write!(f, "check-in and check-out dates are required"),
            ValidationError::InvalidDate(s) => write!(f, "invalid date: {s}"),
            ValidationError::InvalidRange { start, end } => {
                write!(f, "check-out {end} must be after check-in {start}")
            }
            ValidationError::DateOutOfRange(d) => write!(f, "date out of range: {d}"),
            ValidationError::StartInPast { start, today } => {
                write!(f, "check-in {start} is before today ({today})")
            }
            ValidationError::StayTooLong { nights, max } => {
                write!(f, "stay of {nights} nights exceeds the maximum of {max}")
            }
            ValidationError::MissingField(name) => write!(f, "{name} is required"),
            ValidationError::FieldTooLong(name) => write!(f, "{name} too long"),
            ValidationError::NoGuests => write!(f, "at least one guest is required"),
            ValidationError::CapacityExceeded { guests, capacity } => {
                write!(f, "{guests} guests exceeds farm capacity of {capacity}")
            }
            ValidationError::InvalidRating(r) => write!(f, "rating must be between 1 and 5, got {r}"),
            ValidationError::InvalidCapacity(c) => write!(f, "capacity must be between 1 and {}, got {c}", crate::limits::MAX_CAPACITY),
            ValidationError::InvalidRate(r) => write!(f, "nightly rate must be between 1 and {}, got {r}", crate::limits::MAX_NIGHTLY_RATE),
            ValidationError::PriceOverflow => write!(f, "total price overflows"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Why a cancellation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelRefusal {
    AlreadyCancelled,
    Completed,
    /// Check-in day is today or already past.
    AlreadyStarted,
}

impl std::fmt::Display for CancelRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelRefusal::AlreadyCancelled => write!(f, "reservation is already cancelled"),
            CancelRefusal::Completed => write!(f, "cannot cancel a completed reservation"),
            CancelRefusal::AlreadyStarted => write!(f, "cannot cancel a stay that has started"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Authoritative overlap with an active reservation of the farm.
    Conflict { farm_id: Ulid, range: DateRange },
    Forbidden(Ulid),
    CannotCancel { id: Ulid, reason: CancelRefusal },
    InvalidState { id: Ulid, reason: &'static str },
    HasActiveReservations(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Failure unrelated to business rules; the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::WalError(_))
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "invalid input: {e}"),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict { farm_id, range } => {
                write!(f, "farm {farm_id} is already reserved for {range}")
            }
            EngineError::Forbidden(id) => write!(f, "not authorized for {id}"),
            EngineError::CannotCancel { id, reason } => write!(f, "cannot cancel {id}: {reason}"),
            EngineError::InvalidState { id, reason } => write!(f, "{id}: {reason}"),
            EngineError::HasActiveReservations(id) => {
                write!(f, "cannot delete farm {id}: has active reservations")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
