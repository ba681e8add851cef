use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::ValidationError;

/// Unix milliseconds.
pub type Ms = i64;

/// Stay over calendar dates `[start, end)`: `start` is the check-in day,
/// `end` the check-out day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn nights(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    /// Overlap test with inclusive bounds on both sides: a check-out on the
    /// other stay's check-in day is a conflict (no same-day turnover).
    pub fn conflicts_with(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Parses the `Display` form, `[2025-03-10, 2025-03-15)`.
impl FromStr for DateRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| ValidationError::InvalidDate(s.to_string()))?;
        let (start, end) = inner
            .split_once(',')
            .ok_or_else(|| ValidationError::InvalidDate(s.to_string()))?;
        DateRange::new(parse_date(start.trim())?, parse_date(end.trim())?)
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate(s.to_string()))
}

// ── Farms ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmInfo {
    pub id: Ulid,
    pub title: String,
    pub location: String,
    /// Price per night in minor currency units.
    pub nightly_rate: u64,
    /// Max guests per reservation.
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct FarmState {
    pub id: Ulid,
    pub title: String,
    pub location: String,
    pub nightly_rate: u64,
    pub capacity: u32,
    /// All reservations ever placed (cancelled included), sorted by `range.start`.
    pub reservations: Vec<Reservation>,
    pub reviews: Vec<Review>,
    /// Set under the write lock when the farm is deleted. A writer that
    /// acquires the lock on a deleted farm must not touch it.
    pub deleted: bool,
}

impl FarmState {
    pub fn new(id: Ulid, title: String, location: String, nightly_rate: u64, capacity: u32) -> Self {
        Self {
            id,
            title,
            location,
            nightly_rate,
            capacity,
            reservations: Vec::new(),
            reviews: Vec::new(),
            deleted: false,
        }
    }

    pub fn info(&self) -> FarmInfo {
        FarmInfo {
            id: self.id,
            title: self.title.clone(),
            location: self.location.clone(),
            nightly_rate: self.nightly_rate,
            capacity: self.capacity,
        }
    }

    /// Insert maintaining sort order by check-in date.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.range.start, |r| r.range.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    pub fn reservation(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    pub fn reservation_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// Reservations whose range conflicts with `query` under the
    /// boundary-touching rule, whatever their status.
    /// Binary search skips everything checking in after `query.end`.
    pub fn touching(&self, query: &DateRange) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.range.start <= query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.range.end >= query.start)
    }

    pub fn insert_review(&mut self, review: Review) {
        self.reviews.push(review);
    }

    pub fn review(&self, id: &Ulid) -> Option<&Review> {
        self.reviews.iter().find(|r| r.id == *id)
    }

    pub fn review_mut(&mut self, id: &Ulid) -> Option<&mut Review> {
        self.reviews.iter_mut().find(|r| r.id == *id)
    }

    pub fn remove_review(&mut self, id: &Ulid) -> Option<Review> {
        let pos = self.reviews.iter().position(|r| r.id == *id)?;
        Some(self.reviews.remove(pos))
    }
}

// ── Reservations ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    /// Waiting for payment capture; blocks dates until the hold expires.
    Pending,
    Confirmed,
    Cancelled,
    /// Never stored: a confirmed stay whose check-in day has arrived.
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "completed" => Ok(ReservationStatus::Completed),
            other => Err(format!("unknown reservation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub farm_id: Ulid,
    pub guest_id: Ulid,
    pub range: DateRange,
    pub guests: u32,
    pub total_price: u64,
    pub guest_name: String,
    pub guest_contact: String,
    /// Stored status: pending, confirmed or cancelled.
    pub status: ReservationStatus,
    /// Set while pending: the hold lapses at this instant.
    pub hold_expires_at: Option<Ms>,
    pub payment_ref: Option<String>,
    pub created_at: Ms,
}

impl Reservation {
    pub fn hold_expired(&self, now: Ms) -> bool {
        self.status == ReservationStatus::Pending
            && self.hold_expires_at.is_some_and(|t| t <= now)
    }

    /// Status as seen by readers. Stored cancellation wins, then hold
    /// expiry, then the date rule that turns confirmed into completed.
    pub fn effective_status(&self, today: NaiveDate, now: Ms) -> ReservationStatus {
        match self.status {
            ReservationStatus::Cancelled => ReservationStatus::Cancelled,
            ReservationStatus::Pending if self.hold_expired(now) => ReservationStatus::Cancelled,
            ReservationStatus::Pending => ReservationStatus::Pending,
            ReservationStatus::Confirmed | ReservationStatus::Completed => {
                if self.range.start <= today {
                    ReservationStatus::Completed
                } else {
                    ReservationStatus::Confirmed
                }
            }
        }
    }

    /// Whether this reservation takes its dates out of availability.
    pub fn blocks_dates(&self, now: Ms) -> bool {
        match self.status {
            ReservationStatus::Confirmed | ReservationStatus::Completed => true,
            ReservationStatus::Pending => !self.hold_expired(now),
            ReservationStatus::Cancelled => false,
        }
    }

    /// Copy with the derived status filled in, for handing out to readers.
    pub fn as_of(&self, today: NaiveDate, now: Ms) -> Reservation {
        let mut r = self.clone();
        r.status = self.effective_status(today, now);
        r
    }
}

/// Input to the authoritative create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReservation {
    pub id: Ulid,
    pub farm_id: Ulid,
    pub guest_id: Ulid,
    pub range: DateRange,
    pub guests: u32,
    pub guest_name: String,
    pub guest_contact: String,
    /// Place the reservation pending; a payment capture must follow.
    pub pay_later: bool,
}

// ── Reviews ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Ulid,
    pub farm_id: Ulid,
    pub reservation_id: Ulid,
    pub guest_id: Ulid,
    pub rating: u8,
    pub comment: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSummary {
    /// Mean rating rounded to one decimal; 0 without reviews.
    pub average_rating: f64,
    pub total_reviews: usize,
}

impl ReviewSummary {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                average_rating: 0.0,
                total_reviews: 0,
            };
        }
        let sum: u64 = reviews.iter().map(|r| r.rating as u64).sum();
        let mean = sum as f64 / reviews.len() as f64;
        Self {
            average_rating: (mean * 10.0).round() / 10.0,
            total_reviews: reviews.len(),
        }
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    FarmCreated {
        id: Ulid,
        title: String,
        location: String,
        nightly_rate: u64,
        capacity: u32,
    },
    FarmDeleted {
        id: Ulid,
    },
    ReservationPlaced {
        reservation: Reservation,
    },
    PaymentCaptured {
        id: Ulid,
        farm_id: Ulid,
        payment_ref: String,
    },
    ReservationCancelled {
        id: Ulid,
        farm_id: Ulid,
    },
    HoldExpired {
        id: Ulid,
        farm_id: Ulid,
    },
    ReviewAdded {
        review: Review,
    },
    ReviewUpdated {
        id: Ulid,
        farm_id: Ulid,
        rating: u8,
        comment: String,
    },
    ReviewRemoved {
        id: Ulid,
        farm_id: Ulid,
    },
}

impl Event {
    /// Farm the event belongs to.
    pub fn farm_id(&self) -> Ulid {
        match self {
            Event::FarmCreated { id, .. } | Event::FarmDeleted { id } => *id,
            Event::ReservationPlaced { reservation } => reservation.farm_id,
            Event::ReviewAdded { review } => review.farm_id,
            Event::PaymentCaptured { farm_id, .. }
            | Event::ReservationCancelled { farm_id, .. }
            | Event::HoldExpired { farm_id, .. }
            | Event::ReviewUpdated { farm_id, .. }
            | Event::ReviewRemoved { farm_id, .. } => *farm_id,
        }
    }
}

// ── Query inputs and result types ───────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FarmFilter {
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    pub min_rate: Option<u64>,
    pub max_rate: Option<u64>,
    /// Farms that take at least this many guests.
    pub min_capacity: Option<u32>,
}

impl FarmFilter {
    pub fn matches(&self, farm: &FarmState) -> bool {
        if let Some(loc) = &self.location
            && !farm.location.to_lowercase().contains(&loc.to_lowercase()) {
                return false;
            }
        self.min_rate.is_none_or(|m| farm.nightly_rate >= m)
            && self.max_rate.is_none_or(|m| farm.nightly_rate <= m)
            && self.min_capacity.is_none_or(|c| farm.capacity >= c)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FarmListing {
    pub farm: FarmInfo,
    pub reviews: ReviewSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DashboardStats {
    pub total_revenue: u64,
    pub active_reservations: usize,
    pub total_farms: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FarmRanking {
    pub farm_id: Ulid,
    pub title: String,
    pub reservations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: u64,
}
