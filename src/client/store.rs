use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::*;

/// Failure reported by a reservation store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The dates overlap this active reservation.
    Conflict(DateRange),
    /// The store rejected the input.
    Invalid(String),
    NotFound(String),
    /// A business rule other than availability said no.
    Refused(String),
    /// Network or storage failure; the same request may succeed later.
    Transient(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict(range) => write!(f, "dates conflict with {range}"),
            StoreError::Invalid(msg) => write!(f, "invalid: {msg}"),
            StoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            StoreError::Refused(msg) => write!(f, "refused: {msg}"),
            StoreError::Transient(msg) => write!(f, "temporarily unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<EngineError> for StoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Conflict { range, .. } => StoreError::Conflict(range),
            EngineError::Validation(v) => StoreError::Invalid(v.to_string()),
            EngineError::NotFound(id) => StoreError::NotFound(id.to_string()),
            e if e.is_transient() => StoreError::Transient(e.to_string()),
            e => StoreError::Refused(e.to_string()),
        }
    }
}

/// What a booking flow needs from wherever reservations live.
/// `create_reservation` must check availability atomically with the insert.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn get_farm(&self, farm_id: Ulid) -> Result<FarmInfo, StoreError>;

    /// Blocked ranges of the farm, ordered by check-in.
    async fn availability(&self, farm_id: Ulid) -> Result<Vec<DateRange>, StoreError>;

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError>;
}

#[async_trait]
impl ReservationStore for Engine {
    async fn get_farm(&self, farm_id: Ulid) -> Result<FarmInfo, StoreError> {
        Ok(Engine::get_farm(self, farm_id).await?.farm)
    }

    async fn availability(&self, farm_id: Ulid) -> Result<Vec<DateRange>, StoreError> {
        Ok(Engine::availability(self, farm_id).await?)
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        Ok(Engine::create_reservation(self, new).await?)
    }
}

#[async_trait]
impl<S: ReservationStore + ?Sized> ReservationStore for Arc<S> {
    async fn get_farm(&self, farm_id: Ulid) -> Result<FarmInfo, StoreError> {
        (**self).get_farm(farm_id).await
    }

    async fn availability(&self, farm_id: Ulid) -> Result<Vec<DateRange>, StoreError> {
        (**self).availability(farm_id).await
    }

    async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        (**self).create_reservation(new).await
    }
}
