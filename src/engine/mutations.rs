use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::clock::date_of;
use crate::limits::*;
use crate::model::*;
use crate::observability;

use super::conflict::{check_no_conflict, validate_bookable, validate_guests, validate_text};
use super::quote::quote;
use super::{forget_entities, CancelRefusal, Engine, EngineError, ValidationError, WalCommand};

fn validate_listing(title: &str, location: &str, nightly_rate: u64, capacity: u32) -> Result<(), ValidationError> {
    validate_text(title, "title", MAX_TITLE_LEN)?;
    validate_text(location, "location", MAX_LOCATION_LEN)?;
    if nightly_rate == 0 || nightly_rate > MAX_NIGHTLY_RATE {
        return Err(ValidationError::InvalidRate(nightly_rate));
    }
    if capacity == 0 || capacity > MAX_CAPACITY {
        return Err(ValidationError::InvalidCapacity(capacity));
    }
    Ok(())
}

impl Engine {
    pub async fn create_farm(
        &self,
        id: Ulid,
        title: String,
        location: String,
        nightly_rate: u64,
        capacity: u32,
    ) -> Result<(), EngineError> {
        validate_listing(&title, &location, nightly_rate, capacity)?;
        let _lifecycle = self.farm_lifecycle.write().await;
        if self.state.len() >= MAX_FARMS {
            return Err(EngineError::LimitExceeded("too many farms"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::FarmCreated {
            id,
            title: title.clone(),
            location: location.clone(),
            nightly_rate,
            capacity,
        };
        self.wal_append(&event).await?;
        let farm = FarmState::new(id, title, location, nightly_rate, capacity);
        self.state.insert(id, Arc::new(RwLock::new(farm)));
        self.notify.send(id, &event);
        Ok(())
    }

    /// Remove a farm with its history. Refused while any stay is still upcoming.
    pub async fn delete_farm(&self, id: Ulid) -> Result<(), EngineError> {
        let _lifecycle = self.farm_lifecycle.write().await;
        let mut guard = self.farm_write(id).await?;
        let now = self.now_ms();
        let today = date_of(now);
        let upcoming = guard.reservations.iter().any(|r| {
            matches!(
                r.effective_status(today, now),
                ReservationStatus::Pending | ReservationStatus::Confirmed
            )
        });
        if upcoming {
            return Err(EngineError::HasActiveReservations(id));
        }

        let event = Event::FarmDeleted { id };
        self.wal_append(&event).await?;
        guard.deleted = true;
        forget_entities(&guard, &self.entity_to_farm);
        self.state.remove(&id);
        self.notify.send(id, &event);
        self.notify.remove(&id);
        Ok(())
    }

    /// Validate, then check for conflicts and insert under the farm's write
    /// lock. Of several concurrent overlapping requests exactly one succeeds.
    pub async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, EngineError> {
        validate_text(&new.guest_name, "guest_name", MAX_GUEST_FIELD_LEN)?;
        validate_text(&new.guest_contact, "guest_contact", MAX_GUEST_FIELD_LEN)?;
        let now = self.now_ms();
        let today = date_of(now);
        validate_bookable(&new.range, today)?;
        if self.entity_to_farm.contains_key(&new.id) {
            return Err(EngineError::AlreadyExists(new.id));
        }

        let mut guard = self.farm_write(new.farm_id).await?;
        validate_guests(new.guests, guard.capacity)?;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_FARM {
            return Err(EngineError::LimitExceeded("too many reservations on farm"));
        }
        if let Err(e) = check_no_conflict(&guard, &new.range, now) {
            metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }
        let price = quote(&new.range, guard.nightly_rate)?;

        let (status, hold_expires_at) = if new.pay_later {
            (ReservationStatus::Pending, Some(now.saturating_add(self.pending_ttl_ms)))
        } else {
            (ReservationStatus::Confirmed, None)
        };
        let reservation = Reservation {
            id: new.id,
            farm_id: new.farm_id,
            guest_id: new.guest_id,
            range: new.range,
            guests: new.guests,
            total_price: price.total_price,
            guest_name: new.guest_name,
            guest_contact: new.guest_contact,
            status,
            hold_expires_at,
            payment_ref: None,
            created_at: now,
        };
        self.persist_new_entity(
            &mut guard,
            reservation.id,
            Event::ReservationPlaced {
                reservation: reservation.clone(),
            },
        )
        .await?;
        metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL, "status" => status.as_str()).increment(1);
        Ok(reservation.as_of(today, now))
    }

    /// Confirm a pending reservation whose hold is still live.
    pub async fn capture_payment(&self, id: Ulid, payment_ref: String) -> Result<Reservation, EngineError> {
        validate_text(&payment_ref, "payment_ref", MAX_PAYMENT_REF_LEN)?;
        let mut guard = self.resolve_entity_write(&id).await?;
        let now = self.now_ms();
        let today = date_of(now);
        let r = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
        match r.effective_status(today, now) {
            ReservationStatus::Pending => {}
            ReservationStatus::Cancelled if r.hold_expired(now) => {
                return Err(EngineError::InvalidState {
                    id,
                    reason: "payment hold has expired",
                });
            }
            ReservationStatus::Cancelled => {
                return Err(EngineError::InvalidState {
                    id,
                    reason: "reservation is cancelled",
                });
            }
            ReservationStatus::Confirmed | ReservationStatus::Completed => {
                return Err(EngineError::InvalidState {
                    id,
                    reason: "payment already captured",
                });
            }
        }

        let farm_id = guard.id;
        self.persist_and_apply(
            &mut guard,
            Event::PaymentCaptured {
                id,
                farm_id,
                payment_ref,
            },
        )
        .await?;
        guard
            .reservation(&id)
            .map(|r| r.as_of(today, now))
            .ok_or(EngineError::NotFound(id))
    }

    /// Guest cancels their own upcoming stay. Refusals change nothing.
    pub async fn cancel_reservation(&self, id: Ulid, guest_id: Ulid) -> Result<Reservation, EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        let now = self.now_ms();
        let today = date_of(now);
        let r = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
        if r.guest_id != guest_id {
            return Err(EngineError::Forbidden(id));
        }
        let refusal = match r.effective_status(today, now) {
            ReservationStatus::Cancelled => Some(CancelRefusal::AlreadyCancelled),
            ReservationStatus::Completed => Some(CancelRefusal::Completed),
            _ if r.range.start <= today => Some(CancelRefusal::AlreadyStarted),
            _ => None,
        };
        if let Some(reason) = refusal {
            return Err(EngineError::CannotCancel { id, reason });
        }

        let farm_id = guard.id;
        self.persist_and_apply(&mut guard, Event::ReservationCancelled { id, farm_id })
            .await?;
        metrics::counter!(observability::RESERVATIONS_CANCELLED_TOTAL).increment(1);
        guard
            .reservation(&id)
            .map(|r| r.as_of(today, now))
            .ok_or(EngineError::NotFound(id))
    }

    /// Record that an unpaid hold lapsed. Returns the farm id.
    pub async fn expire_reservation(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        let r = guard.reservation(&id).ok_or(EngineError::NotFound(id))?;
        if !r.hold_expired(self.now_ms()) {
            return Err(EngineError::InvalidState {
                id,
                reason: "hold has not expired",
            });
        }
        let farm_id = guard.id;
        self.persist_and_apply(&mut guard, Event::HoldExpired { id, farm_id })
            .await?;
        metrics::counter!(observability::RESERVATIONS_EXPIRED_TOTAL).increment(1);
        Ok(farm_id)
    }

    /// A guest reviews a completed stay of theirs, once per reservation.
    pub async fn add_review(
        &self,
        id: Ulid,
        farm_id: Ulid,
        reservation_id: Ulid,
        guest_id: Ulid,
        rating: i64,
        comment: String,
    ) -> Result<Review, EngineError> {
        if !(1..=5).contains(&rating) {
            return Err(ValidationError::InvalidRating(rating).into());
        }
        validate_text(&comment, "comment", MAX_COMMENT_LEN)?;
        if self.entity_to_farm.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let mut guard = self.farm_write(farm_id).await?;
        if guard.reviews.len() >= MAX_REVIEWS_PER_FARM {
            return Err(EngineError::LimitExceeded("too many reviews on farm"));
        }
        let now = self.now_ms();
        let stay = guard
            .reservation(&reservation_id)
            .ok_or(EngineError::NotFound(reservation_id))?;
        if stay.guest_id != guest_id {
            return Err(EngineError::Forbidden(reservation_id));
        }
        if stay.effective_status(date_of(now), now) != ReservationStatus::Completed {
            return Err(EngineError::InvalidState {
                id: reservation_id,
                reason: "only completed stays can be reviewed",
            });
        }
        if guard.reviews.iter().any(|r| r.reservation_id == reservation_id) {
            return Err(EngineError::AlreadyExists(reservation_id));
        }

        let review = Review {
            id,
            farm_id,
            reservation_id,
            guest_id,
            // Range-checked above.
            rating: rating as u8,
            comment,
            created_at: now,
        };
        self.persist_new_entity(
            &mut guard,
            review.id,
            Event::ReviewAdded {
                review: review.clone(),
            },
        )
        .await?;
        Ok(review)
    }

    /// The reviewer edits their own review. Fields left `None` keep their value.
    pub async fn update_review(
        &self,
        id: Ulid,
        guest_id: Ulid,
        rating: Option<i64>,
        comment: Option<String>,
    ) -> Result<Review, EngineError> {
        if let Some(rating) = rating
            && !(1..=5).contains(&rating)
        {
            return Err(ValidationError::InvalidRating(rating).into());
        }
        if let Some(comment) = &comment {
            validate_text(comment, "comment", MAX_COMMENT_LEN)?;
        }

        let mut guard = self.resolve_entity_write(&id).await?;
        let current = guard.review(&id).ok_or(EngineError::NotFound(id))?;
        if current.guest_id != guest_id {
            return Err(EngineError::Forbidden(id));
        }
        let event = Event::ReviewUpdated {
            id,
            farm_id: guard.id,
            // Range-checked above.
            rating: rating.map_or(current.rating, |r| r as u8),
            comment: comment.unwrap_or_else(|| current.comment.clone()),
        };
        self.persist_and_apply(&mut guard, event).await?;
        guard.review(&id).cloned().ok_or(EngineError::NotFound(id))
    }

    pub async fn remove_review(&self, id: Ulid, guest_id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.resolve_entity_write(&id).await?;
        let review = guard
            .reviews
            .iter()
            .find(|r| r.id == id)
            .ok_or(EngineError::NotFound(id))?;
        if review.guest_id != guest_id {
            return Err(EngineError::Forbidden(id));
        }
        let farm_id = guard.id;
        self.persist_and_apply(&mut guard, Event::ReviewRemoved { id, farm_id })
            .await
    }

    /// Pending reservations whose hold has lapsed, as `(reservation, farm)`.
    /// Farms locked by a writer are skipped until the next sweep.
    pub fn collect_expired_holds(&self, now: Ms) -> Vec<(Ulid, Ulid)> {
        let mut expired = Vec::new();
        for farm in self.farm_handles() {
            if let Ok(guard) = farm.try_read() {
                expired.extend(
                    guard
                        .reservations
                        .iter()
                        .filter(|r| r.hold_expired(now))
                        .map(|r| (r.id, guard.id)),
                );
            }
        }
        expired
    }

    /// Rewrite the WAL as the minimal event list that rebuilds the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        // No farm appears or disappears until the new log is installed.
        let _lifecycle = self.farm_lifecycle.write().await;
        // Hold every farm's read lock until the snapshot is installed, so no
        // event lands in the old log after its farm was captured.
        let mut guards = Vec::new();
        for farm in self.farm_handles() {
            guards.push(farm.read_owned().await);
        }

        let mut snapshot = Vec::new();
        for farm in guards.iter().filter(|g| !g.deleted) {
            snapshot.push(Event::FarmCreated {
                id: farm.id,
                title: farm.title.clone(),
                location: farm.location.clone(),
                nightly_rate: farm.nightly_rate,
                capacity: farm.capacity,
            });
            snapshot.extend(farm.reservations.iter().map(|r| Event::ReservationPlaced {
                reservation: r.clone(),
            }));
            snapshot.extend(farm.reviews.iter().map(|r| Event::ReviewAdded { review: r.clone() }));
        }

        let (ack, rx) = oneshot::channel();
        let result = self
            .wal_request(WalCommand::Compact { snapshot, ack }, rx)
            .await?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guards);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (reply, rx) = oneshot::channel();
        self.wal_request(WalCommand::AppendsSinceCompact { reply }, rx)
            .await
            .unwrap_or(0)
    }
}
