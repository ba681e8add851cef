mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
mod quote;

pub use availability::blocked_ranges;
pub use conflict::{check_draft, find_conflict, has_conflict};
pub(crate) use conflict::{validate_guests, validate_text};
pub use error::{CancelRefusal, EngineError, ValidationError};
pub use quote::{nights_between, parse_stay, quote, Quote};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::clock::{Clock, SystemClock};
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;
use crate::wal::Wal;

pub type SharedFarmState = Arc<RwLock<FarmState>>;

/// How long an unpaid reservation holds its dates by default.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(15 * 60);

// ── WAL writer task ──────────────────────────────────────────────

type Ack = oneshot::Sender<io::Result<()>>;

pub(super) enum WalCommand {
    Append { event: Event, ack: Ack },
    Compact { snapshot: Vec<Event>, ack: Ack },
    AppendsSinceCompact { reply: oneshot::Sender<u64> },
}

/// Owns the WAL. Appends that are already queued when one arrives are written
/// together and share a single fsync; every sender in the batch gets the
/// batch's result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut pending: Option<WalCommand> = None;
    loop {
        let cmd = match pending.take() {
            Some(cmd) => cmd,
            None => match rx.recv().await {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match cmd {
            WalCommand::Append { event, ack } => {
                let mut batch = vec![(event, ack)];
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WalCommand::Append { event, ack } => batch.push((event, ack)),
                        other => {
                            // Runs after this batch is durable.
                            pending = Some(other);
                            break;
                        }
                    }
                }
                commit_batch(&mut wal, batch);
            }
            WalCommand::Compact { snapshot, ack } => {
                let result = Wal::write_snapshot(wal.path(), &snapshot).and_then(|()| wal.install_snapshot());
                let _ = ack.send(result);
            }
            WalCommand::AppendsSinceCompact { reply } => {
                let _ = reply.send(wal.appends_since_compact());
            }
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<(Event, Ack)>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let mut result = batch.iter().try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so a half-written batch is not
    // prepended to the next one.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }

    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    for (_, ack) in batch {
        let _ = ack.send(match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        });
    }
}

// ── Engine ───────────────────────────────────────────────────────

pub struct Engine {
    pub state: DashMap<Ulid, SharedFarmState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reservation or review id → farm id.
    pub(super) entity_to_farm: DashMap<Ulid, Ulid>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) pending_ttl_ms: Ms,
    /// Serializes farm create/delete with each other and with compaction,
    /// so the farm map only changes while no snapshot is being taken.
    pub(super) farm_lifecycle: RwLock<()>,
}

/// Apply a farm-scoped event. Caller holds the farm's write lock.
fn apply_to_farm(farm: &mut FarmState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ReservationPlaced { reservation } => {
            entity_map.insert(reservation.id, farm.id);
            farm.insert_reservation(reservation.clone());
        }
        Event::PaymentCaptured { id, payment_ref, .. } => {
            if let Some(r) = farm.reservation_mut(id) {
                r.status = ReservationStatus::Confirmed;
                r.hold_expires_at = None;
                r.payment_ref = Some(payment_ref.clone());
            }
        }
        Event::ReservationCancelled { id, .. } | Event::HoldExpired { id, .. } => {
            if let Some(r) = farm.reservation_mut(id) {
                r.status = ReservationStatus::Cancelled;
                r.hold_expires_at = None;
            }
        }
        Event::ReviewAdded { review } => {
            entity_map.insert(review.id, farm.id);
            farm.insert_review(review.clone());
        }
        Event::ReviewUpdated { id, rating, comment, .. } => {
            if let Some(r) = farm.review_mut(id) {
                r.rating = *rating;
                r.comment = comment.clone();
            }
        }
        Event::ReviewRemoved { id, .. } => {
            farm.remove_review(id);
            entity_map.remove(id);
        }
        // Farm lifecycle is handled on the farm map itself.
        Event::FarmCreated { .. } | Event::FarmDeleted { .. } => {}
    }
}

fn forget_entities(farm: &FarmState, entity_map: &DashMap<Ulid, Ulid>) {
    for r in &farm.reservations {
        entity_map.remove(&r.id);
    }
    for r in &farm.reviews {
        entity_map.remove(&r.id);
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        Self::with_clock(wal_path, notify, Arc::new(SystemClock))
    }

    /// Open the WAL at `wal_path`, rebuild state from it and start the writer task.
    pub fn with_clock(wal_path: PathBuf, notify: Arc<NotifyHub>, clock: Arc<dyn Clock>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let entity_to_farm = DashMap::new();
        let mut farms: HashMap<Ulid, FarmState> = HashMap::new();
        for event in &events {
            match event {
                Event::FarmCreated {
                    id,
                    title,
                    location,
                    nightly_rate,
                    capacity,
                } => {
                    let farm = FarmState::new(*id, title.clone(), location.clone(), *nightly_rate, *capacity);
                    farms.insert(*id, farm);
                }
                Event::FarmDeleted { id } => {
                    if let Some(farm) = farms.remove(id) {
                        forget_entities(&farm, &entity_to_farm);
                    }
                }
                other => {
                    if let Some(farm) = farms.get_mut(&other.farm_id()) {
                        apply_to_farm(farm, other, &entity_to_farm);
                    }
                }
            }
        }

        let state = DashMap::new();
        for (id, farm) in farms {
            state.insert(id, Arc::new(RwLock::new(farm)));
        }
        tracing::info!("replayed {} WAL events into {} farms", events.len(), state.len());

        Ok(Self {
            state,
            wal_tx,
            notify,
            entity_to_farm,
            clock,
            pending_ttl_ms: DEFAULT_PENDING_TTL.as_millis() as Ms,
            farm_lifecycle: RwLock::new(()),
        })
    }

    /// How long new pay-later reservations hold their dates.
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl_ms = ttl.as_millis().min(Ms::MAX as u128) as Ms;
        self
    }

    pub fn now_ms(&self) -> Ms {
        self.clock.now_ms()
    }

    async fn wal_request<T>(&self, cmd: WalCommand, rx: oneshot::Receiver<T>) -> Result<T, EngineError> {
        self.wal_tx
            .send(cmd)
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))
    }

    /// Durably append one event through the group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (ack, rx) = oneshot::channel();
        let cmd = WalCommand::Append {
            event: event.clone(),
            ack,
        };
        self.wal_request(cmd, rx)
            .await?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_farm_state(&self, id: &Ulid) -> Option<SharedFarmState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn farm_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_farm.get(entity_id).map(|e| *e.value())
    }

    /// Farms as a snapshot of handles, so no map shard stays locked across an await.
    pub(super) fn farm_handles(&self) -> Vec<SharedFarmState> {
        self.state.iter().map(|e| e.value().clone()).collect()
    }

    /// WAL append, apply, publish. The farm stays locked throughout.
    pub(super) async fn persist_and_apply(&self, farm: &mut FarmState, event: Event) -> Result<(), EngineError> {
        self.wal_append(&event).await?;
        apply_to_farm(farm, &event, &self.entity_to_farm);
        self.notify.send(farm.id, &event);
        Ok(())
    }

    /// Like `persist_and_apply` for an event that introduces `entity_id`.
    /// The id is reserved engine-wide first, so two farms can never both
    /// accept it.
    pub(super) async fn persist_new_entity(
        &self,
        farm: &mut FarmState,
        entity_id: Ulid,
        event: Event,
    ) -> Result<(), EngineError> {
        match self.entity_to_farm.entry(entity_id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(entity_id)),
            Entry::Vacant(slot) => {
                slot.insert(farm.id);
            }
        }
        if let Err(e) = self.persist_and_apply(farm, event).await {
            self.entity_to_farm.remove(&entity_id);
            return Err(e);
        }
        Ok(())
    }

    /// Write-lock a farm that still exists.
    pub(super) async fn farm_write(&self, farm_id: Ulid) -> Result<OwnedRwLockWriteGuard<FarmState>, EngineError> {
        let farm = self.get_farm_state(&farm_id).ok_or(EngineError::NotFound(farm_id))?;
        let guard = farm.write_owned().await;
        if guard.deleted {
            return Err(EngineError::NotFound(farm_id));
        }
        Ok(guard)
    }

    /// Write-lock the farm that owns a reservation or review.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<FarmState>, EngineError> {
        let farm_id = self
            .farm_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        self.farm_write(farm_id)
            .await
            .map_err(|_| EngineError::NotFound(*entity_id))
    }
}
