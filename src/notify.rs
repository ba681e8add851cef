use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::Engine;
use crate::model::{Event, Reservation, ReservationStatus};

const FARM_CHANNEL_CAPACITY: usize = 256;
const FIREHOSE_CAPACITY: usize = 4096;

/// Fan-out of applied events: one channel per farm plus one carrying every event.
pub struct NotifyHub {
    farms: DashMap<Ulid, broadcast::Sender<Event>>,
    all: broadcast::Sender<Event>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            farms: DashMap::new(),
            all: broadcast::channel(FIREHOSE_CAPACITY).0,
        }
    }

    /// Events of one farm. The channel is created on first subscription.
    pub fn subscribe(&self, farm_id: Ulid) -> broadcast::Receiver<Event> {
        self.farms
            .entry(farm_id)
            .or_insert_with(|| broadcast::channel(FARM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all.subscribe()
    }

    /// Publish an applied event. Nobody listening is fine.
    pub fn send(&self, farm_id: Ulid, event: &Event) {
        if let Some(tx) = self.farms.get(&farm_id) {
            let _ = tx.send(event.clone());
        }
        let _ = self.all.send(event.clone());
    }

    /// Drop a farm's channel once the farm is gone.
    pub fn remove(&self, farm_id: &Ulid) {
        self.farms.remove(farm_id);
    }
}

#[derive(Debug)]
pub struct NotifyError(pub String);

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl std::error::Error for NotifyError {}

/// Tells a guest their stay is booked.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(&self, reservation: &Reservation) -> Result<(), NotifyError>;
}

/// Writes the confirmation as a structured log line.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn booking_confirmed(&self, reservation: &Reservation) -> Result<(), NotifyError> {
        let body = serde_json::to_string(reservation).map_err(|e| NotifyError(e.to_string()))?;
        info!(
            reservation_id = %reservation.id,
            guest_contact = %reservation.guest_contact,
            reservation = %body,
            "booking confirmed"
        );
        Ok(())
    }
}

/// Reservation that just became confirmed by `event`, if any.
async fn confirmed_by(engine: &Engine, event: &Event) -> Option<Reservation> {
    match event {
        Event::ReservationPlaced { reservation } if reservation.status == ReservationStatus::Confirmed => {
            Some(reservation.clone())
        }
        Event::PaymentCaptured { id, .. } => engine.get_reservation(*id).await.ok(),
        _ => None,
    }
}

/// Calls the notifier for every confirmed booking until the hub goes away.
/// Failures are logged; the booking itself is already committed.
pub async fn run_dispatcher(engine: Arc<Engine>, notifier: Arc<dyn Notifier>) {
    let mut rx = engine.notify.subscribe_all();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("notification dispatcher lagged, skipped {skipped} events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let Some(reservation) = confirmed_by(&engine, &event).await else {
            continue;
        };
        match notifier.booking_confirmed(&reservation).await {
            Ok(()) => debug!("notified guest of {}", reservation.id),
            Err(e) => warn!("reservation {}: {e}", reservation.id),
        }
    }
}
