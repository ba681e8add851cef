use ulid::Ulid;

use crate::engine::{check_draft, quote, validate_guests, validate_text, Quote, ValidationError};
use crate::limits::MAX_GUEST_FIELD_LEN;
use crate::model::*;

use super::store::{ReservationStore, StoreError};

/// Where a booking attempt stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Drafting,
    Validating,
    AwaitingServerConfirmation,
    Confirmed(Reservation),
    Rejected(SubmitError),
}

/// Why a submission did not produce a reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Rejected locally; the store was never called.
    Validation(ValidationError),
    /// The store found these dates taken. Availability must be refreshed.
    Conflict(DateRange),
    /// Failed for reasons unrelated to the booking. Not retried.
    Transient(String),
    /// The store refused for another reason.
    Refused(String),
    /// Cached availability is out of date; call `refresh` first.
    StaleAvailability,
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Validation(e) => write!(f, "{e}"),
            SubmitError::Conflict(range) => write!(f, "these dates overlap an existing booking {range}"),
            SubmitError::Transient(msg) => write!(f, "booking failed, please retry: {msg}"),
            SubmitError::Refused(msg) => write!(f, "booking refused: {msg}"),
            SubmitError::StaleAvailability => write!(f, "availability changed, refresh before booking"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Instant answer to a date edit, computed from cached availability only.
/// Warnings here never block a submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftFeedback {
    pub conflict: Option<DateRange>,
    pub quote: Option<Quote>,
    pub invalid: Option<ValidationError>,
}

#[derive(Debug, Clone, Default)]
struct Draft {
    start: Option<String>,
    end: Option<String>,
    guests: u32,
    guest_name: String,
    guest_contact: String,
    pay_later: bool,
}

/// One guest booking one farm: local checks first, then a single
/// authoritative create against the store.
pub struct BookingFlow<S> {
    store: S,
    farm: FarmInfo,
    guest_id: Ulid,
    blocked: Vec<DateRange>,
    stale: bool,
    draft: Draft,
    state: FlowState,
}

impl<S: ReservationStore> BookingFlow<S> {
    /// Load the farm and its availability, ready for drafting.
    pub async fn open(store: S, farm_id: Ulid, guest_id: Ulid) -> Result<Self, StoreError> {
        let farm = store.get_farm(farm_id).await?;
        let blocked = store.availability(farm_id).await?;
        Ok(Self {
            store,
            farm,
            guest_id,
            blocked,
            stale: false,
            draft: Draft {
                guests: 1,
                ..Draft::default()
            },
            state: FlowState::Drafting,
        })
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn farm(&self) -> &FarmInfo {
        &self.farm
    }

    /// Cached blocked ranges; not authoritative.
    pub fn blocked(&self) -> &[DateRange] {
        &self.blocked
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn edit(&mut self) {
        if !matches!(self.state, FlowState::Drafting) {
            self.state = FlowState::Drafting;
        }
    }

    pub fn set_dates(&mut self, start: Option<&str>, end: Option<&str>) -> DraftFeedback {
        self.edit();
        self.draft.start = start.map(str::to_string);
        self.draft.end = end.map(str::to_string);
        self.feedback()
    }

    pub fn set_guests(&mut self, guests: u32) {
        self.edit();
        self.draft.guests = guests;
    }

    pub fn set_guest_name(&mut self, name: impl Into<String>) {
        self.edit();
        self.draft.guest_name = name.into();
    }

    pub fn set_guest_contact(&mut self, contact: impl Into<String>) {
        self.edit();
        self.draft.guest_contact = contact.into();
    }

    /// Place the reservation pending; a payment capture confirms it later.
    pub fn set_pay_later(&mut self, pay_later: bool) {
        self.edit();
        self.draft.pay_later = pay_later;
    }

    /// Conflict warning and price for the current dates.
    pub fn feedback(&self) -> DraftFeedback {
        match check_draft(self.draft.start.as_deref(), self.draft.end.as_deref(), &self.blocked) {
            Ok((stay, conflict)) => match quote(&stay, self.farm.nightly_rate) {
                Ok(q) => DraftFeedback {
                    conflict,
                    quote: Some(q),
                    invalid: None,
                },
                Err(e) => DraftFeedback {
                    conflict,
                    quote: None,
                    invalid: Some(e),
                },
            },
            Err(e) => DraftFeedback {
                invalid: Some(e),
                ..DraftFeedback::default()
            },
        }
    }

    fn validate(&self) -> Result<DateRange, ValidationError> {
        let (stay, _) = check_draft(self.draft.start.as_deref(), self.draft.end.as_deref(), &[])?;
        validate_text(&self.draft.guest_name, "guest_name", MAX_GUEST_FIELD_LEN)?;
        validate_text(&self.draft.guest_contact, "guest_contact", MAX_GUEST_FIELD_LEN)?;
        validate_guests(self.draft.guests, self.farm.capacity)?;
        Ok(stay)
    }

    fn reject(&mut self, err: SubmitError) -> SubmitError {
        self.state = FlowState::Rejected(err.clone());
        err
    }

    /// Validate locally, then make exactly one create call. Never retries.
    pub async fn submit(&mut self) -> Result<Reservation, SubmitError> {
        if self.stale {
            return Err(self.reject(SubmitError::StaleAvailability));
        }

        self.state = FlowState::Validating;
        let range = match self.validate() {
            Ok(range) => range,
            Err(e) => return Err(self.reject(SubmitError::Validation(e))),
        };

        self.state = FlowState::AwaitingServerConfirmation;
        let new = NewReservation {
            id: Ulid::new(),
            farm_id: self.farm.id,
            guest_id: self.guest_id,
            range,
            guests: self.draft.guests,
            guest_name: self.draft.guest_name.trim().to_string(),
            guest_contact: self.draft.guest_contact.trim().to_string(),
            pay_later: self.draft.pay_later,
        };
        match self.store.create_reservation(new).await {
            Ok(reservation) => {
                let pos = self.blocked.partition_point(|b| b.start <= reservation.range.start);
                self.blocked.insert(pos, reservation.range);
                self.state = FlowState::Confirmed(reservation.clone());
                Ok(reservation)
            }
            Err(StoreError::Conflict(range)) => {
                self.stale = true;
                Err(self.reject(SubmitError::Conflict(range)))
            }
            Err(StoreError::Transient(msg)) => {
                self.stale = true;
                Err(self.reject(SubmitError::Transient(msg)))
            }
            Err(e @ (StoreError::Invalid(_) | StoreError::NotFound(_) | StoreError::Refused(_))) => {
                Err(self.reject(SubmitError::Refused(e.to_string())))
            }
        }
    }

    /// Re-fetch availability and go back to drafting.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.blocked = self.store.availability(self.farm.id).await?;
        self.stale = false;
        self.state = FlowState::Drafting;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(parse_date(a).unwrap(), parse_date(b).unwrap()).unwrap()
    }

    /// Store that answers from fixed data and counts every call.
    struct MockStore {
        farm: FarmInfo,
        blocked: Mutex<Vec<DateRange>>,
        create_result: Mutex<Option<StoreError>>,
        calls: AtomicUsize,
        creates: AtomicUsize,
    }

    impl MockStore {
        fn new(blocked: Vec<DateRange>) -> Self {
            Self {
                farm: FarmInfo {
                    id: Ulid::new(),
                    title: "Mango Grove".into(),
                    location: "Goa".into(),
                    nightly_rate: 5000,
                    capacity: 10,
                },
                blocked: Mutex::new(blocked),
                create_result: Mutex::new(None),
                calls: AtomicUsize::new(0),
                creates: AtomicUsize::new(0),
            }
        }

        fn fail_next_create(&self, err: StoreError) {
            *self.create_result.lock().unwrap() = Some(err);
        }
    }

    #[async_trait]
    impl ReservationStore for MockStore {
        async fn get_farm(&self, _farm_id: Ulid) -> Result<FarmInfo, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.farm.clone())
        }

        async fn availability(&self, _farm_id: Ulid) -> Result<Vec<DateRange>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.blocked.lock().unwrap().clone())
        }

        async fn create_reservation(&self, new: NewReservation) -> Result<Reservation, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.creates.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.create_result.lock().unwrap().take() {
                return Err(err);
            }
            Ok(Reservation {
                id: new.id,
                farm_id: new.farm_id,
                guest_id: new.guest_id,
                range: new.range,
                guests: new.guests,
                total_price: new.range.nights() as u64 * self.farm.nightly_rate,
                guest_name: new.guest_name,
                guest_contact: new.guest_contact,
                status: if new.pay_later {
                    ReservationStatus::Pending
                } else {
                    ReservationStatus::Confirmed
                },
                hold_expires_at: None,
                payment_ref: None,
                created_at: 0,
            })
        }
    }

    async fn open(blocked: Vec<DateRange>) -> BookingFlow<MockStore> {
        let store = MockStore::new(blocked);
        let farm_id = store.farm.id;
        let mut flow = BookingFlow::open(store, farm_id, Ulid::new()).await.unwrap();
        flow.set_guest_name("Asha Rao");
        flow.set_guest_contact("asha@example.com");
        flow.set_guests(2);
        flow
    }

    #[tokio::test]
    async fn date_edits_warn_without_network() {
        let mut flow = open(vec![range("2025-03-10", "2025-03-15")]).await;
        let calls = flow.store().calls.load(Ordering::SeqCst);

        let feedback = flow.set_dates(Some("2025-03-15"), Some("2025-03-18"));
        assert_eq!(feedback.conflict, Some(range("2025-03-10", "2025-03-15")));
        assert_eq!(feedback.quote.unwrap().total_price, 15000);
        assert!(feedback.invalid.is_none());

        let feedback = flow.set_dates(Some("2025-03-20"), None);
        assert_eq!(feedback.invalid, Some(ValidationError::MissingDates));
        assert!(feedback.conflict.is_none());

        let feedback = flow.set_dates(Some("2025-03-20"), Some("March 22"));
        assert!(matches!(feedback.invalid, Some(ValidationError::InvalidDate(_))));

        assert_eq!(flow.store().calls.load(Ordering::SeqCst), calls);
        assert_eq!(flow.state(), &FlowState::Drafting);
    }

    #[tokio::test]
    async fn too_many_guests_never_reach_the_store() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        flow.set_guests(15);
        let calls = flow.store().calls.load(Ordering::SeqCst);

        let err = flow.submit().await.unwrap_err();
        assert_eq!(
            err,
            SubmitError::Validation(ValidationError::CapacityExceeded {
                guests: 15,
                capacity: 10
            })
        );
        assert_eq!(flow.state(), &FlowState::Rejected(err));
        assert_eq!(flow.store().calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn missing_fields_reject_locally() {
        let mut flow = open(vec![]).await;
        assert_eq!(
            flow.submit().await.unwrap_err(),
            SubmitError::Validation(ValidationError::MissingDates)
        );

        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        flow.set_guest_name("   ");
        assert_eq!(
            flow.submit().await.unwrap_err(),
            SubmitError::Validation(ValidationError::MissingField("guest_name"))
        );

        flow.set_guest_name("Asha Rao");
        flow.set_guests(0);
        assert_eq!(
            flow.submit().await.unwrap_err(),
            SubmitError::Validation(ValidationError::NoGuests)
        );
        assert_eq!(flow.store().creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn confirmed_submission() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        let reservation = assert_ok!(flow.submit().await);
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.total_price, 15000);
        assert_eq!(reservation.guest_name, "Asha Rao");
        assert_eq!(flow.state(), &FlowState::Confirmed(reservation.clone()));
        // The new stay now shows in the local index.
        assert_eq!(flow.blocked(), &[range("2025-03-10", "2025-03-13")]);
    }

    #[tokio::test]
    async fn pay_later_yields_pending() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        flow.set_pay_later(true);
        assert_eq!(flow.submit().await.unwrap().status, ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn conflict_requires_refresh() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-12"), Some("2025-03-14"));
        let taken = range("2025-03-10", "2025-03-15");
        flow.store().fail_next_create(StoreError::Conflict(taken));

        assert_eq!(flow.submit().await.unwrap_err(), SubmitError::Conflict(taken));
        assert!(flow.is_stale());

        // Resubmitting without refreshing is refused before any call.
        let creates = flow.store().creates.load(Ordering::SeqCst);
        assert_eq!(flow.submit().await.unwrap_err(), SubmitError::StaleAvailability);
        assert_eq!(flow.store().creates.load(Ordering::SeqCst), creates);

        flow.store().blocked.lock().unwrap().push(taken);
        flow.refresh().await.unwrap();
        assert!(!flow.is_stale());
        assert_eq!(flow.state(), &FlowState::Drafting);
        let feedback = flow.set_dates(Some("2025-03-12"), Some("2025-03-14"));
        assert_eq!(feedback.conflict, Some(taken));

        flow.set_dates(Some("2025-03-20"), Some("2025-03-22"));
        assert!(flow.submit().await.is_ok());
    }

    #[tokio::test]
    async fn transient_failure_is_not_retried() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        flow.store().fail_next_create(StoreError::Transient("connection reset".into()));

        let err = assert_err!(flow.submit().await);
        assert!(matches!(err, SubmitError::Transient(_)));
        assert_eq!(flow.store().creates.load(Ordering::SeqCst), 1);
        assert!(flow.is_stale());
    }

    #[tokio::test]
    async fn server_refusal_is_surfaced() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        flow.store().fail_next_create(StoreError::Invalid("check-in is before today".into()));
        assert!(matches!(flow.submit().await.unwrap_err(), SubmitError::Refused(_)));
        // Not an availability problem: the cache stays usable.
        assert!(!flow.is_stale());
    }

    #[tokio::test]
    async fn each_submission_uses_a_fresh_id() {
        let mut flow = open(vec![]).await;
        flow.set_dates(Some("2025-03-10"), Some("2025-03-13"));
        let first = assert_ok!(flow.submit().await);
        flow.set_dates(Some("2025-04-10"), Some("2025-04-13"));
        let second = assert_ok!(flow.submit().await);
        assert_ne!(first.id, second.id);
    }
}
