//! Guest-side booking: a draft is checked against cached availability as it
//! is edited, then submitted once to a store that re-checks atomically.

mod flow;
mod remote;
mod store;

pub use flow::{BookingFlow, DraftFeedback, FlowState, SubmitError};
pub use remote::RemoteStore;
pub use store::{ReservationStore, StoreError};
