//! Server-push observations and the queue their notifications are delivered through.

pub(crate) mod manager;
pub(crate) mod queue;

pub use manager::{ObservationHandle, ObservationState, ObservationStatus};
pub use queue::{Delivery, Listener, NotificationConsumer, ObservationId};
