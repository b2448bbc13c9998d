//! Single-consumer hand-off of notifications from the reader task.
//!
//! Producers (the session's reader task and observation lifecycle tasks) never block: when the
//! buffer holds `capacity` notifications, the oldest buffered notification is dropped to make
//! room. Close markers are not counted against the capacity and are never dropped.
//!
//! Listeners run only inside [`NotificationConsumer`] calls, one at a time, with no lock held.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::message::Notification;
use crate::prelude::{debug, warn};

/// Consecutive overflows logged at WARN before downgrading to DEBUG.
const MAX_CONSECUTIVE_DROP_WARNINGS: u32 = 3;

/// Identifies one observation on a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(pub(crate) u64);

impl ObservationId {
    /// The numeric value, unique per client.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// A notification tagged with the observation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The observation that produced the notification.
    pub observation: ObservationId,
    /// The notification itself.
    pub notification: Notification,
}

/// Callback invoked with each notification of one observation.
pub type Listener = Box<dyn FnMut(&Notification) + Send + 'static>;

enum Event {
    Notification(Delivery),
    Closed(ObservationId),
}

/// Tracks consecutive overflows so repeated drops do not flood the log.
struct DropTracker {
    consecutive: u32,
}

impl DropTracker {
    fn record_drop(&mut self) -> bool {
        self.consecutive = self.consecutive.saturating_add(1);
        self.consecutive <= MAX_CONSECUTIVE_DROP_WARNINGS
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

struct State {
    events: VecDeque<Event>,
    buffered: usize,
    closed: bool,
    drops: DropTracker,
}

struct Shared {
    state: Mutex<State>,
    listeners: Mutex<HashMap<ObservationId, Listener>>,
    ready: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, HashMap<ObservationId, Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Producer side of the queue. Cheap to clone.
#[derive(Clone)]
pub(crate) struct NotificationQueue {
    shared: Arc<Shared>,
}

impl fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("capacity", &self.shared.capacity)
            .field("dropped", &self.shared.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl NotificationQueue {
    /// Creates a queue and its single consumer.
    pub(crate) fn new(capacity: usize) -> (Self, NotificationConsumer) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                events: VecDeque::new(),
                buffered: 0,
                closed: false,
                drops: DropTracker { consecutive: 0 },
            }),
            listeners: Mutex::new(HashMap::new()),
            ready: Notify::new(),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            NotificationConsumer { shared },
        )
    }

    /// Installs the listener for `id`. Must happen before the observation is routed.
    pub(crate) fn register_listener(&self, id: ObservationId, listener: Listener) {
        if self.shared.state().closed {
            return;
        }
        self.shared.listeners().insert(id, listener);
    }

    /// Removes the listener of an observation that never became active.
    pub(crate) fn unregister_listener(&self, id: ObservationId) {
        self.shared.listeners().remove(&id);
    }

    /// Appends a notification, dropping the oldest buffered one when full.
    ///
    /// Returns `false` if the queue is closed and the notification was discarded.
    pub(crate) fn push(&self, observation: ObservationId, notification: Notification) -> bool {
        let mut state = self.shared.state();
        if state.closed {
            return false;
        }

        if state.buffered >= self.shared.capacity {
            if let Some(pos) = state
                .events
                .iter()
                .position(|e| matches!(e, Event::Notification(_)))
            {
                if let Some(Event::Notification(old)) = state.events.remove(pos) {
                    state.buffered -= 1;
                    let total = self.shared.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if state.drops.record_drop() {
                        warn!(
                            "Notification queue full; dropped oldest notification: observation={}, capacity={}, dropped_total={}",
                            old.observation, self.shared.capacity, total
                        );
                    } else {
                        debug!(
                            "Notification queue full (repeated); dropped oldest notification: observation={}, dropped_total={}",
                            old.observation, total
                        );
                    }
                }
            }
        } else {
            state.drops.reset();
        }

        state.events.push_back(Event::Notification(Delivery {
            observation,
            notification,
        }));
        state.buffered += 1;
        drop(state);

        self.shared.ready.notify_one();
        true
    }

    /// Marks the end of an observation's notifications and releases its listener once consumed.
    pub(crate) fn push_closed(&self, observation: ObservationId) {
        let mut state = self.shared.state();
        if state.closed {
            return;
        }
        state.events.push_back(Event::Closed(observation));
        drop(state);

        self.shared.ready.notify_one();
    }

    /// Discards everything pending and ends the stream for the consumer.
    pub(crate) fn close(&self) {
        let discarded = {
            let mut state = self.shared.state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.buffered = 0;
            let n = state.events.len();
            state.events.clear();
            n
        };
        self.shared.listeners().clear();
        debug!("Notification queue closed: discarded={}", discarded);

        self.shared.ready.notify_one();
    }
}

/// Consumer side of the queue.
///
/// There is exactly one consumer per client. Drain it on your own schedule with
/// [`NotificationConsumer::dispatch_next`] or [`NotificationConsumer::dispatch_pending`], which
/// invoke each observation's listener, or pull raw [`Delivery`] values with
/// [`NotificationConsumer::next_delivery`].
pub struct NotificationConsumer {
    shared: Arc<Shared>,
}

impl fmt::Debug for NotificationConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationConsumer")
            .field("capacity", &self.shared.capacity)
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

impl NotificationConsumer {
    /// Waits for the next notification and hands it to its observation's listener.
    ///
    /// Returns `false` once the queue is closed and nothing is left. Notifications of
    /// observations registered without a listener are consumed without a call.
    pub async fn dispatch_next(&mut self) -> bool {
        match self.next_delivery().await {
            Some(delivery) => {
                self.dispatch(&delivery);
                true
            }
            None => false,
        }
    }

    /// Dispatches every notification already buffered without waiting. Returns how many were
    /// dispatched.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut dispatched = 0;
        while let Some(delivery) = self.try_next_delivery() {
            self.dispatch(&delivery);
            dispatched += 1;
        }
        dispatched
    }

    /// Waits for the next notification without invoking listeners.
    ///
    /// Returns `None` once the queue is closed and nothing is left.
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        loop {
            let notified = self.shared.ready.notified();
            match self.pop() {
                Popped::Delivery(d) => return Some(d),
                Popped::Ended => return None,
                Popped::Empty => notified.await,
            }
        }
    }

    /// Returns the next buffered notification, if any, without invoking listeners.
    pub fn try_next_delivery(&mut self) -> Option<Delivery> {
        match self.pop() {
            Popped::Delivery(d) => Some(d),
            Popped::Ended | Popped::Empty => None,
        }
    }

    /// Total notifications dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    /// `true` once the client has closed the queue.
    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }

    fn pop(&self) -> Popped {
        loop {
            let event = {
                let mut state = self.shared.state();
                match state.events.pop_front() {
                    Some(event) => {
                        if matches!(event, Event::Notification(_)) {
                            state.buffered -= 1;
                        }
                        event
                    }
                    None if state.closed => return Popped::Ended,
                    None => return Popped::Empty,
                }
            };

            match event {
                Event::Notification(d) => return Popped::Delivery(d),
                Event::Closed(id) => {
                    let listener = self.shared.listeners().remove(&id);
                    drop(listener);
                    debug!("Released listener: observation={}", id);
                }
            }
        }
    }

    fn dispatch(&self, delivery: &Delivery) {
        // Taken out of the map so the call runs with no lock held.
        let listener = self.shared.listeners().remove(&delivery.observation);
        if let Some(mut listener) = listener {
            listener(&delivery.notification);
            if !self.shared.state().closed {
                self.shared
                    .listeners()
                    .entry(delivery.observation)
                    .or_insert(listener);
            }
        }
    }
}

enum Popped {
    Delivery(Delivery),
    Empty,
    Ended,
}
