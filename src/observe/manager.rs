//! Observation lifecycle: registration, lifetime, deregistration.
//!
//! ```text
//! Pending ──registration ok──▶ Active ──lifetime elapsed / cancel / client close──▶ Cancelling ──▶ Closed
//!    └────registration failed──▶ Failed
//! ```
//!
//! Deregistration is attempted exactly once per active observation, bounded by the cancellation
//! timeout. Its failure is logged and recorded in [`ObservationStatus::cancellation`]; the
//! observation ends `Closed` either way.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CancellationError, ClientError, RequestError, SubscriptionError};
use crate::message::codec::{self, Observe, RequestPacket};
use crate::message::Method;
use crate::observe::queue::{Listener, NotificationQueue, ObservationId};
use crate::prelude::{debug, info, warn};
use crate::session::{ExchangeError, Session};

/// Lifecycle state of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationState {
    /// Registration in flight.
    Pending,
    /// Registered; notifications are being routed.
    Active,
    /// Routing stopped; deregistration in flight.
    Cancelling,
    /// Finished. No further notifications are queued.
    Closed,
    /// Registration failed; nothing was cancelled.
    Failed,
}

impl ObservationState {
    /// `true` for `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ObservationState::Closed | ObservationState::Failed)
    }
}

/// Snapshot of an observation's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationStatus {
    /// Current state.
    pub state: ObservationState,
    /// Outcome of the deregistration, once attempted.
    pub cancellation: Option<Result<(), CancellationError>>,
}

/// Handle to an active observation.
///
/// Dropping the handle does not end the observation; it runs until its lifetime elapses, it is
/// cancelled, or the client is closed.
#[derive(Debug)]
pub struct ObservationHandle {
    id: ObservationId,
    path: String,
    status: watch::Receiver<ObservationStatus>,
    cancel: CancellationToken,
}

impl ObservationHandle {
    /// Identity used to tag this observation's deliveries.
    pub fn id(&self) -> ObservationId {
        self.id
    }

    /// The observed path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current state.
    pub fn state(&self) -> ObservationState {
        self.status.borrow().state
    }

    /// Current status, including the deregistration outcome once known.
    pub fn status(&self) -> ObservationStatus {
        self.status.borrow().clone()
    }

    /// Ends the observation early. Deregistration follows in the background.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits until the observation is closed and returns its final status.
    pub async fn wait(&self) -> ObservationStatus {
        let mut status = self.status.clone();
        let done = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .ok()
            .map(|s| s.clone());
        // A dropped sender means the lifecycle task is gone; report what it last published.
        done.unwrap_or_else(|| status.borrow().clone())
    }
}

/// Creates observations on one session and tracks their lifecycle tasks.
pub(crate) struct ObservationManager {
    session: Arc<Session>,
    queue: NotificationQueue,
    cancellation_timeout: Duration,
    next_id: AtomicU64,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for ObservationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationManager")
            .field("cancellation_timeout", &self.cancellation_timeout)
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl ObservationManager {
    pub(crate) fn new(
        session: Arc<Session>,
        queue: NotificationQueue,
        cancellation_timeout: Duration,
    ) -> Self {
        Self {
            session,
            queue,
            cancellation_timeout,
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Registers an observation of `path` lasting `lifetime` from now.
    ///
    /// Returns once the server has accepted or refused the registration; the registration
    /// response is queued as the first notification.
    pub(crate) async fn observe(
        &self,
        path: &str,
        lifetime: Duration,
        listener: Option<Listener>,
    ) -> Result<ObservationHandle, ClientError> {
        let deadline = Instant::now() + lifetime;
        let id = ObservationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = Session::new_token();

        debug!("Registering observation: observation={}, path={}", id, path);
        if let Some(listener) = listener {
            self.queue.register_listener(id, listener);
        }
        self.session.add_route(&token, id);

        let packet = RequestPacket {
            observe: Some(Observe::Register),
            ..RequestPacket::new(Method::Get, path)
        };
        if let Err(e) = self.register(&packet, &token, lifetime).await {
            self.session.remove_route(&token);
            self.queue.unregister_listener(id);
            warn!(
                "Observation registration failed: observation={}, path={}, error={}",
                id, path, e
            );
            return Err(e);
        }
        let (status_tx, status_rx) = watch::channel(ObservationStatus {
            state: ObservationState::Active,
            cancellation: None,
        });
        let cancel = self.shutdown.child_token();

        let lifecycle = Lifecycle {
            session: Arc::clone(&self.session),
            queue: self.queue.clone(),
            id,
            token,
            path: path.to_owned(),
            deadline,
            cancellation_timeout: self.cancellation_timeout,
            cancel: cancel.clone(),
            status: status_tx,
        };
        {
            // Checked under the lock `shutdown` takes the task list with, so every task spawned
            // here is either joined by close or never started.
            let mut tasks = self
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if self.shutdown.is_cancelled() {
                drop(tasks);
                self.session.remove_route(&lifecycle.token);
                self.queue.unregister_listener(id);
                debug!(
                    "Client closed during registration; dropping observation: observation={}, path={}",
                    id, path
                );
                return Err(ClientError::Closed);
            }
            tasks.retain(|t| !t.is_finished());
            tasks.push(tokio::spawn(lifecycle.run()));
        }
        info!("Observation active: observation={}, path={}", id, path);

        Ok(ObservationHandle {
            id,
            path: path.to_owned(),
            status: status_rx,
            cancel,
        })
    }

    async fn register(
        &self,
        packet: &RequestPacket<'_>,
        token: &[u8],
        timeout: Duration,
    ) -> Result<(), ClientError> {
        match self.session.exchange(packet, token, timeout).await {
            Ok(msg) if msg.is_success() && msg.observe.is_some() => Ok(()),
            Ok(msg) if msg.is_success() => Err(SubscriptionError::NotObservable {
                code: codec::format_code(msg.code),
            }
            .into()),
            Ok(msg) => Err(SubscriptionError::Rejected {
                code: codec::format_code(msg.code),
            }
            .into()),
            Err(ExchangeError::Encoding(e)) => Err(e.into()),
            Err(ExchangeError::Request(e)) => Err(SubscriptionError::Request(e).into()),
            Err(ExchangeError::Io(e)) => Err(SubscriptionError::Io(e).into()),
        }
    }

    /// Cancels every observation and waits for their deregistrations.
    ///
    /// Registrations still in flight fail with [`ClientError::Closed`] instead of starting.
    ///
    /// Each lifecycle task gets its own cancellation budget plus `grace`; stragglers are aborted.
    pub(crate) async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let tasks: Vec<JoinHandle<()>> = std::mem::take(
            &mut *self
                .tasks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );

        let budget = self.cancellation_timeout + grace;
        for mut task in tasks {
            match tokio::time::timeout(budget, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(_e)) => warn!("Error joining observation task during close: error={}", _e),
                Err(_) => {
                    warn!("Observation task did not finish during close; aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
    }

    /// Signals every observation to end without waiting.
    pub(crate) fn cancel_all(&self) {
        self.shutdown.cancel();
    }
}

struct Lifecycle {
    session: Arc<Session>,
    queue: NotificationQueue,
    id: ObservationId,
    token: Vec<u8>,
    path: String,
    deadline: Instant,
    cancellation_timeout: Duration,
    cancel: CancellationToken,
    status: watch::Sender<ObservationStatus>,
}

impl Lifecycle {
    async fn run(self) {
        tokio::select! {
            () = tokio::time::sleep_until(self.deadline) => {
                debug!("Observation lifetime elapsed: observation={}", self.id);
            }
            () = self.cancel.cancelled() => {
                debug!("Observation cancelled: observation={}", self.id);
            }
        }

        self.status.send_modify(|s| s.state = ObservationState::Cancelling);
        self.session.remove_route(&self.token);

        let outcome = self.deregister().await;
        if let Err(_e) = &outcome {
            warn!(
                "Failed to cancel observation: observation={}, path={}, error={}",
                self.id, self.path, _e
            );
        }

        self.queue.push_closed(self.id);
        self.status.send_replace(ObservationStatus {
            state: ObservationState::Closed,
            cancellation: Some(outcome),
        });
        info!("Observation closed: observation={}, path={}", self.id, self.path);
    }

    async fn deregister(&self) -> Result<(), CancellationError> {
        let packet = RequestPacket {
            observe: Some(Observe::Deregister),
            ..RequestPacket::new(Method::Get, &self.path)
        };
        match self
            .session
            .exchange(&packet, &self.token, self.cancellation_timeout)
            .await
        {
            Ok(msg) if msg.is_success() => Ok(()),
            Ok(msg) => Err(CancellationError::Rejected {
                code: codec::format_code(msg.code),
            }),
            Err(ExchangeError::Request(RequestError::Timeout(d))) => {
                Err(CancellationError::Timeout(d))
            }
            Err(ExchangeError::Request(RequestError::Reset)) => Err(CancellationError::Reset),
            Err(ExchangeError::Io(e)) => Err(CancellationError::Transport(e.to_string())),
            Err(ExchangeError::Encoding(e)) => Err(CancellationError::Transport(e.to_string())),
        }
    }
}
