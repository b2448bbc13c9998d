//! The session engine: one reader task per connection, token-matched exchanges, and routing of
//! observation notifications into the queue.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use coap_lite::MessageType;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::constants::{MAX_DATAGRAM_SIZE, TOKEN_LENGTH};
use crate::error::{CloseError, RequestError};
use crate::message::codec::{self, Inbound, Observe, RequestPacket};
use crate::message::{EncodingError, Notification};
use crate::observe::queue::{NotificationQueue, ObservationId};
use crate::prelude::{debug, warn};
use crate::transport::{DatagramConn, TransportError};

/// Why a single exchange failed.
#[derive(Debug)]
pub(crate) enum ExchangeError {
    Encoding(EncodingError),
    Request(RequestError),
    Io(TransportError),
}

impl From<EncodingError> for ExchangeError {
    fn from(e: EncodingError) -> Self {
        ExchangeError::Encoding(e)
    }
}

/// Why the connection stopped delivering datagrams.
#[derive(Debug, Clone)]
enum Lost {
    Closed,
    Failed(String),
}

impl Lost {
    fn to_error(&self) -> TransportError {
        match self {
            Lost::Closed => TransportError::Closed,
            Lost::Failed(reason) => TransportError::Io(reason.clone()),
        }
    }
}

type Completion = oneshot::Sender<Result<Inbound, ExchangeError>>;

struct Pending {
    message_id: u16,
    deregistration: bool,
    tx: Completion,
}

impl Pending {
    /// A deregistration is answered by a response without Observe; anything carrying Observe on
    /// that token is a notification still in flight.
    fn completed_by(&self, msg: &Inbound) -> bool {
        !(self.deregistration && msg.observe.is_some())
    }
}

#[derive(Default)]
struct Exchanges {
    pending: HashMap<Vec<u8>, Pending>,
    lost: Option<Lost>,
}

struct Inner {
    conn: Arc<dyn DatagramConn>,
    queue: NotificationQueue,
    exchanges: Mutex<Exchanges>,
    routes: Mutex<HashMap<Vec<u8>, ObservationId>>,
    next_message_id: AtomicU16,
}

impl Inner {
    fn exchanges(&self) -> MutexGuard<'_, Exchanges> {
        self.exchanges
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<Vec<u8>, ObservationId>> {
        self.routes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn send_empty(&self, kind: MessageType, message_id: u16) {
        let bytes = match codec::empty(kind, message_id) {
            Ok(bytes) => bytes,
            Err(_e) => {
                debug!("Failed encoding empty message: error={}", _e);
                return;
            }
        };
        if let Err(_e) = self.conn.send(&bytes).await {
            debug!(
                "Failed sending empty message: kind={:?}, message_id={}, error={}",
                kind, message_id, _e
            );
        }
    }

    async fn handle_datagram(&self, datagram: &[u8]) {
        let msg = match Inbound::decode(datagram) {
            Ok(msg) => msg,
            Err(_e) => {
                debug!("Dropping malformed datagram: len={}, error={}", datagram.len(), _e);
                return;
            }
        };

        if msg.kind == MessageType::Reset {
            self.complete_reset(msg.message_id);
            return;
        }
        if msg.is_empty() {
            // An empty ACK announces a separate response; an empty CON is a ping.
            if msg.kind == MessageType::Confirmable {
                self.send_empty(MessageType::Reset, msg.message_id).await;
            }
            return;
        }
        if !msg.is_response() {
            debug!("Rejecting request from server: message_id={}", msg.message_id);
            if msg.kind == MessageType::Confirmable {
                self.send_empty(MessageType::Reset, msg.message_id).await;
            }
            return;
        }

        let pending = {
            let mut exchanges = self.exchanges();
            let completes = exchanges
                .pending
                .get(&msg.token)
                .is_some_and(|p| p.completed_by(&msg));
            if completes {
                exchanges.pending.remove(&msg.token)
            } else {
                None
            }
        };
        let routed = self.route_notification(&msg, pending.is_some());

        if pending.is_none() && !routed {
            debug!(
                "Response for unknown token: message_id={}, kind={:?}",
                msg.message_id, msg.kind
            );
            if msg.kind == MessageType::Confirmable {
                self.send_empty(MessageType::Reset, msg.message_id).await;
            }
            return;
        }

        if msg.kind == MessageType::Confirmable {
            self.send_empty(MessageType::Acknowledgement, msg.message_id).await;
        }
        if let Some(pending) = pending {
            let _ = pending.tx.send(Ok(msg));
        }
    }

    /// Pushes `msg` to the queue if its token belongs to an observation.
    ///
    /// A response completing a registration is routed only when it accepts the observation.
    fn route_notification(&self, msg: &Inbound, completes_exchange: bool) -> bool {
        let routes = self.routes();
        let Some(id) = routes.get(&msg.token).copied() else {
            return false;
        };
        if completes_exchange && !(msg.is_success() && msg.observe.is_some()) {
            return true;
        }

        // Pushed while holding `routes` so nothing follows a route's removal.
        self.queue.push(
            id,
            Notification {
                code: codec::format_code(msg.code),
                body: msg.payload.clone(),
            },
        );
        true
    }

    fn complete_reset(&self, message_id: u16) {
        let mut exchanges = self.exchanges();
        let token = exchanges
            .pending
            .iter()
            .find(|(_, p)| p.message_id == message_id)
            .map(|(token, _)| token.clone());
        match token.and_then(|t| exchanges.pending.remove(&t)) {
            Some(pending) => {
                let _ = pending
                    .tx
                    .send(Err(ExchangeError::Request(RequestError::Reset)));
            }
            None => debug!("Reset for unknown message: message_id={}", message_id),
        }
    }

    fn fail_all(&self, lost: Lost) {
        let drained: Vec<Pending> = {
            let mut exchanges = self.exchanges();
            exchanges.lost = Some(lost.clone());
            exchanges.pending.drain().map(|(_, p)| p).collect()
        };
        for pending in drained {
            let _ = pending.tx.send(Err(ExchangeError::Io(lost.to_error())));
        }
    }
}

/// Removes the pending entry when the exchange future finishes or is dropped.
struct PendingGuard<'a> {
    inner: &'a Inner,
    token: &'a [u8],
    message_id: u16,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut exchanges = self.inner.exchanges();
        if exchanges
            .pending
            .get(self.token)
            .is_some_and(|p| p.message_id == self.message_id)
        {
            exchanges.pending.remove(self.token);
        }
    }
}

/// A running session over one connection.
pub(crate) struct Session {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Starts the reader task. Must be called within a Tokio runtime.
    pub(crate) fn start(conn: Arc<dyn DatagramConn>, queue: NotificationQueue) -> Self {
        let inner = Arc::new(Inner {
            conn,
            queue,
            exchanges: Mutex::new(Exchanges::default()),
            routes: Mutex::new(HashMap::new()),
            next_message_id: AtomicU16::new(fastrand::u16(..)),
        });
        let shutdown = CancellationToken::new();

        let task_inner = Arc::clone(&inner);
        let token = shutdown.clone();
        let handle = tokio::spawn(async move {
            run_reader(task_inner, token).await;
        });

        Self {
            inner,
            shutdown,
            reader: Mutex::new(Some(handle)),
        }
    }

    /// A fresh random token.
    pub(crate) fn new_token() -> Vec<u8> {
        (0..TOKEN_LENGTH).map(|_| fastrand::u8(..)).collect()
    }

    /// Sends `packet` with `token` and waits for the matching response.
    ///
    /// `timeout` bounds sending and waiting together.
    pub(crate) async fn exchange(
        &self,
        packet: &RequestPacket<'_>,
        token: &[u8],
        timeout: Duration,
    ) -> Result<Inbound, ExchangeError> {
        let message_id = self.inner.next_message_id.fetch_add(1, Ordering::Relaxed);
        let bytes = packet.encode(message_id, token)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut exchanges = self.inner.exchanges();
            if let Some(lost) = &exchanges.lost {
                return Err(ExchangeError::Io(lost.to_error()));
            }
            exchanges.pending.insert(
                token.to_vec(),
                Pending {
                    message_id,
                    deregistration: packet.observe == Some(Observe::Deregister),
                    tx,
                },
            );
        }
        let _guard = PendingGuard {
            inner: &self.inner,
            token,
            message_id,
        };

        let exchange = async {
            if let Err(e) = self.inner.conn.send(&bytes).await {
                return Err(ExchangeError::Io(e));
            }
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(ExchangeError::Io(TransportError::Closed)),
            }
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    "Request timed out: message_id={}, timeout_ms={}",
                    message_id,
                    timeout.as_millis()
                );
                Err(ExchangeError::Request(RequestError::Timeout(timeout)))
            }
        }
    }

    /// Routes notifications carrying `token` to observation `id`.
    pub(crate) fn add_route(&self, token: &[u8], id: ObservationId) {
        self.inner.routes().insert(token.to_vec(), id);
    }

    /// Stops routing `token`. Once this returns no further notification for it is queued.
    pub(crate) fn remove_route(&self, token: &[u8]) {
        self.inner.routes().remove(token);
    }

    /// Stops the reader task, aborting it if it does not finish within `timeout`.
    ///
    /// Pending exchanges fail with [`TransportError::Closed`].
    pub(crate) async fn stop(&self, timeout: Duration) -> Result<(), CloseError> {
        self.shutdown.cancel();
        let handle = self
            .reader
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        let result = match handle {
            None => Ok(()),
            Some(mut handle) => match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_e)) => {
                    warn!("Error joining reader task during close: error={}", _e);
                    Ok(())
                }
                Err(_) => {
                    warn!("Close timeout exceeded; aborting reader task");
                    handle.abort();
                    let _ = handle.await;
                    Err(CloseError::ReaderTimeout(timeout))
                }
            },
        };

        self.inner.fail_all(Lost::Closed);
        result
    }

    /// Closes the underlying connection.
    pub(crate) async fn close_connection(&self) -> Result<(), TransportError> {
        self.inner.conn.close().await
    }

    /// Signals the reader to stop without waiting for it.
    pub(crate) fn cancel(&self) {
        self.shutdown.cancel();
    }
}

async fn run_reader(inner: Arc<Inner>, shutdown: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    debug!("Session reader started");

    loop {
        let received = tokio::select! {
            () = shutdown.cancelled() => {
                debug!("Session reader stopping");
                return;
            }
            r = inner.conn.recv(&mut buf) => r,
        };

        match received {
            Ok(n) => inner.handle_datagram(&buf[..n]).await,
            Err(TransportError::Closed) => {
                debug!("Connection closed; session reader exiting");
                inner.fail_all(Lost::Closed);
                return;
            }
            Err(e) => {
                warn!("Connection read failed; session reader exiting: error={}", e);
                inner.fail_all(Lost::Failed(e.to_string()));
                return;
            }
        }
    }
}
