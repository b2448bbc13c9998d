//! The CoAP client: requests, observations and close.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::credentials::{CredentialResolver, Credentials, EnvSource};
use crate::error::{ClientError, CloseError};
use crate::message::codec::{self, RequestPacket};
use crate::message::{MediaType, Method, Notification, Request, Response};
use crate::observe::manager::ObservationManager;
use crate::observe::queue::NotificationQueue;
use crate::observe::{Listener, NotificationConsumer, ObservationHandle, ObservationStatus};
use crate::prelude::{debug, info};
use crate::session::{ExchangeError, Session};
use crate::transport::{
    dial, DatagramConn, Endpoint, ServerVerification, TransportConfig, TransportError,
};

/// A CoAP client bound to one DTLS session.
///
/// All operations take `&self`; share the client behind an `Arc` to issue requests from several
/// tasks. Call [`Client::close`] when done.
///
/// # Example
///
/// ```no_run
/// use coap_dtls::{Client, ClientConfig};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), coap_dtls::ClientError> {
/// let client = Client::connect(ClientConfig::builder("coap.example.org:5684").build()).await?;
///
/// let res = client.get("/hello", Duration::from_secs(10)).await?;
/// println!("{} {}", res.code, String::from_utf8_lossy(&res.body));
///
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    session: Arc<Session>,
    observations: ObservationManager,
    queue: NotificationQueue,
    consumer: Mutex<Option<NotificationConsumer>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("observations", &self.observations)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Resolves credentials from the process environment and files, then dials the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Credential`] if the credential files cannot be loaded, and
    /// [`ClientError::Transport`] if the endpoint is invalid or the handshake fails.
    pub async fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        Self::connect_with_resolver(config, &CredentialResolver::new()).await
    }

    /// Like [`Client::connect`], resolving credentials with `resolver`.
    ///
    /// # Errors
    ///
    /// See [`Client::connect`].
    pub async fn connect_with_resolver<E: EnvSource>(
        config: ClientConfig,
        resolver: &CredentialResolver<E>,
    ) -> Result<Self, ClientError> {
        let credentials = resolver.resolve(config.credentials())?;
        let endpoint = Endpoint::parse(config.endpoint()).map_err(TransportError::from)?;
        let verification = server_verification(&config, &credentials, resolver)?;

        let transport = TransportConfig::configure(credentials, endpoint.host(), verification)
            .with_connect_timeout(config.connect_timeout());
        let conn = dial(config.endpoint(), &transport).await?;

        Ok(Self::from_connection(Arc::new(conn), config))
    }

    /// Runs a client over an already established connection.
    ///
    /// The endpoint and credential settings of `config` are not used.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_connection(conn: Arc<dyn DatagramConn>, config: ClientConfig) -> Self {
        let (queue, consumer) = NotificationQueue::new(config.notification_capacity());
        let session = Arc::new(Session::start(conn, queue.clone()));
        let observations = ObservationManager::new(
            Arc::clone(&session),
            queue.clone(),
            config.cancellation_timeout(),
        );

        Self {
            config,
            session,
            observations,
            queue,
            consumer: Mutex::new(Some(consumer)),
            closed: AtomicBool::new(false),
        }
    }

    /// Sends a GET.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn get(&self, path: &str, timeout: Duration) -> Result<Response, ClientError> {
        self.request(Request::new(Method::Get, path, timeout)).await
    }

    /// Sends a PUT with `payload` encoded as `media_type`.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn put(
        &self,
        path: &str,
        media_type: &str,
        payload: impl Into<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        self.request(Request::new(Method::Put, path, timeout).with_payload(media_type, payload))
            .await
    }

    /// Sends a POST with `payload` encoded as `media_type`.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn post(
        &self,
        path: &str,
        media_type: &str,
        payload: impl Into<Vec<u8>>,
        timeout: Duration,
    ) -> Result<Response, ClientError> {
        self.request(Request::new(Method::Post, path, timeout).with_payload(media_type, payload))
            .await
    }

    /// Sends a DELETE.
    ///
    /// # Errors
    ///
    /// See [`Client::request`].
    pub async fn delete(&self, path: &str, timeout: Duration) -> Result<Response, ClientError> {
        self.request(Request::new(Method::Delete, path, timeout)).await
    }

    /// Performs one confirmable exchange, bounded by `request.timeout`.
    ///
    /// The media type is checked before anything is sent. The response body is returned whole,
    /// whatever the response code.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Closed`] after [`Client::close`].
    /// - [`ClientError::Encoding`] for an unknown media type.
    /// - [`ClientError::Request`] on timeout or reset.
    /// - [`ClientError::Io`] if the connection fails during the exchange.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        self.ensure_open()?;
        let content_format = request
            .media_type
            .as_deref()
            .map(MediaType::from_str)
            .transpose()?;

        let packet = RequestPacket {
            content_format,
            payload: request.payload.as_deref().unwrap_or_default(),
            ..RequestPacket::new(request.method, &request.path)
        };
        let token = Session::new_token();

        match self.session.exchange(&packet, &token, request.timeout).await {
            Ok(msg) => Ok(Response {
                code: codec::format_code(msg.code),
                body: msg.payload,
            }),
            Err(ExchangeError::Encoding(e)) => Err(e.into()),
            Err(ExchangeError::Request(e)) => Err(e.into()),
            Err(ExchangeError::Io(e)) => Err(ClientError::Io(e)),
        }
    }

    /// Observes `path` for `lifetime`, delivering notifications as raw [`crate::Delivery`]
    /// values through the consumer.
    ///
    /// Returns once the registration is accepted; the observation then runs in the background.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Closed`] after [`Client::close`].
    /// - [`ClientError::Subscription`] if registration fails. Nothing is cancelled in that case.
    pub async fn observe(
        &self,
        path: &str,
        lifetime: Duration,
    ) -> Result<ObservationHandle, ClientError> {
        self.ensure_open()?;
        self.observations.observe(path, lifetime, None).await
    }

    /// Observes `path` for `lifetime`, invoking `listener` for each notification.
    ///
    /// The listener runs on the task draining the [`NotificationConsumer`], never on the
    /// network task, and never concurrently with itself.
    ///
    /// # Errors
    ///
    /// See [`Client::observe`].
    pub async fn observe_with<F>(
        &self,
        path: &str,
        lifetime: Duration,
        listener: F,
    ) -> Result<ObservationHandle, ClientError>
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.ensure_open()?;
        let listener: Listener = Box::new(listener);
        self.observations
            .observe(path, lifetime, Some(listener))
            .await
    }

    /// Observes `path` and waits until the observation has closed.
    ///
    /// # Errors
    ///
    /// See [`Client::observe`]. Deregistration failures are not errors; they are reported in
    /// the returned [`ObservationStatus`].
    pub async fn observe_and_wait<F>(
        &self,
        path: &str,
        lifetime: Duration,
        listener: F,
    ) -> Result<ObservationStatus, ClientError>
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        let handle = self.observe_with(path, lifetime, listener).await?;
        Ok(handle.wait().await)
    }

    /// Takes the notification consumer. Returns `None` after the first call.
    pub fn take_notifications(&self) -> Option<NotificationConsumer> {
        self.consumer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
    }

    /// `true` once [`Client::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tears down the session.
    ///
    /// Cancels every observation (each deregisters within its cancellation budget), stops the
    /// reader task, closes the notification queue, then closes the connection. Only the first
    /// call does anything; later calls return `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Close`] if the reader had to be aborted or the connection failed
    /// to close. The client is closed regardless.
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("Closing client: endpoint={}", self.config.endpoint());

        self.observations.shutdown(self.config.close_timeout()).await;
        let reader = self.session.stop(self.config.close_timeout()).await;
        self.queue.close();
        let conn = self
            .session
            .close_connection()
            .await
            .map_err(CloseError::Connection);

        debug!("Client closed: endpoint={}", self.config.endpoint());
        reader?;
        conn?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            debug!("Client dropped without close; cancelling background tasks");
            self.observations.cancel_all();
            self.session.cancel();
            self.queue.close();
        }
    }
}

fn server_verification<E: EnvSource>(
    config: &ClientConfig,
    credentials: &Credentials,
    resolver: &CredentialResolver<E>,
) -> Result<ServerVerification, ClientError> {
    if config.insecure_skip_verify() {
        return Ok(ServerVerification::SkipVerify);
    }
    if let Some(ca_path) = config.ca_path() {
        return Ok(ServerVerification::Roots(resolver.load_trust_anchors(ca_path)?));
    }
    if credentials.is_certificate() {
        return Err(TransportError::InvalidConfig(
            "certificate mode needs a CA bundle or insecure_skip_verify".into(),
        )
        .into());
    }
    // PSK sessions carry no server certificate.
    Ok(ServerVerification::SkipVerify)
}
