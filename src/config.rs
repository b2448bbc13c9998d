//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CANCELLATION_TIMEOUT, DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_NOTIFICATION_CAPACITY,
};
use crate::credentials::CredentialSource;

/// Settings for one [`crate::Client`].
///
/// Build with [`ClientConfig::builder`]. Environment variables are not read here; the
/// configuration only carries their names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub(crate) endpoint: String,
    pub(crate) credentials: CredentialSource,
    pub(crate) ca_path: Option<PathBuf>,
    pub(crate) insecure_skip_verify: bool,
    pub(crate) connect_timeout: Duration,
    pub(crate) cancellation_timeout: Duration,
    pub(crate) notification_capacity: usize,
    pub(crate) close_timeout: Duration,
}

impl ClientConfig {
    /// Creates a builder for `endpoint` (`host:port`).
    pub fn builder(endpoint: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(endpoint)
    }

    /// The remote endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Where credentials are resolved from.
    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    /// PEM bundle of trust anchors for the server certificate.
    pub fn ca_path(&self) -> Option<&PathBuf> {
        self.ca_path.as_ref()
    }

    /// Whether server certificate verification is disabled.
    pub fn insecure_skip_verify(&self) -> bool {
        self.insecure_skip_verify
    }

    /// Handshake budget.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Budget for each observation's deregistration.
    pub fn cancellation_timeout(&self) -> Duration {
        self.cancellation_timeout
    }

    /// Notifications buffered before the oldest are dropped.
    pub fn notification_capacity(&self) -> usize {
        self.notification_capacity
    }

    /// Budget for joining the background reader during close.
    pub fn close_timeout(&self) -> Duration {
        self.close_timeout
    }
}

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```
/// use coap_dtls::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder("coap.example.org:5684")
///     .psk_env("DEVICE_ID", "DEVICE_PSK")
///     .cancellation_timeout(Duration::from_secs(1))
///     .build();
///
/// assert_eq!(config.credentials().psk_identity_env, "DEVICE_ID");
/// assert_eq!(config.connect_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a builder with defaults for every setting but the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            config: ClientConfig {
                endpoint: endpoint.into(),
                credentials: CredentialSource::default(),
                ca_path: None,
                insecure_skip_verify: false,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                cancellation_timeout: DEFAULT_CANCELLATION_TIMEOUT,
                notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
                close_timeout: DEFAULT_CLOSE_TIMEOUT,
            },
        }
    }

    /// Authenticates with an ECDSA certificate and key, both PEM files.
    ///
    /// Takes precedence over PSK settings.
    #[must_use]
    pub fn certificate(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.config.credentials.certificate_path = Some(cert_path.into());
        self.config.credentials.key_path = Some(key_path.into());
        self
    }

    /// Names the environment variables holding the PSK identity and secret.
    #[must_use]
    pub fn psk_env(mut self, identity_env: impl Into<String>, secret_env: impl Into<String>) -> Self {
        self.config.credentials.psk_identity_env = identity_env.into();
        self.config.credentials.psk_secret_env = secret_env.into();
        self
    }

    /// Replaces the whole credential source.
    #[must_use]
    pub fn credentials(mut self, credentials: CredentialSource) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Verifies the server certificate against the anchors in this PEM file.
    #[must_use]
    pub fn ca_path(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.config.ca_path = Some(ca_path.into());
        self
    }

    /// Accepts any server certificate.
    #[must_use]
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    /// Overrides the handshake budget.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the budget for each observation's deregistration.
    #[must_use]
    pub fn cancellation_timeout(mut self, timeout: Duration) -> Self {
        self.config.cancellation_timeout = timeout;
        self
    }

    /// Sets the notification buffer size. Values below one are raised to one.
    #[must_use]
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity.max(1);
        self
    }

    /// Sets the budget for joining the background reader during close.
    #[must_use]
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
