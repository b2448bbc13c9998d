//! Default values used when the caller does not override them.

use std::time::Duration;

/// Environment variable holding the PSK identity when no other name is given.
pub const DEFAULT_PSK_IDENTITY_ENV: &str = "COAP_PSK_ID";

/// Environment variable holding the PSK secret when no other name is given.
pub const DEFAULT_PSK_SECRET_ENV: &str = "COAP_PSK";

/// Time budget for the DTLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Time budget for deregistering an observation once its lifetime is over.
///
/// Deployments have used values between one and five seconds; the longer
/// value is the default and [`crate::ClientConfigBuilder::cancellation_timeout`]
/// overrides it.
pub const DEFAULT_CANCELLATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Time budget for joining the background reader while closing.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of notifications buffered before the oldest ones are dropped.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Largest datagram the session reads from the connection.
pub(crate) const MAX_DATAGRAM_SIZE: usize = 8192;

/// Length of the tokens attached to requests.
pub(crate) const TOKEN_LENGTH: usize = 8;
