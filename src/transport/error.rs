//! Error types for the transport layer (endpoint resolution, UDP socket, DTLS).

use std::time::Duration;
use thiserror::Error;

use crate::transport::endpoint::EndpointError;

/// Errors produced while dialing or using the encrypted datagram session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The endpoint string is not a valid `host:port`.
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    /// Host name resolution failed.
    #[error("failed resolving endpoint {endpoint}")]
    Resolve {
        /// The endpoint being resolved.
        endpoint: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Resolution succeeded but yielded no address.
    #[error("endpoint {0} resolved to no address")]
    NoAddress(String),

    /// Binding or connecting the UDP socket failed.
    #[error("UDP socket error")]
    Socket(#[source] std::io::Error),

    /// The handshake did not complete within the connection budget.
    #[error("DTLS handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// The handshake failed (authentication, certificate rejection, peer alert).
    #[error("DTLS handshake failed: {0}")]
    Handshake(String),

    /// The credentials or trust anchors could not be turned into a DTLS configuration.
    #[error("invalid DTLS configuration: {0}")]
    InvalidConfig(String),

    /// Reading from or writing to the established session failed.
    #[error("DTLS session I/O error: {0}")]
    Io(String),

    /// The session has been closed.
    #[error("connection closed")]
    Closed,
}
