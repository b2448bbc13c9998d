//! Error types for client operations.

use std::time::Duration;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::message::EncodingError;
use crate::transport::TransportError;

/// Errors produced by the client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Certificate, key or trust anchor material could not be loaded.
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Dialing the endpoint failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be encoded; nothing was sent.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The exchange failed.
    #[error("request failed: {0}")]
    Request(#[from] RequestError),

    /// The connection failed while sending a request or waiting for its response.
    #[error("connection I/O error: {0}")]
    Io(#[source] TransportError),

    /// Observation registration failed.
    #[error("subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Tearing down the session failed.
    #[error("close failed: {0}")]
    Close(#[from] CloseError),

    /// The client has been closed.
    #[error("client is closed")]
    Closed,
}

/// Errors for a single request/response exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RequestError {
    /// No response arrived within the request's deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server rejected the message with a Reset.
    #[error("request reset by server")]
    Reset,
}

/// Errors for observation registration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubscriptionError {
    /// The server answered the registration with a non-success code.
    #[error("registration rejected with code {code}")]
    Rejected {
        /// Response code, e.g. `4.04`.
        code: String,
    },

    /// The server answered with success but without an Observe option.
    #[error("resource is not observable (code {code})")]
    NotObservable {
        /// Response code, e.g. `2.05`.
        code: String,
    },

    /// The registration exchange itself failed.
    #[error("registration exchange failed: {0}")]
    Request(#[from] RequestError),

    /// The connection failed during registration.
    #[error("registration I/O error: {0}")]
    Io(#[source] TransportError),
}

/// Observation teardown failure.
///
/// Never returned to callers; it is logged and recorded on the observation's final status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CancellationError {
    /// The server did not answer the deregistration in time.
    #[error("deregistration timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered the deregistration with a non-success code.
    #[error("deregistration rejected with code {code}")]
    Rejected {
        /// Response code.
        code: String,
    },

    /// The server reset the deregistration.
    #[error("deregistration reset by server")]
    Reset,

    /// The deregistration could not be sent.
    #[error("deregistration not sent: {0}")]
    Transport(String),
}

/// Errors raised while closing the client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CloseError {
    /// Closing the connection failed.
    #[error("failed closing connection: {0}")]
    Connection(#[source] TransportError),

    /// The background reader did not stop within the close budget and was aborted.
    #[error("reader did not stop within {0:?}")]
    ReaderTimeout(Duration),
}
