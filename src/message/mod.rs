//! Request and response values exchanged with the server.

use std::time::Duration;

pub(crate) mod codec;
mod media_type;

pub use media_type::MediaType;

/// Errors raised while turning a [`Request`] into a datagram.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EncodingError {
    /// The media type name is not in the CoAP content-format registry.
    #[error("unknown media type: {0}")]
    UnknownMediaType(String),

    /// The message could not be serialized (for example an oversized option).
    #[error("failed encoding CoAP message: {0}")]
    Message(String),
}

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// One request/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Resource path, optionally followed by `?query`.
    pub path: String,
    /// Content format name of `payload`.
    pub media_type: Option<String>,
    /// Request body.
    pub payload: Option<Vec<u8>>,
    /// Deadline for this exchange only.
    pub timeout: Duration,
}

impl Request {
    /// Creates a request without a body.
    pub fn new(method: Method, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method,
            path: path.into(),
            media_type: None,
            payload: None,
            timeout,
        }
    }

    /// Attaches a body and its content format name.
    #[must_use]
    pub fn with_payload(mut self, media_type: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        self.media_type = Some(media_type.into());
        self.payload = Some(payload.into());
        self
    }
}

/// A response, with its body fully buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response code in `class.detail` form, e.g. `2.05`.
    pub code: String,
    /// Response body; empty when the server sent none.
    pub body: Vec<u8>,
}

impl Response {
    /// Returns `true` for `2.xx` codes.
    pub fn is_success(&self) -> bool {
        self.code.starts_with("2.")
    }
}

/// A server-pushed update for an observation.
pub type Notification = Response;
