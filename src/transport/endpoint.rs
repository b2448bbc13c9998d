//! Endpoint parsing.
//!
//! An endpoint is a `host:port` pair. IPv6 literals must be bracketed (`[::1]:5684`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Parsed `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

/// Errors returned by [`Endpoint::parse`].
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EndpointError {
    /// The input has no `:port` suffix.
    #[error("endpoint must be host:port")]
    MissingPort,

    /// The port is not a number in `1..=65535`.
    #[error("endpoint port is invalid: {0}")]
    InvalidPort(String),

    /// The host part is empty.
    #[error("endpoint host is empty")]
    EmptyHost,

    /// An IPv6 literal is missing its closing bracket.
    #[error("endpoint IPv6 literal is not closed")]
    UnclosedBracket,
}

impl Endpoint {
    /// Parse and validate a `host:port` endpoint.
    ///
    /// ## Errors
    ///
    /// Returns an [`EndpointError`] if the host is empty or the port is missing or invalid.
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        let input = input.trim();
        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, rest) = rest.split_once(']').ok_or(EndpointError::UnclosedBracket)?;
            let port = rest.strip_prefix(':').ok_or(EndpointError::MissingPort)?;
            (host, port)
        } else {
            input.rsplit_once(':').ok_or(EndpointError::MissingPort)?
        };

        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }
        let port = match port.parse::<u16>() {
            Ok(0) | Err(_) => return Err(EndpointError::InvalidPort(port.to_owned())),
            Ok(port) => port,
        };

        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }

    /// Host name or IP literal, without brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// UDP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{Endpoint, EndpointError};

    #[test]
    fn test_parse_hostname_and_port() {
        let ep = Endpoint::parse("coap.example.org:5684").unwrap();
        assert_eq!(ep.host(), "coap.example.org");
        assert_eq!(ep.port(), 5684);
    }

    #[test]
    fn test_parse_ipv6_literal() {
        let ep = Endpoint::parse("[::1]:5684").unwrap();
        assert_eq!(ep.host(), "::1");
        assert_eq!(ep.to_string(), "[::1]:5684");
    }

    #[test]
    fn test_parse_missing_port() {
        assert_eq!(
            Endpoint::parse("localhost").unwrap_err(),
            EndpointError::MissingPort
        );
    }

    #[test]
    fn test_parse_invalid_port() {
        assert_eq!(
            Endpoint::parse("localhost:0").unwrap_err(),
            EndpointError::InvalidPort("0".into())
        );
        assert_eq!(
            Endpoint::parse("localhost:coaps").unwrap_err(),
            EndpointError::InvalidPort("coaps".into())
        );
    }

    #[test]
    fn test_parse_empty_host() {
        assert_eq!(
            Endpoint::parse(":5684").unwrap_err(),
            EndpointError::EmptyHost
        );
    }

    #[test]
    fn test_parse_unclosed_bracket() {
        assert_eq!(
            Endpoint::parse("[::1:5684").unwrap_err(),
            EndpointError::UnclosedBracket
        );
    }
}
