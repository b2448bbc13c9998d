//! Encrypted datagram transport.
//!
//! - `config`: cipher suite selection and handshake budget
//! - `dialer`: DTLS client handshake over a connected UDP socket
//! - `conn`: the [`DatagramConn`] seam the session runs on

pub mod config;
pub mod conn;
pub mod dialer;
pub mod endpoint;
pub mod error;

pub use config::{CipherSuite, CipherSuiteSet, ServerVerification, TransportConfig};
pub use conn::{DatagramConn, DtlsConnection};
pub use dialer::dial;
pub use endpoint::{Endpoint, EndpointError};
pub use error::TransportError;
