//! The datagram connection seam used by the session.

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use webrtc_dtls::conn::DTLSConn;
use webrtc_util::Conn;

use crate::transport::TransportError;

/// A connected, message-oriented, secured channel to one peer.
///
/// Each `send` writes one datagram and each `recv` returns one datagram. Implementations must
/// allow `send` and `recv` to run concurrently from different tasks.
#[async_trait]
pub trait DatagramConn: Send + Sync + 'static {
    /// Sends one datagram to the peer.
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError>;

    /// Receives one datagram into `buf`, returning its length.
    ///
    /// Returns [`TransportError::Closed`] once the connection is closed.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Closes the connection. Pending and later `recv` calls fail.
    async fn close(&self) -> Result<(), TransportError>;
}

/// An established DTLS client session.
pub struct DtlsConnection {
    conn: DTLSConn,
    peer: SocketAddr,
}

impl DtlsConnection {
    pub(crate) fn new(conn: DTLSConn, peer: SocketAddr) -> Self {
        Self { conn, peer }
    }

    /// Remote address of the session.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl fmt::Debug for DtlsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DtlsConnection")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DatagramConn for DtlsConnection {
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        Conn::send(&self.conn, datagram)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match Conn::recv(&self.conn, buf).await {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        Conn::close(&self.conn)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
