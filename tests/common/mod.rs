// Shared fixtures: an in-memory datagram pair and a scripted CoAP peer.

#![allow(dead_code)]

use std::collections::LinkedList;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coap_dtls::transport::{DatagramConn, TransportError};
use coap_dtls::{Client, ClientConfig};
use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType, ResponseType};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// How long the peer waits for a datagram before a test fails.
pub const PEER_WAIT: Duration = Duration::from_secs(30);

/// One end of an in-memory datagram link.
pub struct MemoryConn {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: CancellationToken,
}

impl MemoryConn {
    pub fn pair() -> (Arc<MemoryConn>, MemoryConn) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let client = MemoryConn {
            tx: a_tx,
            rx: Mutex::new(b_rx),
            closed: CancellationToken::new(),
        };
        let peer = MemoryConn {
            tx: b_tx,
            rx: Mutex::new(a_rx),
            closed: CancellationToken::new(),
        };
        (Arc::new(client), peer)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl DatagramConn for MemoryConn {
    async fn send(&self, datagram: &[u8]) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.tx
            .send(datagram.to_vec())
            .map_err(|_| TransportError::Io("peer gone".into()))
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            () = self.closed.cancelled() => Err(TransportError::Closed),
            datagram = rx.recv() => match datagram {
                Some(d) => {
                    buf[..d.len()].copy_from_slice(&d);
                    Ok(d.len())
                }
                None => Err(TransportError::Closed),
            },
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.cancel();
        Ok(())
    }
}

/// The server side of a test session.
pub struct Peer {
    conn: MemoryConn,
}

impl Peer {
    pub async fn recv(&self) -> Packet {
        self.try_recv_within(PEER_WAIT)
            .await
            .expect("peer timed out waiting for a datagram")
    }

    pub async fn try_recv_within(&self, wait: Duration) -> Option<Packet> {
        let mut buf = vec![0u8; 8192];
        match tokio::time::timeout(wait, self.conn.recv(&mut buf)).await {
            Ok(Ok(n)) => Some(Packet::from_bytes(&buf[..n]).expect("client sent malformed CoAP")),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    pub async fn send(&self, packet: &Packet) {
        let bytes = packet.to_bytes().expect("test packet encodes");
        self.conn.send(&bytes).await.expect("peer send");
    }

    /// Answers `request` with a piggybacked ACK.
    pub async fn reply(&self, request: &Packet, code: ResponseType, payload: &[u8]) {
        self.send(&piggybacked(request, code, payload)).await;
    }
}

/// Connects a client to a fresh in-memory peer.
pub fn connect(config: ClientConfig) -> (Client, Arc<MemoryConn>, Peer) {
    let (client_conn, peer_conn) = MemoryConn::pair();
    let conn: Arc<dyn DatagramConn> = client_conn.clone();
    let client = Client::from_connection(conn, config);
    (client, client_conn, Peer { conn: peer_conn })
}

pub fn config() -> ClientConfig {
    ClientConfig::builder("localhost:5684")
        .cancellation_timeout(Duration::from_secs(1))
        .close_timeout(Duration::from_secs(1))
        .build()
}

pub fn piggybacked(request: &Packet, code: ResponseType, payload: &[u8]) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(MessageType::Acknowledgement);
    packet.header.code = MessageClass::Response(code);
    packet.header.message_id = request.header.message_id;
    packet.set_token(request.get_token().to_vec());
    packet.payload = payload.to_vec();
    packet
}

pub fn notification(
    token: &[u8],
    kind: MessageType,
    message_id: u16,
    sequence: u32,
    payload: &[u8],
) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(kind);
    packet.header.code = MessageClass::Response(ResponseType::Content);
    packet.header.message_id = message_id;
    packet.set_token(token.to_vec());
    packet.add_option(CoapOption::Observe, observe_value(sequence));
    packet.payload = payload.to_vec();
    packet
}

/// Minimal big-endian encoding of an Observe sequence number.
pub fn observe_value(sequence: u32) -> Vec<u8> {
    let bytes = sequence.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

pub fn empty(kind: MessageType, message_id: u16) -> Packet {
    let mut packet = Packet::new();
    packet.header.set_type(kind);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
}

pub fn method(packet: &Packet) -> Option<RequestType> {
    match packet.header.code {
        MessageClass::Request(method) => Some(method),
        _ => None,
    }
}

pub fn path(packet: &Packet) -> String {
    let segments = options(packet, CoapOption::UriPath);
    format!(
        "/{}",
        segments
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    )
}

pub fn queries(packet: &Packet) -> Vec<String> {
    options(packet, CoapOption::UriQuery)
        .iter()
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

pub fn uint_option(packet: &Packet, option: CoapOption) -> Option<u32> {
    options(packet, option)
        .front()
        .map(|v| v.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

fn options(packet: &Packet, option: CoapOption) -> LinkedList<Vec<u8>> {
    packet.get_option(option).cloned().unwrap_or_default()
}
