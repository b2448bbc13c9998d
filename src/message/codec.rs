//! CoAP datagram framing on top of `coap-lite`.

use coap_lite::{CoapOption, MessageClass, MessageType, Packet, RequestType};

use crate::message::{EncodingError, MediaType, Method};

/// Observe option value requesting registration.
const OBSERVE_REGISTER: u32 = 0;
/// Observe option value requesting deregistration.
const OBSERVE_DEREGISTER: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Observe {
    Register,
    Deregister,
}

/// An outbound confirmable request, before a message id and token are assigned.
#[derive(Debug, Clone)]
pub(crate) struct RequestPacket<'a> {
    pub(crate) method: Method,
    pub(crate) path: &'a str,
    pub(crate) content_format: Option<MediaType>,
    pub(crate) payload: &'a [u8],
    pub(crate) observe: Option<Observe>,
}

impl<'a> RequestPacket<'a> {
    pub(crate) fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            content_format: None,
            payload: &[],
            observe: None,
        }
    }

    pub(crate) fn encode(&self, message_id: u16, token: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let mut packet = Packet::new();
        packet.header.set_type(MessageType::Confirmable);
        packet.header.code = MessageClass::Request(request_type(self.method));
        packet.header.message_id = message_id;
        packet.set_token(token.to_vec());

        if let Some(observe) = self.observe {
            let value = match observe {
                Observe::Register => OBSERVE_REGISTER,
                Observe::Deregister => OBSERVE_DEREGISTER,
            };
            packet.add_option(CoapOption::Observe, encode_uint(value));
        }

        let (path, query) = match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path, None),
        };
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            packet.add_option(CoapOption::UriPath, segment.as_bytes().to_vec());
        }
        if let Some(format) = self.content_format {
            packet.add_option(CoapOption::ContentFormat, encode_uint(u32::from(format.id())));
        }
        for param in query.into_iter().flat_map(|q| q.split('&')).filter(|s| !s.is_empty()) {
            packet.add_option(CoapOption::UriQuery, param.as_bytes().to_vec());
        }

        packet.payload = self.payload.to_vec();
        packet
            .to_bytes()
            .map_err(|e| EncodingError::Message(format!("{e:?}")))
    }
}

fn request_type(method: Method) -> RequestType {
    match method {
        Method::Get => RequestType::Get,
        Method::Put => RequestType::Put,
        Method::Post => RequestType::Post,
        Method::Delete => RequestType::Delete,
    }
}

/// Encodes an empty `ACK` or `RST` for `message_id`.
pub(crate) fn empty(kind: MessageType, message_id: u16) -> Result<Vec<u8>, EncodingError> {
    let mut packet = Packet::new();
    packet.header.set_type(kind);
    packet.header.code = MessageClass::Empty;
    packet.header.message_id = message_id;
    packet
        .to_bytes()
        .map_err(|e| EncodingError::Message(format!("{e:?}")))
}

/// A decoded inbound datagram.
#[derive(Debug, Clone)]
pub(crate) struct Inbound {
    pub(crate) kind: MessageType,
    pub(crate) message_id: u16,
    pub(crate) token: Vec<u8>,
    pub(crate) code: MessageClass,
    pub(crate) observe: Option<u32>,
    pub(crate) payload: Vec<u8>,
}

impl Inbound {
    pub(crate) fn decode(datagram: &[u8]) -> Result<Self, EncodingError> {
        let packet =
            Packet::from_bytes(datagram).map_err(|e| EncodingError::Message(format!("{e:?}")))?;

        let observe = packet
            .get_option(CoapOption::Observe)
            .and_then(|values| values.front())
            .map(|value| decode_uint(value));

        Ok(Self {
            kind: packet.header.get_type(),
            message_id: packet.header.message_id,
            token: packet.get_token().to_vec(),
            code: packet.header.code,
            observe,
            payload: packet.payload,
        })
    }

    /// `true` for an empty message (no code), such as the ACK preceding a separate response.
    pub(crate) fn is_empty(&self) -> bool {
        matches!(self.code, MessageClass::Empty)
    }

    /// Classes 2 to 5, including codes the message library has no name for.
    pub(crate) fn is_response(&self) -> bool {
        matches!(code_class(self.code), 2..=5)
    }

    pub(crate) fn is_success(&self) -> bool {
        code_class(self.code) == 2
    }
}

fn code_class(code: MessageClass) -> u8 {
    u8::from(code) >> 5
}

/// Formats a code as `class.detail`, e.g. `2.05` or `4.04`.
pub(crate) fn format_code(code: MessageClass) -> String {
    let raw = u8::from(code);
    format!("{}.{:02}", raw >> 5, raw & 0x1f)
}

/// Minimal-length big-endian unsigned integer option value.
fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

fn decode_uint(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}
