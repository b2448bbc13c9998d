//! CoAP Content-Format registry names.

use std::fmt;
use std::str::FromStr;

use crate::message::EncodingError;

/// A registered CoAP content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum MediaType {
    /// `text/plain;charset=utf-8`
    TextPlain,
    /// `application/cose; cose-type="cose-encrypt0"`
    CoseEncrypt0,
    /// `application/cose; cose-type="cose-mac0"`
    CoseMac0,
    /// `application/cose; cose-type="cose-sign1"`
    CoseSign1,
    /// `application/link-format`
    LinkFormat,
    /// `application/xml`
    Xml,
    /// `application/octet-stream`
    OctetStream,
    /// `application/exi`
    Exi,
    /// `application/json`
    Json,
    /// `application/json-patch+json`
    JsonPatch,
    /// `application/merge-patch+json`
    JsonMergePatch,
    /// `application/cbor`
    Cbor,
    /// `application/cwt`
    Cwt,
    /// `application/cose; cose-type="cose-encrypt"`
    CoseEncrypt,
    /// `application/cose; cose-type="cose-mac"`
    CoseMac,
    /// `application/cose; cose-type="cose-sign"`
    CoseSign,
    /// `application/cose-key`
    CoseKey,
    /// `application/cose-key-set`
    CoseKeySet,
    /// `application/senml+json`
    SenmlJson,
    /// `application/senml+cbor`
    SenmlCbor,
    /// `application/coap-group+json`
    CoapGroup,
    /// `application/senml-etch+json`
    SenmlEtchJson,
    /// `application/senml-etch+cbor`
    SenmlEtchCbor,
    /// `application/vnd.ocf+cbor`
    OcfCbor,
    /// `application/vnd.oma.lwm2m+tlv`
    Lwm2mTlv,
    /// `application/vnd.oma.lwm2m+json`
    Lwm2mJson,
    /// `application/vnd.oma.lwm2m+cbor`
    Lwm2mCbor,
}

const REGISTRY: &[(MediaType, &str, u16)] = &[
    (MediaType::TextPlain, "text/plain;charset=utf-8", 0),
    (MediaType::CoseEncrypt0, "application/cose; cose-type=\"cose-encrypt0\"", 16),
    (MediaType::CoseMac0, "application/cose; cose-type=\"cose-mac0\"", 17),
    (MediaType::CoseSign1, "application/cose; cose-type=\"cose-sign1\"", 18),
    (MediaType::LinkFormat, "application/link-format", 40),
    (MediaType::Xml, "application/xml", 41),
    (MediaType::OctetStream, "application/octet-stream", 42),
    (MediaType::Exi, "application/exi", 47),
    (MediaType::Json, "application/json", 50),
    (MediaType::JsonPatch, "application/json-patch+json", 51),
    (MediaType::JsonMergePatch, "application/merge-patch+json", 52),
    (MediaType::Cbor, "application/cbor", 60),
    (MediaType::Cwt, "application/cwt", 61),
    (MediaType::CoseEncrypt, "application/cose; cose-type=\"cose-encrypt\"", 96),
    (MediaType::CoseMac, "application/cose; cose-type=\"cose-mac\"", 97),
    (MediaType::CoseSign, "application/cose; cose-type=\"cose-sign\"", 98),
    (MediaType::CoseKey, "application/cose-key", 101),
    (MediaType::CoseKeySet, "application/cose-key-set", 102),
    (MediaType::SenmlJson, "application/senml+json", 110),
    (MediaType::SenmlCbor, "application/senml+cbor", 112),
    (MediaType::CoapGroup, "application/coap-group+json", 256),
    (MediaType::SenmlEtchJson, "application/senml-etch+json", 320),
    (MediaType::SenmlEtchCbor, "application/senml-etch+cbor", 322),
    (MediaType::OcfCbor, "application/vnd.ocf+cbor", 10000),
    (MediaType::Lwm2mTlv, "application/vnd.oma.lwm2m+tlv", 11542),
    (MediaType::Lwm2mJson, "application/vnd.oma.lwm2m+json", 11543),
    (MediaType::Lwm2mCbor, "application/vnd.oma.lwm2m+cbor", 11544),
];

impl MediaType {
    /// The registered name.
    pub fn as_str(self) -> &'static str {
        self.entry().1
    }

    /// The Content-Format number sent on the wire.
    pub fn id(self) -> u16 {
        self.entry().2
    }

    /// Looks up a content format by number.
    pub fn from_id(id: u16) -> Option<Self> {
        REGISTRY.iter().find(|(_, _, n)| *n == id).map(|(m, _, _)| *m)
    }

    fn entry(self) -> &'static (MediaType, &'static str, u16) {
        // Every variant has exactly one row.
        REGISTRY
            .iter()
            .find(|(m, _, _)| *m == self)
            .unwrap_or(&REGISTRY[0])
    }
}

/// Lowercases and drops whitespace so `Text/Plain; Charset=UTF-8` matches the registry row.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for MediaType {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        if wanted == "text/plain" {
            return Ok(MediaType::TextPlain);
        }
        REGISTRY
            .iter()
            .find(|(_, name, _)| normalize(name) == wanted)
            .map(|(m, _, _)| *m)
            .ok_or_else(|| EncodingError::UnknownMediaType(s.to_owned()))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
