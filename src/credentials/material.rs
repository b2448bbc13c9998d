//! Validated DER material handed to the DTLS stack.

use crate::credentials::error::CredentialError;
use pkcs8::{ObjectIdentifier, PrivateKeyInfo};
use x509_parser::error::X509Error;
use zeroize::Zeroize;

/// `id-ecPublicKey` (RFC 5480).
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// One DER-encoded X.509 certificate from a chain or trust bundle.
///
/// Always holds exactly one certificate with no trailing bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Certificate(Vec<u8>);

impl Certificate {
    /// Returns the DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Certificate {
    type Error = CredentialError;

    fn try_from(der: Vec<u8>) -> Result<Self, Self::Error> {
        let (rest, _) = x509_parser::parse_x509_certificate(&der).map_err(|e| match e {
            x509_parser::nom::Err::Error(e) | x509_parser::nom::Err::Failure(e) => e,
            x509_parser::nom::Err::Incomplete(_) => X509Error::InvalidCertificate,
        })?;
        if !rest.is_empty() {
            return Err(X509Error::InvalidCertificate.into());
        }
        Ok(Self(der))
    }
}

/// An elliptic-curve private key as PKCS#8 DER, zeroized on drop.
#[derive(Clone, Eq, PartialEq, Zeroize)]
#[zeroize(drop)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Returns the PKCS#8 bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = CredentialError;

    fn try_from(pkcs8: &[u8]) -> Result<Self, Self::Error> {
        let info = PrivateKeyInfo::try_from(pkcs8)
            .map_err(|e| CredentialError::InvalidPrivateKey(e.to_string()))?;
        if info.algorithm.oid != EC_PUBLIC_KEY {
            return Err(CredentialError::InvalidPrivateKey(format!(
                "expected an EC key, found algorithm {}",
                info.algorithm.oid
            )));
        }
        Ok(Self(pkcs8.to_vec()))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("len", &self.0.len())
            .finish()
    }
}
