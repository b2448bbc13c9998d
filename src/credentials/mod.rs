//! Credential material for the DTLS session.
//!
//! A session authenticates with exactly one [`Credentials`] variant: a pre-shared key or an
//! ECDSA certificate with its private key. [`CredentialResolver`] turns a [`CredentialSource`]
//! (file paths and environment variable names) into concrete material.
//!
//! When both a certificate/key pair and PSK variables are configured, the certificate wins.
//! The DTLS library prefers PSK whenever one is installed, so the precedence is decided here,
//! once, before the transport is configured.

use crate::constants::{DEFAULT_PSK_IDENTITY_ENV, DEFAULT_PSK_SECRET_ENV};
use std::path::PathBuf;

pub mod error;
mod material;
mod resolver;

pub use error::CredentialError;
pub use material::{Certificate, PrivateKey};
pub use resolver::{CredentialResolver, EnvSource, ProcessEnv};

/// Resolved secret material for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Pre-shared key authentication.
    Psk(PskCredentials),
    /// ECDSA certificate authentication.
    Certificate(CertificateCredentials),
}

impl Credentials {
    /// Returns `true` for certificate credentials.
    pub fn is_certificate(&self) -> bool {
        matches!(self, Credentials::Certificate(_))
    }
}

/// PSK identity and secret.
///
/// The secret is zeroized on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, zeroize::Zeroize, zeroize::ZeroizeOnDrop)]
pub struct PskCredentials {
    identity_hint: Vec<u8>,
    secret: Vec<u8>,
}

impl PskCredentials {
    /// Creates PSK credentials from an identity and a secret.
    pub fn new(identity_hint: impl Into<Vec<u8>>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            identity_hint: identity_hint.into(),
            secret: secret.into(),
        }
    }

    /// The identity presented to the server.
    pub fn identity_hint(&self) -> &[u8] {
        &self.identity_hint
    }

    /// The shared secret.
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl std::fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity_hint", &String::from_utf8_lossy(&self.identity_hint))
            .field("secret_len", &self.secret.len())
            .finish()
    }
}

/// Certificate chain (leaf first) and the leaf's ECDSA private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateCredentials {
    chain: Vec<Certificate>,
    private_key: PrivateKey,
}

impl CertificateCredentials {
    /// Creates certificate credentials. `chain` must not be empty.
    pub fn new(chain: Vec<Certificate>, private_key: PrivateKey) -> Self {
        Self { chain, private_key }
    }

    /// The certificate chain, leaf first.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// The PKCS#8 DER encoded private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }
}

/// Where credentials come from.
///
/// Certificate mode requires both paths. Otherwise the PSK identity and secret are read from the
/// named environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSource {
    /// PEM file holding the client certificate (chain).
    pub certificate_path: Option<PathBuf>,
    /// PEM file holding the ECDSA private key.
    pub key_path: Option<PathBuf>,
    /// Environment variable holding the PSK identity.
    pub psk_identity_env: String,
    /// Environment variable holding the PSK secret.
    pub psk_secret_env: String,
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self {
            certificate_path: None,
            key_path: None,
            psk_identity_env: DEFAULT_PSK_IDENTITY_ENV.to_owned(),
            psk_secret_env: DEFAULT_PSK_SECRET_ENV.to_owned(),
        }
    }
}

impl CredentialSource {
    /// Returns the certificate and key paths when both are configured.
    pub fn certificate_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.certificate_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}
