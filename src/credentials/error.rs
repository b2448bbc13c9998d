//! Error type for credential resolution.

use std::path::PathBuf;
use x509_parser::error::X509Error;

/// An error that may arise while turning a [`super::CredentialSource`] into credentials.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// A certificate or key file could not be read.
    #[error("failed reading {kind} file {}", path.display())]
    ReadFile {
        /// Which file was being read (`certificate` or `key`).
        kind: &'static str,
        /// The offending path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file did not contain the expected PEM block.
    #[error("no {label} PEM block found in {}", path.display())]
    MissingPemBlock {
        /// The expected PEM label.
        label: &'static str,
        /// The offending path.
        path: PathBuf,
    },

    /// Error returned by the X.509 parsing library.
    #[error("failed parsing X.509 certificate")]
    InvalidCertificate(#[from] X509Error),

    /// The key is not a parseable ECDSA P-256 private key.
    #[error("failed decoding ECDSA private key: {0}")]
    InvalidPrivateKey(String),

    /// The key file holds a PEM block of an unsupported kind.
    #[error("unsupported private key PEM block: {0}")]
    UnsupportedKey(String),
}
