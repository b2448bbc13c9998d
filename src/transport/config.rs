//! DTLS session configuration derived from resolved credentials.

use crate::constants::DEFAULT_CONNECT_TIMEOUT;
use crate::credentials::{Certificate, Credentials};
use std::time::Duration;

/// A DTLS 1.2 cipher suite offered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
#[non_exhaustive]
pub enum CipherSuite {
    /// `TLS_ECDHE_ECDSA_WITH_AES_128_CCM`
    TLS_ECDHE_ECDSA_WITH_AES_128_CCM,
    /// `TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8`
    TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
    /// `TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256`
    TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
    /// `TLS_PSK_WITH_AES_128_GCM_SHA256`
    TLS_PSK_WITH_AES_128_GCM_SHA256,
    /// `TLS_PSK_WITH_AES_128_CCM_8`
    TLS_PSK_WITH_AES_128_CCM_8,
    /// `TLS_PSK_WITH_AES_128_CCM`
    TLS_PSK_WITH_AES_128_CCM,
}

const ECDSA_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
];

const PSK_SUITES: &[CipherSuite] = &[
    CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_PSK_WITH_AES_128_CCM_8,
    CipherSuite::TLS_PSK_WITH_AES_128_CCM,
];

/// The group of cipher suites offered, chosen by credential kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuiteSet {
    /// Pre-shared key suites.
    Psk,
    /// ECDHE-ECDSA certificate suites.
    EcdsaCertificate,
}

impl CipherSuiteSet {
    /// The suites in preference order.
    pub fn suites(self) -> &'static [CipherSuite] {
        match self {
            CipherSuiteSet::Psk => PSK_SUITES,
            CipherSuiteSet::EcdsaCertificate => ECDSA_SUITES,
        }
    }
}

/// How the server's certificate is checked in certificate mode.
///
/// PSK sessions have no server certificate and ignore this setting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ServerVerification {
    /// Verify the server chain against these trust anchors.
    ///
    /// An empty list rejects every server certificate.
    Roots(Vec<Certificate>),
    /// Accept any server certificate.
    #[default]
    SkipVerify,
}

/// Everything the dialer needs to open one DTLS session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    cipher_suites: CipherSuiteSet,
    connect_timeout: Duration,
    credentials: Credentials,
    server_name: String,
    verification: ServerVerification,
}

impl TransportConfig {
    /// Builds the configuration for `credentials`.
    ///
    /// Certificate credentials select the ECDSA suites; every other variant selects the PSK
    /// suites. The connection budget starts at [`DEFAULT_CONNECT_TIMEOUT`].
    pub fn configure(
        credentials: Credentials,
        server_name: impl Into<String>,
        verification: ServerVerification,
    ) -> Self {
        let cipher_suites = if credentials.is_certificate() {
            CipherSuiteSet::EcdsaCertificate
        } else {
            CipherSuiteSet::Psk
        };

        Self {
            cipher_suites,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            credentials,
            server_name: server_name.into(),
            verification,
        }
    }

    /// Overrides the handshake budget.
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// The selected cipher suite group.
    pub fn cipher_suites(&self) -> CipherSuiteSet {
        self.cipher_suites
    }

    /// The handshake budget.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The credentials presented during the handshake.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Name used to verify the server certificate.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Server certificate policy.
    pub fn verification(&self) -> &ServerVerification {
        &self.verification
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::credentials::{
        CertificateCredentials, CredentialResolver, CredentialSource, PskCredentials,
    };
    use std::collections::HashMap;
    use std::io::Write as _;

    fn certificate_credentials() -> Credentials {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["device".to_owned()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let mut cert_file = tempfile::NamedTempFile::new().unwrap();
        cert_file.write_all(cert.pem().as_bytes()).unwrap();
        let mut key_file = tempfile::NamedTempFile::new().unwrap();
        key_file.write_all(key.serialize_pem().as_bytes()).unwrap();

        let env: HashMap<String, String> = [
            ("COAP_PSK_ID".to_owned(), "dev-1".to_owned()),
            ("COAP_PSK".to_owned(), "s3cr3t".to_owned()),
        ]
        .into_iter()
        .collect();
        let source = CredentialSource {
            certificate_path: Some(cert_file.path().to_path_buf()),
            key_path: Some(key_file.path().to_path_buf()),
            ..CredentialSource::default()
        };
        CredentialResolver::with_env(env).resolve(&source).unwrap()
    }

    #[test]
    fn test_psk_credentials_select_psk_suites() {
        let config = TransportConfig::configure(
            Credentials::Psk(PskCredentials::new("dev-1", "s3cr3t")),
            "localhost",
            ServerVerification::SkipVerify,
        );

        assert_eq!(config.cipher_suites(), CipherSuiteSet::Psk);
        assert_eq!(
            config.cipher_suites().suites(),
            &[
                CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256,
                CipherSuite::TLS_PSK_WITH_AES_128_CCM_8,
                CipherSuite::TLS_PSK_WITH_AES_128_CCM,
            ]
        );
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_certificate_wins_even_with_psk_variables_set() {
        let credentials = certificate_credentials();
        assert!(matches!(credentials, Credentials::Certificate(_)));

        let config =
            TransportConfig::configure(credentials, "localhost", ServerVerification::default());

        assert_eq!(config.cipher_suites(), CipherSuiteSet::EcdsaCertificate);
        assert!(config
            .cipher_suites()
            .suites()
            .iter()
            .all(|s| format!("{s:?}").starts_with("TLS_ECDHE_ECDSA")));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_empty_psk_still_selects_psk_suites() {
        let config = TransportConfig::configure(
            Credentials::Psk(PskCredentials::new(Vec::new(), Vec::new())),
            "h",
            ServerVerification::SkipVerify,
        );
        assert_eq!(config.cipher_suites(), CipherSuiteSet::Psk);
    }

    #[test]
    fn test_certificate_credentials_constructed_directly() {
        let Credentials::Certificate(resolved) = certificate_credentials() else {
            panic!("expected certificate credentials");
        };
        let credentials = Credentials::Certificate(CertificateCredentials::new(
            resolved.chain().to_vec(),
            resolved.private_key().clone(),
        ));

        let config = TransportConfig::configure(credentials, "h", ServerVerification::SkipVerify)
            .with_connect_timeout(Duration::from_millis(250));
        assert_eq!(config.cipher_suites(), CipherSuiteSet::EcdsaCertificate);
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));
    }
}
