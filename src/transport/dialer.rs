//! Opens one DTLS client session to an endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use tokio::net::UdpSocket;
use webrtc_dtls::cipher_suite::CipherSuiteId;
use webrtc_dtls::config::Config;
use webrtc_dtls::conn::DTLSConn;
use webrtc_dtls::crypto::{
    Certificate as DtlsCertificate, CryptoPrivateKey, CryptoPrivateKeyKind,
};
use zeroize::Zeroizing;

use crate::credentials::{Certificate, CertificateCredentials, Credentials, PskCredentials};
use crate::prelude::{debug, info, warn};
use crate::transport::config::{CipherSuite, ServerVerification, TransportConfig};
use crate::transport::{DtlsConnection, Endpoint, TransportError};

/// Dials `endpoint` (`host:port`) and performs the DTLS client handshake.
///
/// The handshake is bounded by [`TransportConfig::connect_timeout`]. Failures are returned as-is;
/// the dialer never retries.
///
/// ## Errors
///
/// Returns [`TransportError`] if:
/// - the endpoint is malformed or does not resolve,
/// - the UDP socket cannot be bound or connected,
/// - the handshake fails or exceeds its budget.
pub async fn dial(endpoint: &str, config: &TransportConfig) -> Result<DtlsConnection, TransportError> {
    let endpoint = Endpoint::parse(endpoint)?;
    let peer = resolve(&endpoint).await?;
    let dtls_config = dtls_config(config)?;

    debug!(
        "Dialing DTLS endpoint: endpoint={}, peer={}, suites={:?}",
        endpoint,
        peer,
        config.cipher_suites()
    );

    let bind_addr: SocketAddr = if peer.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(TransportError::Socket)?;
    socket.connect(peer).await.map_err(TransportError::Socket)?;

    let handshake = DTLSConn::new(Arc::new(socket), dtls_config, true, None);
    match tokio::time::timeout(config.connect_timeout(), handshake).await {
        Ok(Ok(conn)) => {
            info!("DTLS session established: endpoint={}, peer={}", endpoint, peer);
            Ok(DtlsConnection::new(conn, peer))
        }
        Ok(Err(e)) => {
            warn!("DTLS handshake failed: endpoint={}, error={}", endpoint, e);
            Err(TransportError::Handshake(e.to_string()))
        }
        Err(_) => {
            warn!(
                "DTLS handshake timed out: endpoint={}, timeout_ms={}",
                endpoint,
                config.connect_timeout().as_millis()
            );
            Err(TransportError::HandshakeTimeout(config.connect_timeout()))
        }
    }
}

async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr, TransportError> {
    let mut addrs = tokio::net::lookup_host((endpoint.host(), endpoint.port()))
        .await
        .map_err(|source| TransportError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?;
    addrs
        .next()
        .ok_or_else(|| TransportError::NoAddress(endpoint.to_string()))
}

fn dtls_config(config: &TransportConfig) -> Result<Config, TransportError> {
    let cipher_suites = config
        .cipher_suites()
        .suites()
        .iter()
        .copied()
        .map(cipher_suite_id)
        .collect();

    let mut dtls = Config {
        cipher_suites,
        server_name: config.server_name().to_owned(),
        ..Default::default()
    };

    match config.credentials() {
        Credentials::Psk(psk) => install_psk(&mut dtls, psk),
        Credentials::Certificate(cert) => {
            dtls.certificates = vec![dtls_certificate(cert)?];
            match config.verification() {
                ServerVerification::SkipVerify => dtls.insecure_skip_verify = true,
                ServerVerification::Roots(roots) => dtls.roots_cas = roots_from_certs(roots)?,
            }
        }
    }

    Ok(dtls)
}

fn install_psk(dtls: &mut Config, psk: &PskCredentials) {
    let secret = Zeroizing::new(psk.secret().to_vec());
    dtls.psk_identity_hint = Some(psk.identity_hint().to_vec());
    dtls.psk = Some(Arc::new(
        move |_hint: &[u8]| -> Result<Vec<u8>, webrtc_dtls::Error> { Ok(secret.to_vec()) },
    ));
}

fn dtls_certificate(cert: &CertificateCredentials) -> Result<DtlsCertificate, TransportError> {
    let der = cert.private_key().as_bytes();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, der, &SystemRandom::new())
        .map_err(|e| TransportError::InvalidConfig(format!("ECDSA key rejected: {e}")))?;

    Ok(DtlsCertificate {
        certificate: cert_chain_from_der(cert.chain()),
        private_key: CryptoPrivateKey {
            kind: CryptoPrivateKeyKind::Ecdsa256(key_pair),
            serialized_der: der.to_vec(),
        },
    })
}

fn cert_chain_from_der(certs: &[Certificate]) -> Vec<CertificateDer<'static>> {
    certs
        .iter()
        .map(|c| CertificateDer::from(c.as_bytes().to_vec()))
        .collect()
}

fn roots_from_certs(certs: &[Certificate]) -> Result<RootCertStore, TransportError> {
    let mut store = RootCertStore::empty();
    if certs.is_empty() {
        return Ok(store);
    }

    let (added, ignored) = store.add_parsable_certificates(cert_chain_from_der(certs));
    debug!("Loaded trust anchors: added={}, ignored={}", added, ignored);

    if store.is_empty() {
        return Err(TransportError::InvalidConfig(
            "no trust anchors were accepted".into(),
        ));
    }
    Ok(store)
}

fn cipher_suite_id(suite: CipherSuite) -> CipherSuiteId {
    match suite {
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM => {
            CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Ccm
        }
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 => {
            CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Ccm_8
        }
        CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256 => {
            CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256
        }
        CipherSuite::TLS_PSK_WITH_AES_128_GCM_SHA256 => {
            CipherSuiteId::Tls_Psk_With_Aes_128_Gcm_Sha256
        }
        CipherSuite::TLS_PSK_WITH_AES_128_CCM_8 => CipherSuiteId::Tls_Psk_With_Aes_128_Ccm_8,
        CipherSuite::TLS_PSK_WITH_AES_128_CCM => CipherSuiteId::Tls_Psk_With_Aes_128_Ccm,
    }
}
