//! Certificate pinning for the gateway connection
//!
//! The gateway presents a self-signed certificate; the client trusts it by
//! SHA-256 fingerprint instead of a CA chain.

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::DigitallySignedStruct;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::{CoreError, Result};

/// "AA:BB:..." SHA-256 fingerprint of a DER certificate
pub fn certificate_fingerprint(cert: &[u8]) -> String {
    Sha256::digest(cert)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Uppercase hex without separators ("aa:bb", "AA-BB" and "aabb" compare equal)
pub fn normalize_fingerprint(fp: &str) -> String {
    fp.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Verifier that accepts exactly one certificate, or any when unpinned
#[derive(Debug)]
pub struct PinnedCertVerifier {
    /// Normalized expected fingerprint; `None` accepts every certificate
    expected: Option<String>,
    provider: Arc<CryptoProvider>,
}

impl PinnedCertVerifier {
    pub fn pinned(fingerprint: &str, provider: Arc<CryptoProvider>) -> Result<Self> {
        let expected = normalize_fingerprint(fingerprint);
        if expected.len() != 64 || !expected.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CoreError::InvalidConfig(format!(
                "gateway.fingerprint is not a SHA-256 fingerprint: {}",
                fingerprint
            )));
        }
        Ok(Self {
            expected: Some(expected),
            provider,
        })
    }

    /// Skip verification entirely (development gateways only)
    pub fn insecure(provider: Arc<CryptoProvider>) -> Self {
        Self {
            expected: None,
            provider,
        }
    }

    fn short(fp: &str) -> String {
        if fp.len() <= 8 {
            return fp.to_string();
        }
        format!("{}...{}", &fp[..4], &fp[fp.len() - 4..])
    }
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let Some(expected) = &self.expected else {
            tracing::warn!("Accepting gateway certificate without verification");
            return Ok(ServerCertVerified::assertion());
        };

        let actual = normalize_fingerprint(&certificate_fingerprint(end_entity.as_ref()));
        if actual == *expected {
            tracing::debug!("Gateway certificate matches pinned fingerprint");
            Ok(ServerCertVerified::assertion())
        } else {
            tracing::error!(
                "Fingerprint mismatch! Expected: {}, Got: {}",
                Self::short(expected),
                Self::short(&actual)
            );
            Err(rustls::Error::General("Fingerprint mismatch".to_string()))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.provider.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(rustls::crypto::ring::default_provider())
    }

    #[test]
    fn test_normalize_fingerprint_formats() {
        assert_eq!(normalize_fingerprint("aa:bb:cc"), "AABBCC");
        assert_eq!(normalize_fingerprint("AA-BB-CC"), "AABBCC");
        assert_eq!(normalize_fingerprint(" aabbcc "), "AABBCC");
    }

    #[test]
    fn test_certificate_fingerprint_format() {
        let fp = certificate_fingerprint(b"certificate");
        assert_eq!(fp.len(), 32 * 3 - 1);
        assert_eq!(fp.split(':').count(), 32);
        assert_eq!(fp, fp.to_uppercase());
    }

    #[test]
    fn test_pinned_rejects_malformed_fingerprint() {
        assert!(PinnedCertVerifier::pinned("AA:BB", provider()).is_err());
        assert!(PinnedCertVerifier::pinned(&"zz".repeat(32), provider()).is_err());
        assert!(PinnedCertVerifier::pinned(&"ab".repeat(32), provider()).is_ok());
    }

    #[test]
    fn test_verify_matches_only_pinned_certificate() {
        let cert = CertificateDer::from(b"not really der".to_vec());
        let fingerprint = certificate_fingerprint(cert.as_ref()).to_lowercase();
        let name = ServerName::try_from("gatechat-gateway").unwrap();

        let verifier = PinnedCertVerifier::pinned(&fingerprint, provider()).unwrap();
        assert!(verifier
            .verify_server_cert(&cert, &[], &name, &[], UnixTime::now())
            .is_ok());

        let other = CertificateDer::from(b"another".to_vec());
        assert!(verifier
            .verify_server_cert(&other, &[], &name, &[], UnixTime::now())
            .is_err());

        let insecure = PinnedCertVerifier::insecure(provider());
        assert!(insecure
            .verify_server_cert(&other, &[], &name, &[], UnixTime::now())
            .is_ok());
    }
}
