//! QUIC transport to the gateway
//!
//! - Client tuning for flaky links (idle timeout, keep-alive)
//! - Certificate pinning
//! - Real-time channel transport and request/response client

pub mod gateway;
pub mod quic;
pub mod reader;
pub mod tls;

pub use gateway::GatewayClient;
pub use quic::QuicTransport;
pub use reader::FrameReader;
pub use tls::{certificate_fingerprint, normalize_fingerprint, PinnedCertVerifier};

use quinn::{ClientConfig, Connection, Endpoint, TransportConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::error::{CoreError, Result};

/// Connection is considered dead after this long without packets
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Keeps NAT bindings alive between heartbeats
const KEEP_ALIVE: Duration = Duration::from_secs(5);

/// Configure QUIC client with settings for unreliable networks
///
/// # Features
/// - 30s idle timeout (laptop sleep, Wi-Fi hand-over)
/// - 5s keep-alive interval (NAT traversal)
pub fn configure_client(crypto_config: Arc<quinn::crypto::rustls::QuicClientConfig>) -> ClientConfig {
    let mut transport = TransportConfig::default();
    transport.max_idle_timeout(IDLE_TIMEOUT.try_into().ok());
    transport.keep_alive_interval(Some(KEEP_ALIVE));

    let mut config = ClientConfig::new(crypto_config);
    config.transport_config(Arc::new(transport));
    config
}

/// Build the QUIC client config for a gateway, pinning its certificate
pub fn client_config_for(gateway: &GatewayConfig) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    let verifier = match (&gateway.fingerprint, gateway.insecure) {
        (Some(fp), _) => PinnedCertVerifier::pinned(fp, provider.clone())?,
        (None, true) => PinnedCertVerifier::insecure(provider.clone()),
        (None, false) => {
            return Err(CoreError::InvalidConfig(
                "gateway.fingerprint is required unless gateway.insecure is set".into(),
            ))
        }
    };

    let rustls_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .map_err(|e| CoreError::Protocol(format!("Failed to configure TLS: {}", e)))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();

    let quic_crypto = quinn::crypto::rustls::QuicClientConfig::try_from(rustls_config)
        .map_err(|e| CoreError::Protocol(format!("Failed to create QUIC crypto config: {}", e)))?;

    Ok(configure_client(Arc::new(quic_crypto)))
}

/// Opens QUIC connections to one gateway
#[derive(Clone)]
pub struct Connector {
    endpoint: String,
    server_name: String,
    config: ClientConfig,
}

impl Connector {
    pub fn new(gateway: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            endpoint: gateway.endpoint.clone(),
            server_name: gateway.server_name.clone(),
            config: client_config_for(gateway)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host(self.endpoint.as_str())
            .await
            .map_err(|e| CoreError::Connection(format!("Invalid address {}: {}", self.endpoint, e)))?;
        addrs
            .next()
            .ok_or_else(|| CoreError::Connection(format!("No address for {}", self.endpoint)))
    }

    pub async fn connect(&self) -> Result<Connection> {
        let addr = self.resolve().await?;
        let bind: SocketAddr = if addr.is_ipv6() {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let endpoint = Endpoint::client(bind)?;

        tracing::debug!("Connecting to {} ({})", self.endpoint, addr);
        let connection = endpoint
            .connect_with(self.config.clone(), addr, &self.server_name)?
            .await?;
        tracing::info!("QUIC connection established to {}", addr);
        Ok(connection)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Loopback gateway used by transport tests

    use quinn::{Endpoint, ServerConfig};
    use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

    use super::certificate_fingerprint;
    use crate::config::GatewayConfig;

    pub(crate) struct LoopbackServer {
        pub endpoint: Endpoint,
        pub gateway: GatewayConfig,
    }

    pub(crate) fn loopback_server() -> LoopbackServer {
        let cert = rcgen::generate_simple_self_signed(vec!["gatechat-gateway".to_string()]).unwrap();
        let cert_der = CertificateDer::from(cert.cert);
        let fingerprint = certificate_fingerprint(cert_der.as_ref());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()));

        let config = ServerConfig::with_single_cert(vec![cert_der], key_der).unwrap();
        let endpoint = Endpoint::server(config, "127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = endpoint.local_addr().unwrap();

        LoopbackServer {
            endpoint,
            gateway: GatewayConfig {
                endpoint: addr.to_string(),
                fingerprint: Some(fingerprint),
                ..GatewayConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpinned_secure_config_rejected() {
        let gateway = GatewayConfig::default();
        assert!(matches!(client_config_for(&gateway), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_insecure_and_pinned_configs_build() {
        let insecure = GatewayConfig {
            insecure: true,
            ..GatewayConfig::default()
        };
        assert!(client_config_for(&insecure).is_ok());

        let pinned = GatewayConfig {
            fingerprint: Some("AB:".repeat(31) + "AB"),
            ..GatewayConfig::default()
        };
        assert!(Connector::new(&pinned).is_ok());
    }

    #[tokio::test]
    async fn test_connect_with_pinned_fingerprint() {
        let server = testing::loopback_server();
        let accept = tokio::spawn({
            let endpoint = server.endpoint.clone();
            async move {
                let incoming = endpoint.accept().await.unwrap();
                let connection = incoming.await.unwrap();
                connection.closed().await;
            }
        });

        let connector = Connector::new(&server.gateway).unwrap();
        let connection = connector.connect().await.unwrap();
        connection.close(0u32.into(), b"done");
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_fingerprint() {
        let server = testing::loopback_server();
        let _accept = tokio::spawn({
            let endpoint = server.endpoint.clone();
            async move {
                if let Some(incoming) = endpoint.accept().await {
                    let _ = incoming.await;
                }
            }
        });

        let gateway = GatewayConfig {
            fingerprint: Some("00".repeat(32)),
            ..server.gateway.clone()
        };
        let connector = Connector::new(&gateway).unwrap();
        assert!(connector.connect().await.is_err());
    }
}
