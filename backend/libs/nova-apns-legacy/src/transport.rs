//! Authenticated byte streams to the APNs servers
//!
//! The push and feedback clients only need a bidirectional stream; the
//! [`Connector`] trait is the seam where the TLS transport plugs in. The
//! production implementation is [`TlsConnector`] (tokio + rustls, client
//! certificate authentication).

use std::fs;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{info, warn};

use crate::config::ApnsConfig;
use crate::credential::Credential;
use crate::endpoint::Endpoint;
use crate::error::{ApnsError, ApnsResult};

/// Opens authenticated connections to an APNs endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Connect to `endpoint`, authenticating with `credential`.
    ///
    /// Timeouts and cancellations must be reported as
    /// [`ApnsError::TransportFailure`].
    async fn connect(&self, endpoint: Endpoint, credential: &Credential)
        -> ApnsResult<Self::Stream>;
}

/// TLS connector presenting the push certificate as client identity
#[derive(Clone)]
pub struct TlsConnector {
    roots: Arc<RootCertStore>,
    connect_timeout: Duration,
}

impl TlsConnector {
    pub fn new(roots: RootCertStore, connect_timeout: Duration) -> Self {
        Self {
            roots: Arc::new(roots),
            connect_timeout,
        }
    }

    /// Trust the platform's native root certificates
    pub fn with_native_roots(connect_timeout: Duration) -> ApnsResult<Self> {
        let certs = rustls_native_certs::load_native_certs()
            .map_err(|e| ApnsError::Config(format!("failed to load native roots: {e}")))?;

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs);
        if ignored > 0 {
            warn!(ignored, "Skipped unparsable native root certificates");
        }
        info!(roots = added, "Loaded native trust roots");

        Ok(Self::new(roots, connect_timeout))
    }

    /// Trust only the roots in a PEM file
    pub fn with_pem_roots(pem: &[u8], connect_timeout: Duration) -> ApnsResult<Self> {
        let mut reader = pem;
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApnsError::Config(format!("failed to parse CA bundle: {e}")))?;

        let mut roots = RootCertStore::empty();
        let (added, _) = roots.add_parsable_certificates(certs);
        if added == 0 {
            return Err(ApnsError::Config("CA bundle holds no usable roots".to_string()));
        }

        Ok(Self::new(roots, connect_timeout))
    }

    /// Build the connector described by the configuration
    pub fn from_config(cfg: &ApnsConfig) -> ApnsResult<Self> {
        match &cfg.ca_bundle_path {
            Some(path) => {
                let pem = fs::read(path).map_err(|e| {
                    ApnsError::Config(format!("failed to read CA bundle {path}: {e}"))
                })?;
                Self::with_pem_roots(&pem, cfg.connect_timeout)
            }
            None => Self::with_native_roots(cfg.connect_timeout),
        }
    }

    fn client_config(&self, credential: &Credential) -> ApnsResult<ClientConfig> {
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ApnsError::Config(format!("TLS protocol setup failed: {e}")))?
            .with_root_certificates(self.roots.clone())
            .with_client_auth_cert(
                credential.certificate_chain().to_vec(),
                credential.private_key().clone_key(),
            )
            .map_err(|e| {
                ApnsError::InvalidCertificateData(format!("client certificate rejected: {e}"))
            })
    }
}

#[async_trait]
impl Connector for TlsConnector {
    type Stream = TlsStream<TcpStream>;

    async fn connect(
        &self,
        endpoint: Endpoint,
        credential: &Credential,
    ) -> ApnsResult<Self::Stream> {
        let config = Arc::new(self.client_config(credential)?);
        let server_name = ServerName::try_from(endpoint.host)
            .map_err(|e| ApnsError::Config(format!("invalid server name {}: {e}", endpoint.host)))?;

        let handshake = async {
            let tcp = TcpStream::connect((endpoint.host, endpoint.port)).await?;
            tcp.set_nodelay(true)?;
            tokio_rustls::TlsConnector::from(config)
                .connect(server_name, tcp)
                .await
        };

        match tokio::time::timeout(self.connect_timeout, handshake).await {
            Ok(Ok(stream)) => {
                info!(endpoint = %endpoint, "TLS connection to APNs established");
                Ok(stream)
            }
            Ok(Err(e)) => {
                warn!(endpoint = %endpoint, error = %e, "TLS connection to APNs failed");
                Err(ApnsError::TransportFailure(e))
            }
            Err(_) => {
                warn!(endpoint = %endpoint, timeout = ?self.connect_timeout, "TLS connection to APNs timed out");
                Err(ApnsError::TransportFailure(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {endpoint} timed out after {:?}", self.connect_timeout),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn credential() -> Credential {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(
            DnType::CommonName,
            "Apple Development IOS Push Services: com.example.app",
        );
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Credential::from_pem(format!("{}{}", cert.pem(), key.serialize_pem()).as_bytes()).unwrap()
    }

    fn root_pem() -> String {
        let mut params = CertificateParams::default();
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, "Nova Test Root");
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().pem()
    }

    #[test]
    fn test_client_config_accepts_credential() {
        let connector = TlsConnector::with_pem_roots(root_pem().as_bytes(), Duration::from_secs(1))
            .unwrap();
        assert!(connector.client_config(&credential()).is_ok());
    }

    #[test]
    fn test_empty_ca_bundle_rejected() {
        let result = TlsConnector::with_pem_roots(b"", Duration::from_secs(1));
        assert!(matches!(result, Err(ApnsError::Config(_))));
    }

    #[test]
    fn test_from_config_missing_bundle() {
        let cfg = ApnsConfig::new("/unused.pem".to_string())
            .with_ca_bundle("/nonexistent/roots.pem".to_string());
        assert!(matches!(
            TlsConnector::from_config(&cfg),
            Err(ApnsError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = TlsConnector::with_pem_roots(root_pem().as_bytes(), Duration::from_secs(5))
            .unwrap();
        let endpoint = Endpoint {
            host: "localhost",
            port,
        };

        let result = connector.connect(endpoint, &credential()).await;
        assert!(matches!(result, Err(ApnsError::TransportFailure(_))));
    }
}
