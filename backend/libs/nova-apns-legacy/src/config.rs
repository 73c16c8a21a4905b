//! APNs Configuration

use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::credential::{
    CertificateDecoder, CertificateFormat, CredentialSource, PemDecoder, Pkcs12Decoder,
};
use crate::error::{ApnsError, ApnsResult};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct ApnsConfig {
    /// Push certificate: a `.p12` archive or a PEM bundle (chain then key)
    pub credential_path: String,
    /// Passphrase of the `.p12` archive
    pub certificate_passphrase: Option<String>,
    /// Extra trust roots (PEM); platform roots are used when unset
    pub ca_bundle_path: Option<String>,
    /// Upper bound for TCP connect plus TLS handshake
    pub connect_timeout: Duration,
}

impl ApnsConfig {
    /// Create new APNs configuration
    pub fn new(credential_path: String) -> Self {
        Self {
            credential_path,
            certificate_passphrase: None,
            ca_bundle_path: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set certificate passphrase
    pub fn with_passphrase(mut self, passphrase: String) -> Self {
        self.certificate_passphrase = Some(passphrase);
        self
    }

    /// Trust the roots in this PEM file instead of the platform store
    pub fn with_ca_bundle(mut self, path: String) -> Self {
        self.ca_bundle_path = Some(path);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Load configuration from environment variables
    ///
    /// **Environment Variables**:
    /// - `APNS_CREDENTIAL_PATH`: `.p12` archive or PEM bundle (required)
    /// - `APNS_CERTIFICATE_PASSPHRASE`: passphrase of the `.p12` archive (optional)
    /// - `APNS_CA_BUNDLE_PATH`: PEM file with trust roots (optional)
    /// - `APNS_CONNECT_TIMEOUT_SECS`: connect + handshake timeout (default: 30)
    pub fn from_env() -> ApnsResult<Self> {
        let credential_path = std::env::var("APNS_CREDENTIAL_PATH")
            .map_err(|_| ApnsError::Config("APNS_CREDENTIAL_PATH not set".to_string()))?;

        let connect_timeout_secs = std::env::var("APNS_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_CONNECT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ApnsError::Config(format!("APNS_CONNECT_TIMEOUT_SECS must be a number: {e}"))
            })?;

        let mut config = Self::new(credential_path)
            .with_connect_timeout(Duration::from_secs(connect_timeout_secs));

        if let Ok(passphrase) = std::env::var("APNS_CERTIFICATE_PASSPHRASE") {
            config = config.with_passphrase(passphrase);
        }

        if let Ok(path) = std::env::var("APNS_CA_BUNDLE_PATH") {
            config = config.with_ca_bundle(path);
        }

        Ok(config)
    }

    pub fn credential_source(&self) -> CredentialSource {
        CredentialSource::Path(self.credential_path.clone().into())
    }

    /// PKCS#12 when a passphrase is set or the file is named `.p12`/`.pfx`,
    /// PEM otherwise
    pub fn certificate_format(&self) -> CertificateFormat {
        if self.certificate_passphrase.is_some() {
            CertificateFormat::Pkcs12
        } else {
            CertificateFormat::from_path(Path::new(&self.credential_path))
        }
    }

    pub fn certificate_decoder(&self) -> Box<dyn CertificateDecoder + Send + Sync> {
        match self.certificate_format() {
            CertificateFormat::Pkcs12 => Box::new(Pkcs12Decoder::new(
                self.certificate_passphrase.clone().unwrap_or_default(),
            )),
            CertificateFormat::Pem => Box::new(PemDecoder),
        }
    }
}

impl fmt::Debug for ApnsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApnsConfig")
            .field("credential_path", &self.credential_path)
            .field(
                "certificate_passphrase",
                &self.certificate_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("ca_bundle_path", &self.ca_bundle_path)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}
