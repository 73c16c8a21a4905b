//! Push certificate credentials
//!
//! A [`Credential`] bundles the client certificate chain, its private key and
//! the [`ServerPopulation`] the certificate authorizes. The population is
//! derived from the leaf certificate's subject exactly once, when the
//! credential is built.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nova_apns_legacy::{Credential, CredentialSource};
//!
//! # fn example() -> nova_apns_legacy::ApnsResult<()> {
//! let credential = Credential::load(&CredentialSource::Path("/certs/apns.p12".into()))?;
//! println!("certificate talks to {}", credential.population());
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use p12_keystore::{KeyStore, KeyStoreEntry};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tracing::{debug, info};
use x509_parser::prelude::*;

use crate::config::ApnsConfig;
use crate::endpoint::ServerPopulation;
use crate::error::{ApnsError, ApnsResult};

/// Subject fragments of certificates issued for the sandbox gateway
const SANDBOX_SUBJECT_PATTERNS: &[&str] = &["Apple Development Push", "Apple Development IOS Push"];

/// Subject fragments of certificates issued for the production gateway
const PRODUCTION_SUBJECT_PATTERNS: &[&str] =
    &["Apple Production Push", "Apple Production IOS Push"];

/// Classify a certificate subject string.
///
/// Returns `None` when the subject matches neither push identity.
pub fn classify_subject(subject: &str) -> Option<ServerPopulation> {
    if SANDBOX_SUBJECT_PATTERNS.iter().any(|p| subject.contains(p)) {
        Some(ServerPopulation::Sandbox)
    } else if PRODUCTION_SUBJECT_PATTERNS
        .iter()
        .any(|p| subject.contains(p))
    {
        Some(ServerPopulation::Production)
    } else {
        None
    }
}

/// Determine which server population a DER certificate authorizes.
pub fn classify_server(cert: &CertificateDer<'_>) -> ApnsResult<ServerPopulation> {
    let subject = certificate_subject(cert)?;
    classify_subject(&subject).ok_or(ApnsError::InvalidCredential(subject))
}

fn certificate_subject(cert: &CertificateDer<'_>) -> ApnsResult<String> {
    let (_, parsed) = X509Certificate::from_der(cert.as_ref()).map_err(|e| {
        ApnsError::InvalidCertificateData(format!("failed to parse X.509 certificate: {e}"))
    })?;

    Ok(parsed.subject().to_string())
}

/// Certificate chain and private key as produced by a [`CertificateDecoder`]
pub struct DecodedCertificate {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Turns a stored certificate blob into a certificate chain and key
pub trait CertificateDecoder {
    fn decode(&self, blob: &[u8]) -> ApnsResult<DecodedCertificate>;
}

/// Decoder for PEM bundles holding the certificate chain followed by the key
#[derive(Debug, Clone, Copy, Default)]
pub struct PemDecoder;

impl CertificateDecoder for PemDecoder {
    fn decode(&self, blob: &[u8]) -> ApnsResult<DecodedCertificate> {
        let mut reader = blob;
        let chain = rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                ApnsError::InvalidCertificateData(format!("failed to parse certificates: {e}"))
            })?;

        if chain.is_empty() {
            return Err(ApnsError::InvalidCertificateData(
                "no certificate found".to_string(),
            ));
        }

        let mut reader = blob;
        let key = rustls_pemfile::private_key(&mut reader)
            .map_err(|e| {
                ApnsError::InvalidCertificateData(format!("failed to parse private key: {e}"))
            })?
            .ok_or_else(|| ApnsError::InvalidCertificateData("no private key found".to_string()))?;

        Ok(DecodedCertificate { chain, key })
    }
}

/// Decoder for PKCS#12 archives (`.p12`), the format Keychain Access exports
#[derive(Clone, Default)]
pub struct Pkcs12Decoder {
    passphrase: String,
}

impl Pkcs12Decoder {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }
}

impl fmt::Debug for Pkcs12Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs12Decoder").finish_non_exhaustive()
    }
}

impl CertificateDecoder for Pkcs12Decoder {
    fn decode(&self, blob: &[u8]) -> ApnsResult<DecodedCertificate> {
        // Fails on a malformed archive and on a MAC mismatch (wrong passphrase)
        let keystore = KeyStore::from_pkcs12(blob, &self.passphrase).map_err(|e| {
            ApnsError::InvalidCertificateData(format!("failed to decode PKCS#12 archive: {e}"))
        })?;

        let key_chain = keystore
            .entries()
            .find_map(|(_, entry)| match entry {
                KeyStoreEntry::PrivateKeyChain(chain) => Some(chain),
                _ => None,
            })
            .ok_or_else(|| {
                ApnsError::InvalidCertificateData("PKCS#12 archive holds no private key".to_string())
            })?;

        let chain: Vec<CertificateDer<'static>> = key_chain
            .chain()
            .iter()
            .map(|cert| CertificateDer::from(cert.as_der().to_vec()))
            .collect();
        if chain.is_empty() {
            return Err(ApnsError::InvalidCertificateData(
                "PKCS#12 archive holds no certificate".to_string(),
            ));
        }

        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_chain.key().to_vec()));
        Ok(DecodedCertificate { chain, key })
    }
}

/// Encoding of a stored push certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateFormat {
    /// Certificate chain followed by the private key
    Pem,
    /// `.p12` / `.pfx` archive
    Pkcs12,
}

impl CertificateFormat {
    /// Format implied by a file name: `.p12` and `.pfx` are PKCS#12,
    /// everything else is read as PEM
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("p12") || ext.eq_ignore_ascii_case("pfx") => {
                CertificateFormat::Pkcs12
            }
            _ => CertificateFormat::Pem,
        }
    }
}

/// Where a credential blob comes from
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// File on disk
    Path(PathBuf),
    /// Blob already in memory
    Blob(Vec<u8>),
}

impl CredentialSource {
    fn read(&self) -> ApnsResult<Cow<'_, [u8]>> {
        match self {
            CredentialSource::Path(path) => fs::read(path).map(Cow::Owned).map_err(|e| {
                ApnsError::InvalidCertificateData(format!(
                    "failed to read certificate from {}: {e}",
                    path.display()
                ))
            }),
            CredentialSource::Blob(blob) => Ok(Cow::Borrowed(blob)),
        }
    }
}

struct CredentialInner {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    population: ServerPopulation,
    subject: String,
}

/// Immutable push credential, cheap to clone and share between sessions
#[derive(Clone)]
pub struct Credential {
    inner: Arc<CredentialInner>,
}

impl Credential {
    /// Build a credential, classifying the leaf certificate once
    pub fn new(decoded: DecodedCertificate) -> ApnsResult<Self> {
        let leaf = decoded.chain.first().ok_or_else(|| {
            ApnsError::InvalidCertificateData("empty certificate chain".to_string())
        })?;

        let subject = certificate_subject(leaf)?;
        let population = classify_subject(&subject)
            .ok_or_else(|| ApnsError::InvalidCredential(subject.clone()))?;

        info!(
            population = %population,
            chain_len = decoded.chain.len(),
            "Loaded APNs push certificate"
        );

        Ok(Self {
            inner: Arc::new(CredentialInner {
                chain: decoded.chain,
                key: decoded.key,
                population,
                subject,
            }),
        })
    }

    /// Decode a blob with the given decoder and build a credential from it
    pub fn decode_with<D>(decoder: &D, blob: &[u8]) -> ApnsResult<Self>
    where
        D: CertificateDecoder + ?Sized,
    {
        Self::new(decoder.decode(blob)?)
    }

    /// Build a credential from a PEM bundle
    pub fn from_pem(blob: &[u8]) -> ApnsResult<Self> {
        Self::decode_with(&PemDecoder, blob)
    }

    /// Load a credential without a passphrase. Files named `.p12`/`.pfx` are
    /// decoded as PKCS#12, other files and in-memory blobs as PEM.
    pub fn load(source: &CredentialSource) -> ApnsResult<Self> {
        match source {
            CredentialSource::Path(path) if CertificateFormat::from_path(path) == CertificateFormat::Pkcs12 => {
                Self::load_with(&Pkcs12Decoder::default(), source)
            }
            _ => Self::load_with(&PemDecoder, source),
        }
    }

    /// Load a credential from a path or blob with an explicit decoder
    pub fn load_with<D>(decoder: &D, source: &CredentialSource) -> ApnsResult<Self>
    where
        D: CertificateDecoder + ?Sized,
    {
        if let CredentialSource::Path(path) = source {
            debug!(path = %path.display(), "Reading APNs certificate");
        }
        let blob = source.read()?;
        Self::decode_with(decoder, &blob)
    }

    /// Load the credential the configuration points at, with the decoder it
    /// selects
    pub fn from_config(config: &ApnsConfig) -> ApnsResult<Self> {
        Self::load_with(config.certificate_decoder().as_ref(), &config.credential_source())
    }

    pub fn population(&self) -> ServerPopulation {
        self.inner.population
    }

    pub fn subject(&self) -> &str {
        &self.inner.subject
    }

    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.inner.chain
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.inner.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("subject", &self.inner.subject)
            .field("population", &self.inner.population)
            .field("chain_len", &self.inner.chain.len())
            .finish_non_exhaustive()
    }
}
