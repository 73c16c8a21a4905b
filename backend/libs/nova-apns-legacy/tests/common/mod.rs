//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::io;
use std::sync::Mutex;

use async_trait::async_trait;
use nova_apns_legacy::{ApnsResult, Connector, Credential, Endpoint};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tokio::io::DuplexStream;

pub const SANDBOX_SUBJECT: &str = "Apple Development IOS Push Services: com.nova.app";
pub const PRODUCTION_SUBJECT: &str = "Apple Production IOS Push Services: com.nova.app";

/// PEM bundle (certificate then key) with the given common name
pub fn pem_bundle(common_name: &str) -> String {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params
        .distinguished_name
        .push(DnType::OrganizationName, "Nova Development");

    let key = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key).unwrap();
    format!("{}{}", cert.pem(), key.serialize_pem())
}

pub fn credential(common_name: &str) -> Credential {
    Credential::from_pem(pem_bundle(common_name).as_bytes()).unwrap()
}

/// Connector handing out pre-built in-memory streams, recording endpoints
#[derive(Default)]
pub struct DuplexConnector {
    streams: Mutex<Vec<DuplexStream>>,
    pub connected: Mutex<Vec<Endpoint>>,
}

impl DuplexConnector {
    /// Returns the connector and the server side of its single stream
    pub fn single(buffer: usize) -> (Self, DuplexStream) {
        let (client, server) = tokio::io::duplex(buffer);
        let connector = Self {
            streams: Mutex::new(vec![client]),
            connected: Mutex::new(Vec::new()),
        };
        (connector, server)
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.connected.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for DuplexConnector {
    type Stream = DuplexStream;

    async fn connect(&self, endpoint: Endpoint, _credential: &Credential) -> ApnsResult<DuplexStream> {
        self.connected.lock().unwrap().push(endpoint);
        self.streams
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "no stream available").into())
    }
}

/// Encode one feedback record
pub fn feedback_record(timestamp: u32, token: &[u8]) -> Vec<u8> {
    let mut bytes = timestamp.to_be_bytes().to_vec();
    bytes.extend_from_slice(&(token.len() as u16).to_be_bytes());
    bytes.extend_from_slice(token);
    bytes
}
