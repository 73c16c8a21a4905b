//! Push notification model

use serde::Serialize;

use crate::error::{ApnsError, ApnsResult};
use crate::frame;

/// Maximum payload size accepted by the legacy gateway, in bytes
pub const MAX_PAYLOAD_LEN: usize = 256;

/// One notification for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Binary device token (not hex)
    pub device_token: Vec<u8>,
    /// Opaque payload, usually serialized JSON
    pub payload: Vec<u8>,
}

impl Notification {
    pub fn new(device_token: impl Into<Vec<u8>>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            device_token: device_token.into(),
            payload: payload.into(),
        }
    }

    /// Build a notification whose payload is the JSON encoding of `body`
    pub fn json<T: Serialize + ?Sized>(device_token: impl Into<Vec<u8>>, body: &T) -> ApnsResult<Self> {
        Ok(Self::new(device_token, serde_json::to_vec(body)?))
    }

    /// Whether the gateway would accept this notification
    pub fn is_valid(&self) -> bool {
        frame::is_valid(self)
    }

    /// First bytes of the token in hex, for logs
    pub fn token_prefix(&self) -> String {
        token_prefix(&self.device_token)
    }
}

pub(crate) fn token_prefix(token: &[u8]) -> String {
    hex::encode(&token[..token.len().min(4)])
}

/// Pack a hexadecimal device token into binary form. Whitespace is ignored.
pub fn pack_hex_token(hex_token: &str) -> ApnsResult<Vec<u8>> {
    let compact: String = hex_token.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact).map_err(|e| ApnsError::InvalidDeviceToken(e.to_string()))
}
