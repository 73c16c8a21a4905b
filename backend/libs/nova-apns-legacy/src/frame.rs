//! Binary framing for the legacy APNs protocol
//!
//! Push frame (simple notification format, command 0):
//!
//! ```text
//! +------+----------------+--------------+------------------+----------------+
//! | 0x00 | token len (BE) | token bytes  | payload len (BE) | payload bytes  |
//! | u8   | u16            | token len    | u16              | <= 256         |
//! +------+----------------+--------------+------------------+----------------+
//! ```
//!
//! Feedback record:
//!
//! ```text
//! +------------------+----------------+--------------+
//! | timestamp (BE)   | token len (BE) | token bytes  |
//! | u32, unix secs   | u16            | token len    |
//! +------------------+----------------+--------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::notification::{Notification, MAX_PAYLOAD_LEN};

/// Command byte of the simple notification format
pub const COMMAND_SIMPLE: u8 = 0;

/// Size of the fixed part of a feedback record
pub const FEEDBACK_HEADER_LEN: usize = 6;

/// Encode a notification into a push frame.
///
/// Returns `None` when the payload exceeds [`MAX_PAYLOAD_LEN`] or the token
/// cannot be length-prefixed; nothing is ever truncated.
pub fn encode(notification: &Notification) -> Option<Bytes> {
    let token = &notification.device_token;
    let payload = &notification.payload;

    if payload.len() > MAX_PAYLOAD_LEN {
        return None;
    }
    let token_len = u16::try_from(token.len()).ok()?;

    let mut frame = BytesMut::with_capacity(1 + 2 + token.len() + 2 + payload.len());
    frame.put_u8(COMMAND_SIMPLE);
    frame.put_u16(token_len);
    frame.put_slice(token);
    frame.put_u16(payload.len() as u16);
    frame.put_slice(payload);

    Some(frame.freeze())
}

/// Whether [`encode`] would produce a frame for this notification
pub fn is_valid(notification: &Notification) -> bool {
    notification.payload.len() <= MAX_PAYLOAD_LEN && notification.device_token.len() <= u16::MAX as usize
}

/// Fixed-size prefix of a feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackHeader {
    /// Seconds since the Unix epoch
    pub timestamp: u32,
    pub token_len: u16,
}

impl FeedbackHeader {
    pub fn parse(bytes: &[u8; FEEDBACK_HEADER_LEN]) -> Self {
        Self {
            timestamp: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            token_len: u16::from_be_bytes([bytes[4], bytes[5]]),
        }
    }

    pub fn rejected_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(i64::from(self.timestamp), 0).unwrap_or_default()
    }
}
