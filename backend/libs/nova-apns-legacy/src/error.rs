//! Error types for the legacy APNs client.

use thiserror::Error;

/// Result type alias for APNs operations.
pub type ApnsResult<T> = Result<T, ApnsError>;

/// Errors surfaced by the push and feedback clients.
#[derive(Error, Debug)]
pub enum ApnsError {
    /// Certificate subject matches neither the development nor the production
    /// push identity.
    #[error("Invalid push certificate: {0}")]
    InvalidCredential(String),

    /// Certificate blob could not be parsed.
    #[error("Invalid certificate data: {0}")]
    InvalidCertificateData(String),

    /// Notification cannot be framed; the caller may shrink the payload and retry.
    #[error("Notification too large: payload is {payload_len} bytes (max {max}), token is {token_len} bytes")]
    NotificationTooLarge {
        payload_len: usize,
        token_len: usize,
        max: usize,
    },

    /// Operation attempted on a session or reader that was already closed.
    #[error("Session already closed")]
    SessionClosed,

    /// Connect, handshake, read or write failure on the underlying stream.
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] std::io::Error),

    /// Feedback stream ended in the middle of a record.
    #[error("Feedback stream truncated: expected {expected} bytes, received {received}")]
    FeedbackTruncated { expected: usize, received: usize },

    /// Hexadecimal device token could not be decoded.
    #[error("Invalid device token: {0}")]
    InvalidDeviceToken(String),

    /// Payload helper could not serialize the notification body.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Missing or malformed configuration.
    #[error("APNs configuration error: {0}")]
    Config(String),
}

impl ApnsError {
    /// Whether the caller can recover by revising its input, as opposed to
    /// opening a new session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ApnsError::NotificationTooLarge { .. } | ApnsError::InvalidDeviceToken(_)
        )
    }
}

impl From<ApnsError> for String {
    fn from(err: ApnsError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_large_is_recoverable() {
        let err = ApnsError::NotificationTooLarge {
            payload_len: 300,
            token_len: 32,
            max: 256,
        };
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_transport_failure_is_fatal() {
        let err: ApnsError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer").into();
        assert!(!err.is_recoverable());
        assert!(matches!(err, ApnsError::TransportFailure(_)));
        assert!(!ApnsError::SessionClosed.is_recoverable());
    }
}
