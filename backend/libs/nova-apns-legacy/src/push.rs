use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};

use crate::credential::Credential;
use crate::endpoint::{resolve_endpoint, Endpoint, ServiceKind};
use crate::error::{ApnsError, ApnsResult};
use crate::frame;
use crate::notification::{Notification, MAX_PAYLOAD_LEN};
use crate::transport::Connector;

/// Write-only session with the APNs push gateway
///
/// The session owns its connection. It starts open and closes exactly once:
/// on [`close`](Self::close), on a failed write, or when dropped. Sends on a
/// closed session fail with [`ApnsError::SessionClosed`] without touching the
/// transport.
pub struct PushSession<S> {
    stream: Option<S>,
    endpoint: Option<Endpoint>,
    sent: u64,
}

impl<S> PushSession<S>
where
    S: AsyncWrite + Unpin + Send,
{
    /// Connect to the push gateway the credential is issued for
    pub async fn open<C>(connector: &C, credential: &Credential) -> ApnsResult<Self>
    where
        C: Connector<Stream = S> + ?Sized,
    {
        let endpoint = resolve_endpoint(credential.population(), ServiceKind::Push);
        let stream = connector.connect(endpoint, credential).await?;

        info!(
            endpoint = %endpoint,
            population = %credential.population(),
            "APNs push session opened"
        );

        Ok(Self {
            stream: Some(stream),
            endpoint: Some(endpoint),
            sent: 0,
        })
    }

    /// Wrap an already-established stream
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream: Some(stream),
            endpoint: None,
            sent: 0,
        }
    }

    /// Frame and write one notification.
    ///
    /// A write failure closes the session before the error is returned.
    pub async fn send(&mut self, notification: &Notification) -> ApnsResult<()> {
        let stream = self.stream.as_mut().ok_or(ApnsError::SessionClosed)?;

        let frame = frame::encode(notification).ok_or(ApnsError::NotificationTooLarge {
            payload_len: notification.payload.len(),
            token_len: notification.device_token.len(),
            max: MAX_PAYLOAD_LEN,
        })?;

        if let Err(e) = write_frame(stream, &frame).await {
            self.stream = None;
            error!(
                token = %notification.token_prefix(),
                sent = self.sent,
                error = %e,
                "APNs push write failed; session closed"
            );
            return Err(ApnsError::TransportFailure(e));
        }

        self.sent += 1;
        debug!(
            token = %notification.token_prefix(),
            frame_len = frame.len(),
            "APNs notification written"
        );
        Ok(())
    }

    /// Shut the connection down. Calling it again is a no-op.
    pub async fn close(&mut self) -> ApnsResult<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };

        info!(sent = self.sent, endpoint = ?self.endpoint.map(|e| e.host), "Closing APNs push session");
        stream.shutdown().await?;
        Ok(())
    }
}

impl<S> PushSession<S> {
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Number of notifications written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl<S> Drop for PushSession<S> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!(sent = self.sent, "APNs push session dropped while open; releasing connection");
        }
    }
}

async fn write_frame<S: AsyncWrite + Unpin>(stream: &mut S, frame: &[u8]) -> io::Result<()> {
    stream.write_all(frame).await?;
    stream.flush().await
}
