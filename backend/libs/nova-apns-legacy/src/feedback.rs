//! Feedback service reader
//!
//! The feedback service streams one record per device that rejected
//! notifications and then closes the connection. There is no terminator
//! record: a clean end of stream at a record boundary means the service has
//! been drained. The transport may split records at any byte, so every
//! fixed-size field is read with an accumulating loop.

use std::io;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

use crate::credential::Credential;
use crate::endpoint::{resolve_endpoint, ServiceKind};
use crate::error::{ApnsError, ApnsResult};
use crate::frame::{FeedbackHeader, FEEDBACK_HEADER_LEN};
use crate::notification::token_prefix;
use crate::transport::Connector;

/// A device that rejected notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    /// Binary device token
    pub device_token: Vec<u8>,
    /// Last rejection; a token registered after this time is still valid
    pub rejected_at: DateTime<Utc>,
}

enum ReaderState<S> {
    Open(S),
    /// Stream ended or failed; the connection is already released
    Exhausted,
    /// Closed by the caller before the stream ended
    Closed,
}

/// Outcome of an exact-size read
enum Fill {
    Complete,
    Eof { received: usize },
}

/// Reader over the records of one feedback connection
pub struct FeedbackReader<S> {
    state: ReaderState<S>,
    records: u64,
}

impl<S> FeedbackReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Connect to the feedback service the credential is issued for
    pub async fn open<C>(connector: &C, credential: &Credential) -> ApnsResult<Self>
    where
        C: Connector<Stream = S> + ?Sized,
    {
        let endpoint = resolve_endpoint(credential.population(), ServiceKind::Feedback);
        let stream = connector.connect(endpoint, credential).await?;

        info!(
            endpoint = %endpoint,
            population = %credential.population(),
            "APNs feedback reader opened"
        );

        Ok(Self::from_stream(stream))
    }

    /// Wrap an already-established stream
    pub fn from_stream(stream: S) -> Self {
        Self {
            state: ReaderState::Open(stream),
            records: 0,
        }
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` once the stream ended cleanly at a record boundary.
    /// A stream that ends mid-record fails with
    /// [`ApnsError::FeedbackTruncated`], a failed read with
    /// [`ApnsError::TransportFailure`]. Either way the connection is released
    /// before returning and the reader is fused: every later call returns
    /// `Ok(None)`, after an error as well as after a clean end. The error is
    /// reported once, so callers must not poll again to tell the two apart.
    /// After [`close`](Self::close) the result is [`ApnsError::SessionClosed`].
    pub async fn next(&mut self) -> ApnsResult<Option<FeedbackRecord>> {
        let stream = match &mut self.state {
            ReaderState::Open(stream) => stream,
            ReaderState::Exhausted => return Ok(None),
            ReaderState::Closed => return Err(ApnsError::SessionClosed),
        };

        match read_record(stream).await {
            Ok(Some(record)) => {
                self.records += 1;
                debug!(
                    token = %token_prefix(&record.device_token),
                    rejected_at = %record.rejected_at,
                    "APNs feedback record read"
                );
                Ok(Some(record))
            }
            Ok(None) => {
                info!(records = self.records, "APNs feedback stream drained");
                self.release().await;
                Ok(None)
            }
            Err(e) => {
                warn!(records = self.records, error = %e, "APNs feedback stream failed");
                self.release().await;
                Err(e)
            }
        }
    }

    /// Read every remaining record
    pub async fn collect_all(mut self) -> ApnsResult<Vec<FeedbackRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Lazily yield the remaining records. The stream ends after the first
    /// error.
    pub fn into_stream(self) -> impl Stream<Item = ApnsResult<FeedbackRecord>> {
        stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.next().await {
                Ok(Some(record)) => Some((Ok(record), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Close the connection. Calling it again is a no-op.
    pub async fn close(&mut self) -> ApnsResult<()> {
        match std::mem::replace(&mut self.state, ReaderState::Closed) {
            ReaderState::Open(mut stream) => {
                info!(records = self.records, "Closing APNs feedback reader");
                stream.shutdown().await?;
                Ok(())
            }
            ReaderState::Exhausted => {
                self.state = ReaderState::Exhausted;
                Ok(())
            }
            ReaderState::Closed => Ok(()),
        }
    }

    async fn release(&mut self) {
        if let ReaderState::Open(mut stream) =
            std::mem::replace(&mut self.state, ReaderState::Exhausted)
        {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "APNs feedback shutdown after end of stream failed");
            }
        }
    }
}

impl<S> FeedbackReader<S> {
    pub fn is_closed(&self) -> bool {
        !matches!(self.state, ReaderState::Open(_))
    }

    /// Number of records read so far
    pub fn records_read(&self) -> u64 {
        self.records
    }
}

impl<S> Drop for FeedbackReader<S> {
    fn drop(&mut self) {
        if let ReaderState::Open(_) = self.state {
            debug!(records = self.records, "APNs feedback reader dropped while open; releasing connection");
        }
    }
}

async fn read_record<S: AsyncRead + Unpin>(stream: &mut S) -> ApnsResult<Option<FeedbackRecord>> {
    let mut header = [0u8; FEEDBACK_HEADER_LEN];
    match fill_exact(stream, &mut header).await? {
        Fill::Complete => {}
        Fill::Eof { received: 0 } => return Ok(None),
        Fill::Eof { received } => {
            return Err(ApnsError::FeedbackTruncated {
                expected: FEEDBACK_HEADER_LEN,
                received,
            })
        }
    }

    let header = FeedbackHeader::parse(&header);
    let token_len = usize::from(header.token_len);
    let mut device_token = vec![0u8; token_len];
    if let Fill::Eof { received } = fill_exact(stream, &mut device_token).await? {
        return Err(ApnsError::FeedbackTruncated {
            expected: FEEDBACK_HEADER_LEN + token_len,
            received: FEEDBACK_HEADER_LEN + received,
        });
    }

    Ok(Some(FeedbackRecord {
        device_token,
        rejected_at: header.rejected_at(),
    }))
}

/// Fill `buf` from partial reads until it is full or the peer closes
async fn fill_exact<S: AsyncRead + Unpin>(stream: &mut S, buf: &mut [u8]) -> io::Result<Fill> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Ok(Fill::Eof { received: filled });
        }
        filled += n;
        trace!(read = n, filled, expected = buf.len(), "Partial feedback read");
    }
    Ok(Fill::Complete)
}
