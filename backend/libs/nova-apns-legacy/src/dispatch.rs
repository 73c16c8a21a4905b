//! Bulk dispatch over a single push session
//!
//! The driver opens one session, writes an initial batch, optionally keeps
//! pulling batches from a [`NotificationSource`] until it reports completion,
//! and closes the session exactly once on every exit path.

use async_trait::async_trait;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::credential::Credential;
use crate::error::ApnsResult;
use crate::feedback::{FeedbackReader, FeedbackRecord};
use crate::notification::Notification;
use crate::push::PushSession;
use crate::transport::Connector;

/// Caller-driven supply of notifications
#[async_trait]
pub trait NotificationSource: Send {
    /// Next batch to send, or `None` once the caller is done
    async fn next_batch(&mut self) -> Option<Vec<Notification>>;
}

/// Batches arrive over a channel; dropping every sender signals completion
#[async_trait]
impl NotificationSource for mpsc::Receiver<Vec<Notification>> {
    async fn next_batch(&mut self) -> Option<Vec<Notification>> {
        self.recv().await
    }
}

#[async_trait]
impl NotificationSource for mpsc::UnboundedReceiver<Vec<Notification>> {
    async fn next_batch(&mut self) -> Option<Vec<Notification>> {
        self.recv().await
    }
}

/// Adapts a closure returning `None` when done
pub struct FnSource<F>(pub F);

#[async_trait]
impl<F> NotificationSource for FnSource<F>
where
    F: FnMut() -> Option<Vec<Notification>> + Send,
{
    async fn next_batch(&mut self) -> Option<Vec<Notification>> {
        (self.0)()
    }
}

/// Result of a bulk dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchSummary {
    /// Notifications written to the gateway
    pub sent: usize,
}

/// Send a single notification on a fresh session
pub async fn push_notification<C>(
    connector: &C,
    credential: &Credential,
    notification: Notification,
) -> ApnsResult<DispatchSummary>
where
    C: Connector + ?Sized,
{
    push_notifications(connector, credential, vec![notification]).await
}

/// Send a finite collection of notifications on one session
pub async fn push_notifications<C>(
    connector: &C,
    credential: &Credential,
    notifications: Vec<Notification>,
) -> ApnsResult<DispatchSummary>
where
    C: Connector + ?Sized,
{
    dispatch(connector, credential, notifications, None).await
}

/// Send `initial`, then every batch pulled from `source` until it is done
pub async fn push_notifications_from<C, N>(
    connector: &C,
    credential: &Credential,
    initial: Vec<Notification>,
    source: &mut N,
) -> ApnsResult<DispatchSummary>
where
    C: Connector + ?Sized,
    N: NotificationSource,
{
    dispatch(connector, credential, initial, Some(source as &mut dyn NotificationSource)).await
}

/// Read all pending feedback records
pub async fn read_feedback<C>(connector: &C, credential: &Credential) -> ApnsResult<Vec<FeedbackRecord>>
where
    C: Connector + ?Sized,
{
    FeedbackReader::open(connector, credential)
        .await?
        .collect_all()
        .await
}

async fn dispatch<C>(
    connector: &C,
    credential: &Credential,
    initial: Vec<Notification>,
    source: Option<&mut dyn NotificationSource>,
) -> ApnsResult<DispatchSummary>
where
    C: Connector + ?Sized,
{
    let mut session = PushSession::open(connector, credential).await?;

    let result = send_all(&mut session, &initial, source).await;
    let closed = session.close().await;

    match (&result, &closed) {
        (Ok(summary), Ok(())) => info!(sent = summary.sent, "APNs bulk dispatch finished"),
        (Err(e), _) => warn!(sent = session.sent(), error = %e, "APNs bulk dispatch aborted"),
        (Ok(_), Err(e)) => warn!(error = %e, "APNs push session close failed"),
    }

    let summary = result?;
    closed?;
    Ok(summary)
}

async fn send_all<S>(
    session: &mut PushSession<S>,
    initial: &[Notification],
    source: Option<&mut dyn NotificationSource>,
) -> ApnsResult<DispatchSummary>
where
    S: AsyncWrite + Unpin + Send,
{
    let mut summary = DispatchSummary::default();

    for notification in initial {
        session.send(notification).await?;
        summary.sent += 1;
    }

    if let Some(source) = source {
        while let Some(batch) = source.next_batch().await {
            for notification in &batch {
                session.send(notification).await?;
                summary.sent += 1;
            }
        }
    }

    Ok(summary)
}
