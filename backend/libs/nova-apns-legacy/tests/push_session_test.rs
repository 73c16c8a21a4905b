//! Integration tests for push sessions and bulk dispatch
//!
//! Sessions run over in-memory duplex streams; the "gateway" side reads
//! whatever the client wrote and checks the frames byte for byte.

mod common;

use common::{credential, DuplexConnector, PRODUCTION_SUBJECT, SANDBOX_SUBJECT};
use nova_apns_legacy::{
    encode, push_notification, push_notifications, push_notifications_from, ApnsError,
    FnSource, Notification, PushSession, ServerPopulation, MAX_PAYLOAD_LEN,
};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

fn notification(token: u8, alert: &str) -> Notification {
    Notification::new(
        vec![token; 32],
        format!(r#"{{"aps":{{"alert":"{alert}"}}}}"#).into_bytes(),
    )
}

fn frames(notifications: &[Notification]) -> Vec<u8> {
    notifications
        .iter()
        .flat_map(|n| encode(n).unwrap().to_vec())
        .collect()
}

#[tokio::test]
async fn test_open_resolves_sandbox_gateway() {
    let credential = credential(SANDBOX_SUBJECT);
    assert_eq!(credential.population(), ServerPopulation::Sandbox);
    let (connector, mut gateway) = DuplexConnector::single(4096);

    let mut session = PushSession::open(&connector, &credential).await.unwrap();
    let sent = notification(1, "hello");
    session.send(&sent).await.unwrap();
    session.close().await.unwrap();

    let endpoints = connector.endpoints();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].host, "gateway.sandbox.push.apple.com");
    assert_eq!(endpoints[0].port, 2195);

    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, frames(&[sent]));
}

#[tokio::test]
async fn test_single_notification_production() {
    let credential = credential(PRODUCTION_SUBJECT);
    let (connector, mut gateway) = DuplexConnector::single(4096);

    let sent = notification(7, "prod");
    let summary = push_notification(&connector, &credential, sent.clone())
        .await
        .unwrap();
    assert_eq!(summary.sent, 1);
    assert_eq!(connector.endpoints()[0].host, "gateway.push.apple.com");

    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, frames(&[sent]));
}

#[tokio::test]
async fn test_bulk_dispatch_collection() {
    let credential = credential(SANDBOX_SUBJECT);
    let (connector, mut gateway) = DuplexConnector::single(64 * 1024);

    let batch: Vec<_> = (0..10).map(|i| notification(i, "bulk")).collect();
    let summary = push_notifications(&connector, &credential, batch.clone())
        .await
        .unwrap();
    assert_eq!(summary.sent, 10);

    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, frames(&batch));
}

#[tokio::test]
async fn test_bulk_dispatch_from_channel() {
    let credential = credential(SANDBOX_SUBJECT);
    let (connector, mut gateway) = DuplexConnector::single(64 * 1024);

    let initial = vec![notification(1, "first")];
    let later = vec![notification(2, "second"), notification(3, "third")];

    let (tx, mut rx) = mpsc::channel(2);
    let producer = {
        let later = later.clone();
        tokio::spawn(async move {
            for n in later {
                tx.send(vec![n]).await.unwrap();
            }
        })
    };

    let summary = push_notifications_from(&connector, &credential, initial.clone(), &mut rx)
        .await
        .unwrap();
    producer.await.unwrap();
    assert_eq!(summary.sent, 3);

    let mut expected = initial;
    expected.extend(later);
    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, frames(&expected));
}

#[tokio::test]
async fn test_bulk_dispatch_from_closure() {
    let credential = credential(SANDBOX_SUBJECT);
    let (connector, mut gateway) = DuplexConnector::single(64 * 1024);

    let mut remaining = 3u8;
    let mut source = FnSource(move || {
        if remaining == 0 {
            return None;
        }
        remaining -= 1;
        Some(vec![notification(remaining, "pulled")])
    });

    let summary = push_notifications_from(&connector, &credential, Vec::new(), &mut source)
        .await
        .unwrap();
    assert_eq!(summary.sent, 3);

    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(
        received,
        frames(&[
            notification(2, "pulled"),
            notification(1, "pulled"),
            notification(0, "pulled"),
        ])
    );
}

#[tokio::test]
async fn test_dispatch_closes_session_when_send_fails() {
    let credential = credential(SANDBOX_SUBJECT);
    let (connector, mut gateway) = DuplexConnector::single(64 * 1024);

    let valid = notification(1, "ok");
    let too_large = Notification::new(vec![2; 32], vec![b'x'; MAX_PAYLOAD_LEN + 1]);
    let never_sent = notification(3, "skipped");

    let err = push_notifications(
        &connector,
        &credential,
        vec![valid.clone(), too_large, never_sent],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ApnsError::NotificationTooLarge { .. }));

    // Connection released: the gateway sees the first frame and then EOF.
    let mut received = Vec::new();
    gateway.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, frames(&[valid]));
}

#[tokio::test]
async fn test_connect_failure_is_transport_failure() {
    let credential = credential(SANDBOX_SUBJECT);
    let connector = DuplexConnector::default();

    let err = push_notification(&connector, &credential, notification(1, "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApnsError::TransportFailure(_)));
}

#[tokio::test]
async fn test_gateway_reset_surfaces_transport_failure() {
    let credential = credential(SANDBOX_SUBJECT);
    let (connector, gateway) = DuplexConnector::single(4096);
    drop(gateway);

    let mut session = PushSession::open(&connector, &credential).await.unwrap();
    let err = session.send(&notification(1, "lost")).await.unwrap_err();
    assert!(matches!(err, ApnsError::TransportFailure(_)));
    assert!(session.is_closed());

    let err = session.send(&notification(1, "lost")).await.unwrap_err();
    assert!(matches!(err, ApnsError::SessionClosed));
    session.close().await.unwrap();
}
