/// Nova APNs Legacy Library
///
/// This library provides a client for Apple's legacy binary Push Notification
/// protocol, used by services that still deliver through the certificate
/// authenticated gateway on ports 2195/2196.
///
/// It handles:
/// - Push certificate loading (PKCS#12 or PEM) and sandbox/production classification
/// - Gateway and feedback endpoint resolution
/// - Binary notification framing with payload size validation
/// - Push sessions with deterministic connection release
/// - Fragmentation-tolerant decoding of the feedback stream
/// - Bulk dispatch of notification batches over a single connection
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod notification;
pub mod push;
pub mod transport;

pub use config::ApnsConfig;
pub use credential::{
    classify_server, classify_subject, CertificateDecoder, CertificateFormat, Credential,
    CredentialSource, DecodedCertificate, PemDecoder, Pkcs12Decoder,
};
pub use dispatch::{
    push_notification, push_notifications, push_notifications_from, read_feedback,
    DispatchSummary, FnSource, NotificationSource,
};
pub use endpoint::{resolve_endpoint, Endpoint, ServerPopulation, ServiceKind};
pub use error::{ApnsError, ApnsResult};
pub use feedback::{FeedbackReader, FeedbackRecord};
pub use frame::{encode, is_valid};
pub use notification::{pack_hex_token, Notification, MAX_PAYLOAD_LEN};
pub use push::PushSession;
pub use transport::{Connector, TlsConnector};
