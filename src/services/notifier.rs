// src/services/notifier.rs
//! Outbound notification queue for successful mints.
//!
//! The engine submits a flat payload to this queue and returns without
//! awaiting delivery. The queue owns its consumer task; whatever the sink
//! does with a notice (email, SMS, push, QR generation) never affects the
//! mint response. The queue is an explicitly constructed value passed into
//! the engine, not a module-level singleton.

use crate::models::certificate::{IssuedCertificateNotice, VerificationLink};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One queued delivery: the certificate notice plus the payload the
/// QR/verification-URL collaborator needs.
#[derive(Debug, Clone)]
pub struct OutboundNotification {
    pub notice: IssuedCertificateNotice,
    pub link: VerificationLink,
}

/// Destination for outbound notifications. Implementations hand the payload
/// to the external dispatcher and own their retry policy.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &OutboundNotification);
}

/// Default sink: logs the payload. Stands in for the external email/QR
/// dispatchers, which consume the same structure.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &OutboundNotification) {
        log::info!(
            "certificate issued notice token_id={} recipient={} course={:?} tx={:?} verify_at=0x{:x}#{}",
            notification.notice.token_id,
            notification.notice.recipient_name,
            notification.notice.course_name,
            notification.notice.transaction_hash,
            notification.link.contract_address,
            notification.link.token_id
        );
    }
}

/// Fire-and-forget dispatcher for issued-certificate notices.
#[derive(Clone)]
pub struct CertificateNotifier {
    tx: mpsc::UnboundedSender<OutboundNotification>,
}

impl CertificateNotifier {
    /// Creates the queue and spawns its consumer task.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundNotification>();
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                sink.deliver(&notification);
            }
        });
        CertificateNotifier { tx }
    }

    /// Enqueues a notification without waiting for delivery. A closed queue
    /// is logged and otherwise ignored; notification failure must not fail
    /// the mint.
    pub fn dispatch(&self, notification: OutboundNotification) {
        if self.tx.send(notification).is_err() {
            log::warn!("notification queue closed; dropping issued-certificate notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, TxHash, U256};
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingSink {
        received: Mutex<Vec<U256>>,
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, notification: &OutboundNotification) {
            self.received
                .lock()
                .unwrap()
                .push(notification.notice.token_id);
        }
    }

    fn notification(token_id: u64) -> OutboundNotification {
        OutboundNotification {
            notice: IssuedCertificateNotice {
                token_id: U256::from(token_id),
                recipient_name: "Ada Lovelace".to_string(),
                course_name: "Algorithms".to_string(),
                institution_name: "Poly U".to_string(),
                issuer: Address::zero(),
                issue_date: 1_700_000_000,
                transaction_hash: TxHash::zero(),
            },
            link: VerificationLink {
                token_id: U256::from(token_id),
                contract_address: Address::zero(),
            },
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_sink() {
        let sink = Arc::new(RecordingSink {
            received: Mutex::new(Vec::new()),
        });
        let notifier = CertificateNotifier::spawn(sink.clone());

        notifier.dispatch(notification(1));
        notifier.dispatch(notification(2));

        // Give the consumer task a chance to drain the queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let received = sink.received.lock().unwrap();
        assert_eq!(*received, vec![U256::from(1u64), U256::from(2u64)]);
    }
}
