//! # Outbox
//!
//! Services never talk to the mail transport or the socket layer directly.
//! They enqueue an [`OutboundEvent`] and return; [`OutboxWorker`] drains the
//! queue in the background. A failed delivery is logged and dropped, it never
//! reaches the request that produced it.

use std::sync::Arc;

use domains::{Broadcaster, ChatEvent, DomainError, Mailer, Outbox, OutboundEvent, Result};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unbounded in-process queue; `enqueue` never waits.
#[derive(Clone)]
pub struct ChannelOutbox {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelOutbox {
    /// Returns the producer side and the receiver to hand to [`OutboxWorker`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Outbox for ChannelOutbox {
    fn enqueue(&self, event: OutboundEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| DomainError::Internal("outbox worker has stopped".into()))
    }
}

pub struct OutboxWorker {
    mailer: Arc<dyn Mailer>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl OutboxWorker {
    pub fn new(mailer: Arc<dyn Mailer>, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            mailer,
            broadcaster,
        }
    }

    /// Runs until every producer has been dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<OutboundEvent>) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event).await;
        }
        tracing::debug!("outbox drained, worker exiting");
    }

    async fn dispatch(&self, event: OutboundEvent) {
        match event {
            OutboundEvent::Email(email) => {
                // Mail transports can be slow; keep broadcasts flowing.
                let mailer = Arc::clone(&self.mailer);
                tokio::spawn(async move {
                    if let Err(e) = mailer.send(&email).await {
                        tracing::warn!(to = %email.to, error = %e, "email delivery failed");
                    }
                });
            }
            OutboundEvent::Broadcast { dialog_id, event } => {
                match self.broadcaster.broadcast(dialog_id, &event).await {
                    Ok(receivers) => {
                        tracing::debug!(%dialog_id, receivers, "event fanned out");
                    }
                    Err(e) => {
                        tracing::warn!(%dialog_id, error = %e, "fan-out failed");
                    }
                }
            }
        }
    }
}

/// Queues a dialog broadcast. The durable write has already happened, so a
/// closed outbox only costs the real-time notification.
pub(crate) fn publish(outbox: &dyn Outbox, dialog_id: Uuid, event: ChatEvent) {
    if let Err(e) = outbox.enqueue(OutboundEvent::Broadcast { dialog_id, event }) {
        tracing::warn!(%dialog_id, error = %e, "broadcast not queued");
    }
}
