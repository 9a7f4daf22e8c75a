//! One-shot send-and-pin to every chat, and bulk unpin.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use warden_common::{ChatFeature, PinnedMessage, WardenError};

use crate::registry::ChatRegistry;
use crate::store::Store;
use crate::transport::{ChatTarget, ChatTransport, Payload, delete_quietly, has_required_permissions};

/// Per-chat outcome counts of a bulk operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Chats where the bot lacks permissions
    pub skipped: usize,
    pub failed: usize,
}

impl std::fmt::Display for BroadcastReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "delivered: {}, skipped: {}, failed: {}",
            self.delivered, self.skipped, self.failed
        )
    }
}

/// Broadcast engine
pub struct Broadcaster {
    transport: Arc<dyn ChatTransport>,
    store: Arc<dyn Store>,
    registry: ChatRegistry,
    /// Pause after each send and each pin
    pacing: Duration,
}

impl Broadcaster {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: Arc<dyn Store>,
        registry: ChatRegistry,
        pacing: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            registry,
            pacing,
        }
    }

    pub fn registry(&self) -> &ChatRegistry {
        &self.registry
    }

    /// Send to every chat with pinning on, pin silently, and remember the pin
    pub async fn send_and_pin(&self, payload: &Payload) -> Result<BroadcastReport, WardenError> {
        let chats = self.registry.with_feature(ChatFeature::Pinning).await?;
        let mut report = BroadcastReport::default();

        for chat in chats {
            let chat_id = chat.chat_id;

            if !has_required_permissions(self.transport.as_ref(), chat_id).await {
                report.skipped += 1;
                continue;
            }

            let sent = match self
                .transport
                .send_payload(&ChatTarget::Id(chat_id), payload)
                .await
            {
                Ok(sent) => sent,
                Err(e) => {
                    tracing::error!(chat_id, error = %e, "Broadcast send failed");
                    report.failed += 1;
                    continue;
                }
            };

            tokio::time::sleep(self.pacing).await;

            if let Err(e) = self.transport.pin_message(chat_id, sent.message_id).await {
                tracing::error!(chat_id, message_id = sent.message_id, error = %e, "Pin failed");
                report.failed += 1;
                continue;
            }

            tokio::time::sleep(self.pacing).await;

            let pinned = PinnedMessage {
                chat_id,
                message_id: sent.message_id,
            };
            if let Err(e) = self.store.add_pinned(pinned).await {
                tracing::error!(chat_id, error = %e, "Failed to record pinned message");
            }
            report.delivered += 1;
        }

        tracing::info!(%report, "📌 Send-and-pin finished");
        Ok(report)
    }

    /// Unpin and delete every recorded broadcast
    pub async fn unpin_all(&self) -> Result<BroadcastReport, WardenError> {
        let pinned = self.store.pinned().await?;
        let mut report = BroadcastReport::default();

        for entry in pinned {
            let PinnedMessage {
                chat_id,
                message_id,
            } = entry;

            if let Err(e) = self.transport.unpin_message(chat_id, message_id).await {
                tracing::error!(chat_id, message_id, error = %e, "Unpin failed");
                report.failed += 1;
                continue;
            }
            delete_quietly(self.transport.as_ref(), chat_id, message_id, "unpinned broadcast")
                .await;

            if let Err(e) = self.store.remove_pinned(entry).await {
                tracing::error!(chat_id, message_id, error = %e, "Failed to forget pinned message");
            }
            report.delivered += 1;
        }

        tracing::info!(%report, "Unpin finished");
        Ok(report)
    }

    /// Send one payload and pause. Failures are logged; returns whether it went out.
    pub async fn deliver(&self, target: &ChatTarget, payload: &Payload) -> bool {
        match self.transport.send_payload(target, payload).await {
            Ok(_) => {
                tokio::time::sleep(self.pacing).await;
                true
            }
            Err(e) => {
                tracing::error!(target = %target, error = %e, "Failed to deliver payload");
                false
            }
        }
    }
}
