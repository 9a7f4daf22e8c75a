//! Moderation gate: one decision per inbound group message.
//!
//! Checks run in a fixed order: membership, privilege, cooldown, captcha,
//! stop-words.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use warden_common::{ChatFeature, WardenError};

use super::StopWordFilter;
use crate::captcha::{CaptchaEngine, IssueTrigger};
use crate::metrics::Metrics;
use crate::registry::ChatRegistry;
use crate::tracking::CooldownTracker;
use crate::transport::{ChatTransport, InboundMessage, delete_quietly, send_transient};

/// Why a message was removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteReason {
    Cooldown { remaining_secs: u64 },
    StopWord(String),
}

/// Gate decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateAction {
    Allow,
    /// Sender is no longer in the chat
    Ignore,
    Delete(DeleteReason),
    /// Unverified sender; a fresh challenge went out
    DeleteAndChallenge,
}

pub struct ModerationGate {
    transport: Arc<dyn ChatTransport>,
    registry: ChatRegistry,
    captcha: Arc<CaptchaEngine>,
    cooldown: CooldownTracker,
    stop_words: StopWordFilter,
    metrics: Arc<Metrics>,
    notice_display: Duration,
}

impl ModerationGate {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        registry: ChatRegistry,
        captcha: Arc<CaptchaEngine>,
        cooldown: CooldownTracker,
        stop_words: StopWordFilter,
        metrics: Arc<Metrics>,
        notice_display: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            captcha,
            cooldown,
            stop_words,
            metrics,
            notice_display,
        }
    }

    pub async fn handle(&self, msg: &InboundMessage) -> Result<GateAction, WardenError> {
        self.handle_at(msg, Utc::now()).await
    }

    /// Decide with an explicit "now"
    pub async fn handle_at(
        &self,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Result<GateAction, WardenError> {
        let (chat_id, user_id) = (msg.chat_id, msg.user_id);

        if !msg.sender.is_present() {
            return Ok(GateAction::Ignore);
        }

        if msg.sender.is_privileged() {
            self.cooldown.record(user_id, chat_id, now).await?;
            return Ok(GateAction::Allow);
        }

        let cooldown = self.registry.cooldown(chat_id).await?;
        if let Some(remaining_secs) = self
            .cooldown
            .remaining(user_id, chat_id, cooldown, now)
            .await?
        {
            delete_quietly(self.transport.as_ref(), chat_id, msg.message_id, "cooldown").await;

            let notice = format!(
                "{}, please wait {remaining_secs} more seconds before writing again.",
                msg.mention
            );
            if let Err(e) =
                send_transient(&self.transport, chat_id, &notice, self.notice_display).await
            {
                tracing::warn!(chat_id, error = %e, "Failed to post cooldown notice");
            }

            Metrics::incr(&self.metrics.cooldown_deletions);
            tracing::debug!(chat_id, user_id, remaining_secs, "Message deleted: cooldown");
            return Ok(GateAction::Delete(DeleteReason::Cooldown { remaining_secs }));
        }

        if self
            .registry
            .is_enabled(chat_id, ChatFeature::Stopwords)
            .await?
        {
            let tracker = self.captcha.tracker();

            if !tracker.is_passed(user_id, chat_id).await? {
                delete_quietly(self.transport.as_ref(), chat_id, msg.message_id, "unverified")
                    .await;

                if let Some(stale) = tracker.challenge_message(user_id, chat_id).await? {
                    delete_quietly(self.transport.as_ref(), chat_id, stale, "stale captcha").await;
                }
                tracker.clear(user_id, chat_id).await?;

                let outcome = self
                    .captcha
                    .issue(chat_id, user_id, &msg.mention, IssueTrigger::Message)
                    .await?;
                tracing::debug!(chat_id, user_id, ?outcome, "Message deleted: captcha pending");
                return Ok(GateAction::DeleteAndChallenge);
            }

            if let Some(text) = msg.text.as_deref() {
                if let Some(word) = self.stop_words.check(text).await? {
                    delete_quietly(self.transport.as_ref(), chat_id, msg.message_id, "stop-word")
                        .await;

                    Metrics::incr(&self.metrics.stopword_deletions);
                    tracing::info!(chat_id, user_id, word = %word, "Message deleted: stop-word");
                    return Ok(GateAction::Delete(DeleteReason::StopWord(word)));
                }
            }
        }

        self.cooldown.record(user_id, chat_id, now).await?;
        Metrics::incr(&self.metrics.messages_allowed);
        Ok(GateAction::Allow)
    }
}
