//! Per-user message cooldown.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use warden_common::MessageCooldown;

use crate::store::{Store, StoreResult};

/// Seconds left to wait, or `None` if the message may go through.
///
/// A message exactly at the boundary is allowed.
pub fn cooldown_remaining(
    last: DateTime<Utc>,
    now: DateTime<Utc>,
    cooldown: MessageCooldown,
) -> Option<u64> {
    if !cooldown.is_enabled() {
        return None;
    }

    let window = chrono::Duration::seconds(i64::from(cooldown.secs()));
    let elapsed = now - last;
    if elapsed < window {
        Some((window - elapsed).num_seconds().max(0) as u64)
    } else {
        None
    }
}

/// Last-message tracking service
#[derive(Clone)]
pub struct CooldownTracker {
    store: Arc<dyn Store>,
}

impl CooldownTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Check the cooldown window for a user
    pub async fn remaining(
        &self,
        user_id: u64,
        chat_id: i64,
        cooldown: MessageCooldown,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<u64>> {
        if !cooldown.is_enabled() {
            return Ok(None);
        }

        Ok(self
            .store
            .last_message_time(user_id, chat_id)
            .await?
            .and_then(|last| cooldown_remaining(last, now, cooldown)))
    }

    /// Record an accepted message
    pub async fn record(&self, user_id: u64, chat_id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.store.set_last_message_time(user_id, chat_id, at).await
    }

    pub async fn last(&self, user_id: u64, chat_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        self.store.last_message_time(user_id, chat_id).await
    }
}
