//! Chat registry: per-chat feature flags and tunables.

use std::sync::Arc;
use warden_common::{CaptchaTimeout, ChatFeature, ChatSettings, MessageCooldown, WardenError};

use crate::store::{Store, StoreResult};

/// Registered chats and their settings
#[derive(Clone)]
pub struct ChatRegistry {
    store: Arc<dyn Store>,
}

impl ChatRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register a chat with every feature on. Existing rows are left untouched.
    pub async fn register(&self, chat_id: i64) -> StoreResult<bool> {
        let inserted = self.store.insert_chat(&ChatSettings::new(chat_id)).await?;
        if inserted {
            tracing::info!(chat_id, "📋 Chat registered");
        }
        Ok(inserted)
    }

    /// Returns false if the chat was not registered
    pub async fn remove(&self, chat_id: i64) -> StoreResult<bool> {
        let removed = self.store.delete_chat(chat_id).await?;
        if removed {
            tracing::info!(chat_id, "Chat removed");
        }
        Ok(removed)
    }

    pub async fn get(&self, chat_id: i64) -> StoreResult<Option<ChatSettings>> {
        self.store.chat(chat_id).await
    }

    pub async fn list(&self) -> StoreResult<Vec<ChatSettings>> {
        self.store.chats().await
    }

    /// Chats with `feature` switched on
    pub async fn with_feature(&self, feature: ChatFeature) -> StoreResult<Vec<ChatSettings>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|c| c.feature(feature))
            .collect())
    }

    /// Unregistered chats read as "off"
    pub async fn is_enabled(&self, chat_id: i64, feature: ChatFeature) -> StoreResult<bool> {
        Ok(self
            .get(chat_id)
            .await?
            .is_some_and(|c| c.feature(feature)))
    }

    pub async fn set_feature(
        &self,
        chat_id: i64,
        feature: ChatFeature,
        enabled: bool,
    ) -> StoreResult<()> {
        self.update(chat_id, |c| c.set_feature(feature, enabled))
            .await?;
        tracing::info!(chat_id, feature = ?feature, enabled, "Chat feature toggled");
        Ok(())
    }

    /// Cooldown for a chat; unregistered chats have none
    pub async fn cooldown(&self, chat_id: i64) -> StoreResult<MessageCooldown> {
        Ok(self
            .get(chat_id)
            .await?
            .map(|c| c.message_cooldown)
            .unwrap_or_default())
    }

    pub async fn set_cooldown(&self, chat_id: i64, cooldown: MessageCooldown) -> StoreResult<()> {
        self.update(chat_id, |c| c.message_cooldown = cooldown)
            .await
    }

    /// Apply a cooldown to every registered chat. Returns how many were updated.
    pub async fn set_cooldown_all(&self, cooldown: MessageCooldown) -> StoreResult<usize> {
        let chats = self.list().await?;
        for mut chat in chats.iter().cloned() {
            chat.message_cooldown = cooldown;
            self.store.save_chat(&chat).await?;
        }
        tracing::info!(chats = chats.len(), cooldown = cooldown.secs(), "Cooldown applied to all chats");
        Ok(chats.len())
    }

    /// Captcha timeout for a chat, or the default when unregistered
    pub async fn captcha_timeout(&self, chat_id: i64) -> StoreResult<CaptchaTimeout> {
        Ok(self
            .get(chat_id)
            .await?
            .map(|c| c.captcha_timeout)
            .unwrap_or_default())
    }

    pub async fn set_captcha_timeout(
        &self,
        chat_id: i64,
        timeout: CaptchaTimeout,
    ) -> StoreResult<()> {
        self.update(chat_id, |c| c.captcha_timeout = timeout).await
    }

    async fn update<F>(&self, chat_id: i64, apply: F) -> StoreResult<()>
    where
        F: FnOnce(&mut ChatSettings),
    {
        let mut chat = self
            .get(chat_id)
            .await?
            .ok_or_else(|| WardenError::NotFound(format!("chat {chat_id} is not registered")))?;
        apply(&mut chat);
        self.store.save_chat(&chat).await
    }
}
