//! In-process store for development runs and tests. Nothing survives a restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;

use warden_common::{CaptchaStatus, ChatSettings, PinnedMessage};

use super::{Store, StoreResult};

#[derive(Default)]
struct Tables {
    chats: BTreeMap<i64, ChatSettings>,
    captcha: HashMap<(u64, i64), CaptchaStatus>,
    last_message: HashMap<(u64, i64), DateTime<Utc>>,
    pinned: BTreeSet<PinnedMessage>,
    stop_words: HashSet<String>,
}

/// Store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_chat(&self, chat: &ChatSettings) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.chats.contains_key(&chat.chat_id) {
            return Ok(false);
        }
        tables.chats.insert(chat.chat_id, chat.clone());
        Ok(true)
    }

    async fn save_chat(&self, chat: &ChatSettings) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .chats
            .insert(chat.chat_id, chat.clone());
        Ok(())
    }

    async fn chat(&self, chat_id: i64) -> StoreResult<Option<ChatSettings>> {
        Ok(self.tables.read().await.chats.get(&chat_id).cloned())
    }

    async fn chats(&self) -> StoreResult<Vec<ChatSettings>> {
        Ok(self.tables.read().await.chats.values().cloned().collect())
    }

    async fn delete_chat(&self, chat_id: i64) -> StoreResult<bool> {
        Ok(self.tables.write().await.chats.remove(&chat_id).is_some())
    }

    async fn captcha_status(
        &self,
        user_id: u64,
        chat_id: i64,
    ) -> StoreResult<Option<CaptchaStatus>> {
        Ok(self
            .tables
            .read()
            .await
            .captcha
            .get(&(user_id, chat_id))
            .cloned())
    }

    async fn save_captcha_status(&self, status: &CaptchaStatus) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .captcha
            .insert((status.user_id, status.chat_id), status.clone());
        Ok(())
    }

    async fn delete_captcha_status(&self, user_id: u64, chat_id: i64) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .captcha
            .remove(&(user_id, chat_id));
        Ok(())
    }

    async fn last_message_time(
        &self,
        user_id: u64,
        chat_id: i64,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self
            .tables
            .read()
            .await
            .last_message
            .get(&(user_id, chat_id))
            .copied())
    }

    async fn set_last_message_time(
        &self,
        user_id: u64,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .last_message
            .insert((user_id, chat_id), at);
        Ok(())
    }

    async fn add_pinned(&self, pinned: PinnedMessage) -> StoreResult<()> {
        self.tables.write().await.pinned.insert(pinned);
        Ok(())
    }

    async fn pinned(&self) -> StoreResult<Vec<PinnedMessage>> {
        Ok(self.tables.read().await.pinned.iter().copied().collect())
    }

    async fn remove_pinned(&self, pinned: PinnedMessage) -> StoreResult<()> {
        self.tables.write().await.pinned.remove(&pinned);
        Ok(())
    }

    async fn replace_stop_words(&self, words: &[String]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.stop_words = words.iter().map(|w| w.to_lowercase()).collect();
        Ok(())
    }

    async fn stop_words(&self) -> StoreResult<HashSet<String>> {
        Ok(self.tables.read().await.stop_words.clone())
    }
}
