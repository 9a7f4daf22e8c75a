//! Persistent storage for chats, captcha progress, cooldowns, pins, and stop-words.
//!
//! Components receive an `Arc<dyn Store>` at composition time; nothing holds a
//! module-level handle.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use warden_common::{CaptchaStatus, ChatSettings, PinnedMessage, WardenError};

pub type StoreResult<T> = Result<T, WardenError>;

/// Record storage. No cross-entity transactions are required.
#[async_trait]
pub trait Store: Send + Sync {
    /// Liveness probe used by the readiness endpoint
    async fn ping(&self) -> StoreResult<()>;

    // === Chats ===

    /// Insert a chat row unless one exists. Returns true if inserted.
    async fn insert_chat(&self, chat: &ChatSettings) -> StoreResult<bool>;
    async fn save_chat(&self, chat: &ChatSettings) -> StoreResult<()>;
    async fn chat(&self, chat_id: i64) -> StoreResult<Option<ChatSettings>>;
    async fn chats(&self) -> StoreResult<Vec<ChatSettings>>;
    /// Returns true if a row was deleted
    async fn delete_chat(&self, chat_id: i64) -> StoreResult<bool>;

    // === Captcha status ===

    async fn captcha_status(&self, user_id: u64, chat_id: i64)
    -> StoreResult<Option<CaptchaStatus>>;
    async fn save_captcha_status(&self, status: &CaptchaStatus) -> StoreResult<()>;
    async fn delete_captcha_status(&self, user_id: u64, chat_id: i64) -> StoreResult<()>;

    // === Cooldown ===

    async fn last_message_time(&self, user_id: u64, chat_id: i64)
    -> StoreResult<Option<DateTime<Utc>>>;
    async fn set_last_message_time(
        &self,
        user_id: u64,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    // === Pinned broadcasts ===

    async fn add_pinned(&self, pinned: PinnedMessage) -> StoreResult<()>;
    async fn pinned(&self) -> StoreResult<Vec<PinnedMessage>>;
    async fn remove_pinned(&self, pinned: PinnedMessage) -> StoreResult<()>;

    // === Stop-words ===

    /// Replace the whole set
    async fn replace_stop_words(&self, words: &[String]) -> StoreResult<()>;
    async fn stop_words(&self) -> StoreResult<HashSet<String>>;
}
