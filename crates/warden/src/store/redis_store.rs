//! Redis-backed store. Records are JSON strings under prefixed keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashSet;

use warden_common::constants::redis_keys::{
    CAPTCHA_PREFIX, CHAT_INDEX, CHAT_PREFIX, LAST_MESSAGE_PREFIX, PINNED, STOP_WORDS,
};
use warden_common::{CaptchaStatus, ChatSettings, PinnedMessage, WardenError};

use super::{Store, StoreResult};

/// Store backed by a Redis connection manager (auto-reconnecting)
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis
    pub async fn connect(redis_url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url).map_err(store_err)?;
        let conn = ConnectionManager::new(client).await.map_err(store_err)?;
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn store_err(err: redis::RedisError) -> WardenError {
    WardenError::Store(err.to_string())
}

fn chat_key(chat_id: i64) -> String {
    format!("{CHAT_PREFIX}{chat_id}")
}

fn captcha_key(user_id: u64, chat_id: i64) -> String {
    format!("{CAPTCHA_PREFIX}{chat_id}:{user_id}")
}

fn last_message_key(user_id: u64, chat_id: i64) -> String {
    format!("{LAST_MESSAGE_PREFIX}{chat_id}:{user_id}")
}

fn pinned_member(pinned: PinnedMessage) -> String {
    format!("{}:{}", pinned.chat_id, pinned.message_id)
}

fn parse_pinned_member(member: &str) -> Option<PinnedMessage> {
    let (chat_id, message_id) = member.split_once(':')?;
    Some(PinnedMessage {
        chat_id: chat_id.parse().ok()?,
        message_id: message_id.parse().ok()?,
    })
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn insert_chat(&self, chat: &ChatSettings) -> StoreResult<bool> {
        let mut conn = self.conn();
        let data = serde_json::to_string(chat)?;

        let inserted: bool = conn
            .set_nx(chat_key(chat.chat_id), &data)
            .await
            .map_err(store_err)?;
        if inserted {
            conn.sadd::<_, _, ()>(CHAT_INDEX, chat.chat_id)
                .await
                .map_err(store_err)?;
        }

        Ok(inserted)
    }

    async fn save_chat(&self, chat: &ChatSettings) -> StoreResult<()> {
        let mut conn = self.conn();
        let data = serde_json::to_string(chat)?;

        conn.set::<_, _, ()>(chat_key(chat.chat_id), &data)
            .await
            .map_err(store_err)?;
        conn.sadd::<_, _, ()>(CHAT_INDEX, chat.chat_id)
            .await
            .map_err(store_err)?;

        Ok(())
    }

    async fn chat(&self, chat_id: i64) -> StoreResult<Option<ChatSettings>> {
        let mut conn = self.conn();
        let data: Option<String> = conn.get(chat_key(chat_id)).await.map_err(store_err)?;

        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    async fn chats(&self) -> StoreResult<Vec<ChatSettings>> {
        let mut conn = self.conn();
        let ids: Vec<i64> = conn.smembers(CHAT_INDEX).await.map_err(store_err)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| chat_key(*id)).collect();
        let rows: Vec<Option<String>> = conn.mget(&keys).await.map_err(store_err)?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in rows.into_iter().flatten() {
            chats.push(serde_json::from_str::<ChatSettings>(&row)?);
        }
        chats.sort_by_key(|c| c.chat_id);

        Ok(chats)
    }

    async fn delete_chat(&self, chat_id: i64) -> StoreResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn.del(chat_key(chat_id)).await.map_err(store_err)?;
        conn.srem::<_, _, ()>(CHAT_INDEX, chat_id)
            .await
            .map_err(store_err)?;

        Ok(removed > 0)
    }

    async fn captcha_status(
        &self,
        user_id: u64,
        chat_id: i64,
    ) -> StoreResult<Option<CaptchaStatus>> {
        let mut conn = self.conn();
        let data: Option<String> = conn
            .get(captcha_key(user_id, chat_id))
            .await
            .map_err(store_err)?;

        match data {
            Some(d) => Ok(Some(serde_json::from_str(&d)?)),
            None => Ok(None),
        }
    }

    async fn save_captcha_status(&self, status: &CaptchaStatus) -> StoreResult<()> {
        let mut conn = self.conn();
        let data = serde_json::to_string(status)?;

        conn.set::<_, _, ()>(captcha_key(status.user_id, status.chat_id), &data)
            .await
            .map_err(store_err)
    }

    async fn delete_captcha_status(&self, user_id: u64, chat_id: i64) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.del::<_, ()>(captcha_key(user_id, chat_id))
            .await
            .map_err(store_err)
    }

    async fn last_message_time(
        &self,
        user_id: u64,
        chat_id: i64,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let mut conn = self.conn();
        let data: Option<String> = conn
            .get(last_message_key(user_id, chat_id))
            .await
            .map_err(store_err)?;

        match data {
            Some(d) => {
                let at = DateTime::parse_from_rfc3339(&d)
                    .map_err(|e| WardenError::Store(format!("bad timestamp {d:?}: {e}")))?;
                Ok(Some(at.with_timezone(&Utc)))
            }
            None => Ok(None),
        }
    }

    async fn set_last_message_time(
        &self,
        user_id: u64,
        chat_id: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.set::<_, _, ()>(last_message_key(user_id, chat_id), at.to_rfc3339())
            .await
            .map_err(store_err)
    }

    async fn add_pinned(&self, pinned: PinnedMessage) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.sadd::<_, _, ()>(PINNED, pinned_member(pinned))
            .await
            .map_err(store_err)
    }

    async fn pinned(&self) -> StoreResult<Vec<PinnedMessage>> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.smembers(PINNED).await.map_err(store_err)?;

        let mut pinned: Vec<PinnedMessage> = members
            .iter()
            .filter_map(|m| {
                let parsed = parse_pinned_member(m);
                if parsed.is_none() {
                    tracing::warn!(member = %m, "Skipping malformed pinned entry");
                }
                parsed
            })
            .collect();
        pinned.sort();

        Ok(pinned)
    }

    async fn remove_pinned(&self, pinned: PinnedMessage) -> StoreResult<()> {
        let mut conn = self.conn();
        conn.srem::<_, _, ()>(PINNED, pinned_member(pinned))
            .await
            .map_err(store_err)
    }

    async fn replace_stop_words(&self, words: &[String]) -> StoreResult<()> {
        let mut conn = self.conn();

        let mut pipe = redis::pipe();
        pipe.atomic().del(STOP_WORDS).ignore();
        if !words.is_empty() {
            pipe.sadd(STOP_WORDS, words).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await.map_err(store_err)?;

        tracing::info!(count = words.len(), "Stop-word set replaced");
        Ok(())
    }

    async fn stop_words(&self) -> StoreResult<HashSet<String>> {
        let mut conn = self.conn();
        let words: HashSet<String> = conn.smembers(STOP_WORDS).await.map_err(store_err)?;
        Ok(words.into_iter().map(|w| w.to_lowercase()).collect())
    }
}
