//! Captcha progress tracking.

use std::sync::Arc;
use warden_common::CaptchaStatus;

use crate::store::{Store, StoreResult};

/// Captcha status service
#[derive(Clone)]
pub struct CaptchaTracker {
    store: Arc<dyn Store>,
}

impl CaptchaTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Get captcha status (if exists)
    pub async fn get(&self, user_id: u64, chat_id: i64) -> StoreResult<Option<CaptchaStatus>> {
        self.store.captcha_status(user_id, chat_id).await
    }

    /// Get or create captcha status
    pub async fn get_or_create(&self, user_id: u64, chat_id: i64) -> StoreResult<CaptchaStatus> {
        if let Some(status) = self.store.captcha_status(user_id, chat_id).await? {
            return Ok(status);
        }

        let status = CaptchaStatus::new(user_id, chat_id);
        self.store.save_captcha_status(&status).await?;

        tracing::debug!(user_id, chat_id, "New captcha status tracked");

        Ok(status)
    }

    /// Whether the user has solved a captcha in this chat. Creates the row if missing.
    pub async fn is_passed(&self, user_id: u64, chat_id: i64) -> StoreResult<bool> {
        Ok(self.get_or_create(user_id, chat_id).await?.passed)
    }

    /// Record a successful solve
    pub async fn mark_passed(&self, user_id: u64, chat_id: i64) -> StoreResult<CaptchaStatus> {
        let mut status = self.get_or_create(user_id, chat_id).await?;

        status.passed = true;
        status.attempts = 0;
        status.challenge_message_id = None;

        self.store.save_captcha_status(&status).await?;

        tracing::info!(user_id, chat_id, "Captcha passed");

        Ok(status)
    }

    /// Count one more issued challenge. Returns the new attempt count.
    pub async fn increment_attempts(&self, user_id: u64, chat_id: i64) -> StoreResult<u32> {
        let mut status = self.get_or_create(user_id, chat_id).await?;

        status.passed = false;
        status.attempts += 1;

        self.store.save_captcha_status(&status).await?;

        Ok(status.attempts)
    }

    /// Record which message currently shows the challenge
    pub async fn set_challenge_message(
        &self,
        user_id: u64,
        chat_id: i64,
        message_id: Option<i32>,
    ) -> StoreResult<()> {
        let mut status = self.get_or_create(user_id, chat_id).await?;
        status.challenge_message_id = message_id;
        self.store.save_captcha_status(&status).await
    }

    pub async fn challenge_message(&self, user_id: u64, chat_id: i64) -> StoreResult<Option<i32>> {
        Ok(self
            .get(user_id, chat_id)
            .await?
            .and_then(|s| s.challenge_message_id))
    }

    /// Admin reset of the attempt counter
    pub async fn reset_attempts(&self, user_id: u64, chat_id: i64) -> StoreResult<()> {
        let mut status = self.get_or_create(user_id, chat_id).await?;
        status.attempts = 0;
        self.store.save_captcha_status(&status).await?;

        tracing::info!(user_id, chat_id, "Captcha attempts reset");
        Ok(())
    }

    /// Drop the row entirely
    pub async fn clear(&self, user_id: u64, chat_id: i64) -> StoreResult<()> {
        self.store.delete_captcha_status(user_id, chat_id).await
    }
}
