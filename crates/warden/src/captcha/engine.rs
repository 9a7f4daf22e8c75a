//! Captcha challenge lifecycle: issue, answer, timeout ban.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warden_common::{ChatFeature, MemberStatus, WardenError};

use super::{CaptchaCallback, Challenge, expected_answer};
use crate::config::CaptchaConfig;
use crate::metrics::Metrics;
use crate::registry::ChatRegistry;
use crate::tracking::CaptchaTracker;
use crate::transport::{
    CallbackEvent, ChatTransport, Permissions, delete_quietly, has_required_permissions,
    send_transient,
};

/// What prompted a challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueTrigger {
    /// An unverified user wrote in the chat
    Message,
    /// Follow-up after a wrong answer
    Reissue,
    /// `/force_captcha`
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    Sent { message_id: i32, attempt: u32 },
    /// Chat unregistered or stop-words off
    FeatureDisabled,
    MissingPermissions,
    /// User already left or was removed
    NotMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Pressed by someone else, or for another chat
    NotForYou,
    Invalid,
    Passed { lifted: bool },
    Wrong { remaining: u32 },
}

/// Captcha engine
pub struct CaptchaEngine {
    transport: Arc<dyn ChatTransport>,
    registry: ChatRegistry,
    tracker: CaptchaTracker,
    config: CaptchaConfig,
    metrics: Arc<Metrics>,
    /// Armed timeout per (user, chat); stale timers find a different generation
    pending: Mutex<HashMap<(u64, i64), u64>>,
    generation: AtomicU64,
}

impl CaptchaEngine {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        registry: ChatRegistry,
        tracker: CaptchaTracker,
        config: CaptchaConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            transport,
            registry,
            tracker,
            config,
            metrics,
            pending: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn tracker(&self) -> &CaptchaTracker {
        &self.tracker
    }

    /// Number of armed timeouts
    pub fn pending_timeouts(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Send a challenge, mute the user, and arm the timeout if this starts a cycle
    pub async fn issue(
        self: &Arc<Self>,
        chat_id: i64,
        user_id: u64,
        mention: &str,
        trigger: IssueTrigger,
    ) -> Result<IssueOutcome, WardenError> {
        if !self.registry.is_enabled(chat_id, ChatFeature::Stopwords).await? {
            return Ok(IssueOutcome::FeatureDisabled);
        }

        if !has_required_permissions(self.transport.as_ref(), chat_id).await {
            if trigger == IssueTrigger::Message {
                if let Err(e) = self
                    .transport
                    .send_text(chat_id, "⚠️ The bot lacks permissions for the captcha.", None)
                    .await
                {
                    tracing::warn!(chat_id, error = %e, "Failed to report missing permissions");
                }
            }
            return Ok(IssueOutcome::MissingPermissions);
        }

        match self.transport.member_status(chat_id, user_id).await {
            Ok(status) if status.is_present() => {}
            Ok(status) => {
                tracing::info!(chat_id, user_id, status = status.label(), "User gone, captcha not sent");
                return Ok(IssueOutcome::NotMember);
            }
            Err(e) => {
                tracing::warn!(chat_id, user_id, error = %e, "Failed to get member status");
                return Ok(IssueOutcome::NotMember);
            }
        }

        let challenge = Challenge::generate(&mut rand::rng());

        let attempt = self.tracker.increment_attempts(user_id, chat_id).await?;
        let attempts_left = self.config.max_attempts.saturating_sub(attempt);
        let timeout = self.registry.captcha_timeout(chat_id).await?;

        let message_id = self
            .transport
            .send_text(
                chat_id,
                &challenge.render(mention, attempts_left, timeout.secs()),
                Some(challenge.keyboard(chat_id, user_id)),
            )
            .await?;
        self.tracker
            .set_challenge_message(user_id, chat_id, Some(message_id))
            .await?;

        if let Err(e) = self
            .transport
            .restrict_member(chat_id, user_id, Permissions::Muted)
            .await
        {
            tracing::warn!(chat_id, user_id, error = %e, "Failed to restrict user");
        }

        if attempt == 1 {
            self.arm_timeout(chat_id, user_id, mention.to_string(), timeout.as_duration());
        }

        Metrics::incr(&self.metrics.captchas_issued);
        tracing::info!(chat_id, user_id, attempt, ?trigger, "🧮 Captcha issued");

        Ok(IssueOutcome::Sent {
            message_id,
            attempt,
        })
    }

    /// Handle a button press on a challenge
    pub async fn answer(self: &Arc<Self>, event: &CallbackEvent) -> Result<AnswerOutcome, WardenError> {
        let callback = match CaptchaCallback::parse(&event.data) {
            Ok(cb) => cb,
            Err(e) => {
                tracing::warn!(user_id = event.user_id, error = %e, "Bad captcha callback");
                self.reply(event, "Captcha error.", true).await;
                return Ok(AnswerOutcome::Invalid);
            }
        };

        if callback.user_id != event.user_id || callback.chat_id != event.chat_id {
            self.reply(event, "This captcha is not for you!", false).await;
            return Ok(AnswerOutcome::NotForYou);
        }

        let Some(correct) = expected_answer(&event.message_text) else {
            self.reply(event, "Could not read the captcha question.", false)
                .await;
            return Ok(AnswerOutcome::Invalid);
        };

        let (chat_id, user_id) = (event.chat_id, event.user_id);

        if callback.answer == correct {
            self.tracker.mark_passed(user_id, chat_id).await?;
            self.cancel_timeout(user_id, chat_id);
            Metrics::incr(&self.metrics.captchas_passed);

            let lifted = self.lift_restrictions(chat_id, user_id).await;
            delete_quietly(self.transport.as_ref(), chat_id, event.message_id, "solved captcha")
                .await;

            let text = if lifted {
                "✅ Captcha passed! You can now write in the chat."
            } else {
                "Captcha passed, but your restrictions could not be lifted. Please contact an administrator."
            };
            self.reply(event, text, true).await;

            return Ok(AnswerOutcome::Passed { lifted });
        }

        Metrics::incr(&self.metrics.captchas_failed);

        let attempts = self
            .tracker
            .get(user_id, chat_id)
            .await?
            .map(|s| s.attempts)
            .unwrap_or(0);
        let remaining = self.config.max_attempts.saturating_sub(attempts);

        delete_quietly(self.transport.as_ref(), chat_id, event.message_id, "wrong captcha").await;
        self.tracker
            .set_challenge_message(user_id, chat_id, None)
            .await?;

        tracing::info!(chat_id, user_id, remaining, "Wrong captcha answer");

        if remaining > 0 {
            self.reply(event, &format!("❌ Wrong! Attempts left: {remaining}"), false)
                .await;
            tokio::time::sleep(self.config.reissue_delay()).await;
            self.issue(chat_id, user_id, &event.mention, IssueTrigger::Reissue)
                .await?;
        } else {
            let text = format!(
                "Too many attempts. You are banned for {} hours.",
                self.config.ban_hours
            );
            self.reply(event, &text, true).await;
        }

        Ok(AnswerOutcome::Wrong { remaining })
    }

    /// Restore full permissions, retrying with a fixed backoff. Falls back to an unban.
    pub async fn lift_restrictions(&self, chat_id: i64, user_id: u64) -> bool {
        let backoff = self.config.lift_backoff();

        for attempt in 1..=self.config.lift_attempts {
            match self
                .transport
                .restrict_member(chat_id, user_id, Permissions::Full)
                .await
            {
                Ok(()) => {
                    tokio::time::sleep(backoff).await;
                    if self.is_plain_member(chat_id, user_id).await {
                        tracing::info!(chat_id, user_id, attempt, "Restrictions lifted");
                        return true;
                    }
                }
                Err(e) => {
                    tracing::warn!(chat_id, user_id, attempt, error = %e, "Failed to lift restrictions");
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        if let Err(e) = self.transport.unban_member(chat_id, user_id).await {
            tracing::warn!(chat_id, user_id, error = %e, "Unban fallback failed");
            return false;
        }
        tokio::time::sleep(backoff).await;

        let lifted = self.is_plain_member(chat_id, user_id).await;
        if !lifted {
            tracing::error!(chat_id, user_id, "Could not lift restrictions");
        }
        lifted
    }

    /// Forget a user's progress, e.g. after they left the chat
    pub async fn forget(&self, chat_id: i64, user_id: u64) -> Result<(), WardenError> {
        self.tracker.clear(user_id, chat_id).await?;
        tracing::debug!(chat_id, user_id, "Captcha status cleared");
        Ok(())
    }

    /// Admin reset: drop the row and disarm any pending ban
    pub async fn reset(&self, chat_id: i64, user_id: u64) -> Result<(), WardenError> {
        self.cancel_timeout(user_id, chat_id);
        self.forget(chat_id, user_id).await
    }

    async fn is_plain_member(&self, chat_id: i64, user_id: u64) -> bool {
        match self.transport.member_status(chat_id, user_id).await {
            Ok(status) => status == MemberStatus::Member,
            Err(e) => {
                tracing::warn!(chat_id, user_id, error = %e, "Failed to poll member status");
                false
            }
        }
    }

    async fn reply(&self, event: &CallbackEvent, text: &str, alert: bool) {
        if let Err(e) = self
            .transport
            .answer_callback(&event.callback_id, text, alert)
            .await
        {
            tracing::warn!(user_id = event.user_id, error = %e, "Failed to answer callback");
        }
    }

    /// Arm the ban timer unless one is already pending for (user, chat).
    /// The first deadline stands until it fires or is disarmed.
    fn arm_timeout(self: &Arc<Self>, chat_id: i64, user_id: u64, mention: String, after: Duration) {
        let generation = {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            if let Some(armed) = pending.get(&(user_id, chat_id)) {
                tracing::debug!(chat_id, user_id, generation = *armed, "Keeping the armed captcha deadline");
                return;
            }
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            pending.insert((user_id, chat_id), generation);
            generation
        };

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            engine.on_timeout(chat_id, user_id, &mention, generation).await;
        });
    }

    fn cancel_timeout(&self, user_id: u64, chat_id: i64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&(user_id, chat_id));
        }
    }

    /// True if `generation` is still the armed timer; disarms it
    fn take_pending(&self, user_id: u64, chat_id: i64, generation: u64) -> bool {
        let Ok(mut pending) = self.pending.lock() else {
            return false;
        };
        if pending.get(&(user_id, chat_id)) == Some(&generation) {
            pending.remove(&(user_id, chat_id));
            true
        } else {
            false
        }
    }

    async fn on_timeout(&self, chat_id: i64, user_id: u64, mention: &str, generation: u64) {
        if !self.take_pending(user_id, chat_id, generation) {
            tracing::debug!(chat_id, user_id, generation, "Captcha timer superseded");
            return;
        }

        let status = match self.tracker.get(user_id, chat_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(chat_id, user_id, error = %e, "Failed to read captcha status");
                return;
            }
        };
        if status.as_ref().is_some_and(|s| s.passed) {
            return;
        }

        if let Some(message_id) = status.and_then(|s| s.challenge_message_id) {
            delete_quietly(self.transport.as_ref(), chat_id, message_id, "expired captcha").await;
        }

        let until = Utc::now() + self.config.ban_duration();
        match self.transport.ban_member(chat_id, user_id, until).await {
            Ok(()) => {
                Metrics::incr(&self.metrics.captcha_bans);
                tracing::warn!(chat_id, user_id, "🔨 User banned for failing the captcha");

                let notice = format!(
                    "{mention} was banned for {} hours for failing the captcha.",
                    self.config.ban_hours
                );
                if let Err(e) =
                    send_transient(&self.transport, chat_id, &notice, self.config.notice_display())
                        .await
                {
                    tracing::warn!(chat_id, error = %e, "Failed to post ban notice");
                }
            }
            Err(e) => tracing::error!(chat_id, user_id, error = %e, "Failed to ban user"),
        }

        if let Err(e) = self.tracker.clear(user_id, chat_id).await {
            tracing::error!(chat_id, user_id, error = %e, "Failed to clear captcha status");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MockTransport, test_state};
    use crate::transport::InlineKeyboard;
    use warden_common::BotPermissions;

    const CHAT: i64 = -100;
    const USER: u64 = 42;

    fn press(
        challenge: &(i32, String, InlineKeyboard),
        user_id: u64,
        pick_correct: bool,
    ) -> CallbackEvent {
        let (message_id, text, keyboard) = challenge;
        let correct = expected_answer(text).unwrap().to_string();
        let button = keyboard
            .rows
            .iter()
            .flatten()
            .find(|b| (b.text == correct) == pick_correct)
            .unwrap();

        CallbackEvent {
            callback_id: "cb".into(),
            user_id,
            mention: "@user".into(),
            chat_id: CHAT,
            message_id: *message_id,
            message_text: text.clone(),
            data: button.data.clone(),
        }
    }

    async fn setup() -> (Arc<CaptchaEngine>, Arc<MockTransport>) {
        let (state, transport) = test_state();
        state.registry.register(CHAT).await.unwrap();
        (state.captcha.clone(), transport)
    }

    fn last_challenge(transport: &MockTransport) -> (i32, String, InlineKeyboard) {
        transport.keyboards(CHAT).pop().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_restricts_and_records() {
        let (engine, transport) = setup().await;

        let outcome = engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();
        let IssueOutcome::Sent { message_id, attempt } = outcome else {
            panic!("expected a challenge, got {outcome:?}");
        };
        assert_eq!(attempt, 1);

        let (id, text, keyboard) = last_challenge(&transport);
        assert_eq!(id, message_id);
        assert!(text.contains("Attempts left: 2"));
        assert_eq!(keyboard.rows.iter().flatten().count(), 4);
        assert_eq!(transport.member(CHAT, USER), MemberStatus::Restricted);

        let status = engine.tracker().get(USER, CHAT).await.unwrap().unwrap();
        assert_eq!(status.challenge_message_id, Some(message_id));
        assert_eq!(engine.pending_timeouts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_issue_preconditions() {
        let (engine, transport) = setup().await;

        assert_eq!(
            engine.issue(-999, USER, "@user", IssueTrigger::Message).await.unwrap(),
            IssueOutcome::FeatureDisabled
        );

        transport.set_member(CHAT, USER, MemberStatus::Left);
        assert_eq!(
            engine.issue(CHAT, USER, "@user", IssueTrigger::Message).await.unwrap(),
            IssueOutcome::NotMember
        );

        transport.set_permissions(BotPermissions {
            can_pin_messages: false,
            ..BotPermissions::default()
        });
        assert_eq!(
            engine.issue(CHAT, USER, "@user", IssueTrigger::Message).await.unwrap(),
            IssueOutcome::MissingPermissions
        );
        assert_eq!(
            transport.texts(CHAT),
            vec!["⚠️ The bot lacks permissions for the captcha.".to_string()]
        );
        assert!(transport.keyboards(CHAT).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_correct_answer_passes() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();
        let challenge = last_challenge(&transport);

        let outcome = engine.answer(&press(&challenge, USER, true)).await.unwrap();
        assert_eq!(outcome, AnswerOutcome::Passed { lifted: true });

        let status = engine.tracker().get(USER, CHAT).await.unwrap().unwrap();
        assert!(status.passed);
        assert_eq!(status.attempts, 0);
        assert_eq!(transport.member(CHAT, USER), MemberStatus::Member);
        assert!(transport.deleted(CHAT).contains(&challenge.0));
        assert_eq!(engine.pending_timeouts(), 0);

        // The disarmed timer never bans
        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(transport.bans().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_without_lift_is_reported() {
        let (engine, transport) = setup().await;
        transport.set_lift_works(false);
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();

        let outcome = engine
            .answer(&press(&last_challenge(&transport), USER, true))
            .await
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::Passed { lifted: false });

        let restores = transport
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Restrict { permissions: Permissions::Full, .. }))
            .count();
        assert_eq!(restores, 3);
        assert!(transport.calls().contains(&Call::Unban {
            chat_id: CHAT,
            user_id: USER
        }));

        let (text, alert) = transport.answers().pop().unwrap();
        assert!(text.contains("could not be lifted"));
        assert!(alert);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_press_changes_nothing() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();
        let before = engine.tracker().get(USER, CHAT).await.unwrap();

        let outcome = engine
            .answer(&press(&last_challenge(&transport), 7, true))
            .await
            .unwrap();
        assert_eq!(outcome, AnswerOutcome::NotForYou);
        assert_eq!(engine.tracker().get(USER, CHAT).await.unwrap(), before);
        assert_eq!(transport.member(CHAT, USER), MemberStatus::Restricted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_answers_then_timeout_ban() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();

        let first = engine
            .answer(&press(&last_challenge(&transport), USER, false))
            .await
            .unwrap();
        assert_eq!(first, AnswerOutcome::Wrong { remaining: 2 });
        assert_eq!(transport.keyboards(CHAT).len(), 2);

        let second = engine
            .answer(&press(&last_challenge(&transport), USER, false))
            .await
            .unwrap();
        assert_eq!(second, AnswerOutcome::Wrong { remaining: 1 });

        let third = engine
            .answer(&press(&last_challenge(&transport), USER, false))
            .await
            .unwrap();
        assert_eq!(third, AnswerOutcome::Wrong { remaining: 0 });
        assert_eq!(transport.keyboards(CHAT).len(), 3);
        assert!(transport.answers().pop().unwrap().1);
        assert!(transport.bans().is_empty());

        // Reissues did not re-arm: the first timer (300s) governs
        assert_eq!(engine.pending_timeouts(), 1);
        tokio::time::sleep(Duration::from_secs(301)).await;

        assert_eq!(transport.bans(), vec![(CHAT, USER)]);
        assert!(engine.tracker().get(USER, CHAT).await.unwrap().is_none());
        let notice = transport.texts(CHAT).pop().unwrap();
        assert!(notice.contains("banned for 24 hours"));

        let notices_deleted = transport.deleted(CHAT).len();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(transport.deleted(CHAT).len(), notices_deleted + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_cycle_keeps_original_deadline() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(100)).await;
        engine.forget(CHAT, USER).await.unwrap();
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();
        assert_eq!(engine.pending_timeouts(), 1);

        // Fires 300s after the first issue, not after the second
        tokio::time::sleep(Duration::from_secs(201)).await;
        assert_eq!(transport.bans(), vec![(CHAT, USER)]);
        assert_eq!(engine.pending_timeouts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_deletes_unanswered_challenge() {
        let (engine, transport) = setup().await;
        let outcome = engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();
        let IssueOutcome::Sent { message_id, .. } = outcome else {
            panic!("expected a challenge, got {outcome:?}");
        };

        tokio::time::sleep(Duration::from_secs(301)).await;

        let calls = transport.calls();
        let deleted_at = calls
            .iter()
            .position(|c| *c == Call::Delete { chat_id: CHAT, message_id })
            .expect("challenge deleted");
        let banned_at = calls
            .iter()
            .position(|c| matches!(c, Call::Ban { chat_id: CHAT, user_id: USER, .. }))
            .expect("user banned");
        assert!(deleted_at < banned_at);
        assert!(transport.texts(CHAT).pop().unwrap().contains("banned for 24 hours"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_allows_a_fresh_deadline() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Message)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(100)).await;
        engine.reset(CHAT, USER).await.unwrap();
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Admin)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(250)).await;
        assert!(transport.bans().is_empty());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.bans(), vec![(CHAT, USER)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_disarms_timer() {
        let (engine, transport) = setup().await;
        engine
            .issue(CHAT, USER, "@user", IssueTrigger::Admin)
            .await
            .unwrap();
        engine.reset(CHAT, USER).await.unwrap();

        tokio::time::sleep(Duration::from_secs(400)).await;
        assert!(transport.bans().is_empty());
    }
}
