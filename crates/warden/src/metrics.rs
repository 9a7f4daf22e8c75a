//! Runtime counters exposed on `/metrics`.

use std::sync::atomic::{AtomicU64, Ordering};
use warden_common::MetricsSnapshot;

/// Moderation counters
#[derive(Default)]
pub struct Metrics {
    pub messages_allowed: AtomicU64,
    pub cooldown_deletions: AtomicU64,
    pub stopword_deletions: AtomicU64,
    pub captchas_issued: AtomicU64,
    pub captchas_passed: AtomicU64,
    pub captchas_failed: AtomicU64,
    pub captcha_bans: AtomicU64,
}

impl Metrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get statistics snapshot; gauges come from the caller
    pub fn snapshot(
        &self,
        registered_chats: u64,
        autopost_tasks: u64,
        pending_captchas: u64,
    ) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_allowed: self.messages_allowed.load(Ordering::Relaxed),
            cooldown_deletions: self.cooldown_deletions.load(Ordering::Relaxed),
            stopword_deletions: self.stopword_deletions.load(Ordering::Relaxed),
            captchas_issued: self.captchas_issued.load(Ordering::Relaxed),
            captchas_passed: self.captchas_passed.load(Ordering::Relaxed),
            captchas_failed: self.captchas_failed.load(Ordering::Relaxed),
            captcha_bans: self.captcha_bans.load(Ordering::Relaxed),
            registered_chats,
            autopost_tasks,
            pending_captchas,
        }
    }
}
