//! Application state and shared resources.

use std::sync::Arc;
use warden_common::{MetricsSnapshot, WardenError};

use crate::broadcast::{AutopostRegistry, Broadcaster};
use crate::captcha::CaptchaEngine;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::moderation::{ModerationGate, StopWordFilter};
use crate::registry::ChatRegistry;
use crate::store::Store;
use crate::tracking::{CaptchaTracker, CooldownTracker};
use crate::transport::ChatTransport;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Persistent records
    pub store: Arc<dyn Store>,

    /// Outbound chat platform calls
    pub transport: Arc<dyn ChatTransport>,

    /// The bot's own username, for `/command@bot` addressing
    pub bot_username: Option<String>,

    pub registry: ChatRegistry,
    pub cooldown: CooldownTracker,
    pub stop_words: StopWordFilter,

    /// Captcha engine
    pub captcha: Arc<CaptchaEngine>,

    /// Per-message moderation
    pub gate: Arc<ModerationGate>,

    /// Send-and-pin and bulk unpin
    pub broadcaster: Arc<Broadcaster>,

    /// Running autopost tasks
    pub autoposts: Arc<AutopostRegistry>,

    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire every component over one store and one transport
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        let metrics = Arc::new(Metrics::default());

        let registry = ChatRegistry::new(store.clone());
        let cooldown = CooldownTracker::new(store.clone());
        let stop_words = StopWordFilter::new(store.clone());

        let captcha = Arc::new(CaptchaEngine::new(
            transport.clone(),
            registry.clone(),
            CaptchaTracker::new(store.clone()),
            config.captcha.clone(),
            metrics.clone(),
        ));

        let gate = Arc::new(ModerationGate::new(
            transport.clone(),
            registry.clone(),
            captcha.clone(),
            cooldown.clone(),
            stop_words.clone(),
            metrics.clone(),
            config.captcha.notice_display(),
        ));

        let broadcaster = Arc::new(Broadcaster::new(
            transport.clone(),
            store.clone(),
            registry.clone(),
            config.broadcast.pacing(),
        ));
        let autoposts = Arc::new(AutopostRegistry::new(broadcaster.clone()));

        Self {
            config,
            store,
            transport,
            bot_username: None,
            registry,
            cooldown,
            stop_words,
            captcha,
            gate,
            broadcaster,
            autoposts,
            metrics,
        }
    }

    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Counters plus current registry sizes
    pub async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, WardenError> {
        let chats = self.registry.list().await?.len() as u64;
        Ok(self.metrics.snapshot(
            chats,
            self.autoposts.len() as u64,
            self.captcha.pending_timeouts() as u64,
        ))
    }
}
