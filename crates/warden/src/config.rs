//! Configuration management for Warden.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use warden_common::constants::{
    BROADCAST_PACING_MS, CAPTCHA_BAN_HOURS, CAPTCHA_REISSUE_DELAY_MS, DEFAULT_LISTEN_ADDR,
    DEFAULT_REDIS_URL, LIFT_RETRY_ATTEMPTS, LIFT_RETRY_BACKOFF_SECS, MAX_CAPTCHA_ATTEMPTS,
    NOTICE_DISPLAY_SECS,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Telegram bot token (usually supplied through `BOT_TOKEN`)
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Users allowed to run admin commands
    #[serde(default)]
    pub admin_ids: Vec<u64>,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address for health and admin endpoints
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Where records are kept
    #[serde(default)]
    pub storage_backend: StorageBackend,

    /// Captcha configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Broadcast configuration
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Redis,
    /// In-process, lost on restart
    Memory,
}

/// Captcha-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Challenges per cycle before the user is left to the timeout ban
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Ban length after an unresolved captcha
    #[serde(default = "default_ban_hours")]
    pub ban_hours: i64,

    /// How long ban and cooldown notices stay visible
    #[serde(default = "default_notice_display")]
    pub notice_display_secs: u64,

    /// Pause before a new challenge after a wrong answer
    #[serde(default = "default_reissue_delay")]
    pub reissue_delay_ms: u64,

    /// Restriction-lifting retries
    #[serde(default = "default_lift_attempts")]
    pub lift_attempts: u32,

    /// Delay between restriction-lifting retries
    #[serde(default = "default_lift_backoff")]
    pub lift_backoff_secs: u64,
}

impl CaptchaConfig {
    pub fn ban_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.ban_hours)
    }

    pub fn notice_display(&self) -> Duration {
        Duration::from_secs(self.notice_display_secs)
    }

    pub fn reissue_delay(&self) -> Duration {
        Duration::from_millis(self.reissue_delay_ms)
    }

    pub fn lift_backoff(&self) -> Duration {
        Duration::from_secs(self.lift_backoff_secs)
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            ban_hours: default_ban_hours(),
            notice_display_secs: default_notice_display(),
            reissue_delay_ms: default_reissue_delay(),
            lift_attempts: default_lift_attempts(),
            lift_backoff_secs: default_lift_backoff(),
        }
    }
}

/// Broadcast configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Pause between consecutive sends (and between send and pin)
    #[serde(default = "default_pacing")]
    pub pacing_ms: u64,
}

impl BroadcastConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing(),
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_max_attempts() -> u32 { MAX_CAPTCHA_ATTEMPTS }
fn default_ban_hours() -> i64 { CAPTCHA_BAN_HOURS }
fn default_notice_display() -> u64 { NOTICE_DISPLAY_SECS }
fn default_reissue_delay() -> u64 { CAPTCHA_REISSUE_DELAY_MS }
fn default_lift_attempts() -> u32 { LIFT_RETRY_ATTEMPTS }
fn default_lift_backoff() -> u64 { LIFT_RETRY_BACKOFF_SECS }
fn default_pacing() -> u64 { BROADCAST_PACING_MS }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!("Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref token) = args.bot_token {
            config.bot_token = Some(token.clone());
        }
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if args.memory_store {
            config.storage_backend = StorageBackend::Memory;
        }

        config.validate()?;
        Ok(config)
    }

    /// The bot cannot start without a token
    pub fn bot_token(&self) -> Result<&str> {
        match self.bot_token.as_deref() {
            Some(token) if !token.trim().is_empty() => Ok(token),
            _ => bail!("Bot token missing: set BOT_TOKEN or bot_token in the config file"),
        }
    }

    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    fn validate(&self) -> Result<()> {
        if self.captcha.max_attempts == 0 {
            bail!("captcha.max_attempts must be at least 1");
        }
        if self.captcha.ban_hours <= 0 {
            bail!("captcha.ban_hours must be positive");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admin_ids: Vec::new(),
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            storage_backend: StorageBackend::default(),
            captcha: CaptchaConfig::default(),
            broadcast: BroadcastConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = AppConfig::default();
        assert_eq!(config.captcha.max_attempts, 3);
        assert_eq!(config.captcha.ban_duration(), chrono::Duration::hours(24));
        assert_eq!(config.captcha.reissue_delay(), Duration::from_millis(500));
        assert_eq!(config.broadcast.pacing(), Duration::from_secs(1));
        assert_eq!(config.storage_backend, StorageBackend::Redis);
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let mut config = AppConfig::default();
        assert!(config.bot_token().is_err());

        config.bot_token = Some("  ".into());
        assert!(config.bot_token().is_err());

        config.bot_token = Some("123:abc".into());
        assert_eq!(config.bot_token().unwrap(), "123:abc");
    }

    #[test]
    fn test_toml_sections_deserialize() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                admin_ids = [1, 2]
                storage_backend = "memory"

                [captcha]
                ban_hours = 12

                [broadcast]
                pacing_ms = 250
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: AppConfig = settings.try_deserialize().unwrap();

        assert!(config.is_admin(2));
        assert!(!config.is_admin(3));
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.captcha.ban_hours, 12);
        assert_eq!(config.captcha.max_attempts, 3);
        assert_eq!(config.broadcast.pacing_ms, 250);
    }
}
