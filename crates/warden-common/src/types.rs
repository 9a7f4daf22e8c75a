//! Core types shared across Warden components.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CAPTCHA_TIMEOUT_SECS, DEFAULT_MESSAGE_COOLDOWN_SECS, MAX_CAPTCHA_TIMEOUT_SECS,
    MAX_MESSAGE_COOLDOWN_SECS, MIN_CAPTCHA_TIMEOUT_SECS,
};
use crate::error::WardenError;

/// Captcha lifetime in seconds, always within [60, 3600].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptchaTimeout(u32);

impl CaptchaTimeout {
    pub const DEFAULT: CaptchaTimeout = CaptchaTimeout(DEFAULT_CAPTCHA_TIMEOUT_SECS);

    /// Validate an admin-supplied timeout
    pub fn try_new(secs: u32) -> Result<Self, WardenError> {
        if (MIN_CAPTCHA_TIMEOUT_SECS..=MAX_CAPTCHA_TIMEOUT_SECS).contains(&secs) {
            Ok(Self(secs))
        } else {
            Err(WardenError::InvalidInput(format!(
                "Captcha timeout must be {MIN_CAPTCHA_TIMEOUT_SECS}-{MAX_CAPTCHA_TIMEOUT_SECS} seconds"
            )))
        }
    }

    pub fn secs(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.0))
    }
}

impl Default for CaptchaTimeout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Minimum spacing between a user's accepted messages, within [0, 86400].
/// Zero disables the cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCooldown(u32);

impl MessageCooldown {
    pub const DISABLED: MessageCooldown = MessageCooldown(DEFAULT_MESSAGE_COOLDOWN_SECS);

    /// Validate an admin-supplied cooldown
    pub fn try_new(secs: u32) -> Result<Self, WardenError> {
        if secs <= MAX_MESSAGE_COOLDOWN_SECS {
            Ok(Self(secs))
        } else {
            Err(WardenError::InvalidInput(format!(
                "Cooldown must be 0-{MAX_MESSAGE_COOLDOWN_SECS} seconds"
            )))
        }
    }

    pub fn secs(&self) -> u32 {
        self.0
    }

    pub fn is_enabled(&self) -> bool {
        self.0 > 0
    }
}

impl Default for MessageCooldown {
    fn default() -> Self {
        Self::DISABLED
    }
}

/// Per-chat feature flags and tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub chat_id: i64,
    pub autoposting_enabled: bool,
    pub pinning_enabled: bool,
    /// Gates both the stop-word filter and the captcha
    pub stopwords_enabled: bool,
    #[serde(default)]
    pub captcha_timeout: CaptchaTimeout,
    #[serde(default)]
    pub message_cooldown: MessageCooldown,
}

impl ChatSettings {
    /// A freshly registered chat has every feature switched on
    pub fn new(chat_id: i64) -> Self {
        Self {
            chat_id,
            autoposting_enabled: true,
            pinning_enabled: true,
            stopwords_enabled: true,
            captcha_timeout: CaptchaTimeout::DEFAULT,
            message_cooldown: MessageCooldown::DISABLED,
        }
    }

    pub fn feature(&self, feature: ChatFeature) -> bool {
        match feature {
            ChatFeature::Stopwords => self.stopwords_enabled,
            ChatFeature::Pinning => self.pinning_enabled,
            ChatFeature::Autoposting => self.autoposting_enabled,
        }
    }

    pub fn set_feature(&mut self, feature: ChatFeature, enabled: bool) {
        match feature {
            ChatFeature::Stopwords => self.stopwords_enabled = enabled,
            ChatFeature::Pinning => self.pinning_enabled = enabled,
            ChatFeature::Autoposting => self.autoposting_enabled = enabled,
        }
    }
}

/// Toggleable per-chat features
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatFeature {
    /// Stop-word filter together with the captcha gate
    Stopwords,
    Pinning,
    Autoposting,
}

impl ChatFeature {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopwords => "Stop-words and captcha",
            Self::Pinning => "Pinning",
            Self::Autoposting => "Autoposting",
        }
    }
}

/// Captcha progress of one user in one chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaStatus {
    pub user_id: u64,
    pub chat_id: i64,
    pub passed: bool,
    /// Challenges issued in the current cycle
    pub attempts: u32,
    /// Message currently showing the challenge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_message_id: Option<i32>,
}

impl CaptchaStatus {
    pub fn new(user_id: u64, chat_id: i64) -> Self {
        Self {
            user_id,
            chat_id,
            passed: false,
            attempts: 0,
            challenge_message_id: None,
        }
    }
}

/// A broadcast message the bot pinned and may later unpin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Membership status of a user in a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Owner,
    Administrator,
    Member,
    /// Present but muted or otherwise limited
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// Owners and administrators bypass every moderation check
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }

    /// False once the user has left or been removed
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Left | Self::Banned)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Owner => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Banned => "banned",
        }
    }
}

/// Admin rights the bot holds in a chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPermissions {
    pub can_delete_messages: bool,
    pub can_restrict_members: bool,
    pub can_pin_messages: bool,
    pub can_manage_chat: bool,
}

impl BotPermissions {
    /// Captcha and broadcasts need all four rights
    pub fn all_granted(&self) -> bool {
        self.can_delete_messages
            && self.can_restrict_members
            && self.can_pin_messages
            && self.can_manage_chat
    }

    /// Human-readable names of the rights that are missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.can_delete_messages {
            missing.push("delete messages");
        }
        if !self.can_restrict_members {
            missing.push("ban users");
        }
        if !self.can_pin_messages {
            missing.push("pin messages");
        }
        if !self.can_manage_chat {
            missing.push("manage chat");
        }
        missing
    }
}

/// Metrics snapshot for monitoring
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Messages let through by the gate
    pub messages_allowed: u64,

    /// Messages deleted for cooldown
    pub cooldown_deletions: u64,

    /// Messages deleted for a stop-word
    pub stopword_deletions: u64,

    /// Captcha challenges sent
    pub captchas_issued: u64,

    /// Captchas answered correctly
    pub captchas_passed: u64,

    /// Wrong captcha answers
    pub captchas_failed: u64,

    /// Users banned by the captcha timeout
    pub captcha_bans: u64,

    /// Registered chats
    pub registered_chats: u64,

    /// Running autoposting tasks
    pub autopost_tasks: u64,

    /// Captcha timeouts currently armed
    pub pending_captchas: u64,
}
