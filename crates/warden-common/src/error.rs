//! Common error types for Warden components.

use thiserror::Error;

/// Common errors across Warden components
#[derive(Debug, Error)]
pub enum WardenError {
    /// Persistent store connection/operation error
    #[error("Store error: {0}")]
    Store(String),

    /// Chat transport call failed (message gone, network hiccup, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The bot lacks a chat capability it needs
    #[error("Missing permission: {0}")]
    Permission(String),

    /// CAPTCHA generation/verification error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// Malformed admin input; the payload is the usage hint
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced chat, user, or task does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl WardenError {
    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Transport(_))
    }

    /// Text suitable for replying to the admin/user in chat
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(hint) => hint.clone(),
            Self::Permission(what) => format!("The bot lacks permissions: {what}"),
            Self::NotFound(what) => format!("Not found: {what}"),
            _ => "Something went wrong, see the bot log.".to_string(),
        }
    }
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("encoding: {err}"))
    }
}
