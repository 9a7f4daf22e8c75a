//! Chat transport seam.
//!
//! The moderation core talks to the chat platform only through
//! [`ChatTransport`]. The Telegram adapter lives in `crate::telegram`.

mod events;

pub use events::{CallbackEvent, DocumentRef, InboundMessage, MembershipUpdate, mention};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use warden_common::{BotPermissions, MemberStatus, WardenError};

pub type TransportResult<T> = Result<T, WardenError>;

/// Where a message should go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Id(i64),
    /// Public chat username, without the leading `@`
    Username(String),
}

impl std::fmt::Display for ChatTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => write!(f, "@{name}"),
        }
    }
}

/// A single inline button carrying callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackButton {
    pub text: String,
    pub data: String,
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<CallbackButton>>,
}

/// Permission presets applied to a member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Cannot send anything
    Muted,
    /// Everything a regular member may do
    Full,
}

/// Broadcast content, referencing already-uploaded media by file id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadKind {
    Text,
    Photo(String),
    Video(String),
    Document(String),
}

/// Formatting carried over from the source message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre { language: Option<String> },
    Link { url: String },
}

/// A styled span of the payload text; offsets count UTF-16 code units
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEntity {
    pub style: EntityStyle,
    pub offset: usize,
    pub length: usize,
}

/// Content re-sent by broadcasts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub kind: PayloadKind,
    /// Message text, or the media caption
    pub text: Option<String>,
    /// Entities of `text`
    pub entities: Vec<TextEntity>,
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            text: Some(text.into()),
            entities: Vec::new(),
        }
    }

    /// Short label for task listings
    pub fn label(&self) -> String {
        match &self.text {
            Some(t) if !t.trim().is_empty() => t.chars().take(20).collect(),
            _ => match self.kind {
                PayloadKind::Text => "Autopost".to_string(),
                PayloadKind::Photo(_) => "Photo".to_string(),
                PayloadKind::Video(_) => "Video".to_string(),
                PayloadKind::Document(_) => "Document".to_string(),
            },
        }
    }
}

/// A message the bot sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Outbound primitives the bot needs from the chat platform
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a plain message, returning its id
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> TransportResult<i32>;

    async fn send_payload(
        &self,
        target: &ChatTarget,
        payload: &Payload,
    ) -> TransportResult<SentMessage>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()>;

    /// Pin without notifying members
    async fn pin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()>;

    async fn unpin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()>;

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
    ) -> TransportResult<()>;

    async fn ban_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> TransportResult<()>;

    /// Lift a ban; a no-op for users that are not banned
    async fn unban_member(&self, chat_id: i64, user_id: u64) -> TransportResult<()>;

    async fn member_status(&self, chat_id: i64, user_id: u64) -> TransportResult<MemberStatus>;

    async fn bot_permissions(&self, chat_id: i64) -> TransportResult<BotPermissions>;

    /// Toast (or alert popup) in reply to a button press
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> TransportResult<()>;

    async fn download_document(&self, file_id: &str) -> TransportResult<Vec<u8>>;
}

/// Check the bot holds delete/restrict/pin/manage rights. Failures count as "no".
pub async fn has_required_permissions(transport: &dyn ChatTransport, chat_id: i64) -> bool {
    match transport.bot_permissions(chat_id).await {
        Ok(perms) => perms.all_granted(),
        Err(e) => {
            tracing::error!(chat_id, error = %e, "Failed to check bot permissions");
            false
        }
    }
}

/// Delete a message, logging instead of failing. Returns whether it worked.
pub async fn delete_quietly(
    transport: &dyn ChatTransport,
    chat_id: i64,
    message_id: i32,
    ctx: &str,
) -> bool {
    match transport.delete_message(chat_id, message_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(chat_id, message_id, ctx, error = %e, "Failed to delete message");
            false
        }
    }
}

/// Send a notice that removes itself after `display_for`
pub async fn send_transient(
    transport: &Arc<dyn ChatTransport>,
    chat_id: i64,
    text: &str,
    display_for: Duration,
) -> TransportResult<()> {
    let message_id = transport.send_text(chat_id, text, None).await?;

    let transport = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(display_for).await;
        delete_quietly(transport.as_ref(), chat_id, message_id, "retract notice").await;
    });

    Ok(())
}
