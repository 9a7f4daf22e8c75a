//! Normalized inbound events handed to the core by the dispatcher.

use warden_common::MemberStatus;

use super::Payload;

/// An attached file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_id: String,
    pub mime_type: Option<String>,
}

/// A message sent to the bot or posted in a chat it moderates
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub user_id: u64,
    /// How to address the sender in replies
    pub mention: String,
    /// Sender's membership at the time the message was handled
    pub sender: MemberStatus,
    /// Text, or the caption of a media message
    pub text: Option<String>,
    /// Direct chat with the bot rather than a group
    pub private: bool,
    pub document: Option<DocumentRef>,
    /// Content of the message this one replies to
    pub reply_payload: Option<Payload>,
}

#[cfg(test)]
impl InboundMessage {
    /// A plain text message in a group
    pub fn group_text(
        chat_id: i64,
        message_id: i32,
        user_id: u64,
        sender: MemberStatus,
        text: &str,
    ) -> Self {
        Self {
            chat_id,
            message_id,
            user_id,
            mention: format!("user {user_id}"),
            sender,
            text: Some(text.to_string()),
            private: false,
            document: None,
            reply_payload: None,
        }
    }
}

/// An inline button press
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub callback_id: String,
    /// Who pressed the button
    pub user_id: u64,
    pub mention: String,
    /// Chat of the message carrying the keyboard
    pub chat_id: i64,
    pub message_id: i32,
    pub message_text: String,
    pub data: String,
}

/// A change in someone's chat membership
#[derive(Debug, Clone)]
pub struct MembershipUpdate {
    pub chat_id: i64,
    pub user_id: u64,
    pub status: MemberStatus,
    /// The bot's own membership changed
    pub is_self: bool,
}

/// `@username` when available, otherwise the first name
pub fn mention(username: Option<&str>, first_name: &str) -> String {
    match username {
        Some(name) if !name.is_empty() => format!("@{name}"),
        _ if !first_name.trim().is_empty() => first_name.to_string(),
        _ => "user".to_string(),
    }
}
