//! [`ChatTransport`] over the Telegram Bot API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    ChatMemberKind, ChatPermissions, InlineKeyboardButton, InlineKeyboardMarkup, InputFile,
    MessageEntity, MessageEntityKind, MessageId, Recipient,
};
use warden_common::{BotPermissions, MemberStatus, WardenError};

use crate::transport::{
    ChatTarget, ChatTransport, EntityStyle, InlineKeyboard, Payload, PayloadKind, Permissions,
    SentMessage, TextEntity, TransportResult,
};

fn transport_err(e: impl std::fmt::Display) -> WardenError {
    WardenError::Transport(e.to_string())
}

fn recipient(target: &ChatTarget) -> Recipient {
    match target {
        ChatTarget::Id(id) => Recipient::Id(ChatId(*id)),
        ChatTarget::Username(name) => Recipient::ChannelUsername(format!("@{name}")),
    }
}

fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(keyboard.rows.into_iter().map(|row| {
        row.into_iter()
            .map(|b| InlineKeyboardButton::callback(b.text, b.data))
            .collect::<Vec<_>>()
    }))
}

/// Keep styling entities; Telegram re-detects mentions, links and hashtags on send
pub(crate) fn text_entity(entity: &MessageEntity) -> Option<TextEntity> {
    let style = match &entity.kind {
        MessageEntityKind::Bold => EntityStyle::Bold,
        MessageEntityKind::Italic => EntityStyle::Italic,
        MessageEntityKind::Underline => EntityStyle::Underline,
        MessageEntityKind::Strikethrough => EntityStyle::Strikethrough,
        MessageEntityKind::Spoiler => EntityStyle::Spoiler,
        MessageEntityKind::Code => EntityStyle::Code,
        MessageEntityKind::Pre { language } => EntityStyle::Pre {
            language: language.clone(),
        },
        MessageEntityKind::TextLink { url } => EntityStyle::Link {
            url: url.to_string(),
        },
        _ => return None,
    };
    Some(TextEntity {
        style,
        offset: entity.offset,
        length: entity.length,
    })
}

fn message_entity(entity: &TextEntity) -> Option<MessageEntity> {
    let kind = match &entity.style {
        EntityStyle::Bold => MessageEntityKind::Bold,
        EntityStyle::Italic => MessageEntityKind::Italic,
        EntityStyle::Underline => MessageEntityKind::Underline,
        EntityStyle::Strikethrough => MessageEntityKind::Strikethrough,
        EntityStyle::Spoiler => MessageEntityKind::Spoiler,
        EntityStyle::Code => MessageEntityKind::Code,
        EntityStyle::Pre { language } => MessageEntityKind::Pre {
            language: language.clone(),
        },
        EntityStyle::Link { url } => match url.parse() {
            Ok(url) => MessageEntityKind::TextLink { url },
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Dropping link with a bad URL");
                return None;
            }
        },
    };
    Some(MessageEntity {
        kind,
        offset: entity.offset,
        length: entity.length,
    })
}

pub(crate) fn member_status(kind: &ChatMemberKind) -> MemberStatus {
    match kind {
        ChatMemberKind::Owner(_) => MemberStatus::Owner,
        ChatMemberKind::Administrator(_) => MemberStatus::Administrator,
        ChatMemberKind::Member => MemberStatus::Member,
        ChatMemberKind::Restricted(r) if r.is_member => MemberStatus::Restricted,
        ChatMemberKind::Restricted(_) | ChatMemberKind::Left => MemberStatus::Left,
        ChatMemberKind::Banned(_) => MemberStatus::Banned,
    }
}

/// Telegram adapter
pub struct TelegramTransport {
    bot: Bot,
    /// The bot's own user id, for permission lookups
    me: UserId,
}

impl TelegramTransport {
    pub fn new(bot: Bot, me: UserId) -> Self {
        Self { bot, me }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> TransportResult<i32> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(markup(keyboard));
        }
        let sent = request.await.map_err(transport_err)?;
        Ok(sent.id.0)
    }

    async fn send_payload(
        &self,
        target: &ChatTarget,
        payload: &Payload,
    ) -> TransportResult<SentMessage> {
        let to = recipient(target);
        let caption = payload.text.clone().unwrap_or_default();
        let entities: Vec<MessageEntity> =
            payload.entities.iter().filter_map(message_entity).collect();

        let sent = match &payload.kind {
            PayloadKind::Text => self.bot.send_message(to, caption).entities(entities).await,
            PayloadKind::Photo(file_id) => {
                self.bot
                    .send_photo(to, InputFile::file_id(file_id.clone()))
                    .caption(caption)
                    .caption_entities(entities)
                    .await
            }
            PayloadKind::Video(file_id) => {
                self.bot
                    .send_video(to, InputFile::file_id(file_id.clone()))
                    .caption(caption)
                    .caption_entities(entities)
                    .await
            }
            PayloadKind::Document(file_id) => {
                self.bot
                    .send_document(to, InputFile::file_id(file_id.clone()))
                    .caption(caption)
                    .caption_entities(entities)
                    .await
            }
        }
        .map_err(transport_err)?;

        Ok(SentMessage {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0,
        })
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn pin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.bot
            .pin_chat_message(ChatId(chat_id), MessageId(message_id))
            .disable_notification(true)
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn unpin_message(&self, chat_id: i64, message_id: i32) -> TransportResult<()> {
        self.bot
            .unpin_chat_message(ChatId(chat_id))
            .message_id(MessageId(message_id))
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn restrict_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
    ) -> TransportResult<()> {
        let permissions = match permissions {
            Permissions::Muted => ChatPermissions::empty(),
            Permissions::Full => ChatPermissions::all(),
        };
        self.bot
            .restrict_chat_member(ChatId(chat_id), UserId(user_id), permissions)
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn ban_member(
        &self,
        chat_id: i64,
        user_id: u64,
        until: DateTime<Utc>,
    ) -> TransportResult<()> {
        self.bot
            .ban_chat_member(ChatId(chat_id), UserId(user_id))
            .until_date(until)
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn unban_member(&self, chat_id: i64, user_id: u64) -> TransportResult<()> {
        self.bot
            .unban_chat_member(ChatId(chat_id), UserId(user_id))
            .only_if_banned(true)
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn member_status(&self, chat_id: i64, user_id: u64) -> TransportResult<MemberStatus> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .map_err(transport_err)?;
        Ok(member_status(&member.kind))
    }

    async fn bot_permissions(&self, chat_id: i64) -> TransportResult<BotPermissions> {
        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), self.me)
            .await
            .map_err(transport_err)?;

        let permissions = match &member.kind {
            ChatMemberKind::Owner(_) => BotPermissions {
                can_delete_messages: true,
                can_restrict_members: true,
                can_pin_messages: true,
                can_manage_chat: true,
            },
            ChatMemberKind::Administrator(admin) => BotPermissions {
                can_delete_messages: admin.can_delete_messages,
                can_restrict_members: admin.can_restrict_members,
                can_pin_messages: admin.can_pin_messages,
                can_manage_chat: admin.can_manage_chat,
            },
            _ => BotPermissions::default(),
        };
        Ok(permissions)
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        alert: bool,
    ) -> TransportResult<()> {
        self.bot
            .answer_callback_query(callback_id.to_string())
            .text(text)
            .show_alert(alert)
            .await
            .map_err(transport_err)?;
        Ok(())
    }

    async fn download_document(&self, file_id: &str) -> TransportResult<Vec<u8>> {
        let file = self
            .bot
            .get_file(file_id.to_string())
            .await
            .map_err(transport_err)?;

        let mut buf = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(transport_err)?;
        Ok(buf)
    }
}
