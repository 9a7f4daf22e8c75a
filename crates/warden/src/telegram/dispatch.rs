//! Update tree: turns Telegram updates into normalized events.

use teloxide::dispatching::{ShutdownToken, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatMemberUpdated, Me, MessageEntity};
use teloxide::update_listeners::Polling;
use warden_common::MemberStatus;

use super::transport::{member_status, text_entity};
use crate::handlers;
use crate::state::AppState;
use crate::transport::{
    CallbackEvent, DocumentRef, InboundMessage, MembershipUpdate, Payload, PayloadKind, TextEntity,
    mention,
};

fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
        .branch(Update::filter_chat_member().endpoint(on_chat_member))
}

async fn on_message(state: AppState, msg: Message) -> anyhow::Result<()> {
    if let Some(inbound) = inbound_message(&state, &msg).await {
        handlers::on_message(&state, &inbound).await;
    }
    Ok(())
}

async fn on_callback(state: AppState, q: CallbackQuery) -> anyhow::Result<()> {
    let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) else {
        return Ok(());
    };

    let event = CallbackEvent {
        callback_id: q.id.to_string(),
        user_id: q.from.id.0,
        mention: mention(q.from.username.as_deref(), &q.from.first_name),
        chat_id: message.chat.id.0,
        message_id: message.id.0,
        message_text: message.text().unwrap_or_default().to_string(),
        data: q.data.clone().unwrap_or_default(),
    };
    handlers::on_callback(&state, &event).await;
    Ok(())
}

async fn on_chat_member(state: AppState, me: Me, update: ChatMemberUpdated) -> anyhow::Result<()> {
    let user = &update.new_chat_member.user;
    let event = MembershipUpdate {
        chat_id: update.chat.id.0,
        user_id: user.id.0,
        status: member_status(&update.new_chat_member.kind),
        is_self: user.id == me.user.id,
    };
    handlers::on_membership(&state, &event).await;
    Ok(())
}

async fn inbound_message(state: &AppState, msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;
    let chat_id = msg.chat.id.0;
    let private = msg.chat.is_private();

    let sender = if private {
        MemberStatus::Member
    } else {
        match state.transport.member_status(chat_id, user.id.0).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(chat_id, user_id = user.id.0, error = %e, "Failed to get sender status");
                MemberStatus::Member
            }
        }
    };

    Some(InboundMessage {
        chat_id,
        message_id: msg.id.0,
        user_id: user.id.0,
        mention: mention(user.username.as_deref(), &user.first_name),
        sender,
        text: msg.text().or(msg.caption()).map(str::to_string),
        private,
        document: msg.document().map(|d| DocumentRef {
            file_id: d.file.id.to_string(),
            mime_type: d.mime_type.as_ref().map(|m| m.essence_str().to_string()),
        }),
        reply_payload: msg.reply_to_message().and_then(payload_of),
    })
}

/// Broadcast content of a message: photo, then video, then document, then text
fn payload_of(msg: &Message) -> Option<Payload> {
    let kind = if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        PayloadKind::Photo(photo.file.id.to_string())
    } else if let Some(video) = msg.video() {
        PayloadKind::Video(video.file.id.to_string())
    } else if let Some(document) = msg.document() {
        PayloadKind::Document(document.file.id.to_string())
    } else {
        let text = msg.text()?;
        return Some(Payload {
            kind: PayloadKind::Text,
            text: Some(text.to_string()),
            entities: styled(msg.entities()),
        });
    };

    Some(Payload {
        kind,
        text: msg.caption().map(str::to_string),
        entities: styled(msg.caption_entities()),
    })
}

fn styled(entities: Option<&[MessageEntity]>) -> Vec<TextEntity> {
    entities
        .unwrap_or_default()
        .iter()
        .filter_map(text_entity)
        .collect()
}

/// A built dispatcher plus the token that stops it
pub struct BotRunner {
    dispatcher: Dispatcher<Bot, anyhow::Error, teloxide::dispatching::DefaultKey>,
    bot: Bot,
}

impl BotRunner {
    pub fn new(bot: Bot, me: Me, state: AppState) -> Self {
        let dispatcher = Dispatcher::builder(bot.clone(), schema())
            .dependencies(dptree::deps![state, me])
            .default_handler(|upd| async move {
                tracing::trace!(update_id = ?upd.id, "Unhandled update");
            })
            .error_handler(LoggingErrorHandler::with_custom_text("Dispatcher error"))
            .build();
        Self { dispatcher, bot }
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.dispatcher.shutdown_token()
    }

    /// Long-poll until the shutdown token fires
    pub async fn run(mut self) {
        let listener = Polling::builder(self.bot.clone())
            .allowed_updates(vec![
                AllowedUpdate::Message,
                AllowedUpdate::CallbackQuery,
                AllowedUpdate::ChatMember,
            ])
            .build();

        self.dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("Update listener error"),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::EntityStyle;

    fn message(json: serde_json::Value) -> Message {
        serde_json::from_value(json).unwrap()
    }

    fn base() -> serde_json::Value {
        serde_json::json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": { "id": -100, "type": "supergroup", "title": "Group" },
            "from": { "id": 1, "is_bot": false, "first_name": "Admin" }
        })
    }

    #[test]
    fn test_schema_builds() {
        let _ = schema();
    }

    #[test]
    fn test_formatted_text_keeps_entities() {
        let mut json = base();
        json["text"] = "Read the rules @group".into();
        json["entities"] = serde_json::json!([
            { "type": "bold", "offset": 0, "length": 4 },
            { "type": "text_link", "offset": 9, "length": 5, "url": "https://example.com/rules" },
            { "type": "mention", "offset": 15, "length": 6 }
        ]);

        let payload = payload_of(&message(json)).unwrap();
        assert_eq!(payload.kind, PayloadKind::Text);
        assert_eq!(payload.text.as_deref(), Some("Read the rules @group"));
        assert_eq!(
            payload.entities,
            vec![
                TextEntity { style: EntityStyle::Bold, offset: 0, length: 4 },
                TextEntity {
                    style: EntityStyle::Link { url: "https://example.com/rules".into() },
                    offset: 9,
                    length: 5,
                },
            ]
        );
    }

    #[test]
    fn test_photo_caption_keeps_entities() {
        let mut json = base();
        json["photo"] = serde_json::json!([
            { "file_id": "small", "file_unique_id": "s", "width": 90, "height": 90 },
            { "file_id": "large", "file_unique_id": "l", "width": 800, "height": 800 }
        ]);
        json["caption"] = "Weekly digest".into();
        json["caption_entities"] = serde_json::json!([
            { "type": "italic", "offset": 0, "length": 6 }
        ]);

        let payload = payload_of(&message(json)).unwrap();
        assert_eq!(payload.kind, PayloadKind::Photo("large".into()));
        assert_eq!(payload.text.as_deref(), Some("Weekly digest"));
        assert_eq!(
            payload.entities,
            vec![TextEntity { style: EntityStyle::Italic, offset: 0, length: 6 }]
        );
    }
}
