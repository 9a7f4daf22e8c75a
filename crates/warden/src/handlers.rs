//! Update routing: admin commands, the moderation gate, captcha presses and
//! membership changes. Every entry point logs and swallows its own errors.

use warden_common::WardenError;

use crate::admin::{self, AdminCommand, CommandContext};
use crate::captcha::CaptchaCallback;
use crate::moderation::GateAction;
use crate::state::AppState;
use crate::transport::{CallbackEvent, DocumentRef, InboundMessage, MembershipUpdate, has_required_permissions};

const STOP_WORD_MIME: &str = "text/plain";

pub async fn on_message(state: &AppState, msg: &InboundMessage) {
    if let Err(e) = route_message(state, msg).await {
        tracing::error!(
            chat_id = msg.chat_id,
            user_id = msg.user_id,
            retryable = e.is_retryable(),
            error = %e,
            "Message handler failed"
        );
    }
}

pub async fn on_callback(state: &AppState, event: &CallbackEvent) {
    if !CaptchaCallback::matches(&event.data) {
        tracing::debug!(user_id = event.user_id, data = %event.data, "Unhandled callback");
        return;
    }

    match state.captcha.answer(event).await {
        Ok(outcome) => {
            tracing::debug!(chat_id = event.chat_id, user_id = event.user_id, ?outcome, "Captcha answered");
        }
        Err(e) => {
            tracing::error!(chat_id = event.chat_id, user_id = event.user_id, error = %e, "Captcha answer failed");
        }
    }
}

/// Forget captcha progress of users who left or were removed
pub async fn on_membership(state: &AppState, update: &MembershipUpdate) {
    if update.is_self || update.status.is_present() {
        return;
    }
    if !has_required_permissions(state.transport.as_ref(), update.chat_id).await {
        return;
    }

    if let Err(e) = state.captcha.forget(update.chat_id, update.user_id).await {
        tracing::error!(
            chat_id = update.chat_id,
            user_id = update.user_id,
            error = %e,
            "Failed to clear captcha status"
        );
    }
}

async fn route_message(state: &AppState, msg: &InboundMessage) -> Result<(), WardenError> {
    let is_admin = state.config.is_admin(msg.user_id);

    if is_admin {
        if let Some(document) = msg.document.as_ref().filter(|d| is_stop_word_list(d)) {
            return upload_stop_words(state, msg, document).await;
        }
    }

    let command = msg
        .text
        .as_deref()
        .and_then(|text| AdminCommand::parse(text, state.bot_username.as_deref()));

    if is_admin {
        if let Some(parsed) = command {
            return run_command(state, msg, parsed).await;
        }
    }

    if msg.private {
        if let Some(Ok(AdminCommand::Help)) = command {
            return run_command(state, msg, Ok(AdminCommand::Help)).await;
        }
        return Ok(());
    }

    let action = state.gate.handle(msg).await?;
    tracing::debug!(chat_id = msg.chat_id, user_id = msg.user_id, ?action, "Gate decision");

    match (action, command) {
        (GateAction::Allow, Some(Ok(cmd))) if !cmd.requires_admin() => {
            run_command(state, msg, Ok(cmd)).await
        }
        _ => Ok(()),
    }
}

async fn run_command(
    state: &AppState,
    msg: &InboundMessage,
    parsed: Result<AdminCommand, WardenError>,
) -> Result<(), WardenError> {
    let ctx = CommandContext {
        chat_id: msg.chat_id,
        user_id: msg.user_id,
        private: msg.private,
        reply_payload: msg.reply_payload.clone(),
    };

    let result = match parsed {
        Ok(cmd) => admin::execute(state, &ctx, cmd).await,
        Err(e) => Err(e),
    };
    let reply = match result {
        Ok(text) => text,
        Err(e) => {
            if matches!(e, WardenError::InvalidInput(_)) {
                tracing::debug!(chat_id = msg.chat_id, error = %e, "Rejected admin input");
            } else {
                tracing::warn!(chat_id = msg.chat_id, error = %e, "Admin command failed");
            }
            e.user_message()
        }
    };

    reply_text(state, msg.chat_id, &reply).await;
    Ok(())
}

fn is_stop_word_list(document: &DocumentRef) -> bool {
    document.mime_type.as_deref() == Some(STOP_WORD_MIME)
}

async fn upload_stop_words(
    state: &AppState,
    msg: &InboundMessage,
    document: &DocumentRef,
) -> Result<(), WardenError> {
    let result = match state.transport.download_document(&document.file_id).await {
        Ok(bytes) => state.stop_words.replace_from_upload(&bytes).await,
        Err(e) => Err(e),
    };
    let reply = match result {
        Ok(count) => {
            tracing::info!(user_id = msg.user_id, count, "🚫 Stop-word list replaced");
            format!("✅ Stop-word list replaced: {count} words.")
        }
        Err(e) => {
            tracing::warn!(user_id = msg.user_id, error = %e, "Stop-word upload failed");
            e.user_message()
        }
    };

    reply_text(state, msg.chat_id, &reply).await;
    Ok(())
}

async fn reply_text(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.transport.send_text(chat_id, text, None).await {
        tracing::warn!(chat_id, error = %e, "Failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ADMIN_ID, MockTransport, test_state};
    use std::sync::Arc;
    use warden_common::MemberStatus;

    const CHAT: i64 = -100;
    const USER: u64 = 42;

    async fn setup() -> (AppState, Arc<MockTransport>) {
        let (state, transport) = test_state();
        state.registry.register(CHAT).await.unwrap();
        (state, transport)
    }

    fn from_admin(text: &str) -> InboundMessage {
        InboundMessage::group_text(CHAT, 1, ADMIN_ID, MemberStatus::Member, text)
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_command_skips_the_gate() {
        let (state, transport) = setup().await;

        on_message(&state, &from_admin("/set_message_cooldown 30")).await;

        assert_eq!(
            transport.texts(CHAT),
            vec!["Message cooldown set to 30 seconds.".to_string()]
        );
        assert!(transport.deleted(CHAT).is_empty());
        assert!(state.captcha.tracker().get(ADMIN_ID, CHAT).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_hint_reply() {
        let (state, transport) = setup().await;
        on_message(&state, &from_admin("/check_user nobody")).await;
        assert_eq!(transport.texts(CHAT), vec!["Usage: /check_user <user_id>".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_admin_commands_are_gated() {
        let (state, transport) = setup().await;

        // Mutating commands from strangers are just messages
        let msg = InboundMessage::group_text(CHAT, 5, USER, MemberStatus::Member, "/delete_chat");
        on_message(&state, &msg).await;

        assert!(state.registry.get(CHAT).await.unwrap().is_some());
        assert!(transport.deleted(CHAT).contains(&5));
        assert_eq!(transport.keyboards(CHAT).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_public_command_for_verified_user() {
        let (state, transport) = setup().await;
        state.captcha.tracker().mark_passed(USER, CHAT).await.unwrap();

        let msg = InboundMessage::group_text(CHAT, 5, USER, MemberStatus::Member, "/get_message_cooldown");
        on_message(&state, &msg).await;

        assert_eq!(transport.texts(CHAT), vec!["Message cooldown is off.".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_chat_help_only() {
        let (state, transport) = setup().await;
        let mut msg = InboundMessage::group_text(7, 1, USER, MemberStatus::Member, "/debug_chats");
        msg.private = true;
        on_message(&state, &msg).await;
        assert!(transport.calls().is_empty());

        msg.text = Some("/help".into());
        on_message(&state, &msg).await;
        assert_eq!(transport.texts(7), vec![admin::HELP.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_word_upload() {
        let (state, transport) = setup().await;
        transport.add_document("file-1", b"Spam, scam ,spam");

        let mut msg = from_admin("");
        msg.text = None;
        msg.document = Some(DocumentRef {
            file_id: "file-1".into(),
            mime_type: Some("text/plain".into()),
        });
        on_message(&state, &msg).await;

        assert_eq!(state.stop_words.count().await.unwrap(), 2);
        assert_eq!(
            transport.texts(CHAT),
            vec!["✅ Stop-word list replaced: 2 words.".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_media_goes_through_the_gate() {
        let (state, transport) = setup().await;
        transport.add_document("file-2", b"spam");

        let mut msg = from_admin("");
        msg.text = None;
        msg.document = Some(DocumentRef {
            file_id: "file-2".into(),
            mime_type: Some("application/pdf".into()),
        });
        state.captcha.tracker().mark_passed(ADMIN_ID, CHAT).await.unwrap();
        on_message(&state, &msg).await;

        assert_eq!(state.stop_words.count().await.unwrap(), 0);
        assert!(transport.calls().is_empty());
        assert!(state.cooldown.last(ADMIN_ID, CHAT).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_departure_clears_captcha_row() {
        let (state, _transport) = setup().await;
        state.captcha.tracker().increment_attempts(USER, CHAT).await.unwrap();

        let mut update = MembershipUpdate {
            chat_id: CHAT,
            user_id: USER,
            status: MemberStatus::Left,
            is_self: true,
        };
        on_membership(&state, &update).await;
        assert!(state.captcha.tracker().get(USER, CHAT).await.unwrap().is_some());

        update.is_self = false;
        on_membership(&state, &update).await;
        assert!(state.captcha.tracker().get(USER, CHAT).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_callbacks_are_ignored() {
        let (state, transport) = setup().await;
        let event = CallbackEvent {
            callback_id: "cb".into(),
            user_id: USER,
            mention: "@user".into(),
            chat_id: CHAT,
            message_id: 9,
            message_text: String::new(),
            data: "menu:open".into(),
        };
        on_callback(&state, &event).await;
        assert!(transport.calls().is_empty());
    }
}
