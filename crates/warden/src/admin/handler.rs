//! Executes parsed admin commands against the registry, trackers and engines.

use chrono::Utc;
use warden_common::{ChatFeature, WardenError};

use super::AdminCommand;
use crate::broadcast::AutopostSpec;
use crate::captcha::{IssueOutcome, IssueTrigger};
use crate::state::AppState;
use crate::transport::Payload;

pub const HELP: &str = "\
Warden moderation bot

Chat setup:
/add_chat - register this chat
/delete_chat - unregister this chat
/turn_on_stopwords, /turn_off_stopwords - stop-words and captcha
/turn_on_pinning, /turn_off_pinning
/turn_on_autoposting, /turn_off_autoposting
/set_message_cooldown <seconds> [--all]
/get_message_cooldown
/set_captcha_timeout <seconds>
/debug_chats - list registered chats

Users:
/check_user <user_id>
/force_captcha <user_id>
/reset_captcha <user_id>
/reset_captcha_attempts <user_id>
/unrestrict_user <user_id>

Broadcasts (reply to the message to send):
/pin - send and pin in every chat
/unpin - unpin everything the bot pinned
/autoposting <interval> [chat, chat, ...] - e.g. 30m, 2h
/autoposting_list [n] - list tasks or cancel task n
/autoposting_del - cancel the newest task
/autoposting_off - cancel all tasks

Upload a .txt file with comma-separated words to replace the stop-word list.";

/// Where a command came from
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub chat_id: i64,
    pub user_id: u64,
    pub private: bool,
    /// Content of the message the command replied to
    pub reply_payload: Option<Payload>,
}

/// Run a command and produce the reply text
pub async fn execute(
    state: &AppState,
    ctx: &CommandContext,
    cmd: AdminCommand,
) -> Result<String, WardenError> {
    if cmd.group_only() && ctx.private {
        return Ok("This command only works in a group chat.".to_string());
    }

    let chat_id = ctx.chat_id;
    tracing::info!(chat_id, user_id = ctx.user_id, command = ?cmd, "Admin command");

    match cmd {
        AdminCommand::Help => Ok(HELP.to_string()),

        AdminCommand::AddChat => {
            let permissions = state.transport.bot_permissions(chat_id).await?;
            let missing = permissions.missing();
            if !missing.is_empty() {
                return Err(WardenError::Permission(missing.join(", ")));
            }
            if state.registry.register(chat_id).await? {
                Ok("✅ Chat registered. All features are on.".to_string())
            } else {
                Ok("Chat is already registered.".to_string())
            }
        }

        AdminCommand::DeleteChat => {
            if state.registry.remove(chat_id).await? {
                Ok("Chat removed.".to_string())
            } else {
                Ok("Chat was not registered.".to_string())
            }
        }

        AdminCommand::SetFeature { feature, enabled } => {
            state.registry.set_feature(chat_id, feature, enabled).await?;
            let state_word = if enabled { "enabled" } else { "disabled" };
            Ok(format!("{} {state_word}.", feature.label()))
        }

        AdminCommand::SetCooldown { cooldown, all } => {
            if all {
                let count = state.registry.set_cooldown_all(cooldown).await?;
                Ok(format!(
                    "Message cooldown set to {} seconds in {count} chats.",
                    cooldown.secs()
                ))
            } else {
                state.registry.set_cooldown(chat_id, cooldown).await?;
                Ok(format!("Message cooldown set to {} seconds.", cooldown.secs()))
            }
        }

        AdminCommand::GetCooldown => {
            let cooldown = state.registry.cooldown(chat_id).await?;
            if cooldown.is_enabled() {
                Ok(format!("Message cooldown: {} seconds.", cooldown.secs()))
            } else {
                Ok("Message cooldown is off.".to_string())
            }
        }

        AdminCommand::SetCaptchaTimeout(timeout) => {
            state.registry.set_captcha_timeout(chat_id, timeout).await?;
            Ok(format!("Captcha timeout set to {} seconds.", timeout.secs()))
        }

        AdminCommand::ResetCaptcha(user_id) => {
            state.captcha.reset(chat_id, user_id).await?;
            Ok(format!("Captcha status of user {user_id} reset."))
        }

        AdminCommand::ResetCaptchaAttempts(user_id) => {
            state
                .captcha
                .tracker()
                .reset_attempts(user_id, chat_id)
                .await?;
            Ok(format!("Captcha attempts of user {user_id} reset."))
        }

        AdminCommand::ForceCaptcha(user_id) => force_captcha(state, chat_id, user_id).await,

        AdminCommand::CheckUser(user_id) => check_user(state, chat_id, user_id).await,

        AdminCommand::UnrestrictUser(user_id) => {
            if state.captcha.lift_restrictions(chat_id, user_id).await {
                state.captcha.reset(chat_id, user_id).await?;
                state.captcha.tracker().mark_passed(user_id, chat_id).await?;
                Ok(format!("Restrictions of user {user_id} lifted."))
            } else {
                Ok(format!("Could not lift the restrictions of user {user_id}."))
            }
        }

        AdminCommand::DebugChats => debug_chats(state).await,

        AdminCommand::Pin => {
            let payload = replied_payload(ctx, "/pin")?;
            let report = state.broadcaster.send_and_pin(&payload).await?;
            Ok(format!("📌 Pinned. {report}"))
        }

        AdminCommand::Unpin => {
            let report = state.broadcaster.unpin_all().await?;
            Ok(format!("Unpinned {} messages. {report}", report.delivered))
        }

        AdminCommand::Autopost { interval, targets } => {
            let payload = replied_payload(ctx, "/autoposting <interval>")?;
            let info = state.autoposts.start(AutopostSpec {
                payload,
                interval,
                targets,
            });
            Ok(format!(
                "📣 Autoposting \"{}\" every {} to {}. Task id: {}",
                info.name, interval, info.targets, info.id
            ))
        }

        AdminCommand::AutopostList { cancel: Some(n) } => match state.autoposts.cancel_at(n) {
            Some(info) => Ok(format!("Autopost task {n} \"{}\" cancelled.", info.name)),
            None => Err(WardenError::NotFound(format!("autopost task {n}"))),
        },

        AdminCommand::AutopostList { cancel: None } => {
            let tasks = state.autoposts.list();
            if tasks.is_empty() {
                return Ok("No autopost tasks are running.".to_string());
            }
            let lines: Vec<String> = tasks
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    format!(
                        "{}. \"{}\" every {} min to {} (since {})",
                        i + 1,
                        t.name,
                        t.interval_minutes,
                        t.targets,
                        t.started_at.format("%Y-%m-%d %H:%M UTC")
                    )
                })
                .collect();
            Ok(format!("Autopost tasks:\n{}", lines.join("\n")))
        }

        AdminCommand::AutopostDel => match state.autoposts.cancel_last() {
            Some(info) => Ok(format!("Autopost \"{}\" cancelled.", info.name)),
            None => Ok("No autopost tasks are running.".to_string()),
        },

        AdminCommand::AutopostOff => {
            let count = state.autoposts.cancel_all();
            Ok(format!("Stopped {count} autopost tasks."))
        }
    }
}

fn replied_payload(ctx: &CommandContext, command: &str) -> Result<Payload, WardenError> {
    ctx.reply_payload.clone().ok_or_else(|| {
        WardenError::InvalidInput(format!("Reply to the message to send with {command}"))
    })
}

async fn force_captcha(
    state: &AppState,
    chat_id: i64,
    user_id: u64,
) -> Result<String, WardenError> {
    let tracker = state.captcha.tracker();
    if let Some(stale) = tracker.challenge_message(user_id, chat_id).await? {
        crate::transport::delete_quietly(state.transport.as_ref(), chat_id, stale, "forced captcha")
            .await;
    }
    state.captcha.reset(chat_id, user_id).await?;

    let mention = format!("User {user_id}");
    let reply = match state
        .captcha
        .issue(chat_id, user_id, &mention, IssueTrigger::Admin)
        .await?
    {
        IssueOutcome::Sent { .. } => format!("Captcha sent to user {user_id}."),
        IssueOutcome::FeatureDisabled => {
            "Captcha is off in this chat. Register it and turn on stop-words first.".to_string()
        }
        IssueOutcome::MissingPermissions => {
            return Err(WardenError::Permission("captcha".to_string()));
        }
        IssueOutcome::NotMember => format!("User {user_id} is not in this chat."),
    };
    Ok(reply)
}

async fn check_user(state: &AppState, chat_id: i64, user_id: u64) -> Result<String, WardenError> {
    let member = match state.transport.member_status(chat_id, user_id).await {
        Ok(status) => status.label().to_string(),
        Err(e) => {
            tracing::warn!(chat_id, user_id, error = %e, "Failed to get member status");
            "unknown".to_string()
        }
    };

    let captcha = match state.captcha.tracker().get(user_id, chat_id).await? {
        Some(status) if status.passed => "passed".to_string(),
        Some(status) => format!("pending, {} challenges issued", status.attempts),
        None => "no record".to_string(),
    };

    let cooldown = state.registry.cooldown(chat_id).await?;
    let wait = match state
        .cooldown
        .remaining(user_id, chat_id, cooldown, Utc::now())
        .await?
    {
        Some(secs) => format!("{secs} seconds left"),
        None => "can write".to_string(),
    };
    let last = match state.cooldown.last(user_id, chat_id).await? {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    };

    Ok(format!(
        "User {user_id}\nStatus: {member}\nCaptcha: {captcha}\nLast message: {last}\nCooldown: {wait}"
    ))
}

async fn debug_chats(state: &AppState) -> Result<String, WardenError> {
    let chats = state.registry.list().await?;
    if chats.is_empty() {
        return Ok("No chats are registered.".to_string());
    }

    let flag = |on: bool| if on { "on" } else { "off" };
    let lines: Vec<String> = chats
        .iter()
        .map(|c| {
            format!(
                "{}: stop-words {}, pinning {}, autoposting {}, cooldown {}s, captcha timeout {}s",
                c.chat_id,
                flag(c.feature(ChatFeature::Stopwords)),
                flag(c.feature(ChatFeature::Pinning)),
                flag(c.feature(ChatFeature::Autoposting)),
                c.message_cooldown.secs(),
                c.captcha_timeout.secs()
            )
        })
        .collect();
    Ok(format!("Registered chats ({}):\n{}", chats.len(), lines.join("\n")))
}
