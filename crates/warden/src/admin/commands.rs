//! Admin command parsing.

use warden_common::{CaptchaTimeout, ChatFeature, MessageCooldown, WardenError};

use crate::broadcast::{AutopostInterval, Targets, parse_targets};

/// A parsed bot command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    AddChat,
    DeleteChat,
    SetFeature { feature: ChatFeature, enabled: bool },
    SetCooldown { cooldown: MessageCooldown, all: bool },
    GetCooldown,
    SetCaptchaTimeout(CaptchaTimeout),
    ResetCaptcha(u64),
    ResetCaptchaAttempts(u64),
    ForceCaptcha(u64),
    CheckUser(u64),
    UnrestrictUser(u64),
    DebugChats,
    /// Send-and-pin the replied-to message
    Pin,
    Unpin,
    Autopost { interval: AutopostInterval, targets: Targets },
    /// List tasks, or cancel task number `n`
    AutopostList { cancel: Option<usize> },
    AutopostDel,
    AutopostOff,
}

impl AdminCommand {
    /// Everything except help and reading the cooldown needs an admin id
    pub fn requires_admin(&self) -> bool {
        !matches!(self, Self::Help | Self::GetCooldown)
    }

    /// Commands that act on "this chat"
    pub fn group_only(&self) -> bool {
        match self {
            Self::Help
            | Self::DebugChats
            | Self::Pin
            | Self::Unpin
            | Self::Autopost { .. }
            | Self::AutopostList { .. }
            | Self::AutopostDel
            | Self::AutopostOff => false,
            Self::SetCooldown { all, .. } => !all,
            _ => true,
        }
    }

    /// Parse a message. `None` means it is not a command for this bot.
    ///
    /// A `@botname` suffix is accepted when it names this bot.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Result<Self, WardenError>> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let (head, rest) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        let name = match head.split_once('@') {
            Some((name, addressee)) => {
                let ours = bot_username.is_some_and(|bot| bot.eq_ignore_ascii_case(addressee));
                if !ours {
                    return None;
                }
                name
            }
            None => head,
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let toggle = |feature, enabled| Some(Ok(Self::SetFeature { feature, enabled }));

        match name.to_lowercase().as_str() {
            "start" | "help" => Some(Ok(Self::Help)),
            "add_chat" => Some(Ok(Self::AddChat)),
            "delete_chat" => Some(Ok(Self::DeleteChat)),
            "turn_on_stopwords" => toggle(ChatFeature::Stopwords, true),
            "turn_off_stopwords" => toggle(ChatFeature::Stopwords, false),
            "turn_on_pinning" => toggle(ChatFeature::Pinning, true),
            "turn_off_pinning" => toggle(ChatFeature::Pinning, false),
            "turn_on_autoposting" => toggle(ChatFeature::Autoposting, true),
            "turn_off_autoposting" => toggle(ChatFeature::Autoposting, false),
            "set_message_cooldown" => Some(parse_cooldown(&args)),
            "get_message_cooldown" => Some(Ok(Self::GetCooldown)),
            "set_captcha_timeout" => Some(parse_timeout(&args)),
            "reset_captcha" => Some(user_arg(&args, "reset_captcha").map(Self::ResetCaptcha)),
            "reset_captcha_attempts" => Some(
                user_arg(&args, "reset_captcha_attempts").map(Self::ResetCaptchaAttempts),
            ),
            "force_captcha" => Some(user_arg(&args, "force_captcha").map(Self::ForceCaptcha)),
            "check_user" => Some(user_arg(&args, "check_user").map(Self::CheckUser)),
            "unrestrict_user" => {
                Some(user_arg(&args, "unrestrict_user").map(Self::UnrestrictUser))
            }
            "debug_chats" => Some(Ok(Self::DebugChats)),
            "pin" => Some(Ok(Self::Pin)),
            "unpin" => Some(Ok(Self::Unpin)),
            "autoposting" => Some(parse_autopost(rest)),
            "autoposting_list" => Some(parse_autopost_list(&args)),
            "autoposting_del" => Some(Ok(Self::AutopostDel)),
            "autoposting_off" => Some(Ok(Self::AutopostOff)),
            _ => None,
        }
    }
}

fn usage(hint: &str) -> WardenError {
    WardenError::InvalidInput(format!("Usage: {hint}"))
}

fn user_arg(args: &[&str], command: &str) -> Result<u64, WardenError> {
    args.first()
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| usage(&format!("/{command} <user_id>")))
}

fn parse_cooldown(args: &[&str]) -> Result<AdminCommand, WardenError> {
    const HINT: &str = "/set_message_cooldown <seconds> [--all]";

    let secs: u32 = args
        .first()
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| usage(HINT))?;
    let all = match args.get(1) {
        None => false,
        Some(&"--all") => true,
        Some(_) => return Err(usage(HINT)),
    };

    Ok(AdminCommand::SetCooldown {
        cooldown: MessageCooldown::try_new(secs)?,
        all,
    })
}

fn parse_timeout(args: &[&str]) -> Result<AdminCommand, WardenError> {
    let secs: u32 = args
        .first()
        .and_then(|a| a.parse().ok())
        .ok_or_else(|| usage("/set_captcha_timeout <seconds>"))?;
    Ok(AdminCommand::SetCaptchaTimeout(CaptchaTimeout::try_new(secs)?))
}

fn parse_autopost(rest: &str) -> Result<AdminCommand, WardenError> {
    let (interval, list) = match rest.split_once(char::is_whitespace) {
        Some((interval, list)) => (interval, list.trim()),
        None => (rest, ""),
    };
    if interval.is_empty() {
        return Err(usage(
            "reply to a message with /autoposting <interval> [chat, chat, ...]",
        ));
    }

    let interval: AutopostInterval = interval.parse()?;
    let targets = if list.is_empty() {
        Targets::AllEnabled
    } else {
        let parsed = parse_targets(list);
        if parsed.is_empty() {
            return Err(usage("/autoposting <interval> t.me/chat1, @chat2"));
        }
        Targets::Explicit(parsed)
    };

    Ok(AdminCommand::Autopost { interval, targets })
}

fn parse_autopost_list(args: &[&str]) -> Result<AdminCommand, WardenError> {
    match args.first() {
        None => Ok(AdminCommand::AutopostList { cancel: None }),
        Some(n) => n
            .parse()
            .map(|n| AdminCommand::AutopostList { cancel: Some(n) })
            .map_err(|_| usage("/autoposting_list [task number]")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChatTarget;

    fn parse(text: &str) -> Option<Result<AdminCommand, WardenError>> {
        AdminCommand::parse(text, Some("warden_bot"))
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(parse("hello").is_none());
        assert!(parse("/unknown_thing").is_none());
    }

    #[test]
    fn test_bot_suffix() {
        assert_eq!(parse("/add_chat@Warden_Bot").unwrap().unwrap(), AdminCommand::AddChat);
        assert!(parse("/add_chat@other_bot").is_none());
        assert!(AdminCommand::parse("/add_chat@warden_bot", None).is_none());
    }

    #[test]
    fn test_toggles() {
        assert_eq!(
            parse("/turn_off_pinning").unwrap().unwrap(),
            AdminCommand::SetFeature {
                feature: ChatFeature::Pinning,
                enabled: false
            }
        );
    }

    #[test]
    fn test_cooldown_bounds_and_flag() {
        assert_eq!(
            parse("/set_message_cooldown 30 --all").unwrap().unwrap(),
            AdminCommand::SetCooldown {
                cooldown: MessageCooldown::try_new(30).unwrap(),
                all: true
            }
        );
        assert!(parse("/set_message_cooldown 86401").unwrap().is_err());
        assert!(parse("/set_message_cooldown -1").unwrap().is_err());
        assert!(parse("/set_message_cooldown").unwrap().is_err());
        assert!(parse("/set_message_cooldown 30 --some").unwrap().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(parse("/set_captcha_timeout 59").unwrap().is_err());
        assert!(parse("/set_captcha_timeout 3601").unwrap().is_err());
        assert_eq!(
            parse("/set_captcha_timeout 60").unwrap().unwrap(),
            AdminCommand::SetCaptchaTimeout(CaptchaTimeout::try_new(60).unwrap())
        );
    }

    #[test]
    fn test_user_argument_hint() {
        let err = parse("/reset_captcha abc").unwrap().unwrap_err();
        assert_eq!(err.user_message(), "Usage: /reset_captcha <user_id>");
        assert_eq!(
            parse("/check_user 42").unwrap().unwrap(),
            AdminCommand::CheckUser(42)
        );
    }

    #[test]
    fn test_autopost_arguments() {
        let AdminCommand::Autopost { interval, targets } =
            parse("/autoposting 2h t.me/chat1, @chat2").unwrap().unwrap()
        else {
            panic!("expected autopost");
        };
        assert_eq!(interval.minutes(), 120);
        assert_eq!(
            targets,
            Targets::Explicit(vec![
                ChatTarget::Username("chat1".into()),
                ChatTarget::Username("chat2".into())
            ])
        );

        assert!(matches!(
            parse("/autoposting 1m").unwrap().unwrap(),
            AdminCommand::Autopost {
                targets: Targets::AllEnabled,
                ..
            }
        ));
        assert!(parse("/autoposting").unwrap().is_err());
        assert!(parse("/autoposting 0m").unwrap().is_err());
    }

    #[test]
    fn test_autopost_list() {
        assert_eq!(
            parse("/autoposting_list 2").unwrap().unwrap(),
            AdminCommand::AutopostList { cancel: Some(2) }
        );
        assert_eq!(
            parse("/autoposting_list").unwrap().unwrap(),
            AdminCommand::AutopostList { cancel: None }
        );
        assert!(parse("/autoposting_list two").unwrap().is_err());
    }

    #[test]
    fn test_access_classes() {
        assert!(!AdminCommand::Help.requires_admin());
        assert!(AdminCommand::DebugChats.requires_admin());
        assert!(AdminCommand::AddChat.group_only());
        assert!(!AdminCommand::Unpin.group_only());
    }
}
