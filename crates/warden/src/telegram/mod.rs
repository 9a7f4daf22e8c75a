//! Telegram adapter built on teloxide.

mod dispatch;
mod transport;

pub use dispatch::BotRunner;
pub use transport::TelegramTransport;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::types::Me;

/// Create the bot client and fetch its own identity
pub async fn connect(token: &str) -> anyhow::Result<(Bot, Me)> {
    let bot = Bot::new(token);
    let me = bot
        .get_me()
        .await
        .context("Failed to reach the Telegram Bot API")?;
    Ok((bot, me))
}
