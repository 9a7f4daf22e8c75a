//! # Warden - group moderation bot
//!
//! Gatekeeps unverified speakers behind an arithmetic captcha, filters
//! stop-words, rate-limits chatter, and broadcasts pinned posts and
//! recurring autoposts to every registered chat.
//!
//! ## Architecture
//! ```text
//! Telegram → Dispatcher → Admin commands / Moderation gate / Captcha engine
//!                                  ↓
//!                           Store (Redis or memory)
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod admin;
mod broadcast;
mod captcha;
mod config;
mod handlers;
mod metrics;
mod moderation;
mod registry;
mod routes;
mod state;
mod store;
mod telegram;
#[cfg(test)]
mod testing;
mod tracking;
mod transport;

use broadcast::autopost_worker;
use config::{AppConfig, StorageBackend};
use state::AppState;
use store::{MemoryStore, RedisStore, Store};
use telegram::{BotRunner, TelegramTransport};

/// Warden - group moderation and broadcast bot
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/warden.toml")]
    config: String,

    /// Telegram bot token (overrides config)
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Redis URL (overrides config)
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Listen address (overrides config)
    #[arg(short, long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    /// Keep records in memory instead of Redis
    #[arg(long, default_value = "false")]
    memory_store: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level, args.json_logs)?;

    info!("🛡️ Starting Warden v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::load(&args.config, &args)?;
    info!("📋 Configuration loaded from {}", args.config);

    let token = config.bot_token()?.to_string();

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url)
                .await
                .context("Failed to connect to Redis")?;
            info!("✅ Redis connected: {}", config.redis_url);
            Arc::new(store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let (bot, me) = telegram::connect(&token).await?;
    info!("🤖 Logged in as @{}", me.user.username.as_deref().unwrap_or("unknown"));

    let transport = Arc::new(TelegramTransport::new(bot.clone(), me.user.id));
    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, store, transport)
        .with_bot_username(me.user.username.clone());

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Autopost tasks stop with the process
    let autoposts = state.autoposts.clone();
    let autopost_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        autopost_worker(autoposts, autopost_shutdown).await;
    });

    // Telegram dispatcher
    let runner = BotRunner::new(bot, me, state.clone());
    let bot_stop = runner.shutdown_token();
    let mut bot_shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let _ = bot_shutdown.recv().await;
        match bot_stop.shutdown() {
            Ok(stopped) => stopped.await,
            Err(e) => tracing::warn!(error = %e, "Dispatcher was not running"),
        }
    });
    let bot_handle = tokio::spawn(runner.run());

    // Build router
    let app = routes::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    info!("🚀 Warden listening on {}", listen_addr);

    // Handle graceful shutdown
    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("🛑 Shutdown signal received");
        let _ = shutdown_tx.send(());
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    bot_handle.await.context("Dispatcher task panicked")?;

    info!("👋 Warden shutdown complete");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }

    Ok(())
}
