//! Music Bot - Main Entry Point
//!
//! A Discord bot that streams YouTube audio into voice channels through
//! a Lavalink node.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::Client;
use serenity::model::gateway::GatewayIntents;
use songbird::{SerenityInit, Songbird};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use music_bot::config::BotConfig;
use music_bot::discord::Handler;
use music_bot::lavalink::LavalinkBackend;
use music_bot::player::{PlayerEvent, PlayerEventLoop, PlayerManager};

/// Discord music bot backed by Lavalink.
#[derive(Parser, Debug)]
#[command(name = "music_bot")]
#[command(about = "Play YouTube audio in Discord voice channels")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let config = BotConfig::from_env().context("Failed to load configuration from environment")?;
    info!(
        "Using Lavalink at {} (idle timeout: {}s)",
        config.lavalink.rest_url(),
        config.idle_timeout_secs
    );

    // Player event channel
    let (event_tx, event_rx) = mpsc::channel::<PlayerEvent>(64);

    let voice = Songbird::serenity();
    let backend = Arc::new(
        LavalinkBackend::new(&config.lavalink, Arc::clone(&voice), event_tx.clone())
            .context("Failed to create Lavalink client")?,
    );
    let players = Arc::new(PlayerManager::new(
        Arc::clone(&backend),
        config.idle_timeout(),
    ));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler::new(Arc::clone(&players)))
        .register_songbird_with(voice)
        .await
        .context("Failed to create Discord client")?;

    // Spawn player event loop
    let event_loop = PlayerEventLoop::new(Arc::clone(&players));
    let event_handle = tokio::spawn(async move {
        event_loop.run(event_rx).await;
    });

    info!("Starting music bot...");
    let shard_manager = Arc::clone(&client.shard_manager);

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                error!("Discord client stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    // Cleanup
    info!("Shutting down...");
    shard_manager.shutdown_all().await;
    if event_tx.send(PlayerEvent::Shutdown).await.is_err() {
        debug!("Player event loop already stopped");
    }
    if let Err(e) = event_handle.await {
        warn!("Player event loop failed: {}", e);
    }
    backend.shutdown().await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
