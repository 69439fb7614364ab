//! Werewolf Player - CLI
//!
//! Runs a single player decision from a config file and a game context.

#![warn(missing_docs)]

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, DecisionArgs};
use serde::Serialize;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;
use werewolf_player::{
    DecisionContext, GenerationOptions, PlayerConfig, PlayerManager, PlayerSession, Role,
    StartGameParams,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Speak(args) => {
            let (player, context, options) = prepare(&args).await?;
            print_json(&player.speak_with(&context, options).await?)
        }
        Command::Vote(args) => {
            let (player, context, options) = prepare(&args).await?;
            print_json(&player.vote_with(&context, options).await?)
        }
        Command::Ability(args) => {
            let (player, context, options) = prepare(&args).await?;
            print_json(&player.use_ability_with(&context, options).await?)
        }
        Command::LastWords => {
            let player = PlayerManager::new(PlayerConfig::default()).create_player(1, None);
            println!("{}", player.last_words().await);
            Ok(())
        }
        Command::ShowConfig { config } => {
            let config = load_config(&config)?;
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}

/// Creates the player, binds it to a game and reads the context file.
#[instrument(skip_all, fields(player_id = args.player_id, role = %args.role))]
async fn prepare(
    args: &DecisionArgs,
) -> Result<(Arc<PlayerSession>, DecisionContext, GenerationOptions)> {
    let role = Role::parse(&args.role)?;
    let config = load_config(&args.config)?;
    let context = load_context(&args.context)?;

    let mut manager = PlayerManager::new(config);
    let player = manager.create_player(args.player_id, args.personality.as_deref());
    player
        .start_game(StartGameParams::new(
            args.game_id.clone(),
            role,
            args.player_id,
            args.teammates.clone(),
        ))
        .await;

    let options = GenerationOptions {
        max_tokens: args.max_tokens,
        temperature: args.temperature,
    };
    Ok((player, context, options))
}

#[instrument]
fn load_config(path: &Path) -> Result<PlayerConfig> {
    info!("Loading player configuration");

    let config = if path.exists() {
        PlayerConfig::from_file(path)?
    } else {
        info!("Config file not found at {}, using defaults", path.display());
        PlayerConfig::default()
    };

    Ok(config.with_env_overrides())
}

#[instrument]
fn load_context(path: &Path) -> Result<DecisionContext> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse context file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
