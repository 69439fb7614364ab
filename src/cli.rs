//! Command-line interface for werewolf_player.

use clap::{Args, Parser, Subcommand};

/// Werewolf Player - LLM-driven werewolf game player
#[derive(Parser, Debug)]
#[command(name = "werewolf_player")]
#[command(about = "Run one werewolf player decision against an LLM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce a day speech
    Speak(DecisionArgs),

    /// Produce a day vote
    Vote(DecisionArgs),

    /// Produce the night action of the player's role
    Ability(DecisionArgs),

    /// Print the player's last words
    LastWords,

    /// Print the effective configuration with the API key redacted
    ShowConfig {
        /// Path to player configuration file
        #[arg(short, long, default_value = "player.toml")]
        config: std::path::PathBuf,
    },
}

/// Arguments shared by every decision command.
#[derive(Args, Debug)]
pub struct DecisionArgs {
    /// Path to player configuration file
    #[arg(short, long, default_value = "player.toml")]
    pub config: std::path::PathBuf,

    /// Path to the JSON game context
    #[arg(long)]
    pub context: std::path::PathBuf,

    /// Role dealt to the player (villager, werewolf, seer, witch)
    #[arg(short, long)]
    pub role: String,

    /// Seat number of the player
    #[arg(short, long, default_value = "1")]
    pub player_id: u32,

    /// Game identifier used for the telemetry session
    #[arg(long, default_value = "cli-game")]
    pub game_id: String,

    /// Fellow werewolves, comma separated
    #[arg(long, value_delimiter = ',')]
    pub teammates: Vec<u32>,

    /// Personality override for this player
    #[arg(long)]
    pub personality: Option<String>,

    /// Override for the configured max tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Override for the configured temperature
    #[arg(long)]
    pub temperature: Option<f32>,
}
