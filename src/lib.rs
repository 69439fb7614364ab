//! Werewolf Player library - LLM-driven werewolf players
//!
//! Each player is an independent agent that holds a role, talks to a
//! language model, and answers the game master's requests with
//! schema-shaped JSON.
//!
//! # Architecture
//!
//! - **Manager**: registry of player sessions keyed by player id
//! - **Player**: per-player agent (speak, vote, night actions, last words)
//! - **Generation**: structured output with a free-text JSON fallback
//! - **Providers**: provider name to LLM client mapping (OpenAI, MiniMax, OpenRouter)
//!
//! # Example
//!
//! ```no_run
//! use werewolf_player::{Credential, PlayerConfig, PlayerManager, Role, StartGameParams};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut manager = PlayerManager::new(PlayerConfig::default());
//! manager.set_credential_for_all(Credential::key_only("sk-..."));
//!
//! let player = manager.create_player(1, Some("calm and analytical"));
//! player
//!     .start_game(StartGameParams::new("game-1".to_string(), Role::Seer, 1, vec![]))
//!     .await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod game;
mod generation;
mod llm_client;
mod manager;
mod player;
mod prompts;
mod providers;
mod telemetry;

// Crate-level exports - Configuration
pub use config::{AiConfig, ConfigError, GameConfig, LoggingConfig, PlayerConfig};

// Crate-level exports - Errors
pub use error::{GenerationStage, PlayerError, PlayerErrorKind};

// Crate-level exports - Game types
pub use game::{
    DecisionContext, GamePhase, Investigation, NightActionResponse, PlayerContext, PlayerId,
    PlayerInfo, PotionUsage, Role, SeerAction, SeerContext, SeerNightAction, Speech, SpeechKind,
    SpeechResponse, Vote, VotingResponse, WerewolfAction, WerewolfNightAction, WitchAction,
    WitchContext, WitchNightAction,
};

// Crate-level exports - Generation pipeline
pub use generation::{
    GenerationOptions, ResponseSchema, clean_parsed_object, extract_json_object,
    generate_structured,
};

// Crate-level exports - LLM client
pub use llm_client::{
    CompatibleBackend, GenerationRequest, LlmBackend, LlmError, LlmErrorKind, ObjectSchema,
    OpenAiBackend, parse_object_content,
};

// Crate-level exports - Player sessions
pub use manager::{HealthReport, PlayerManager, PlayerStatusEntry};
pub use player::{
    FALLBACK_SPEECH, FALLBACK_VOTE_REASON, FALLBACK_VOTE_TARGET, LAST_WORDS, PlayerSession,
    PlayerStatus, StartGameParams,
};

// Crate-level exports - Prompts
pub use prompts::{PromptSubject, personality, personality_preamble};

// Crate-level exports - Providers
pub use providers::{
    ClientKind, Credential, ModelFactory, ProviderRegistry, ProviderSpec, ResolvedModel,
};

// Crate-level exports - Telemetry
pub use telemetry::{
    GameTelemetry, NoopTelemetry, SessionMetadata, TelemetryError, TracingTelemetry,
};
