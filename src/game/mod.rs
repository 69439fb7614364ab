//! Werewolf game domain types shared by prompts, sessions and the pipeline.

mod context;
mod response;
mod role;

pub use context::{
    DecisionContext, Investigation, PlayerContext, PlayerInfo, PotionUsage, SeerContext, Speech,
    SpeechKind, Vote, WitchContext,
};
pub use response::{
    NightActionResponse, SeerAction, SeerNightAction, SpeechResponse, VotingResponse,
    WerewolfAction, WerewolfNightAction, WitchAction, WitchNightAction,
};
pub use role::{GamePhase, Role};

/// Seat number of a player in a game (1-based).
pub type PlayerId = u32;
