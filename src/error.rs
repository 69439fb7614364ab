//! Player agent error types.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::game::{PlayerId, Role};

/// Which step of the generation pipeline failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GenerationStage {
    /// Schema-constrained object generation.
    #[display("structured")]
    Structured,
    /// Free-text generation with manual JSON extraction.
    #[display("fallback")]
    Fallback,
}

/// What went wrong inside a player operation.
#[derive(Debug, Clone, PartialEq, Display)]
pub enum PlayerErrorKind {
    /// No session is registered for the player id.
    #[display("Player {} not found. Please create the player first.", _0)]
    NotFound(PlayerId),
    /// `use_ability` was called without a bound role or a usable credential.
    #[display("No special ability is available to use")]
    AbilityUnavailable,
    /// The bound role never acts at night.
    #[display("Role {} has no night action and should be skipped", _0)]
    NoNightAction(Role),
    /// A role name that does not match any known role.
    #[display("Unknown role: {}", _0)]
    UnknownRole(String),
    /// The generation pipeline failed for the named operation.
    #[display("Failed to generate {} ({}): {}", function_id, stage, message)]
    Generation {
        /// Operation identifier, e.g. `vote-generation`.
        function_id: String,
        /// Pipeline step that failed.
        stage: GenerationStage,
        /// Underlying failure.
        message: String,
    },
}

/// Player error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Player error: {} at {}:{}", kind, file, line)]
pub struct PlayerError {
    /// Error category and details.
    pub kind: PlayerErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl PlayerError {
    /// Creates a new player error with caller location tracking.
    #[track_caller]
    #[instrument(skip(kind))]
    pub fn new(kind: PlayerErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        tracing::error!(error_kind = %kind, "Player error created");
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> &PlayerErrorKind {
        &self.kind
    }
}

impl From<PlayerErrorKind> for PlayerError {
    #[track_caller]
    fn from(kind: PlayerErrorKind) -> Self {
        Self::new(kind)
    }
}
