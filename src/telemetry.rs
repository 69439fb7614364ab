//! Game-session telemetry hook, called once per `start_game`.

use derive_more::{Display, Error};
use serde::Serialize;
use tracing::{info, instrument};

use crate::game::{PlayerId, Role};

/// What a player reports when a game session opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Seat number.
    pub player_id: PlayerId,
    /// Dealt role.
    pub role: Role,
    /// Fellow werewolves.
    pub teammates: Vec<PlayerId>,
}

/// Receiver of game-session records.
///
/// Calls are fire-and-forget: a failure is logged by the caller and never
/// reaches the game.
pub trait GameTelemetry: Send + Sync + std::fmt::Debug {
    /// Opens a tracking record for `game_id`.
    fn create_game_session(
        &self,
        game_id: &str,
        metadata: &SessionMetadata,
    ) -> Result<(), TelemetryError>;
}

/// Records game sessions as tracing events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl GameTelemetry for TracingTelemetry {
    #[instrument(skip(self, metadata), fields(player_id = metadata.player_id, role = %metadata.role))]
    fn create_game_session(
        &self,
        game_id: &str,
        metadata: &SessionMetadata,
    ) -> Result<(), TelemetryError> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| TelemetryError::new(format!("Failed to encode metadata: {}", e)))?;
        info!(game_id, metadata = %metadata_json, "Game session opened");
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl GameTelemetry for NoopTelemetry {
    fn create_game_session(
        &self,
        _game_id: &str,
        _metadata: &SessionMetadata,
    ) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Telemetry error.
#[derive(Debug, Clone, Display, Error)]
#[display("Telemetry error: {} at {}:{}", message, file, line)]
pub struct TelemetryError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl TelemetryError {
    /// Creates a new telemetry error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
