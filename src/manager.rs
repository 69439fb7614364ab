//! Registry of live player sessions.

use std::collections::HashMap;
use std::sync::Arc;

use derive_getters::Getters;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::PlayerConfig;
use crate::error::{PlayerError, PlayerErrorKind};
use crate::game::PlayerId;
use crate::player::{PlayerSession, PlayerStatus};
use crate::providers::{Credential, ModelFactory, ProviderRegistry};
use crate::telemetry::{GameTelemetry, TracingTelemetry};

/// Summary returned by [`PlayerManager::health_check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    total: usize,
    active: usize,
    player_ids: Vec<PlayerId>,
}

/// Status of one registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatusEntry {
    player_id: PlayerId,
    status: PlayerStatus,
}

/// Owns every player session, at most one per player id.
///
/// A credential pushed with [`set_credential_for_all`](Self::set_credential_for_all)
/// is applied to the current sessions and to every session created later.
#[derive(Debug)]
pub struct PlayerManager {
    players: HashMap<PlayerId, Arc<PlayerSession>>,
    configs: HashMap<PlayerId, PlayerConfig>,
    insertion_order: Vec<PlayerId>,
    default_config: PlayerConfig,
    global_credential: Option<Credential>,
    models: Arc<dyn ModelFactory>,
    telemetry: Arc<dyn GameTelemetry>,
}

impl PlayerManager {
    /// Creates a registry using the default provider registry and tracing telemetry.
    #[instrument(skip(default_config))]
    pub fn new(default_config: PlayerConfig) -> Self {
        Self::with_collaborators(
            default_config,
            Arc::new(ProviderRegistry::default()),
            Arc::new(TracingTelemetry),
        )
    }

    /// Creates a registry whose sessions share the given collaborators.
    #[instrument(skip_all)]
    pub fn with_collaborators(
        default_config: PlayerConfig,
        models: Arc<dyn ModelFactory>,
        telemetry: Arc<dyn GameTelemetry>,
    ) -> Self {
        info!("Creating player manager");
        Self {
            players: HashMap::new(),
            configs: HashMap::new(),
            insertion_order: Vec::new(),
            default_config,
            global_credential: None,
            models,
            telemetry,
        }
    }

    /// Returns the session for `player_id`, creating it on first use.
    ///
    /// An existing session is returned unchanged and `personality` is ignored.
    #[instrument(skip(self))]
    pub fn create_player(
        &mut self,
        player_id: PlayerId,
        personality: Option<&str>,
    ) -> Arc<PlayerSession> {
        if let Some(existing) = self.players.get(&player_id) {
            warn!(player_id, "Player already exists, returning existing instance");
            return Arc::clone(existing);
        }

        let config = self.default_config.with_personality(personality);
        let player = Arc::new(PlayerSession::with_collaborators(
            config.clone(),
            Arc::clone(&self.models),
            Arc::clone(&self.telemetry),
        ));

        if let Some(credential) = &self.global_credential {
            player.set_credential(credential.clone());
        }

        info!(
            player_id,
            personality = %config.game().personality(),
            "Created player"
        );
        self.players.insert(player_id, Arc::clone(&player));
        self.configs.insert(player_id, config);
        self.insertion_order.push(player_id);
        player
    }

    /// Removes a session and its config. Returns whether one existed.
    #[instrument(skip(self))]
    pub fn remove_player(&mut self, player_id: PlayerId) -> bool {
        let removed = self.players.remove(&player_id).is_some();
        self.configs.remove(&player_id);
        self.insertion_order.retain(|id| *id != player_id);

        if removed {
            info!(player_id, "Removed player");
        } else {
            warn!(player_id, "Player not found");
        }
        removed
    }

    /// Looks up a session.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerErrorKind::NotFound`] when the player was never created.
    #[instrument(skip(self))]
    pub fn get_player(&self, player_id: PlayerId) -> Result<Arc<PlayerSession>, PlayerError> {
        self.players
            .get(&player_id)
            .cloned()
            .ok_or_else(|| PlayerError::new(PlayerErrorKind::NotFound(player_id)))
    }

    /// Whether a session exists for `player_id`.
    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.contains_key(&player_id)
    }

    /// Registered player ids, ascending.
    #[instrument(skip(self))]
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().copied().collect();
        ids.sort_unstable();
        debug!(count = ids.len(), "Listed players");
        ids
    }

    /// Number of registered players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// The config a player was created with.
    pub fn player_config(&self, player_id: PlayerId) -> Option<&PlayerConfig> {
        self.configs.get(&player_id)
    }

    /// Status of every player, in creation order.
    #[instrument(skip(self))]
    pub fn all_statuses(&self) -> Vec<PlayerStatusEntry> {
        self.insertion_order
            .iter()
            .filter_map(|id| {
                self.players.get(id).map(|player| PlayerStatusEntry {
                    player_id: *id,
                    status: player.status(),
                })
            })
            .collect()
    }

    /// Drops every session. The global credential is kept.
    #[instrument(skip(self))]
    pub fn clear(&mut self) {
        self.players.clear();
        self.configs.clear();
        self.insertion_order.clear();
        info!("Cleared all players");
    }

    /// Counts registered players and those bound to a non-empty game id.
    #[instrument(skip(self))]
    pub fn health_check(&self) -> HealthReport {
        let active = self
            .players
            .values()
            .filter(|player| {
                player
                    .status()
                    .game_id()
                    .as_deref()
                    .is_some_and(|game_id| !game_id.is_empty())
            })
            .count();

        HealthReport {
            total: self.players.len(),
            active,
            player_ids: self.player_ids(),
        }
    }

    /// Stores `credential` for future players and pushes it to every current one.
    #[instrument(skip(self, credential), fields(
        provider = credential.provider().as_deref().unwrap_or("default"),
        model = credential.model().as_deref().unwrap_or("default"),
        base_url = credential.base_url().as_deref().unwrap_or("default"),
    ))]
    pub fn set_credential_for_all(&mut self, credential: Credential) {
        for player in self.players.values() {
            player.set_credential(credential.clone());
        }
        info!(count = self.players.len(), "Set API key for all players");
        self.global_credential = Some(credential);
    }

    /// The credential applied to newly created players.
    pub fn global_credential(&self) -> Option<&Credential> {
        self.global_credential.as_ref()
    }
}
