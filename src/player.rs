//! Per-player agent: role binding, credentials and AI-driven decisions.

use std::sync::{Arc, PoisonError, RwLock};

use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::PlayerConfig;
use crate::error::{GenerationStage, PlayerError, PlayerErrorKind};
use crate::game::{
    DecisionContext, NightActionResponse, PlayerId, Role, SeerNightAction, SpeechResponse,
    VotingResponse, WerewolfNightAction, WitchNightAction,
};
use crate::generation::{GenerationOptions, ResponseSchema, generate_structured};
use crate::llm_client::GenerationRequest;
use crate::prompts::{self, PromptSubject};
use crate::providers::{Credential, ModelFactory, ProviderRegistry, ResolvedModel};
use crate::telemetry::{GameTelemetry, SessionMetadata, TracingTelemetry};

/// Speech returned when the player cannot ask the model.
pub const FALLBACK_SPEECH: &str = "I need to think carefully about the current situation.";

/// Vote target returned when the player cannot ask the model.
pub const FALLBACK_VOTE_TARGET: PlayerId = 1;

/// Vote reason returned when the player cannot ask the model.
pub const FALLBACK_VOTE_REASON: &str = "Default vote for player 1";

/// Last words of every player.
pub const LAST_WORDS: &str = "Sad to leave the game so soon. I hope the good camp wins!";

const SPEECH_GENERATION: &str = "speech-generation";
const VOTE_GENERATION: &str = "vote-generation";
const ABILITY_GENERATION: &str = "ability-generation";

/// Parameters of `start_game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct StartGameParams {
    /// Game the player joins.
    pub game_id: String,
    /// Dealt role.
    pub role: Role,
    /// Seat number.
    pub player_id: PlayerId,
    /// Fellow werewolves.
    #[serde(default)]
    pub teammates: Vec<PlayerId>,
}

/// Snapshot reported by [`PlayerSession::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatus {
    game_id: Option<String>,
    player_id: Option<PlayerId>,
    role: Option<Role>,
    teammates: Option<Vec<PlayerId>>,
    is_alive: bool,
    personality: String,
}

#[derive(Debug, Clone)]
struct GameBinding {
    game_id: String,
    player_id: PlayerId,
    role: Role,
    teammates: Vec<PlayerId>,
}

/// One player's agent.
///
/// Unbound until [`start_game`](Self::start_game) deals a role. Bound state
/// and the runtime credential sit behind short-lived locks that are never
/// held across a generation call, so a session can be shared as
/// `Arc<PlayerSession>`. Calls on one session are expected to be serialized
/// by the caller.
#[derive(Debug)]
pub struct PlayerSession {
    config: PlayerConfig,
    binding: RwLock<Option<GameBinding>>,
    runtime_credential: RwLock<Option<Credential>>,
    models: Arc<dyn ModelFactory>,
    telemetry: Arc<dyn GameTelemetry>,
}

impl PlayerSession {
    /// Creates a session using the default provider registry and tracing telemetry.
    #[instrument(skip(config))]
    pub fn new(config: PlayerConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(ProviderRegistry::default()),
            Arc::new(TracingTelemetry),
        )
    }

    /// Creates a session with explicit model and telemetry collaborators.
    #[instrument(skip_all, fields(provider = %config.ai().provider(), model = %config.ai().model()))]
    pub fn with_collaborators(
        config: PlayerConfig,
        models: Arc<dyn ModelFactory>,
        telemetry: Arc<dyn GameTelemetry>,
    ) -> Self {
        debug!("Creating player session");
        Self {
            config,
            binding: RwLock::new(None),
            runtime_credential: RwLock::new(None),
            models,
            telemetry,
        }
    }

    /// Replaces the runtime credential.
    #[instrument(skip(self, credential), fields(
        provider = credential.provider().as_deref().unwrap_or("default"),
        model = credential.model().as_deref().unwrap_or("default"),
        base_url = credential.base_url().as_deref().unwrap_or("default"),
    ))]
    pub fn set_credential(&self, credential: Credential) {
        info!("Runtime API key set");
        *self
            .runtime_credential
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    /// Binds the session to a game. Calling it again rebinds everything.
    #[instrument(skip(self, params), fields(game_id = %params.game_id, role = %params.role, player_id = params.player_id))]
    pub async fn start_game(&self, params: StartGameParams) {
        let metadata = SessionMetadata {
            player_id: params.player_id,
            role: params.role,
            teammates: params.teammates.clone(),
        };
        if let Err(e) = self
            .telemetry
            .create_game_session(&params.game_id, &metadata)
        {
            warn!(error = %e, "Failed to open telemetry session");
        }

        if *self.config.logging().enabled() {
            info!("Player started game {} as {}", params.game_id, params.role);
            info!("Player ID: {}", params.player_id);
            if !params.teammates.is_empty() {
                let teammates: Vec<String> =
                    params.teammates.iter().map(|t| t.to_string()).collect();
                info!("Teammates: {}", teammates.join(", "));
            }
            info!("Game ID (session): {}", params.game_id);
        }

        *self.binding.write().unwrap_or_else(PoisonError::into_inner) = Some(GameBinding {
            game_id: params.game_id,
            player_id: params.player_id,
            role: params.role,
            teammates: params.teammates,
        });
    }

    /// Produces a day speech, or [`FALLBACK_SPEECH`] when the role or key is missing.
    pub async fn speak(&self, context: &DecisionContext) -> Result<SpeechResponse, PlayerError> {
        self.speak_with(context, GenerationOptions::default()).await
    }

    /// [`speak`](Self::speak) with sampling overrides.
    #[instrument(skip(self, context, options), fields(player_id = ?self.player_id()))]
    pub async fn speak_with(
        &self,
        context: &DecisionContext,
        options: GenerationOptions,
    ) -> Result<SpeechResponse, PlayerError> {
        let Some(binding) = self.ready("speak") else {
            return Ok(SpeechResponse {
                speech: FALLBACK_SPEECH.to_string(),
            });
        };

        let prompt = prompts::speech_prompt(&self.subject(&binding), context);
        self.generate(SPEECH_GENERATION, prompt, options).await
    }

    /// Produces a day vote, or a vote for player 1 when the role or key is missing.
    pub async fn vote(&self, context: &DecisionContext) -> Result<VotingResponse, PlayerError> {
        self.vote_with(context, GenerationOptions::default()).await
    }

    /// [`vote`](Self::vote) with sampling overrides.
    #[instrument(skip(self, context, options), fields(player_id = ?self.player_id()))]
    pub async fn vote_with(
        &self,
        context: &DecisionContext,
        options: GenerationOptions,
    ) -> Result<VotingResponse, PlayerError> {
        let Some(binding) = self.ready("vote") else {
            return Ok(VotingResponse {
                target: FALLBACK_VOTE_TARGET,
                reason: FALLBACK_VOTE_REASON.to_string(),
            });
        };

        let check_results = match (binding.role, context.seer()) {
            (Role::Seer, Some(seer)) => Some(seer.check_results()),
            _ => None,
        };
        let prompt =
            prompts::voting_prompt(&self.subject(&binding), context, check_results.as_ref());
        self.generate(VOTE_GENERATION, prompt, options).await
    }

    /// Produces the night action of the bound role.
    ///
    /// Unlike speaking and voting there is no fallback: a missing role or
    /// key, or a role without a night action, is an error.
    pub async fn use_ability(
        &self,
        context: &DecisionContext,
    ) -> Result<NightActionResponse, PlayerError> {
        self.use_ability_with(context, GenerationOptions::default()).await
    }

    /// [`use_ability`](Self::use_ability) with sampling overrides.
    #[instrument(skip(self, context, options), fields(player_id = ?self.player_id()))]
    pub async fn use_ability_with(
        &self,
        context: &DecisionContext,
        options: GenerationOptions,
    ) -> Result<NightActionResponse, PlayerError> {
        let binding = self
            .ready("use_ability")
            .ok_or_else(|| PlayerError::new(PlayerErrorKind::AbilityUnavailable))?;

        let prompt = || prompts::night_action_prompt(&self.subject(&binding), context);
        match binding.role {
            Role::Werewolf => self
                .generate::<WerewolfNightAction>(ABILITY_GENERATION, prompt(), options)
                .await
                .map(NightActionResponse::Werewolf),
            Role::Seer => self
                .generate::<SeerNightAction>(ABILITY_GENERATION, prompt(), options)
                .await
                .map(NightActionResponse::Seer),
            Role::Witch => self
                .generate::<WitchNightAction>(ABILITY_GENERATION, prompt(), options)
                .await
                .map(NightActionResponse::Witch),
            Role::Villager => Err(PlayerError::new(PlayerErrorKind::NoNightAction(binding.role))),
        }
    }

    /// Final words when the player leaves the game.
    #[instrument(skip(self))]
    pub async fn last_words(&self) -> String {
        LAST_WORDS.to_string()
    }

    /// Current binding and personality.
    #[instrument(skip(self))]
    pub fn status(&self) -> PlayerStatus {
        let binding = self.binding();
        PlayerStatus {
            game_id: binding.as_ref().map(|b| b.game_id.clone()),
            player_id: binding.as_ref().map(|b| b.player_id),
            role: binding.as_ref().map(|b| b.role),
            teammates: binding.as_ref().map(|b| b.teammates.clone()),
            is_alive: true,
            personality: self.config.game().personality().clone(),
        }
    }

    /// Dealt role, once bound.
    pub fn role(&self) -> Option<Role> {
        self.binding().map(|b| b.role)
    }

    /// Seat number, once bound.
    pub fn player_id(&self) -> Option<PlayerId> {
        self.binding().map(|b| b.player_id)
    }

    /// Fellow werewolves, once bound.
    pub fn teammates(&self) -> Option<Vec<PlayerId>> {
        self.binding().map(|b| b.teammates)
    }

    /// Game id, once bound.
    pub fn game_id(&self) -> Option<String> {
        self.binding().map(|b| b.game_id)
    }

    /// Personality preamble derived from the configured strategy.
    pub fn personality_prompt(&self) -> String {
        prompts::personality_preamble(self.config.game())
    }

    /// Static configuration this session was created with.
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Runtime credential, if one was pushed.
    pub fn runtime_credential(&self) -> Option<Credential> {
        self.runtime_credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a key is available from the runtime credential or the config.
    pub fn has_api_key(&self) -> bool {
        self.resolved_model().api_key().is_some()
    }

    fn binding(&self) -> Option<GameBinding> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn resolved_model(&self) -> ResolvedModel {
        ResolvedModel::resolve(self.runtime_credential().as_ref(), self.config.ai())
    }

    /// The binding, when both a role and a key are available.
    fn ready(&self, operation: &str) -> Option<GameBinding> {
        let has_key = self.has_api_key();
        debug!(operation, role = ?self.role(), has_key, "Checking player readiness");

        let Some(binding) = self.binding() else {
            warn!(operation, "No role assigned, returning fallback");
            return None;
        };
        if !has_key {
            warn!(operation, player_id = binding.player_id, "No API key set, returning fallback");
            return None;
        }
        Some(binding)
    }

    fn subject<'a>(&'a self, binding: &'a GameBinding) -> PromptSubject<'a> {
        PromptSubject {
            player_id: Some(binding.player_id),
            role: binding.role,
            teammates: &binding.teammates,
            game: self.config.game(),
        }
    }

    async fn generate<T: ResponseSchema>(
        &self,
        function_id: &str,
        prompt: String,
        options: GenerationOptions,
    ) -> Result<T, PlayerError> {
        let model = self.resolved_model();
        let backend = self.models.build(&model).map_err(|e| {
            PlayerError::new(PlayerErrorKind::Generation {
                function_id: function_id.to_string(),
                stage: GenerationStage::Structured,
                message: e.message,
            })
        })?;

        let ai = self.config.ai();
        let request = GenerationRequest::new(
            prompt,
            options.max_tokens.unwrap_or(*ai.max_tokens()),
            options.temperature.unwrap_or(*ai.temperature()),
        );
        generate_structured::<T>(backend.as_ref(), function_id, &request).await
    }
}
