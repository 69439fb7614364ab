//! Tests for player session decisions against a scripted model backend.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use werewolf_player::{
    AiConfig, Credential, DecisionContext, FALLBACK_SPEECH, FALLBACK_VOTE_REASON,
    FALLBACK_VOTE_TARGET, GameConfig, GamePhase, GameTelemetry, GenerationOptions,
    GenerationRequest, GenerationStage, Investigation, LAST_WORDS, LlmBackend, LlmError,
    LoggingConfig, ModelFactory, NightActionResponse, ObjectSchema, PlayerConfig, PlayerContext,
    PlayerErrorKind, PlayerInfo, PlayerSession, ResolvedModel, Role, SeerContext, SessionMetadata,
    StartGameParams, TelemetryError, WitchAction,
};

/// What the scripted backend answers to a structured request.
#[derive(Debug, Clone)]
enum ObjectReply {
    Object(Value),
    NoObject,
    Fail,
}

/// What the scripted backend answers to a text request.
#[derive(Debug, Clone)]
enum TextReply {
    Text(String),
    Fail,
}

#[derive(Debug, Default)]
struct Calls {
    built: Vec<ResolvedModel>,
    object_prompts: Vec<String>,
    text_prompts: Vec<String>,
    requests: Vec<(u32, f32)>,
}

#[derive(Debug, Clone)]
struct ScriptedModels {
    object: ObjectReply,
    text: TextReply,
    calls: Arc<Mutex<Calls>>,
}

impl ScriptedModels {
    fn new(object: ObjectReply, text: TextReply) -> Self {
        Self {
            object,
            text,
            calls: Arc::new(Mutex::new(Calls::default())),
        }
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().expect("Calls lock poisoned")
    }
}

impl ModelFactory for ScriptedModels {
    fn build(&self, model: &ResolvedModel) -> Result<Box<dyn LlmBackend>, LlmError> {
        self.calls().built.push(model.clone());
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl LlmBackend for ScriptedModels {
    async fn generate_object(
        &self,
        request: &GenerationRequest,
        _schema: &ObjectSchema,
    ) -> Result<Value, LlmError> {
        {
            let mut calls = self.calls();
            calls.object_prompts.push(request.prompt().clone());
            calls
                .requests
                .push((*request.max_tokens(), *request.temperature()));
        }
        match &self.object {
            ObjectReply::Object(value) => Ok(value.clone()),
            ObjectReply::NoObject => Err(LlmError::no_object("No object generated".to_string())),
            ObjectReply::Fail => Err(LlmError::backend("Connection refused".to_string())),
        }
    }

    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.calls().text_prompts.push(request.prompt().clone());
        match &self.text {
            TextReply::Text(text) => Ok(text.clone()),
            TextReply::Fail => Err(LlmError::backend("Rate limited".to_string())),
        }
    }
}

#[derive(Debug, Default)]
struct RecordingTelemetry {
    fail: bool,
    sessions: Mutex<Vec<(String, SessionMetadata)>>,
}

impl GameTelemetry for RecordingTelemetry {
    fn create_game_session(
        &self,
        game_id: &str,
        metadata: &SessionMetadata,
    ) -> Result<(), TelemetryError> {
        self.sessions
            .lock()
            .expect("Sessions lock poisoned")
            .push((game_id.to_string(), metadata.clone()));
        if self.fail {
            Err(TelemetryError::new("Telemetry offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn config_with_key(key: Option<&str>) -> PlayerConfig {
    let ai = match key {
        Some(key) => AiConfig::default().with_api_key(key),
        None => AiConfig::default(),
    };
    PlayerConfig::new(
        ai,
        GameConfig::default().with_personality("quiet observer"),
        LoggingConfig::new(false),
    )
}

fn session(key: Option<&str>, models: &ScriptedModels) -> PlayerSession {
    PlayerSession::with_collaborators(
        config_with_key(key),
        Arc::new(models.clone()),
        Arc::new(RecordingTelemetry::default()),
    )
}

fn base_context() -> PlayerContext {
    PlayerContext {
        round: 2,
        current_phase: GamePhase::Day,
        alive_players: (1..=6).map(|id| PlayerInfo { id, is_alive: id != 4 }).collect(),
        all_speeches: BTreeMap::new(),
        all_votes: BTreeMap::new(),
    }
}

fn context() -> DecisionContext {
    DecisionContext::Player(base_context())
}

async fn bind(player: &PlayerSession, role: Role, teammates: Vec<u32>) {
    player
        .start_game(StartGameParams::new("game-7".to_string(), role, 3, teammates))
        .await;
}

#[tokio::test]
async fn test_speak_without_role_returns_fallback() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(Some("key"), &models);

    let speech = player.speak(&context()).await.expect("Speak should not fail");
    assert_eq!(speech.speech, FALLBACK_SPEECH);
    assert!(models.calls().built.is_empty());
}

#[tokio::test]
async fn test_vote_without_key_returns_fallback() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(None, &models);
    bind(&player, Role::Villager, vec![]).await;

    let vote = player.vote(&context()).await.expect("Vote should not fail");
    assert_eq!(vote.target, FALLBACK_VOTE_TARGET);
    assert_eq!(vote.reason, FALLBACK_VOTE_REASON);
    assert!(models.calls().built.is_empty());
}

#[tokio::test]
async fn test_speak_without_key_returns_fallback() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(None, &models);
    bind(&player, Role::Werewolf, vec![5]).await;

    let speech = player.speak(&context()).await.expect("Speak should not fail");
    assert_eq!(speech.speech, FALLBACK_SPEECH);
    assert!(models.calls().built.is_empty());
}

#[tokio::test]
async fn test_runtime_credential_enables_generation() {
    let models = ScriptedModels::new(
        ObjectReply::Object(json!({"speech": "Player 5 is too quiet."})),
        TextReply::Fail,
    );
    let player = session(None, &models);
    bind(&player, Role::Villager, vec![]).await;
    assert!(!player.has_api_key());

    player.set_credential(Credential::new(
        "runtime-key".to_string(),
        Some("minimax".to_string()),
        Some("MiniMax-M2".to_string()),
        None,
    ));

    let speech = player.speak(&context()).await.expect("Speak should succeed");
    assert_eq!(speech.speech, "Player 5 is too quiet.");

    let calls = models.calls();
    assert_eq!(calls.built.len(), 1);
    assert_eq!(calls.built[0].provider(), "minimax");
    assert_eq!(calls.built[0].model(), "MiniMax-M2");
    assert_eq!(calls.built[0].api_key().as_deref(), Some("runtime-key"));
    assert!(calls.object_prompts[0].contains("You are player 3."));
    assert!(calls.text_prompts.is_empty());
}

#[tokio::test]
async fn test_use_ability_without_role_is_error() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(Some("key"), &models);

    let err = player
        .use_ability(&context())
        .await
        .expect_err("Ability without role should fail");
    assert_eq!(err.kind(), &PlayerErrorKind::AbilityUnavailable);
}

#[tokio::test]
async fn test_use_ability_without_key_is_error() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(None, &models);
    bind(&player, Role::Seer, vec![]).await;

    let err = player
        .use_ability(&context())
        .await
        .expect_err("Ability without key should fail");
    assert_eq!(err.kind(), &PlayerErrorKind::AbilityUnavailable);
}

#[tokio::test]
async fn test_villager_has_no_night_action() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let err = player
        .use_ability(&context())
        .await
        .expect_err("Villager ability should fail");
    assert_eq!(err.kind(), &PlayerErrorKind::NoNightAction(Role::Villager));
    assert!(models.calls().built.is_empty());
}

#[tokio::test]
async fn test_werewolf_night_action_structured() {
    let models = ScriptedModels::new(
        ObjectReply::Object(json!({"action": "kill", "target": 5, "reason": "The seer claim"})),
        TextReply::Fail,
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Werewolf, vec![2]).await;

    let action = player
        .use_ability(&context())
        .await
        .expect("Werewolf action should succeed");
    let NightActionResponse::Werewolf(action) = action else {
        panic!("Expected werewolf action, got {action:?}");
    };
    assert_eq!(action.target, 5);
    assert!(models.calls().object_prompts[0].contains("teammates are: 2"));
}

#[tokio::test]
async fn test_vote_fallback_projects_declared_fields() {
    let models = ScriptedModels::new(
        ObjectReply::NoObject,
        TextReply::Text(
            r#"Here you go: {"target": 2, "reason": "x", "extra": "y"} Good luck!"#.to_string(),
        ),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let vote = player.vote(&context()).await.expect("Fallback vote should succeed");
    assert_eq!(vote.target, 2);
    assert_eq!(vote.reason, "x");

    let calls = models.calls();
    assert_eq!(calls.text_prompts.len(), 1);
    assert!(calls.text_prompts[0].starts_with(&calls.object_prompts[0]));
    assert!(calls.text_prompts[0].contains("IMPORTANT: You must respond with a valid JSON object"));
}

#[tokio::test]
async fn test_witch_fallback_drops_null_reasons() {
    let models = ScriptedModels::new(
        ObjectReply::NoObject,
        TextReply::Text(
            r#"{"action": "using", "healTarget": 4, "healReason": "Saving the seer", "poisonTarget": 0, "poisonReason": null}"#
                .to_string(),
        ),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Witch, vec![]).await;

    let action = player
        .use_ability(&context())
        .await
        .expect("Witch action should succeed");
    let NightActionResponse::Witch(action) = action else {
        panic!("Expected witch action, got {action:?}");
    };
    assert_eq!(action.action, WitchAction::Using);
    assert_eq!(action.heal_target, 4);
    assert_eq!(action.poison_target, 0);
    assert_eq!(action.poison_reason, None);
}

#[tokio::test]
async fn test_fallback_without_json_is_error() {
    let models = ScriptedModels::new(
        ObjectReply::NoObject,
        TextReply::Text("I would rather not say.".to_string()),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let err = player.speak(&context()).await.expect_err("Speak should fail");
    match err.kind() {
        PlayerErrorKind::Generation {
            function_id,
            stage,
            message,
        } => {
            assert_eq!(function_id, "speech-generation");
            assert_eq!(*stage, GenerationStage::Fallback);
            assert_eq!(message, "No JSON object found in response");
        }
        other => panic!("Unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_backend_failure_skips_fallback() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Text("{}".to_string()));
    let player = session(Some("key"), &models);
    bind(&player, Role::Seer, vec![]).await;

    let err = player.vote(&context()).await.expect_err("Vote should fail");
    match err.kind() {
        PlayerErrorKind::Generation {
            function_id, stage, ..
        } => {
            assert_eq!(function_id, "vote-generation");
            assert_eq!(*stage, GenerationStage::Structured);
        }
        other => panic!("Unexpected error: {other:?}"),
    }
    assert!(models.calls().text_prompts.is_empty());
}

#[tokio::test]
async fn test_generation_options_override_config() {
    let models = ScriptedModels::new(
        ObjectReply::Object(json!({"speech": "Hello"})),
        TextReply::Fail,
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    player
        .speak_with(
            &context(),
            GenerationOptions {
                max_tokens: Some(64),
                temperature: None,
            },
        )
        .await
        .expect("Speak should succeed");

    let calls = models.calls();
    assert_eq!(calls.requests, vec![(64, 0.8)]);
}

#[tokio::test]
async fn test_start_game_reports_and_rebinds() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let telemetry = Arc::new(RecordingTelemetry {
        fail: true,
        sessions: Mutex::new(Vec::new()),
    });
    let player = PlayerSession::with_collaborators(
        config_with_key(Some("key")),
        Arc::new(models),
        telemetry.clone(),
    );

    player
        .start_game(StartGameParams::new("game-1".to_string(), Role::Werewolf, 2, vec![5]))
        .await;
    player
        .start_game(StartGameParams::new("game-2".to_string(), Role::Seer, 4, vec![]))
        .await;

    let status = player.status();
    assert_eq!(status.game_id().as_deref(), Some("game-2"));
    assert_eq!(*status.role(), Some(Role::Seer));
    assert_eq!(*status.player_id(), Some(4));
    assert_eq!(status.teammates().as_deref(), Some(&[][..]));
    assert!(*status.is_alive());
    assert_eq!(status.personality(), "quiet observer");

    let sessions = telemetry.sessions.lock().expect("Sessions lock poisoned");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].0, "game-1");
    assert_eq!(sessions[0].1.teammates, vec![5]);
}

#[tokio::test]
async fn test_unbound_status_and_last_words() {
    let models = ScriptedModels::new(ObjectReply::Fail, TextReply::Fail);
    let player = session(None, &models);

    let status = player.status();
    assert_eq!(*status.game_id(), None);
    assert_eq!(*status.role(), None);
    assert_eq!(player.last_words().await, LAST_WORDS);
    assert!(player.personality_prompt().is_empty());
}

#[tokio::test]
async fn test_seer_vote_includes_check_results() {
    let models = ScriptedModels::new(
        ObjectReply::Object(json!({"target": 5, "reason": "Checked as a werewolf"})),
        TextReply::Fail,
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Seer, vec![]).await;

    let seer = SeerContext {
        base: base_context(),
        investigated_players: BTreeMap::from([
            (1, Investigation { target: 5, is_good: false }),
            (2, Investigation { target: 2, is_good: true }),
        ]),
    };
    let vote = player
        .vote(&DecisionContext::Seer(seer))
        .await
        .expect("Seer vote should succeed");
    assert_eq!(vote.target, 5);

    let calls = models.calls();
    assert!(
        calls.object_prompts[0]
            .contains("Your check results: player 2: good; player 5: werewolf.")
    );
}

#[tokio::test]
async fn test_structured_reply_missing_field_falls_back_to_text() {
    let models = ScriptedModels::new(
        ObjectReply::Object(json!({"target": 3})),
        TextReply::Text(r#"{"target": 6, "reason": "Voted late"}"#.to_string()),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let vote = player.vote(&context()).await.expect("Fallback vote should succeed");
    assert_eq!(vote.target, 6);
    assert_eq!(vote.reason, "Voted late");

    let calls = models.calls();
    assert_eq!(calls.object_prompts.len(), 1);
    assert_eq!(calls.text_prompts.len(), 1);
}

#[tokio::test]
async fn test_vote_fallback_keeps_reply_with_null_reason() {
    let models = ScriptedModels::new(
        ObjectReply::NoObject,
        TextReply::Text(r#"{"target": 2, "reason": null, "extra": "y"}"#.to_string()),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let vote = player.vote(&context()).await.expect("Fallback vote should succeed");
    assert_eq!(vote.target, 2);
    assert!(vote.reason.is_empty());
}

#[tokio::test]
async fn test_vote_fallback_reads_string_target() {
    let models = ScriptedModels::new(
        ObjectReply::NoObject,
        TextReply::Text(r#"{"target": "2", "reason": "x"}"#.to_string()),
    );
    let player = session(Some("key"), &models);
    bind(&player, Role::Villager, vec![]).await;

    let vote = player.vote(&context()).await.expect("Fallback vote should succeed");
    assert_eq!(vote.target, 2);
    assert_eq!(vote.reason, "x");
}
