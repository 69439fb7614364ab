//! Natural-language prompt fragments for each decision.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::config::GameConfig;
use crate::game::{DecisionContext, PlayerContext, PlayerId, Role, SeerContext, WitchContext};

/// Output-format reminder appended to every speech prompt.
const SPEECH_FORMAT: &str = "Return JSON with the following field:\n- speech: what you say (20-50 words of natural conversation that every player hears)\n\nReturn the JSON object directly, without any other explanation.";

/// Output-format reminder appended to every voting prompt.
const VOTING_FORMAT: &str =
    "Note: return JSON strictly in the voting format, with the target and reason fields.";

/// The player a prompt is written for.
#[derive(Debug, Clone, Copy)]
pub struct PromptSubject<'a> {
    /// Seat number, when known.
    pub player_id: Option<PlayerId>,
    /// Role dealt to the player.
    pub role: Role,
    /// Fellow werewolves (empty for everyone else).
    pub teammates: &'a [PlayerId],
    /// Play-style settings.
    pub game: &'a GameConfig,
}

/// Personality description for a personality key.
#[instrument]
pub fn personality(key: &str) -> String {
    match key {
        "aggressive" => "Your personality is aggressive: you speak first and loudly, press suspects hard, and push the table towards quick decisions.".to_string(),
        "conservative" => "Your personality is conservative: you speak carefully, avoid wild accusations, and only commit once the evidence is clear.".to_string(),
        "cunning" => "Your personality is cunning: you read the table, hide your intentions, and steer the discussion while appearing reasonable.".to_string(),
        other => format!("Your personality is {other}: let it shape how you speak and decide."),
    }
}

/// Personality preamble built from the configured strategy.
///
/// Empty when no strategy is set. A `balanced` strategy is played as the
/// `cunning` personality; any other label is used as the personality key.
#[instrument(skip(game))]
pub fn personality_preamble(game: &GameConfig) -> String {
    match game.strategy().as_deref() {
        None | Some("") => String::new(),
        Some(strategy) => {
            let key = if strategy == "balanced" { "cunning" } else { strategy };
            format!("{}\n\n", personality(key))
        }
    }
}

fn role_description(role: Role) -> &'static str {
    match role {
        Role::Villager => "You are a villager. You have no night power; find the werewolves through discussion and votes.",
        Role::Werewolf => "You are a werewolf. Kill the villagers at night and avoid being voted out during the day. Never reveal your identity.",
        Role::Seer => "You are the seer. Each night you learn whether one player is good or a werewolf. Guide the village without getting killed.",
        Role::Witch => "You are the witch. You hold one healing potion and one poison potion. Use them to protect the village.",
    }
}

fn identity(subject: &PromptSubject<'_>) -> String {
    let mut text = match subject.player_id {
        Some(id) => format!("You are player {id}. {}", role_description(subject.role)),
        None => role_description(subject.role).to_string(),
    };
    if subject.role.is_werewolf() && !subject.teammates.is_empty() {
        text.push_str(&format!(
            "\nYour werewolf teammates are: {}.",
            join_ids(subject.teammates)
        ));
    }
    if !subject.game.personality().is_empty() {
        text.push_str(&format!("\nCharacter: {}", subject.game.personality()));
    }
    text
}

fn join_ids(ids: &[PlayerId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_game_state(context: &PlayerContext) -> String {
    let mut text = format!(
        "Round {}, phase: {}.\nAlive players: {}.",
        context.round,
        context.current_phase,
        join_ids(&context.alive_ids())
    );

    if !context.all_speeches.is_empty() {
        text.push_str("\n\nSpeeches so far:");
        for (round, speeches) in &context.all_speeches {
            for speech in speeches {
                text.push_str(&format!(
                    "\n[round {round}] player {}: {}",
                    speech.player_id, speech.content
                ));
            }
        }
    }

    if !context.all_votes.is_empty() {
        text.push_str("\n\nVotes so far:");
        for (round, votes) in &context.all_votes {
            for vote in votes {
                text.push_str(&format!(
                    "\n[round {round}] player {} voted for player {}",
                    vote.voter_id, vote.target_id
                ));
            }
        }
    }

    text
}

fn render_check_results(results: &BTreeMap<PlayerId, &'static str>) -> String {
    results
        .iter()
        .map(|(id, verdict)| format!("player {id}: {verdict}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Prompt for a day speech.
#[instrument(skip(subject, context), fields(role = %subject.role))]
pub fn speech_prompt(subject: &PromptSubject<'_>, context: &DecisionContext) -> String {
    let mut prompt = personality_preamble(subject.game);
    prompt.push_str(&identity(subject));
    prompt.push_str("\n\n");
    prompt.push_str(&render_game_state(context.base()));
    if let Some(seer) = context.seer() {
        let results = seer.check_results();
        if !results.is_empty() {
            prompt.push_str(&format!(
                "\n\nYour check results: {}.",
                render_check_results(&results)
            ));
        }
    }
    prompt.push_str("\n\nIt is your turn to speak. Say something that helps your camp win.");
    prompt.push_str("\n\n");
    prompt.push_str(SPEECH_FORMAT);
    prompt
}

/// Prompt for a day vote. Seer check results, when given, are listed.
#[instrument(skip(subject, context, check_results), fields(role = %subject.role))]
pub fn voting_prompt(
    subject: &PromptSubject<'_>,
    context: &DecisionContext,
    check_results: Option<&BTreeMap<PlayerId, &'static str>>,
) -> String {
    let mut prompt = personality_preamble(subject.game);
    prompt.push_str(&identity(subject));
    prompt.push_str("\n\n");
    prompt.push_str(&render_game_state(context.base()));
    if let Some(results) = check_results.filter(|r| !r.is_empty()) {
        prompt.push_str(&format!(
            "\n\nYour check results: {}.",
            render_check_results(results)
        ));
    }
    prompt.push_str("\n\nChoose one alive player to vote out and explain why.");
    if subject.role.is_werewolf() && !subject.teammates.is_empty() {
        prompt.push_str(" Do not vote for your teammates.");
    }
    prompt.push_str("\n\n");
    prompt.push_str(VOTING_FORMAT);
    prompt
}

fn werewolf_instructions(subject: &PromptSubject<'_>, context: &PlayerContext) -> String {
    let targets: Vec<PlayerId> = context
        .alive_ids()
        .into_iter()
        .filter(|id| Some(*id) != subject.player_id && !subject.teammates.contains(id))
        .collect();
    format!(
        "It is night. Choose one player to kill from: {}.\nReturn JSON with fields action (\"kill\"), target (player id) and reason.",
        join_ids(&targets)
    )
}

fn seer_instructions(subject: &PromptSubject<'_>, seer: Option<&SeerContext>) -> String {
    let mut text = String::from("It is night. Choose one player to investigate.");
    if let Some(results) = seer.map(SeerContext::check_results).filter(|r| !r.is_empty()) {
        text.push_str(&format!(
            "\nAlready checked: {}. Do not check them again.",
            render_check_results(&results)
        ));
    }
    if let Some(id) = subject.player_id {
        text.push_str(&format!("\nYou cannot investigate yourself (player {id})."));
    }
    text.push_str(
        "\nReturn JSON with fields action (\"investigate\"), target (player id) and reason.",
    );
    text
}

fn witch_instructions(witch: Option<&WitchContext>) -> String {
    let mut text = String::from("It is night.");
    match witch.and_then(|w| w.killed_tonight) {
        Some(id) => text.push_str(&format!(" The werewolves attacked player {id} tonight.")),
        None => text.push_str(" You do not know who was attacked tonight."),
    }
    let potions = witch.map(|w| w.potion_used).unwrap_or_default();
    text.push_str(&format!(
        "\nHealing potion: {}. Poison potion: {}.",
        if potions.heal { "used" } else { "available" },
        if potions.poison { "used" } else { "available" }
    ));
    text.push_str("\nReturn JSON with fields action (\"using\" or \"idle\"), healTarget (player id, 0 for none), healReason, poisonTarget (player id, 0 for none) and poisonReason.");
    text
}

/// Prompt for a night action of the subject's role.
#[instrument(skip(subject, context), fields(role = %subject.role))]
pub fn night_action_prompt(subject: &PromptSubject<'_>, context: &DecisionContext) -> String {
    let mut prompt = personality_preamble(subject.game);
    prompt.push_str(&identity(subject));
    prompt.push_str("\n\n");
    prompt.push_str(&render_game_state(context.base()));
    prompt.push_str("\n\n");
    let instructions = match subject.role {
        Role::Werewolf => werewolf_instructions(subject, context.base()),
        Role::Seer => seer_instructions(subject, context.seer()),
        Role::Witch => witch_instructions(context.witch()),
        Role::Villager => "You have no action tonight.".to_string(),
    };
    prompt.push_str(&instructions);
    prompt
}
