//! Structured decisions returned by a player.
//!
//! Model replies are read leniently: a missing or `null` field takes its
//! default, a seat number may arrive as a string, and a non-string reason is
//! kept as its JSON text. Nothing here rejects a reply for its field types.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::PlayerId;

/// Seat number from a JSON number or numeric string; anything else is `0`.
fn lenient_player_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PlayerId, D::Error> {
    let id = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| PlayerId::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(id.unwrap_or_default())
}

/// String as-is, `null` as empty, any other value as its JSON text.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// The value when it fits `T`, else `T::default()`.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_value(Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Day speech.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SpeechResponse {
    /// What the player says aloud (20-50 words of natural conversation).
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub speech: String,
}

/// Day vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VotingResponse {
    /// Seat voted out.
    #[serde(default, deserialize_with = "lenient_player_id")]
    #[schemars(with = "PlayerId")]
    pub target: PlayerId,
    /// Why.
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub reason: String,
}

/// Werewolf night verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WerewolfAction {
    /// Attack a seat.
    #[default]
    Kill,
}

/// Werewolf night decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WerewolfNightAction {
    /// Always `kill`.
    #[serde(default, deserialize_with = "or_default")]
    #[schemars(with = "WerewolfAction")]
    pub action: WerewolfAction,
    /// Seat to attack.
    #[serde(default, deserialize_with = "lenient_player_id")]
    #[schemars(with = "PlayerId")]
    pub target: PlayerId,
    /// Why this seat.
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub reason: String,
}

/// Seer night verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SeerAction {
    /// Check a seat.
    #[default]
    Investigate,
}

/// Seer night decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SeerNightAction {
    /// Always `investigate`.
    #[serde(default, deserialize_with = "or_default")]
    #[schemars(with = "SeerAction")]
    pub action: SeerAction,
    /// Seat to check.
    #[serde(default, deserialize_with = "lenient_player_id")]
    #[schemars(with = "PlayerId")]
    pub target: PlayerId,
    /// Why this seat.
    #[serde(default, deserialize_with = "lenient_text")]
    #[schemars(with = "String")]
    pub reason: String,
}

/// Witch night verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WitchAction {
    /// At least one potion is used tonight.
    Using,
    /// Nothing is used tonight.
    #[default]
    Idle,
}

/// Witch night decision. A target of `0` means the potion is not used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WitchNightAction {
    /// `using` or `idle`.
    #[serde(default, deserialize_with = "or_default")]
    #[schemars(with = "WitchAction")]
    pub action: WitchAction,
    /// Seat to heal, 0 for none.
    #[serde(default, deserialize_with = "lenient_player_id")]
    #[schemars(with = "PlayerId")]
    pub heal_target: PlayerId,
    /// Why heal.
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub heal_reason: Option<String>,
    /// Seat to poison, 0 for none.
    #[serde(default, deserialize_with = "lenient_player_id")]
    #[schemars(with = "PlayerId")]
    pub poison_target: PlayerId,
    /// Why poison.
    #[serde(
        default,
        deserialize_with = "lenient_optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(with = "Option<String>")]
    pub poison_reason: Option<String>,
}

/// Night decision, one variant per role that acts at night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NightActionResponse {
    /// Werewolf attack.
    Werewolf(WerewolfNightAction),
    /// Seer check.
    Seer(SeerNightAction),
    /// Witch potions.
    Witch(WitchNightAction),
}

impl NightActionResponse {
    /// The seat the action is aimed at, if any.
    pub fn target(&self) -> Option<PlayerId> {
        match self {
            Self::Werewolf(a) => Some(a.target),
            Self::Seer(a) => Some(a.target),
            Self::Witch(a) => [a.heal_target, a.poison_target]
                .into_iter()
                .find(|t| *t != 0),
        }
    }
}
