//! Game state handed to a player when a decision is requested.

use std::collections::BTreeMap;

use derive_more::From;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{GamePhase, PlayerId};

/// Public information about one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    /// Seat number.
    pub id: PlayerId,
    /// Whether the player is still in the game.
    pub is_alive: bool,
}

/// Who produced a line in the speech log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechKind {
    /// A player talking during the day.
    #[default]
    Player,
    /// A moderator announcement.
    System,
}

/// One line of the speech log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Speech {
    /// Speaker seat (0 for system messages).
    pub player_id: PlayerId,
    /// What was said.
    pub content: String,
    /// Speaker kind.
    #[serde(default, rename = "type")]
    pub kind: SpeechKind,
}

/// One ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Seat that cast the ballot.
    pub voter_id: PlayerId,
    /// Seat voted against.
    pub target_id: PlayerId,
}

/// Result of one seer check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investigation {
    /// Seat that was checked.
    pub target: PlayerId,
    /// `true` when the seat is not a werewolf.
    pub is_good: bool,
}

/// Which witch potions are already spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PotionUsage {
    /// Healing potion spent.
    pub heal: bool,
    /// Poison potion spent.
    pub poison: bool,
}

/// Game state visible to every player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerContext {
    /// Current round, starting at 1.
    pub round: u32,
    /// Current phase.
    pub current_phase: GamePhase,
    /// Seats still in the game.
    pub alive_players: Vec<PlayerInfo>,
    /// Speech log keyed by round.
    #[serde(default)]
    pub all_speeches: BTreeMap<u32, Vec<Speech>>,
    /// Ballots keyed by round.
    #[serde(default)]
    pub all_votes: BTreeMap<u32, Vec<Vote>>,
}

impl PlayerContext {
    /// Ids of the seats still alive, in seat order.
    pub fn alive_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self
            .alive_players
            .iter()
            .filter(|p| p.is_alive)
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Seer view: the shared context plus private check results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeerContext {
    /// Shared game state.
    #[serde(flatten)]
    pub base: PlayerContext,
    /// Check results keyed by the round they were made in.
    pub investigated_players: BTreeMap<u32, Investigation>,
}

impl SeerContext {
    /// Folds check results into `seat -> "good" | "werewolf"`.
    pub fn check_results(&self) -> BTreeMap<PlayerId, &'static str> {
        self.investigated_players
            .values()
            .map(|i| (i.target, if i.is_good { "good" } else { "werewolf" }))
            .collect()
    }
}

/// Witch view: the shared context plus potion state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WitchContext {
    /// Shared game state.
    #[serde(flatten)]
    pub base: PlayerContext,
    /// Seat the werewolves attacked tonight, if known.
    #[serde(default)]
    pub killed_tonight: Option<PlayerId>,
    /// Potions already spent.
    pub potion_used: PotionUsage,
}

/// Context for one decision, in whichever shape the caller holds.
///
/// Untagged on the wire: the role-specific fields decide the variant.
#[derive(Debug, Clone, PartialEq, Serialize, From)]
#[serde(untagged)]
pub enum DecisionContext {
    /// Seer context (has `investigatedPlayers`).
    Seer(SeerContext),
    /// Witch context (has `potionUsed`).
    Witch(WitchContext),
    /// Shared context only.
    Player(PlayerContext),
}

// Round maps are keyed by integers, which serde's buffered `flatten` and
// `untagged` paths cannot read back from JSON object keys. The role-specific
// shapes therefore go through `serde_json::Value`.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeerExtras {
    investigated_players: BTreeMap<u32, Investigation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WitchExtras {
    #[serde(default)]
    killed_tonight: Option<PlayerId>,
    potion_used: PotionUsage,
}

impl<'de> Deserialize<'de> for SeerContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let base = PlayerContext::deserialize(&value).map_err(D::Error::custom)?;
        let extras = SeerExtras::deserialize(&value).map_err(D::Error::custom)?;
        Ok(Self {
            base,
            investigated_players: extras.investigated_players,
        })
    }
}

impl<'de> Deserialize<'de> for WitchContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let base = PlayerContext::deserialize(&value).map_err(D::Error::custom)?;
        let extras = WitchExtras::deserialize(&value).map_err(D::Error::custom)?;
        Ok(Self {
            base,
            killed_tonight: extras.killed_tonight,
            potion_used: extras.potion_used,
        })
    }
}

impl<'de> Deserialize<'de> for DecisionContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let context = if value.get("investigatedPlayers").is_some() {
            Self::Seer(SeerContext::deserialize(&value).map_err(D::Error::custom)?)
        } else if value.get("potionUsed").is_some() {
            Self::Witch(WitchContext::deserialize(&value).map_err(D::Error::custom)?)
        } else {
            Self::Player(PlayerContext::deserialize(&value).map_err(D::Error::custom)?)
        };
        Ok(context)
    }
}

impl DecisionContext {
    /// The shared part of the context.
    pub fn base(&self) -> &PlayerContext {
        match self {
            Self::Seer(c) => &c.base,
            Self::Witch(c) => &c.base,
            Self::Player(c) => c,
        }
    }

    /// Seer check results, when this is a seer context.
    pub fn seer(&self) -> Option<&SeerContext> {
        match self {
            Self::Seer(c) => Some(c),
            _ => None,
        }
    }

    /// Witch potion state, when this is a witch context.
    pub fn witch(&self) -> Option<&WitchContext> {
        match self {
            Self::Witch(c) => Some(c),
            _ => None,
        }
    }
}
