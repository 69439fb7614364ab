//! Roles and phases.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::instrument;

use crate::error::{PlayerError, PlayerErrorKind};

/// Role dealt to a player at the start of a game.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    /// Plain villager, no night action.
    Villager,
    /// Kills one player each night together with the other werewolves.
    Werewolf,
    /// Learns whether one player is good or a werewolf each night.
    Seer,
    /// Holds one healing and one poison potion.
    Witch,
}

impl Role {
    /// Parses a role name, rejecting anything that is not a known role.
    #[track_caller]
    #[instrument]
    pub fn parse(name: &str) -> Result<Self, PlayerError> {
        name.trim()
            .parse()
            .map_err(|_| PlayerError::new(PlayerErrorKind::UnknownRole(name.to_string())))
    }

    /// Whether this role acts during the night phase.
    pub fn has_night_action(self) -> bool {
        !matches!(self, Self::Villager)
    }

    /// Whether this role belongs to the werewolf camp.
    pub fn is_werewolf(self) -> bool {
        matches!(self, Self::Werewolf)
    }
}

/// Phase of the game loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GamePhase {
    /// Seats are being dealt.
    Preparing,
    /// Power roles act.
    Night,
    /// Everyone speaks.
    Day,
    /// Everyone votes someone out.
    Voting,
    /// A camp has won.
    Ended,
}
