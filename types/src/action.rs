use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    role::{Faction, Role},
    vote::Ballot,
};

/// Something a seated player can do right now.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerAction {
    PublicVote(Ballot),
    MafiaVote { target: Uuid },
    Investigate { target: Uuid },
    Protect { target: Uuid },
    ConfirmAbility,
    Revenge { target: Uuid },
    Wait,
}

impl Display for PlayerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerAction::PublicVote(Ballot::Skip) => write!(f, "Skip vote"),
            PlayerAction::PublicVote(Ballot::Target(target)) => write!(f, "Vote {target}"),
            PlayerAction::MafiaVote { target } => write!(f, "Kill {target}"),
            PlayerAction::Investigate { target } => write!(f, "Investigate {target}"),
            PlayerAction::Protect { target } => write!(f, "Protect {target}"),
            PlayerAction::ConfirmAbility => write!(f, "Confirm"),
            PlayerAction::Revenge { target } => write!(f, "Revenge {target}"),
            PlayerAction::Wait => write!(f, "Wait"),
        }
    }
}

impl PlayerAction {
    pub fn target(&self) -> Option<Uuid> {
        match self {
            PlayerAction::PublicVote(ballot) => ballot.target(),
            PlayerAction::MafiaVote { target }
            | PlayerAction::Investigate { target }
            | PlayerAction::Protect { target }
            | PlayerAction::Revenge { target } => Some(*target),
            PlayerAction::ConfirmAbility | PlayerAction::Wait => None,
        }
    }
}

/// One use of a role power; at most one per actor per round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityAction {
    pub game_id: Uuid,
    pub round: u32,
    pub role: Role,
    pub actor_id: Uuid,
    pub target_id: Option<Uuid>,
    /// Investigation result. Only ever shown to the actor.
    pub result: Option<Faction>,
    pub confirmed: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl AbilityAction {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed == Some(true)
    }
}
