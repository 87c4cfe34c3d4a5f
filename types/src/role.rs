use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Mafia,
    Citizen,
    Sheikh,
    Girl,
    Boy,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Mafia,
    Citizens,
}

impl Role {
    pub fn faction(self) -> Faction {
        match self {
            Role::Mafia => Faction::Mafia,
            Role::Citizen | Role::Sheikh | Role::Girl | Role::Boy => Faction::Citizens,
        }
    }

    pub fn is_mafia(self) -> bool {
        self.faction() == Faction::Mafia
    }

    /// Roles that act during the ability phase. The boy acts only after death.
    pub fn acts_in_ability_phase(self) -> bool {
        matches!(self, Role::Sheikh | Role::Girl)
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Mafia => write!(f, "Mafia"),
            Role::Citizen => write!(f, "Citizen"),
            Role::Sheikh => write!(f, "Sheikh"),
            Role::Girl => write!(f, "Girl"),
            Role::Boy => write!(f, "Boy"),
        }
    }
}

impl Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Mafia => write!(f, "mafia"),
            Faction::Citizens => write!(f, "citizens"),
        }
    }
}
