use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{action::PlayerAction, error::GameError, role::Role, snapshot::GameSnapshot};

/// Anything that can pick an action for a seat: bots, a terminal prompt.
pub trait Strategy: Debug + Send {
    fn select_action(
        &mut self,
        view: &GameSnapshot,
        available_actions: &[PlayerAction],
    ) -> PlayerAction;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub game_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    role: Option<Role>,
    is_alive: bool,
    pub is_connected: bool,
    eliminated_at_round: Option<u32>,
}

impl PartialEq for Player {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Player {
    pub fn new(game_id: Uuid, user_id: Uuid, name: &str, is_connected: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            user_id,
            name: name.to_string(),
            role: None,
            is_alive: true,
            is_connected,
            eliminated_at_round: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn eliminated_at_round(&self) -> Option<u32> {
        self.eliminated_at_round
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn is_mafia(&self) -> bool {
        self.role.is_some_and(Role::is_mafia)
    }

    /// Roles are written exactly once.
    pub(crate) fn assign_role(&mut self, role: Role) -> Result<(), GameError> {
        if self.role.is_some() {
            return Err(GameError::RolesAlreadyAssigned);
        }
        self.role = Some(role);
        Ok(())
    }

    /// There is no way back from this.
    pub(crate) fn eliminate(&mut self, round: u32) {
        self.is_alive = false;
        self.eliminated_at_round = Some(round);
    }
}
