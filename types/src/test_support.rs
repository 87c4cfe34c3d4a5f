use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    game_state::GameState,
    phase::Phase,
    role::Role,
    settings::{GameSettings, Member, RoomSettings},
};

/// A table with fixed roles, seated in order. The first seat owns the room.
pub(crate) struct Table {
    pub state: GameState,
    pub owner: Uuid,
    pub now: DateTime<Utc>,
}

impl Table {
    pub fn new(roles: &[Role]) -> Self {
        Self::with_settings(roles, GameSettings::default())
    }

    pub fn with_settings(roles: &[Role], settings: GameSettings) -> Self {
        let members: Vec<_> = roles
            .iter()
            .enumerate()
            .map(|(i, role)| Member::new(Uuid::new_v4(), &format!("{role}-{i}")))
            .collect();
        let owner = members[0].user_id;
        let room = RoomSettings {
            room_id: Uuid::new_v4(),
            owner_id: owner,
            game: settings,
        };
        let now = Utc::now();
        let mut state = GameState::new(&room, &members, now).unwrap();
        for (player, role) in state.players.iter_mut().zip(roles) {
            player.assign_role(*role).unwrap();
        }
        Self { state, owner, now }
    }

    /// Puts the game straight into `phase` the way a transition would.
    pub fn at(mut self, phase: Phase) -> Self {
        self.state.game.phase = phase;
        self.state.game.phase_token += 1;
        self.state.game.phase_started_at = self.now;
        self.state.game.phase_deadline_at = phase
            .duration(&self.state.settings)
            .map(|length| self.now + length);
        self
    }

    /// User id of the `nth` seat holding `role`.
    pub fn user(&self, role: Role, nth: usize) -> Uuid {
        self.state
            .players
            .iter()
            .filter(|p| p.has_role(role))
            .nth(nth)
            .map(|p| p.user_id)
            .unwrap()
    }

    /// Player id of the `nth` seat holding `role`.
    pub fn player(&self, role: Role, nth: usize) -> Uuid {
        self.state.player_by_user(self.user(role, nth)).unwrap().id
    }
}
