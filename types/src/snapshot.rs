//! Per-viewer read models. Hidden information is filtered here and nowhere
//! else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    action::PlayerAction,
    game_state::{GameState, RevengeStatus},
    phase::Phase,
    player::Player,
    role::{Faction, Role},
    vote::{Ballot, VoteKind},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub is_alive: bool,
    pub is_connected: bool,
    /// `None` unless this viewer is allowed to see it.
    pub role: Option<Role>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub round: u32,
    pub target_id: Uuid,
    pub faction: Faction,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub game_id: Uuid,
    pub phase: Phase,
    pub round: u32,
    pub phase_token: u64,
    pub deadline: Option<DateTime<Utc>>,
    pub winner: Option<Faction>,
    /// Player id of the viewer, `None` for spectators.
    pub viewer_id: Option<Uuid>,
    pub is_owner: bool,
    pub my_role: Option<Role>,
    pub players: Vec<PlayerView>,
    pub investigations: Vec<Investigation>,
    pub my_ballot: Option<Ballot>,
}

impl GameSnapshot {
    pub fn player(&self, id: Uuid) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn name_of(&self, id: Uuid) -> &str {
        self.player(id).map_or("?", |p| p.name.as_str())
    }
}

impl GameState {
    /// What `user_id` is allowed to know right now.
    pub fn snapshot_for(&self, user_id: Uuid) -> GameSnapshot {
        let viewer = self.player_by_user(user_id);
        let players = self
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                user_id: p.user_id,
                name: p.name.clone(),
                is_alive: p.is_alive(),
                is_connected: p.is_connected,
                role: self.role_visible(viewer, p).then(|| p.role()).flatten(),
            })
            .collect();

        let investigations = viewer
            .filter(|v| v.has_role(Role::Sheikh))
            .map(|v| {
                self.actions
                    .iter()
                    .filter(|a| a.actor_id == v.id && a.role == Role::Sheikh)
                    .filter_map(|a| {
                        Some(Investigation {
                            round: a.round,
                            target_id: a.target_id?,
                            faction: a.result?,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let my_ballot = viewer.and_then(|v| match self.game.phase {
            Phase::PublicVoting => self.ballot_of(v.id, VoteKind::Public),
            Phase::MafiaVoting => self.ballot_of(v.id, VoteKind::Mafia),
            _ => None,
        });

        GameSnapshot {
            game_id: self.game.id,
            phase: self.game.phase,
            round: self.game.round,
            phase_token: self.game.phase_token,
            deadline: self.game.phase_deadline_at,
            winner: self.game.winner,
            viewer_id: viewer.map(|v| v.id),
            is_owner: self.game.owner_id == user_id,
            my_role: viewer.and_then(Player::role),
            players,
            investigations,
            my_ballot,
        }
    }

    fn role_visible(&self, viewer: Option<&Player>, subject: &Player) -> bool {
        if self.is_finished() {
            return true;
        }
        match viewer {
            Some(viewer) => viewer.id == subject.id || (viewer.is_mafia() && subject.is_mafia()),
            None => false,
        }
    }

    /// Every concrete move `user_id` may make right now. Owner and mafia
    /// phase confirms are not listed; they close a phase rather than act in it.
    pub fn permitted_actions(&self, user_id: Uuid, now: DateTime<Utc>) -> Vec<PlayerAction> {
        let Some(me) = self.player_by_user(user_id) else {
            return Vec::new();
        };
        if self.is_finished() {
            return Vec::new();
        }
        let living_others = || {
            self.players
                .iter()
                .filter(move |p| p.is_alive() && p.id != me.id)
        };

        let mut actions: Vec<PlayerAction> = match self.game.phase {
            Phase::PublicVoting if me.is_alive() => std::iter::once(Ballot::Skip)
                .chain(living_others().map(|p| Ballot::Target(p.id)))
                .map(PlayerAction::PublicVote)
                .collect(),
            Phase::AbilityPhase if me.is_alive() => match (me.role(), self.action_this_round(me.id)) {
                (Some(Role::Sheikh), None) => living_others()
                    .map(|p| PlayerAction::Investigate { target: p.id })
                    .collect(),
                (Some(Role::Girl), None) => self
                    .players
                    .iter()
                    .filter(|p| p.is_alive())
                    .map(|p| PlayerAction::Protect { target: p.id })
                    .collect(),
                (Some(_), Some(action)) if !action.is_confirmed() => {
                    vec![PlayerAction::ConfirmAbility]
                }
                _ => Vec::new(),
            },
            Phase::MafiaVoting if me.is_alive() && me.is_mafia() => living_others()
                .filter(|p| !p.is_mafia())
                .map(|p| PlayerAction::MafiaVote { target: p.id })
                .collect(),
            Phase::Resolution if self.can_take_revenge(me, now) => living_others()
                .map(|p| PlayerAction::Revenge { target: p.id })
                .collect(),
            _ => Vec::new(),
        };
        actions.push(PlayerAction::Wait);
        log::debug!("{} may choose from {} actions", me.name, actions.len());
        actions
    }

    fn can_take_revenge(&self, me: &Player, now: DateTime<Utc>) -> bool {
        self.revenge_windows.iter().any(|w| {
            w.boy_id == me.id
                && w.round == self.game.round
                && w.status == RevengeStatus::Pending
                && now <= w.closes_at
        })
    }
}
