use std::{collections::HashSet, fmt::Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    action::AbilityAction,
    assignment::{MAX_PLAYERS, MIN_PLAYERS},
    error::GameError,
    event::{EventKind, GameEvent},
    phase::Phase,
    player::Player,
    role::Faction,
    settings::{GameSettings, Member, RoomSettings},
    vote::{Vote, VoteKind},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Uuid,
    pub room_id: Uuid,
    pub owner_id: Uuid,
    pub phase: Phase,
    pub round: u32,
    pub started_at: DateTime<Utc>,
    pub phase_started_at: DateTime<Utc>,
    pub phase_deadline_at: Option<DateTime<Utc>>,
    /// Fencing token, bumped on every transition.
    pub phase_token: u64,
    pub ended_at: Option<DateTime<Utc>>,
    pub winner: Option<Faction>,
}

/// A deferred phase callback. Only acts if the game still sits in
/// `expected_phase` with `expected_token` once `fire_at` has passed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerTicket {
    pub game_id: Uuid,
    pub expected_phase: Phase,
    pub expected_token: u64,
    pub fire_at: DateTime<Utc>,
}

/// What a committed transaction needs the outside world to do.
#[derive(Clone, Debug, Default)]
pub struct Effects {
    pub events: Vec<GameEvent>,
    pub timers: Vec<TimerTicket>,
}

impl Effects {
    pub fn finished(&self) -> bool {
        self.events
            .iter()
            .any(|event| event.kind == EventKind::GameFinished)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevengeStatus {
    Pending,
    Taken { target: Uuid },
    Forfeited,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevengeWindow {
    pub boy_id: Uuid,
    pub round: u32,
    pub opened_at: DateTime<Utc>,
    pub closes_at: DateTime<Utc>,
    pub status: RevengeStatus,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EliminationCause {
    PublicVote,
    MafiaVote,
    Revenge,
}

impl EliminationCause {
    pub fn as_str(self) -> &'static str {
        match self {
            EliminationCause::PublicVote => "public_vote",
            EliminationCause::MafiaVote => "mafia_vote",
            EliminationCause::Revenge => "revenge",
        }
    }
}

/// The single game aggregate. Every rule lives in `impl GameState` blocks
/// across this crate; callers mutate it only inside one transaction.
#[derive(Clone, Debug)]
pub struct GameState {
    pub(crate) game: Game,
    pub(crate) settings: GameSettings,
    pub(crate) players: Vec<Player>,
    pub(crate) votes: Vec<Vote>,
    pub(crate) actions: Vec<AbilityAction>,
    pub(crate) revenge_windows: Vec<RevengeWindow>,
    pub(crate) resolved_votes: Vec<(u32, VoteKind)>,
    pub(crate) events: Vec<GameEvent>,
    published_events: usize,
    pending_timers: Vec<TimerTicket>,
}

impl GameState {
    /// Seats the members in the given order. The game waits in the lobby
    /// until `start` deals the roles.
    pub fn new(
        room: &RoomSettings,
        members: &[Member],
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        let num_players = members.len();
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(GameError::InvalidPlayerCount(num_players));
        }
        let mut seated = HashSet::with_capacity(num_players);
        if let Some(member) = members.iter().find(|m| !seated.insert(m.user_id)) {
            return Err(GameError::DuplicateMember(member.user_id));
        }
        log::info!("Num players: {num_players}, room: {}", room.room_id);

        let id = Uuid::new_v4();
        let players = members
            .iter()
            .map(|m| Player::new(id, m.user_id, &m.name, m.is_connected))
            .collect();

        Ok(Self {
            game: Game {
                id,
                room_id: room.room_id,
                owner_id: room.owner_id,
                phase: Phase::Lobby,
                round: 1,
                started_at: now,
                phase_started_at: now,
                phase_deadline_at: None,
                phase_token: 0,
                ended_at: None,
                winner: None,
            },
            settings: room.game.clone(),
            players,
            votes: Vec::new(),
            actions: Vec::new(),
            revenge_windows: Vec::new(),
            resolved_votes: Vec::new(),
            events: Vec::new(),
            published_events: 0,
            pending_timers: Vec::new(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.game.id
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.game.phase
    }

    pub fn round(&self) -> u32 {
        self.game.round
    }

    pub fn winner(&self) -> Option<Faction> {
        self.game.winner
    }

    pub fn is_finished(&self) -> bool {
        self.game.phase == Phase::Finished
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn votes(&self) -> &[Vote] {
        &self.votes
    }

    pub fn actions(&self) -> &[AbilityAction] {
        &self.actions
    }

    pub fn revenge_windows(&self) -> &[RevengeWindow] {
        &self.revenge_windows
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn player(&self, id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_by_user(&self, user_id: Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.user_id == user_id)
    }

    pub fn set_connected(
        &mut self,
        user_id: Uuid,
        connected: bool,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(GameError::NotAPlayer)?;
        if player.is_connected == connected {
            return Ok(());
        }
        player.is_connected = connected;
        let name = player.name.clone();
        if self.is_finished() {
            return Ok(());
        }
        let status = if connected { "connected" } else { "disconnected" };
        self.emit(
            EventKind::PlayerConnection,
            &[("player", name), ("status", status.to_string())],
            now,
        );
        // a sheikh or girl dropping out may be the last one holding the phase open
        self.collapse_ability_phase_if_done(now);
        Ok(())
    }

    /// Hands over events and timers produced since the last drain.
    pub fn drain_effects(&mut self) -> Effects {
        let events = self.events[self.published_events..].to_vec();
        self.published_events = self.events.len();
        Effects {
            events,
            timers: std::mem::take(&mut self.pending_timers),
        }
    }

    pub(crate) fn emit(
        &mut self,
        kind: EventKind,
        params: &[(&str, String)],
        now: DateTime<Utc>,
    ) {
        let event = GameEvent::new(
            self.game.id,
            self.events.len() as u64,
            self.game.round,
            kind,
            params,
            now,
        );
        self.events.push(event);
    }

    /// Queues a callback for the current phase and token.
    pub(crate) fn schedule(&mut self, fire_at: DateTime<Utc>) {
        self.pending_timers.push(TimerTicket {
            game_id: self.game.id,
            expected_phase: self.game.phase,
            expected_token: self.game.phase_token,
            fire_at,
        });
    }

    pub(crate) fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.game
            .phase_deadline_at
            .is_some_and(|deadline| now >= deadline)
    }

    pub(crate) fn require_live_game(&self) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::GameFinished);
        }
        Ok(())
    }

    pub(crate) fn require_phase(&self, expected: Phase) -> Result<(), GameError> {
        self.require_live_game()?;
        if self.game.phase != expected {
            return Err(GameError::WrongPhase {
                expected,
                actual: self.game.phase,
            });
        }
        Ok(())
    }

    pub(crate) fn require_owner(&self, user_id: Uuid) -> Result<(), GameError> {
        if self.game.owner_id != user_id {
            return Err(GameError::NotOwner);
        }
        Ok(())
    }

    pub(crate) fn seat(&self, user_id: Uuid) -> Result<&Player, GameError> {
        self.player_by_user(user_id).ok_or(GameError::NotAPlayer)
    }

    pub(crate) fn living_seat(&self, user_id: Uuid) -> Result<&Player, GameError> {
        let player = self.seat(user_id)?;
        if !player.is_alive() {
            return Err(GameError::PlayerEliminated);
        }
        Ok(player)
    }

    pub(crate) fn living_target(&self, target: Uuid) -> Result<&Player, GameError> {
        match self.player(target) {
            Some(player) if player.is_alive() => Ok(player),
            Some(player) => Err(GameError::InvalidTarget(format!(
                "{} has been eliminated",
                player.name
            ))),
            None => Err(GameError::InvalidTarget(format!("unknown player {target}"))),
        }
    }

    pub(crate) fn is_alive_player(&self, id: Uuid) -> bool {
        self.player(id).is_some_and(Player::is_alive)
    }

    pub(crate) fn action_this_round(&self, actor_id: Uuid) -> Option<&AbilityAction> {
        self.actions
            .iter()
            .find(|a| a.actor_id == actor_id && a.round == self.game.round)
    }
}

impl Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let players_str = self
            .players
            .iter()
            .map(|player| {
                format!(
                    "{}{}: {}",
                    player.name,
                    if player.is_connected { "" } else { " (away)" },
                    if player.is_alive() { "alive" } else { "out" }
                )
            })
            .join("\n");
        write!(
            f,
            "\nRound {} / {} (token {})\nTable:\n{}",
            self.game.round, self.game.phase, self.game.phase_token, players_str
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomSettings {
        RoomSettings {
            room_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            game: GameSettings::default(),
        }
    }

    fn members(count: usize) -> Vec<Member> {
        (0..count)
            .map(|i| Member::new(Uuid::new_v4(), &format!("Player {i}")))
            .collect()
    }

    #[test]
    fn test_player_count_bounds() {
        let now = Utc::now();
        assert_eq!(
            GameState::new(&room(), &members(2), now).unwrap_err(),
            GameError::InvalidPlayerCount(2)
        );
        assert_eq!(
            GameState::new(&room(), &members(21), now).unwrap_err(),
            GameError::InvalidPlayerCount(21)
        );
        let state = GameState::new(&room(), &members(20), now).unwrap();
        assert_eq!(state.phase(), Phase::Lobby);
        assert_eq!(state.round(), 1);
        assert_eq!(state.game().phase_token, 0);
    }

    #[test]
    fn test_member_seated_twice_is_rejected() {
        let mut seats = members(3);
        seats.push(seats[1].clone());
        assert_eq!(
            GameState::new(&room(), &seats, Utc::now()).unwrap_err(),
            GameError::DuplicateMember(seats[1].user_id)
        );
    }

    #[test]
    fn test_drain_only_returns_new_effects() {
        let seats = members(4);
        let now = Utc::now();
        let mut state = GameState::new(&room(), &seats, now).unwrap();
        state.set_connected(seats[2].user_id, false, now).unwrap();
        state.set_connected(seats[2].user_id, false, now).unwrap();

        let effects = state.drain_effects();
        assert_eq!(effects.events.len(), 1);
        assert_eq!(effects.events[0].param("status"), Some("disconnected"));
        assert!(state.drain_effects().events.is_empty());

        state.set_connected(seats[2].user_id, true, now).unwrap();
        let effects = state.drain_effects();
        assert_eq!(effects.events.len(), 1);
        assert_eq!(effects.events[0].sequence, 1);
        assert!(!effects.finished());
    }

    #[test]
    fn test_presence_after_the_end_is_not_announced() {
        use crate::{role::Role, test_support::Table};

        let table = Table::new(&[Role::Mafia, Role::Citizen, Role::Citizen])
            .at(Phase::Finished);
        let mut state = table.state;
        let citizen = state.players()[1].user_id;

        state.set_connected(citizen, false, table.now).unwrap();
        assert!(!state.players()[1].is_connected);
        assert!(state.events().is_empty());
        assert!(state.drain_effects().events.is_empty());
    }

    #[test]
    fn test_unknown_user_has_no_seat() {
        let mut state = GameState::new(&room(), &members(3), Utc::now()).unwrap();
        assert_eq!(
            state.set_connected(Uuid::new_v4(), false, Utc::now()),
            Err(GameError::NotAPlayer)
        );
    }
}
