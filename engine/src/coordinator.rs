//! The player-facing game service. Every operation is one transaction on the
//! game aggregate followed by publishing what it produced: timers to the
//! scheduler, events to the event log.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, Weak},
};

use database::EventLogWriter;
use rand::rngs::OsRng;
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use types::{
    Ballot, Effects, GameError, GameSnapshot, GameState, Member, Phase, PlayerAction,
    RoomSettings, SecureRng, StaleReason, TimerOutcome, TimerTicket,
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    event_log::{self, EventLog},
    scheduler::Scheduler,
    store::GameStore,
};

/// Held from a game's commit until its effects are published, so the event
/// log sees each game's transactions in commit order.
type Gate = Arc<tokio::sync::Mutex<()>>;

pub struct Coordinator {
    store: GameStore,
    gates: Mutex<HashMap<Uuid, Gate>>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    rng: Mutex<Box<dyn SecureRng>>,
    event_log: EventLog,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("games", &self.store.len())
            .field("clock", &self.clock)
            .field("scheduler", &self.scheduler)
            .field("event_log", &self.event_log)
            .finish()
    }
}

impl Coordinator {
    /// Operating-system randomness and no event log until told otherwise.
    pub fn new(clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            store: GameStore::default(),
            gates: Mutex::new(HashMap::new()),
            clock,
            scheduler,
            rng: Mutex::new(Box::new(OsRng)),
            event_log: EventLog::default(),
        }
    }

    /// Swaps the random source, e.g. for a seeded ChaCha20 in tests.
    pub fn with_rng(mut self, rng: Box<dyn SecureRng>) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn with_event_log(mut self, writer: Arc<dyn EventLogWriter>) -> Self {
        self.event_log = EventLog::new(writer);
        self
    }

    pub fn with_event_log_policy(mut self, policy: database::RetryPolicy) -> Self {
        self.event_log = self.event_log.with_policy(policy);
        self
    }

    /// Seats the members, deals the roles and returns the new game's id.
    /// Nothing is stored if dealing fails.
    pub async fn start_game(
        &self,
        room: &RoomSettings,
        members: &[Member],
    ) -> Result<Uuid, GameError> {
        let now = self.clock.now();
        let mut state = GameState::new(room, members, now)?;
        {
            let mut rng = self.lock_rng();
            state.start(now, &mut **rng)?;
        }
        let game_id = state.id();
        let effects = state.drain_effects();
        let gate = Gate::default();
        let _turn = gate.lock().await;
        self.lock_gates().insert(game_id, gate.clone());
        self.event_log.open(&state).await;
        self.store.insert(state);
        log::info!("Started game {game_id} in room {}", room.room_id);
        self.publish(game_id, effects).await;
        Ok(game_id)
    }

    pub async fn cast_public_vote(
        &self,
        game_id: Uuid,
        caller: Uuid,
        ballot: Ballot,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, _| {
            state.cast_public_vote(caller, ballot, now)
        })
        .await
    }

    pub async fn confirm_public_voting(
        &self,
        game_id: Uuid,
        caller: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, rng| {
            state.confirm_public_voting(caller, now, rng)
        })
        .await
    }

    pub async fn cast_mafia_vote(
        &self,
        game_id: Uuid,
        caller: Uuid,
        target: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, _| {
            state.cast_mafia_vote(caller, target, now)
        })
        .await
    }

    pub async fn confirm_mafia_voting(
        &self,
        game_id: Uuid,
        caller: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, rng| {
            state.confirm_mafia_voting(caller, now, rng)
        })
        .await
    }

    pub async fn use_sheikh_ability(
        &self,
        game_id: Uuid,
        caller: Uuid,
        target: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, _| {
            state.use_sheikh_ability(caller, target, now).map(|_| ())
        })
        .await
    }

    pub async fn use_girl_ability(
        &self,
        game_id: Uuid,
        caller: Uuid,
        target: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, _| {
            state.use_girl_ability(caller, target, now)
        })
        .await
    }

    pub async fn confirm_ability_action(
        &self,
        game_id: Uuid,
        caller: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, _| {
            state.confirm_ability_action(caller, now)
        })
        .await
    }

    pub async fn use_boy_revenge(
        &self,
        game_id: Uuid,
        caller: Uuid,
        target: Uuid,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, rng| {
            state.use_boy_revenge(caller, target, now, rng)
        })
        .await
    }

    /// Owner-only; `override_early` only matters during discussion.
    pub async fn advance_phase(
        &self,
        game_id: Uuid,
        caller: Uuid,
        override_early: bool,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, caller, |state, now, rng| {
            state.advance_phase(caller, override_early, now, rng)
        })
        .await
    }

    /// Gateway hook for presence changes.
    pub async fn set_player_connected(
        &self,
        game_id: Uuid,
        user_id: Uuid,
        connected: bool,
    ) -> Result<GameSnapshot, GameError> {
        self.run(game_id, user_id, |state, now, _| {
            state.set_connected(user_id, connected, now)
        })
        .await
    }

    /// Runs whichever operation `action` stands for. `Wait` is a read.
    pub async fn apply_action(
        &self,
        game_id: Uuid,
        caller: Uuid,
        action: PlayerAction,
    ) -> Result<GameSnapshot, GameError> {
        match action {
            PlayerAction::PublicVote(ballot) => self.cast_public_vote(game_id, caller, ballot).await,
            PlayerAction::MafiaVote { target } => {
                self.cast_mafia_vote(game_id, caller, target).await
            }
            PlayerAction::Investigate { target } => {
                self.use_sheikh_ability(game_id, caller, target).await
            }
            PlayerAction::Protect { target } => self.use_girl_ability(game_id, caller, target).await,
            PlayerAction::ConfirmAbility => self.confirm_ability_action(game_id, caller).await,
            PlayerAction::Revenge { target } => self.use_boy_revenge(game_id, caller, target).await,
            PlayerAction::Wait => self.get_game_state(game_id, caller),
        }
    }

    pub fn get_game_state(&self, game_id: Uuid, caller: Uuid) -> Result<GameSnapshot, GameError> {
        self.store.read(game_id, |state| state.snapshot_for(caller))
    }

    pub fn permitted_actions(
        &self,
        game_id: Uuid,
        caller: Uuid,
    ) -> Result<Vec<PlayerAction>, GameError> {
        let now = self.clock.now();
        self.store
            .read(game_id, |state| state.permitted_actions(caller, now))
    }

    pub fn game_count(&self) -> usize {
        self.store.len()
    }

    /// Deferred callback entry. Stale tickets change nothing; one that
    /// arrives early is put back for the current deadline.
    pub async fn on_timer_fired(&self, ticket: TimerTicket) -> Result<TimerOutcome, GameError> {
        let gate = self.gate(ticket.game_id)?;
        let _turn = gate.lock().await;
        let now = self.clock.now();
        let (outcome, effects) = self.store.transact(ticket.game_id, |state| {
            let mut rng = self.lock_rng();
            state.on_timer(&ticket, now, &mut **rng)
        })?;
        if outcome == TimerOutcome::Stale(StaleReason::NotDue) {
            let deadline = self
                .store
                .read(ticket.game_id, |state| state.game().phase_deadline_at)?;
            if let Some(fire_at) = deadline {
                log::debug!("Timer for {} came early, re-armed for {fire_at}", ticket.game_id);
                self.scheduler.schedule(TimerTicket { fire_at, ..ticket });
            }
        }
        self.publish(ticket.game_id, effects).await;
        Ok(outcome)
    }

    /// Feeds due tickets from a `TokioScheduler` back in. The loop ends once
    /// the coordinator is gone or every sender has been dropped.
    pub fn spawn_timer_loop(
        self: &Arc<Self>,
        mut receiver: UnboundedReceiver<TimerTicket>,
    ) -> JoinHandle<()> {
        let coordinator: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(ticket) = receiver.recv().await {
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                match coordinator.on_timer_fired(ticket).await {
                    Ok(outcome) => log::debug!("Timer for {}: {outcome:?}", ticket.game_id),
                    Err(GameError::GameNotFound(game_id)) => {
                        log::debug!("Timer for torn down game {game_id}")
                    }
                    Err(err) => log::warn!("Timer for {} failed: {err}", ticket.game_id),
                }
            }
            log::debug!("Timer loop finished");
        })
    }

    /// Drops a finished game and purges its timeline. Returns how many
    /// events were purged.
    pub async fn teardown(&self, game_id: Uuid) -> Result<u64, GameError> {
        let gate = self.gate(game_id)?;
        let _turn = gate.lock().await;
        let phase = self.store.read(game_id, GameState::phase)?;
        if phase != Phase::Finished {
            return Err(GameError::WrongPhase {
                expected: Phase::Finished,
                actual: phase,
            });
        }
        self.store.remove(game_id);
        self.lock_gates().remove(&game_id);
        let purged = self.event_log.purge(game_id).await;
        log::info!("Tore down game {game_id}, purged {purged} events");
        Ok(purged)
    }

    async fn run<F>(&self, game_id: Uuid, caller: Uuid, f: F) -> Result<GameSnapshot, GameError>
    where
        F: FnOnce(&mut GameState, chrono::DateTime<chrono::Utc>, &mut dyn SecureRng) -> Result<(), GameError>,
    {
        let gate = self.gate(game_id)?;
        let _turn = gate.lock().await;
        let now = self.clock.now();
        let (snapshot, effects) = self.store.transact(game_id, |state| {
            {
                let mut rng = self.lock_rng();
                f(state, now, &mut **rng)?;
            }
            Ok(state.snapshot_for(caller))
        })?;
        self.publish(game_id, effects).await;
        Ok(snapshot)
    }

    async fn publish(&self, game_id: Uuid, effects: Effects) {
        for ticket in effects.timers.iter() {
            self.scheduler.schedule(*ticket);
        }
        if effects.events.is_empty() {
            return;
        }
        self.event_log.append(game_id, &effects.events).await;
        if effects.finished() {
            let closing = self.store.read(game_id, |state| {
                (
                    state.winner().map(|w| w.to_string()).unwrap_or_default(),
                    event_log::results(state),
                )
            });
            if let Ok((winner, results)) = closing {
                self.event_log.close(game_id, winner, results).await;
            }
        }
    }

    fn gate(&self, game_id: Uuid) -> Result<Gate, GameError> {
        self.lock_gates()
            .get(&game_id)
            .cloned()
            .ok_or(GameError::GameNotFound(game_id))
    }

    fn lock_gates(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Gate>> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, Box<dyn SecureRng>> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
