//! Headless games: strategies in every seat, a hand-cranked clock, and
//! timers fired as soon as nobody has anything left to do.

use std::{sync::Arc, time::Duration};

use types::{
    GameError, GameSettings, GameSnapshot, Member, Phase, PlayerAction, Role, RoomSettings,
    Strategy,
};
use uuid::Uuid;

use crate::{
    clock::{Clock, ManualClock},
    coordinator::Coordinator,
    error::EngineError,
    scheduler::ManualScheduler,
};

const MAX_PASSES: usize = 10_000;

#[derive(Debug)]
pub struct Seat {
    pub user_id: Uuid,
    pub name: String,
    pub strategy: Box<dyn Strategy>,
}

impl Seat {
    pub fn new(name: &str, strategy: Box<dyn Strategy>) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            strategy,
        }
    }
}

/// A coordinator wired to a manual clock and scheduler.
#[derive(Debug)]
pub struct Simulation {
    pub coordinator: Coordinator,
    pub clock: Arc<ManualClock>,
    pub scheduler: Arc<ManualScheduler>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(|coordinator| coordinator)
    }
}

impl Simulation {
    /// `configure` adds the rng and event log to the bare coordinator.
    pub fn new(configure: impl FnOnce(Coordinator) -> Coordinator) -> Self {
        let clock = Arc::new(ManualClock::default());
        let scheduler = Arc::new(ManualScheduler::default());
        let coordinator = configure(Coordinator::new(clock.clone(), scheduler.clone()));
        Self {
            coordinator,
            clock,
            scheduler,
        }
    }

    /// Jumps the clock to the earliest pending timer and fires everything
    /// due by then.
    pub async fn fire_next_timer(&self, game_id: Uuid) -> Result<(), EngineError> {
        let Some(fire_at) = self.scheduler.next_fire_at() else {
            return Err(EngineError::Stalled(game_id));
        };
        self.clock.advance_to(fire_at);
        for ticket in self.scheduler.take_due(self.clock.now()) {
            match self.coordinator.on_timer_fired(ticket).await {
                Ok(outcome) => log::debug!("{} timer: {outcome:?}", ticket.expected_phase),
                Err(GameError::GameNotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Plays one game to the end. The first seat owns the room and confirms
/// public votes; any living mafia confirms the night vote.
pub async fn run_game(
    simulation: &Simulation,
    settings: &GameSettings,
    seats: &mut [Seat],
    delay_ms: Option<u64>,
) -> Result<GameSnapshot, EngineError> {
    let owner = seats
        .first()
        .map(|seat| seat.user_id)
        .ok_or(GameError::InvalidPlayerCount(0))?;
    let room = RoomSettings {
        room_id: Uuid::new_v4(),
        owner_id: owner,
        game: settings.clone(),
    };
    let members: Vec<_> = seats
        .iter()
        .map(|seat| Member::new(seat.user_id, &seat.name))
        .collect();
    let coordinator = &simulation.coordinator;
    let game_id = coordinator.start_game(&room, &members).await?;

    for _ in 0..MAX_PASSES {
        if let Some(ms) = delay_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        let acted = play_pass(coordinator, game_id, seats).await?;

        let view = coordinator.get_game_state(game_id, owner)?;
        log::debug!("Round {} {} (token {})", view.round, view.phase, view.phase_token);
        match view.phase {
            Phase::Finished => {
                log::info!("Game {game_id} over after {} rounds: {:?}", view.round, view.winner);
                return Ok(view);
            }
            Phase::CardDistribution => {
                coordinator.advance_phase(game_id, owner, false).await?;
            }
            Phase::PublicVoting => {
                coordinator.confirm_public_voting(game_id, owner).await?;
            }
            Phase::MafiaVoting => match living_mafia(coordinator, game_id, seats)? {
                Some(mafia) => {
                    coordinator.confirm_mafia_voting(game_id, mafia).await?;
                }
                None => simulation.fire_next_timer(game_id).await?,
            },
            _ if acted => {}
            _ => simulation.fire_next_timer(game_id).await?,
        }
    }
    Err(EngineError::Stalled(game_id))
}

/// Offers every seat its permitted actions once. True if anyone did
/// something other than wait.
async fn play_pass(
    coordinator: &Coordinator,
    game_id: Uuid,
    seats: &mut [Seat],
) -> Result<bool, EngineError> {
    let mut acted = false;
    for seat in seats.iter_mut() {
        let actions = coordinator.permitted_actions(game_id, seat.user_id)?;
        if actions.iter().all(|action| *action == PlayerAction::Wait) {
            continue;
        }
        let view = coordinator.get_game_state(game_id, seat.user_id)?;
        let action = seat.strategy.select_action(&view, &actions);
        if action == PlayerAction::Wait {
            continue;
        }
        log::debug!("{} chose {}", seat.name, action);
        match coordinator.apply_action(game_id, seat.user_id, action).await {
            Ok(_) => acted = true,
            Err(err) if err.is_recoverable() => log::warn!("{} tried {action}: {err}", seat.name),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(acted)
}

fn living_mafia(
    coordinator: &Coordinator,
    game_id: Uuid,
    seats: &[Seat],
) -> Result<Option<Uuid>, GameError> {
    for seat in seats {
        let view = coordinator.get_game_state(game_id, seat.user_id)?;
        let alive = view
            .viewer_id
            .and_then(|id| view.player(id))
            .is_some_and(|p| p.is_alive);
        if alive && view.my_role == Some(Role::Mafia) {
            return Ok(Some(seat.user_id));
        }
    }
    Ok(None)
}
