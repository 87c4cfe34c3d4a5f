//! Phase coordination: the only code that moves `Game::phase`.

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use uuid::Uuid;

use crate::{
    assignment::deal_roles,
    error::GameError,
    event::EventKind,
    game_state::{EliminationCause, GameState, RevengeStatus, TimerTicket},
    phase::{next_phase, LivingRoles, NextPhase, Phase},
    role::{Faction, Role},
    win::{evaluate_winner, AliveCounts},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdvanceCause {
    /// Owner pressed "next"; `override_early` cuts discussion short.
    Owner { override_early: bool },
    /// Owner or mafia confirmed a voting phase.
    Confirmed,
    Timer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StaleReason {
    Finished,
    PhaseMoved,
    TokenMoved,
    NoDeadline,
    NotDue,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    Fired,
    Stale(StaleReason),
}

impl GameState {
    /// Leaves the lobby and deals the cards. Fails, leaving nothing dealt,
    /// when the secure random source is unavailable.
    pub fn start<R>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.require_phase(Phase::Lobby)?;
        self.step(now, rng)
    }

    /// Owner-only manual advance, held to the same rules as a timer.
    pub fn advance_phase<R>(
        &mut self,
        caller: Uuid,
        override_early: bool,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.require_live_game()?;
        self.require_owner(caller)?;
        self.advance(AdvanceCause::Owner { override_early }, now, rng)
    }

    /// Deferred callback entry point. Anything that no longer matches the
    /// captured phase and token is skipped without touching state.
    pub fn on_timer<R>(
        &mut self,
        ticket: &TimerTicket,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<TimerOutcome, GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let stale = if self.is_finished() {
            Some(StaleReason::Finished)
        } else if self.game.phase != ticket.expected_phase {
            Some(StaleReason::PhaseMoved)
        } else if self.game.phase_token != ticket.expected_token {
            Some(StaleReason::TokenMoved)
        } else {
            match self.game.phase_deadline_at {
                None => Some(StaleReason::NoDeadline),
                Some(deadline) if now < deadline => Some(StaleReason::NotDue),
                Some(_) => None,
            }
        };
        if let Some(reason) = stale {
            log::debug!(
                "Skipping timer for {} ({}, token {}): {reason:?}",
                ticket.game_id,
                ticket.expected_phase,
                ticket.expected_token
            );
            return Ok(TimerOutcome::Stale(reason));
        }
        self.advance(AdvanceCause::Timer, now, rng)?;
        Ok(TimerOutcome::Fired)
    }

    /// Finishes whatever the current phase owes (tallies, revenge
    /// forfeits), then moves on.
    pub(crate) fn advance<R>(
        &mut self,
        cause: AdvanceCause,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        match self.game.phase {
            Phase::Finished => return Err(GameError::GameFinished),
            Phase::Discussion => {
                let early = cause == AdvanceCause::Owner { override_early: true };
                if !early && !self.deadline_passed(now) {
                    return Err(GameError::DiscussionNotOver);
                }
            }
            Phase::PublicVoting => {
                self.resolve_public_vote(now);
            }
            Phase::MafiaVoting => {
                self.resolve_mafia_vote(now, rng)?;
            }
            Phase::Resolution if self.has_pending_revenge() => {
                if !self.deadline_passed(now) {
                    return Err(GameError::RevengeWindowOpen);
                }
                self.forfeit_pending_revenge(now);
            }
            _ => {}
        }
        if self.is_finished() {
            return Ok(());
        }
        log::debug!("Advancing {} from {} ({cause:?})", self.game.id, self.game.phase);
        self.step(now, rng)
    }

    /// Takes the next edge of the transition table, passing straight through
    /// phases nobody has to wait on.
    pub(crate) fn step<R>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        loop {
            let living = LivingRoles::from_players(&self.players);
            match next_phase(self.game.phase, &living) {
                None => return Err(GameError::GameFinished),
                Some(NextPhase::Finish(winner)) => {
                    self.finalize(winner, now);
                    return Ok(());
                }
                Some(NextPhase::Enter(next)) => {
                    self.enter(next, now, rng)?;
                    if !self.passes_through() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn passes_through(&self) -> bool {
        match self.game.phase {
            Phase::Resolution => self.game.phase_deadline_at.is_none(),
            Phase::EndCheck => true,
            _ => false,
        }
    }

    fn enter<R>(&mut self, next: Phase, now: DateTime<Utc>, rng: &mut R) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        let from = self.game.phase;
        if from == Phase::EndCheck && next == Phase::Discussion {
            self.game.round += 1;
        }
        self.game.phase = next;
        self.game.phase_token += 1;
        self.game.phase_started_at = now;
        self.game.phase_deadline_at = None;
        log::info!(
            "Game {} round {}: {from} -> {next} (token {})",
            self.game.id,
            self.game.round,
            self.game.phase_token
        );
        self.emit(
            EventKind::PhaseChanged,
            &[("from", from.to_string()), ("to", next.to_string())],
            now,
        );

        let deadline = match next {
            Phase::CardDistribution => {
                self.assign_roles(now, rng)?;
                None
            }
            Phase::Resolution => self.open_revenge_windows(now),
            _ => next.duration(&self.settings).map(|length| now + length),
        };
        self.game.phase_deadline_at = deadline;
        if let Some(fire_at) = deadline {
            self.schedule(fire_at);
        }
        if next == Phase::AbilityPhase {
            self.collapse_ability_phase_if_done(now);
        }
        Ok(())
    }

    fn assign_roles<R>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        if self.players.iter().any(|p| p.role().is_some()) {
            return Err(GameError::RolesAlreadyAssigned);
        }
        let roles = deal_roles(self.players.len(), &self.settings, rng)?;
        for (player, role) in self.players.iter_mut().zip(roles) {
            player.assign_role(role)?;
        }
        let mafia = self.players.iter().filter(|p| p.is_mafia()).count();
        log::info!(
            "Dealt {} roles to game {} ({mafia} mafia)",
            self.players.len(),
            self.game.id
        );
        self.emit(
            EventKind::RolesAssigned,
            &[
                ("players", self.players.len().to_string()),
                ("mafia", mafia.to_string()),
            ],
            now,
        );
        Ok(())
    }

    /// Ends the game. Bumping the token here is what turns every timer still
    /// in flight into a no-op.
    pub(crate) fn finalize(&mut self, winner: Faction, now: DateTime<Utc>) {
        if self.is_finished() {
            return;
        }
        for window in self.revenge_windows.iter_mut() {
            if window.status == RevengeStatus::Pending {
                window.status = RevengeStatus::Forfeited;
            }
        }
        self.game.phase = Phase::Finished;
        self.game.phase_token += 1;
        self.game.phase_deadline_at = None;
        self.game.ended_at = Some(now);
        self.game.winner = Some(winner);
        log::info!("Game {} over! Winner: {winner}", self.game.id);
        self.emit(
            EventKind::GameFinished,
            &[("winner", winner.to_string())],
            now,
        );
    }

    /// Removes a player and immediately re-runs the win check. Returns the
    /// winner when this elimination ended the game.
    pub(crate) fn eliminate(
        &mut self,
        player_id: Uuid,
        cause: EliminationCause,
        now: DateTime<Utc>,
    ) -> Option<Faction> {
        let round = self.game.round;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id && p.is_alive())?;
        player.eliminate(round);
        let name = player.name.clone();
        let was_boy = player.has_role(Role::Boy);
        log::info!("{name} eliminated by {}", cause.as_str());
        self.emit(
            EventKind::PlayerEliminated,
            &[("player", name), ("cause", cause.as_str().to_string())],
            now,
        );

        let winner = evaluate_winner(AliveCounts::from_players(&self.players));
        match winner {
            Some(faction) => self.finalize(faction, now),
            None if was_boy => log::debug!("Boy down in round {round}, revenge opens at resolution"),
            None => {}
        }
        winner
    }
}
