//! One-shot role powers: investigate, protect, and the boy's revenge.

use chrono::{DateTime, Duration, Utc};
use rand::{CryptoRng, RngCore};
use uuid::Uuid;

use crate::{
    action::AbilityAction,
    error::GameError,
    event::EventKind,
    game_state::{EliminationCause, GameState, RevengeStatus, RevengeWindow},
    phase::{Phase, REVENGE_WINDOW_SECS},
    role::{Faction, Role},
};

impl GameState {
    /// Reveals the target's faction to the sheikh and nobody else.
    pub fn use_sheikh_ability(
        &mut self,
        caller: Uuid,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Faction, GameError> {
        let actor_id = self.ability_actor(caller, Role::Sheikh)?;
        if target == actor_id {
            return Err(GameError::InvalidTarget("cannot investigate yourself".into()));
        }
        let faction = self
            .living_target(target)?
            .role()
            .map(Role::faction)
            .ok_or_else(|| GameError::InvalidTarget("target has no role yet".into()))?;
        self.record_action(Role::Sheikh, actor_id, target, Some(faction), now);
        self.emit(EventKind::InvestigationPerformed, &[], now);
        Ok(faction)
    }

    /// Self-protection is allowed.
    pub fn use_girl_ability(
        &mut self,
        caller: Uuid,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        let actor_id = self.ability_actor(caller, Role::Girl)?;
        self.living_target(target)?;
        self.record_action(Role::Girl, actor_id, target, None, now);
        self.emit(EventKind::ProtectionPlaced, &[], now);
        Ok(())
    }

    pub fn confirm_ability_action(
        &mut self,
        caller: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        self.require_phase(Phase::AbilityPhase)?;
        let actor = self.living_seat(caller)?;
        if !actor.role().is_some_and(Role::acts_in_ability_phase) {
            return Err(GameError::RoleNotPermitted);
        }
        let (actor_id, round) = (actor.id, self.game.round);
        let action = self
            .actions
            .iter_mut()
            .find(|a| a.actor_id == actor_id && a.round == round)
            .ok_or(GameError::NothingToConfirm)?;
        if action.is_confirmed() {
            return Ok(());
        }
        action.confirmed = Some(true);
        log::debug!("{actor_id} confirmed their {} action", action.role);
        self.collapse_ability_phase_if_done(now);
        Ok(())
    }

    /// Pulls the ability deadline in to `now` once every sheikh and girl who
    /// could still act has confirmed. Dead or disconnected ones don't count.
    pub(crate) fn collapse_ability_phase_if_done(&mut self, now: DateTime<Utc>) {
        if self.game.phase != Phase::AbilityPhase {
            return;
        }
        let round = self.game.round;
        let already = self
            .events
            .iter()
            .any(|e| e.kind == EventKind::AbilityPhaseComplete && e.round == round);
        if already {
            return;
        }
        let waiting = self
            .players
            .iter()
            .filter(|p| p.is_alive() && p.is_connected)
            .filter(|p| p.role().is_some_and(Role::acts_in_ability_phase))
            .any(|p| !self.action_this_round(p.id).is_some_and(AbilityAction::is_confirmed));
        if waiting {
            return;
        }
        log::info!("Every ability confirmed in round {round}, closing the phase");
        self.game.phase_deadline_at = Some(now);
        self.emit(EventKind::AbilityPhaseComplete, &[], now);
        self.schedule(now);
    }

    /// A dead boy's one extra elimination while his window is open.
    pub fn use_boy_revenge<R>(
        &mut self,
        caller: Uuid,
        target: Uuid,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.require_phase(Phase::Resolution)?;
        let boy = self.seat(caller)?;
        if !boy.has_role(Role::Boy) {
            return Err(GameError::RoleNotPermitted);
        }
        let (boy_id, boy_name, round) = (boy.id, boy.name.clone(), self.game.round);
        let window = self
            .revenge_windows
            .iter()
            .find(|w| w.boy_id == boy_id && w.round == round)
            .ok_or(GameError::RoleNotPermitted)?;
        if window.status != RevengeStatus::Pending {
            return Err(GameError::AlreadyActed);
        }
        if now > window.closes_at {
            return Err(GameError::RevengeWindowClosed);
        }
        let target_name = self.living_target(target)?.name.clone();

        self.actions.push(AbilityAction {
            game_id: self.game.id,
            round,
            role: Role::Boy,
            actor_id: boy_id,
            target_id: Some(target),
            result: None,
            confirmed: Some(true),
            created_at: now,
        });
        if let Some(window) = self
            .revenge_windows
            .iter_mut()
            .find(|w| w.boy_id == boy_id && w.round == round)
        {
            window.status = RevengeStatus::Taken { target };
        }
        self.emit(
            EventKind::RevengeTaken,
            &[("player", boy_name), ("target", target_name)],
            now,
        );
        self.eliminate(target, EliminationCause::Revenge, now);
        if self.is_finished() || self.has_pending_revenge() {
            return Ok(());
        }
        self.step(now, rng)
    }

    /// Opens a window for every boy who fell this round. Returns when the
    /// last pending window closes, if any is open.
    pub(crate) fn open_revenge_windows(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let round = self.game.round;
        let fallen: Vec<_> = self
            .players
            .iter()
            .filter(|p| p.has_role(Role::Boy) && p.eliminated_at_round() == Some(round))
            .filter(|p| {
                !self
                    .revenge_windows
                    .iter()
                    .any(|w| w.boy_id == p.id && w.round == round)
            })
            .map(|p| (p.id, p.name.clone()))
            .collect();
        let closes_at = now + Duration::seconds(REVENGE_WINDOW_SECS);
        for (boy_id, name) in fallen {
            log::info!("Revenge window open for {name} until {closes_at}");
            self.revenge_windows.push(RevengeWindow {
                boy_id,
                round,
                opened_at: now,
                closes_at,
                status: RevengeStatus::Pending,
            });
            self.emit(EventKind::RevengeWindowOpened, &[("player", name)], now);
        }
        self.revenge_windows
            .iter()
            .filter(|w| w.round == round && w.status == RevengeStatus::Pending)
            .map(|w| w.closes_at)
            .max()
    }

    pub(crate) fn has_pending_revenge(&self) -> bool {
        self.revenge_windows
            .iter()
            .any(|w| w.round == self.game.round && w.status == RevengeStatus::Pending)
    }

    pub(crate) fn forfeit_pending_revenge(&mut self, now: DateTime<Utc>) {
        let round = self.game.round;
        let mut forfeited = Vec::new();
        for window in self.revenge_windows.iter_mut() {
            if window.round == round && window.status == RevengeStatus::Pending {
                window.status = RevengeStatus::Forfeited;
                forfeited.push(window.boy_id);
            }
        }
        for boy_id in forfeited {
            let name = self.player(boy_id).map(|p| p.name.clone()).unwrap_or_default();
            log::info!("{name} let the revenge window lapse");
            self.emit(EventKind::RevengeForfeited, &[("player", name)], now);
        }
    }

    fn ability_actor(&self, caller: Uuid, role: Role) -> Result<Uuid, GameError> {
        self.require_phase(Phase::AbilityPhase)?;
        let actor = self.living_seat(caller)?;
        if !actor.has_role(role) {
            return Err(GameError::RoleNotPermitted);
        }
        if self.action_this_round(actor.id).is_some() {
            return Err(GameError::AlreadyActed);
        }
        Ok(actor.id)
    }

    fn record_action(
        &mut self,
        role: Role,
        actor_id: Uuid,
        target: Uuid,
        result: Option<Faction>,
        now: DateTime<Utc>,
    ) {
        log::debug!("{role} {actor_id} acted on {target} in round {}", self.game.round);
        self.actions.push(AbilityAction {
            game_id: self.game.id,
            round: self.game.round,
            role,
            actor_id,
            target_id: Some(target),
            result,
            confirmed: Some(false),
            created_at: now,
        });
    }
}
