//! Public and mafia ballots, and turning a round's ballots into an outcome.

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use uuid::Uuid;

use crate::{
    assignment::uniform_index,
    error::GameError,
    event::EventKind,
    game_state::{EliminationCause, GameState},
    phase::Phase,
    role::Role,
    transition::AdvanceCause,
    vote::{resolve_mafia, resolve_public, Ballot, MafiaOutcome, PublicOutcome, Tally, Vote, VoteKind},
};

impl GameState {
    pub fn cast_public_vote(
        &mut self,
        caller: Uuid,
        ballot: Ballot,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        self.require_phase(Phase::PublicVoting)?;
        let voter_id = self.living_seat(caller)?.id;
        if let Ballot::Target(target) = ballot {
            if target == voter_id {
                return Err(GameError::InvalidTarget("cannot vote for yourself".into()));
            }
            self.living_target(target)?;
        }
        self.record_vote(VoteKind::Public, voter_id, ballot, now);
        Ok(())
    }

    /// Owner closes public voting early: tally now, then move on.
    pub fn confirm_public_voting<R>(
        &mut self,
        caller: Uuid,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.require_phase(Phase::PublicVoting)?;
        self.require_owner(caller)?;
        self.advance(AdvanceCause::Confirmed, now, rng)
    }

    pub fn cast_mafia_vote(
        &mut self,
        caller: Uuid,
        target: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        self.require_phase(Phase::MafiaVoting)?;
        let voter = self.living_seat(caller)?;
        if !voter.is_mafia() {
            return Err(GameError::RoleNotPermitted);
        }
        let voter_id = voter.id;
        if self.living_target(target)?.is_mafia() {
            return Err(GameError::InvalidTarget("mafia cannot target mafia".into()));
        }
        self.record_vote(VoteKind::Mafia, voter_id, Ballot::Target(target), now);
        Ok(())
    }

    /// Any living mafia may close the night vote.
    pub fn confirm_mafia_voting<R>(
        &mut self,
        caller: Uuid,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        self.require_phase(Phase::MafiaVoting)?;
        if !self.living_seat(caller)?.is_mafia() {
            return Err(GameError::RoleNotPermitted);
        }
        self.advance(AdvanceCause::Confirmed, now, rng)
    }

    /// The voter's active ballot for this round, if any.
    pub fn ballot_of(&self, voter_id: Uuid, kind: VoteKind) -> Option<Ballot> {
        self.votes
            .iter()
            .find(|v| v.voter_id == voter_id && v.kind == kind && v.round == self.game.round)
            .map(|v| v.ballot)
    }

    /// Last write wins: one active ballot per voter, round and kind.
    fn record_vote(&mut self, kind: VoteKind, voter_id: Uuid, ballot: Ballot, now: DateTime<Utc>) {
        let round = self.game.round;
        self.votes
            .retain(|v| !(v.voter_id == voter_id && v.round == round && v.kind == kind));
        log::debug!("{kind:?} ballot in round {round}: {voter_id} -> {ballot:?}");
        self.votes.push(Vote {
            game_id: self.game.id,
            round,
            kind,
            voter_id,
            ballot,
            cast_at: now,
        });
    }

    fn tally(&self, kind: VoteKind) -> Tally {
        let round = self.game.round;
        Tally::from_votes(
            self.votes
                .iter()
                .filter(|v| v.round == round && v.kind == kind)
                .filter(|v| self.is_alive_player(v.voter_id)),
        )
    }

    /// Marks (round, kind) resolved. False if it already was.
    fn mark_resolved(&mut self, kind: VoteKind) -> bool {
        let key = (self.game.round, kind);
        if self.resolved_votes.contains(&key) {
            return false;
        }
        self.resolved_votes.push(key);
        true
    }

    pub(crate) fn resolve_public_vote(&mut self, now: DateTime<Utc>) {
        if !self.mark_resolved(VoteKind::Public) {
            return;
        }
        let tally = self.tally(VoteKind::Public);
        let outcome = resolve_public(&tally);
        log::info!(
            "Public vote in round {}: {} ({} targets, {} skips)",
            self.game.round,
            outcome.as_str(),
            tally.counts.len(),
            tally.skips
        );
        let mut params = vec![("outcome", outcome.as_str().to_string())];
        if let PublicOutcome::Eliminate(target) = outcome {
            if let Some(player) = self.player(target) {
                params.push(("player", player.name.clone()));
            }
        }
        self.emit(EventKind::PublicVoteResolved, &params, now);
        if let PublicOutcome::Eliminate(target) = outcome {
            self.eliminate(target, EliminationCause::PublicVote, now);
        }
    }

    pub(crate) fn resolve_mafia_vote<R>(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), GameError>
    where
        R: RngCore + CryptoRng + ?Sized,
    {
        if !self.mark_resolved(VoteKind::Mafia) {
            return Ok(());
        }
        let target = match resolve_mafia(&self.tally(VoteKind::Mafia)) {
            MafiaOutcome::NoVotes => return Ok(()),
            MafiaOutcome::Decided(target) => target,
            MafiaOutcome::Tied(candidates) => {
                let pick = candidates[uniform_index(rng, candidates.len())?];
                log::info!("Mafia vote tied between {} targets", candidates.len());
                self.emit(
                    EventKind::MafiaTiebreak,
                    &[("candidates", candidates.len().to_string())],
                    now,
                );
                pick
            }
        };
        if !self.is_alive_player(target) {
            return Ok(());
        }
        if self.is_protected(target) {
            log::info!("Mafia kill blocked in round {}", self.game.round);
            self.emit(EventKind::MafiaKillBlocked, &[], now);
            return Ok(());
        }
        self.eliminate(target, EliminationCause::MafiaVote, now);
        Ok(())
    }

    fn is_protected(&self, target: Uuid) -> bool {
        self.actions.iter().any(|a| {
            a.round == self.game.round && a.role == Role::Girl && a.target_id == Some(target)
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::{role::Faction, test_support::Table};

    #[test]
    fn test_public_ballot_is_last_write_wins() {
        let mut table = Table::new(&[Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen])
            .at(Phase::PublicVoting);
        let voter = table.user(Role::Citizen, 0);
        let a = table.player(Role::Citizen, 1);
        let b = table.player(Role::Mafia, 0);
        table.state.cast_public_vote(voter, Ballot::Target(a), table.now).unwrap();
        table.state.cast_public_vote(voter, Ballot::Target(b), table.now).unwrap();
        table.state.cast_public_vote(voter, Ballot::Target(b), table.now).unwrap();

        assert_eq!(table.state.votes().len(), 1);
        let voter_id = table.state.player_by_user(voter).unwrap().id;
        assert_eq!(table.state.ballot_of(voter_id, VoteKind::Public), Some(Ballot::Target(b)));
    }

    #[test]
    fn test_public_vote_rejects_self_and_dead_targets() {
        let mut table = Table::new(&[Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen])
            .at(Phase::PublicVoting);
        let voter = table.user(Role::Citizen, 0);
        let own_id = table.player(Role::Citizen, 0);
        let dead = table.player(Role::Citizen, 2);
        table.state.players.iter_mut().find(|p| p.id == dead).unwrap().eliminate(1);

        assert!(matches!(
            table.state.cast_public_vote(voter, Ballot::Target(own_id), table.now),
            Err(GameError::InvalidTarget(_))
        ));
        assert!(matches!(
            table.state.cast_public_vote(voter, Ballot::Target(dead), table.now),
            Err(GameError::InvalidTarget(_))
        ));
        let dead_user = table.state.player(dead).unwrap().user_id;
        assert_eq!(
            table.state.cast_public_vote(dead_user, Ballot::Skip, table.now),
            Err(GameError::PlayerEliminated)
        );
        assert!(table.state.votes().is_empty());
    }

    #[test]
    fn test_public_vote_in_wrong_phase() {
        let mut table = Table::new(&[Role::Mafia, Role::Citizen, Role::Citizen]).at(Phase::Discussion);
        let voter = table.user(Role::Citizen, 0);
        assert_eq!(
            table.state.cast_public_vote(voter, Ballot::Skip, table.now),
            Err(GameError::WrongPhase {
                expected: Phase::PublicVoting,
                actual: Phase::Discussion
            })
        );
    }

    #[test]
    fn test_public_resolution_eliminates_and_is_idempotent() {
        let roles = [Role::Mafia, Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen, Role::Citizen];
        let mut table = Table::new(&roles).at(Phase::PublicVoting);
        let target = table.player(Role::Mafia, 0);
        for nth in 0..4 {
            let voter = table.user(Role::Citizen, nth);
            table.state.cast_public_vote(voter, Ballot::Target(target), table.now).unwrap();
        }
        table.state.resolve_public_vote(table.now);
        table.state.resolve_public_vote(table.now);

        assert!(!table.state.player(target).unwrap().is_alive());
        let resolved = table
            .state
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::PublicVoteResolved)
            .count();
        assert_eq!(resolved, 1);
        let eliminated = table
            .state
            .events()
            .iter()
            .find(|e| e.kind == EventKind::PlayerEliminated)
            .unwrap();
        assert_eq!(eliminated.param("cause"), Some("public_vote"));
        assert_eq!(
            eliminated.params.keys().map(String::as_str).collect::<Vec<_>>(),
            ["cause", "player"]
        );
    }

    #[test]
    fn test_owner_confirm_ends_game_on_parity() {
        let mut table = Table::with_settings(
            &[Role::Mafia, Role::Citizen, Role::Citizen],
            crate::settings::GameSettings::classic(),
        )
        .at(Phase::PublicVoting);
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let victim = table.player(Role::Citizen, 1);
        for user in [table.user(Role::Mafia, 0), table.user(Role::Citizen, 0)] {
            table.state.cast_public_vote(user, Ballot::Target(victim), table.now).unwrap();
        }
        let stranger = table.user(Role::Citizen, 0);
        assert_eq!(
            table.state.confirm_public_voting(stranger, table.now, &mut rng),
            Err(GameError::NotOwner)
        );
        let owner = table.owner;
        table.state.confirm_public_voting(owner, table.now, &mut rng).unwrap();
        assert_eq!(table.state.phase(), Phase::Finished);
        assert_eq!(table.state.winner(), Some(Faction::Mafia));
    }

    #[test]
    fn test_only_mafia_vote_at_night() {
        let mut table = Table::new(&[Role::Mafia, Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen])
            .at(Phase::MafiaVoting);
        let citizen = table.user(Role::Citizen, 0);
        let mafia = table.user(Role::Mafia, 0);
        let teammate = table.player(Role::Mafia, 1);
        let victim = table.player(Role::Citizen, 1);

        assert_eq!(
            table.state.cast_mafia_vote(citizen, victim, table.now),
            Err(GameError::RoleNotPermitted)
        );
        assert!(matches!(
            table.state.cast_mafia_vote(mafia, teammate, table.now),
            Err(GameError::InvalidTarget(_))
        ));
        table.state.cast_mafia_vote(mafia, victim, table.now).unwrap();
        assert_eq!(table.state.votes().len(), 1);
    }

    #[test]
    fn test_girl_protection_blocks_kill() {
        let roles = [Role::Mafia, Role::Girl, Role::Citizen, Role::Citizen, Role::Citizen];
        let mut table = Table::new(&roles).at(Phase::AbilityPhase);
        let victim = table.player(Role::Citizen, 0);
        let girl = table.user(Role::Girl, 0);
        table.state.use_girl_ability(girl, victim, table.now).unwrap();
        table = table.at(Phase::MafiaVoting);

        let mafia = table.user(Role::Mafia, 0);
        table.state.cast_mafia_vote(mafia, victim, table.now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        table.state.resolve_mafia_vote(table.now, &mut rng).unwrap();

        assert!(table.state.player(victim).unwrap().is_alive());
        assert!(table
            .state
            .events()
            .iter()
            .any(|e| e.kind == EventKind::MafiaKillBlocked && e.params.is_empty()));
    }

    #[test]
    fn test_mafia_tie_is_broken_and_logged() {
        let roles = [Role::Mafia, Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen, Role::Citizen];
        let mut table = Table::new(&roles).at(Phase::MafiaVoting);
        let a = table.player(Role::Citizen, 0);
        let b = table.player(Role::Citizen, 1);
        let (first, second) = (table.user(Role::Mafia, 0), table.user(Role::Mafia, 1));
        table.state.cast_mafia_vote(first, a, table.now).unwrap();
        table.state.cast_mafia_vote(second, b, table.now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        table.state.resolve_mafia_vote(table.now, &mut rng).unwrap();

        let tiebreak = table
            .state
            .events()
            .iter()
            .find(|e| e.kind == EventKind::MafiaTiebreak)
            .unwrap();
        assert_eq!(tiebreak.param("candidates"), Some("2"));
        let survivors = [a, b]
            .iter()
            .filter(|id| table.state.player(**id).unwrap().is_alive())
            .count();
        assert_eq!(survivors, 1);
    }

    #[test]
    fn test_no_mafia_votes_is_silent() {
        let mut table = Table::new(&[Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen])
            .at(Phase::MafiaVoting);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        table.state.resolve_mafia_vote(table.now, &mut rng).unwrap();
        assert!(table.state.events().is_empty());
        assert!(table.state.players().iter().all(|p| p.is_alive()));
    }

    #[test]
    fn test_mafia_kill_reaching_parity_finishes() {
        let mut table = Table::with_settings(
            &[Role::Mafia, Role::Mafia, Role::Citizen, Role::Citizen, Role::Citizen],
            crate::settings::GameSettings::classic(),
        )
        .at(Phase::MafiaVoting);
        let victim = table.player(Role::Citizen, 0);
        let mafia = table.user(Role::Mafia, 0);
        table.state.cast_mafia_vote(mafia, victim, table.now).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        table.state.confirm_mafia_voting(mafia, table.now, &mut rng).unwrap();
        assert_eq!(table.state.winner(), Some(Faction::Mafia));
        assert_eq!(table.state.game().phase_deadline_at, None);
    }
}
