pub mod input_strategy;

use rand::seq::SliceRandom;
use types::{Ballot, Faction, GameSnapshot, PlayerAction, Role, Strategy};
use uuid::Uuid;

pub use crate::input_strategy::InputStrategy;

/// Picks uniformly among the moves that do something. Bots don't affect
/// fairness, so the thread rng is fine here.
#[derive(Debug, Default)]
pub struct RandomStrategy {}

impl Strategy for RandomStrategy {
    fn select_action(
        &mut self,
        _view: &GameSnapshot,
        available_actions: &[PlayerAction],
    ) -> PlayerAction {
        let active: Vec<_> = available_actions
            .iter()
            .filter(|action| **action != PlayerAction::Wait)
            .collect();
        active
            .choose(&mut rand::thread_rng())
            .map(|action| **action)
            .unwrap_or(PlayerAction::Wait)
    }
}

/// Deterministic bot: acts on what it knows, otherwise takes the first
/// option on offer.
#[derive(Debug, Default)]
pub struct DefaultStrategy {}

impl Strategy for DefaultStrategy {
    fn select_action(
        &mut self,
        view: &GameSnapshot,
        available_actions: &[PlayerAction],
    ) -> PlayerAction {
        if available_actions.contains(&PlayerAction::ConfirmAbility) {
            return PlayerAction::ConfirmAbility;
        }

        // girl always covers herself
        if let Some(me) = view.viewer_id {
            let protect_self = PlayerAction::Protect { target: me };
            if available_actions.contains(&protect_self) {
                return protect_self;
            }
        }

        // the sheikh checks whoever hasn't been checked yet
        if let Some(action) = available_actions.iter().find(|action| match action {
            PlayerAction::Investigate { target } => {
                !view.investigations.iter().any(|i| i.target_id == *target)
            }
            _ => false,
        }) {
            return *action;
        }

        if let Some(suspect) = suspect(view) {
            let vote = PlayerAction::PublicVote(Ballot::Target(suspect));
            if available_actions.contains(&vote) {
                return vote;
            }
        }

        available_actions
            .iter()
            .find(|action| {
                !matches!(
                    action,
                    PlayerAction::Wait | PlayerAction::PublicVote(Ballot::Skip)
                )
            })
            .or_else(|| available_actions.first())
            .copied()
            .unwrap_or(PlayerAction::Wait)
    }
}

/// Who this viewer would vote out: a living player found to be mafia, or,
/// for mafia, the first living player not on the team.
fn suspect(view: &GameSnapshot) -> Option<Uuid> {
    let alive = |id: &Uuid| view.player(*id).is_some_and(|p| p.is_alive);
    if view.my_role == Some(Role::Mafia) {
        return view
            .players
            .iter()
            .find(|p| p.is_alive && p.role != Some(Role::Mafia))
            .map(|p| p.id);
    }
    view.investigations
        .iter()
        .filter(|i| i.faction == Faction::Mafia)
        .map(|i| i.target_id)
        .find(alive)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use types::{phase::Phase, snapshot::Investigation, PlayerView};

    use super::*;

    fn view(my_role: Role) -> GameSnapshot {
        let players: Vec<_> = ["Ann", "Ben", "Cal", "Dee"]
            .iter()
            .map(|name| PlayerView {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                name: name.to_string(),
                is_alive: true,
                is_connected: true,
                role: None,
            })
            .collect();
        GameSnapshot {
            game_id: Uuid::new_v4(),
            phase: Phase::PublicVoting,
            round: 1,
            phase_token: 3,
            deadline: Some(Utc::now()),
            winner: None,
            viewer_id: Some(players[0].id),
            is_owner: false,
            my_role: Some(my_role),
            players,
            investigations: Vec::new(),
            my_ballot: None,
        }
    }

    fn ballots(view: &GameSnapshot) -> Vec<PlayerAction> {
        std::iter::once(Ballot::Skip)
            .chain(view.players[1..].iter().map(|p| Ballot::Target(p.id)))
            .map(PlayerAction::PublicVote)
            .chain(std::iter::once(PlayerAction::Wait))
            .collect()
    }

    #[test]
    fn test_sheikh_votes_for_known_mafia() {
        let mut view = view(Role::Sheikh);
        let mafia = view.players[2].id;
        view.investigations.push(Investigation {
            round: 1,
            target_id: mafia,
            faction: Faction::Mafia,
        });
        let actions = ballots(&view);
        assert_eq!(
            DefaultStrategy::default().select_action(&view, &actions),
            PlayerAction::PublicVote(Ballot::Target(mafia))
        );
    }

    #[test]
    fn test_default_prefers_acting_over_waiting() {
        let view = view(Role::Citizen);
        let actions = ballots(&view);
        assert_eq!(
            DefaultStrategy::default().select_action(&view, &actions),
            PlayerAction::PublicVote(Ballot::Target(view.players[1].id))
        );
        assert_eq!(
            DefaultStrategy::default().select_action(&view, &[PlayerAction::Wait]),
            PlayerAction::Wait
        );
    }

    #[test]
    fn test_random_never_waits_when_it_can_act() {
        let view = view(Role::Citizen);
        let actions = ballots(&view);
        let mut strategy = RandomStrategy::default();
        for _ in 0..50 {
            assert_ne!(strategy.select_action(&view, &actions), PlayerAction::Wait);
        }
    }
}
