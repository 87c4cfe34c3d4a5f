use std::fmt::Display;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::{
    player::Player,
    role::{Faction, Role},
    settings::{GameSettings, MIN_PHASE_SECS},
    win::{evaluate_winner, AliveCounts},
};

pub const PUBLIC_VOTING_SECS: i64 = 45;
pub const MAFIA_VOTING_SECS: i64 = 45;
pub const ABILITY_PHASE_SECS: i64 = 30;
pub const REVENGE_WINDOW_SECS: i64 = 30;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lobby,
    CardDistribution,
    Discussion,
    PublicVoting,
    AbilityPhase,
    MafiaVoting,
    Resolution,
    EndCheck,
    Finished,
}

impl Phase {
    /// Fixed forward order. `Finished` is only reached through a win.
    pub fn nominal_next(self) -> Option<Phase> {
        match self {
            Phase::Lobby => Some(Phase::CardDistribution),
            Phase::CardDistribution => Some(Phase::Discussion),
            Phase::Discussion => Some(Phase::PublicVoting),
            Phase::PublicVoting => Some(Phase::AbilityPhase),
            Phase::AbilityPhase => Some(Phase::MafiaVoting),
            Phase::MafiaVoting => Some(Phase::Resolution),
            Phase::Resolution => Some(Phase::EndCheck),
            Phase::EndCheck => Some(Phase::Discussion),
            Phase::Finished => None,
        }
    }

    /// Length of the phase's deadline, if it has a fixed one. Resolution is
    /// timed only while a revenge window is open, so it is not listed here.
    pub fn duration(self, settings: &GameSettings) -> Option<Duration> {
        let secs = match self {
            Phase::Discussion => return Some(settings.discussion_duration()),
            Phase::PublicVoting => PUBLIC_VOTING_SECS,
            Phase::AbilityPhase => ABILITY_PHASE_SECS,
            Phase::MafiaVoting => MAFIA_VOTING_SECS,
            _ => return None,
        };
        Some(Duration::seconds(secs.max(MIN_PHASE_SECS)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Lobby => "lobby",
            Phase::CardDistribution => "card_distribution",
            Phase::Discussion => "discussion",
            Phase::PublicVoting => "public_voting",
            Phase::AbilityPhase => "ability_phase",
            Phase::MafiaVoting => "mafia_voting",
            Phase::Resolution => "resolution",
            Phase::EndCheck => "end_check",
            Phase::Finished => "finished",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is still alive, as far as the transition table cares.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LivingRoles {
    pub counts: AliveCounts,
    pub sheikh: bool,
    pub girl: bool,
}

impl LivingRoles {
    pub fn from_players(players: &[Player]) -> Self {
        let alive_role = |role: Role| {
            players
                .iter()
                .any(|p| p.is_alive() && p.role() == Some(role))
        };
        Self {
            counts: AliveCounts::from_players(players),
            sheikh: alive_role(Role::Sheikh),
            girl: alive_role(Role::Girl),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NextPhase {
    Enter(Phase),
    Finish(Faction),
}

/// Pure transition table: win short-circuit out of resolution, the
/// ability-phase skip, and the finish checks on entry. `None` once the game
/// is over.
pub fn next_phase(current: Phase, living: &LivingRoles) -> Option<NextPhase> {
    if matches!(current, Phase::Resolution | Phase::EndCheck) {
        if let Some(winner) = evaluate_winner(living.counts) {
            return Some(NextPhase::Finish(winner));
        }
    }

    let mut next = current.nominal_next()?;
    if next == Phase::AbilityPhase && !living.sheikh && !living.girl {
        next = Phase::MafiaVoting;
    }

    match next {
        Phase::MafiaVoting if living.counts.mafia == 0 => Some(NextPhase::Finish(Faction::Citizens)),
        Phase::Resolution if living.counts.citizens == 0 => Some(NextPhase::Finish(Faction::Mafia)),
        _ => Some(NextPhase::Enter(next)),
    }
}
