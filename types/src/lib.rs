pub mod abilities;
pub mod action;
pub mod assignment;
pub mod error;
pub mod event;
pub mod game_state;
pub mod phase;
pub mod player;
pub mod role;
pub mod settings;
pub mod snapshot;
pub mod transition;
pub mod vote;
pub mod voting;
pub mod win;

#[cfg(test)]
mod test_support;

pub use action::{AbilityAction, PlayerAction};
pub use assignment::{deal_roles, SecureRng, MAX_PLAYERS, MIN_PLAYERS};
pub use error::GameError;
pub use event::{EventKind, GameEvent};
pub use game_state::{Effects, Game, GameState, RevengeStatus, RevengeWindow, TimerTicket};
pub use phase::{next_phase, LivingRoles, NextPhase, Phase};
pub use player::{Player, Strategy};
pub use role::{Faction, Role};
pub use settings::{GameSettings, Member, RoomSettings};
pub use snapshot::{GameSnapshot, Investigation, PlayerView};
pub use transition::{StaleReason, TimerOutcome};
pub use vote::{Ballot, Vote, VoteKind};
pub use win::{evaluate_winner, AliveCounts};
