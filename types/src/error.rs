use thiserror::Error;
use uuid::Uuid;

use crate::phase::Phase;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Game not found: {0}")]
    GameNotFound(Uuid),

    #[error("Game has already finished")]
    GameFinished,

    #[error("Not allowed during {actual}, requires {expected}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Caller is not seated in this game")]
    NotAPlayer,

    #[error("Eliminated players cannot act")]
    PlayerEliminated,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Ability already used this round")]
    AlreadyActed,

    #[error("Only the room owner may do this")]
    NotOwner,

    #[error("Caller's role does not permit this action")]
    RoleNotPermitted,

    #[error("Discussion time has not elapsed")]
    DiscussionNotOver,

    #[error("A revenge window is still open")]
    RevengeWindowOpen,

    #[error("No open revenge window for this player")]
    RevengeWindowClosed,

    #[error("Nothing to confirm this round")]
    NothingToConfirm,

    #[error("Player count {0} is outside 3..=20")]
    InvalidPlayerCount(usize),

    #[error("Member {0} already holds a seat")]
    DuplicateMember(Uuid),

    #[error("Roles have already been assigned")]
    RolesAlreadyAssigned,

    #[error("Secure random source unavailable: {0}")]
    SecureRandomUnavailable(String),
}

impl GameError {
    /// Everything except a missing secure random source can be fixed by the
    /// caller retrying with different input or at a different time.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GameError::SecureRandomUnavailable(_))
    }
}
