use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_DISCUSSION_SECS: u32 = 10;
pub const MAX_DISCUSSION_SECS: u32 = 600;
pub const DEFAULT_DISCUSSION_SECS: u32 = 120;

/// Absolute floor applied to every computed phase deadline.
pub const MIN_PHASE_SECS: i64 = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub discussion_secs: u32,
    /// Room-level override; only honoured when it validates against the
    /// player count at assignment time.
    pub mafia_count: Option<i64>,
    pub enable_sheikh: bool,
    pub enable_girl: bool,
    pub enable_boy: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            discussion_secs: DEFAULT_DISCUSSION_SECS,
            mafia_count: None,
            enable_sheikh: true,
            enable_girl: true,
            enable_boy: true,
        }
    }
}

impl GameSettings {
    /// Plain mafia-vs-citizens game with no optional roles.
    pub fn classic() -> Self {
        Self {
            enable_sheikh: false,
            enable_girl: false,
            enable_boy: false,
            ..Self::default()
        }
    }

    pub fn discussion_duration(&self) -> Duration {
        let secs = self
            .discussion_secs
            .clamp(MIN_DISCUSSION_SECS, MAX_DISCUSSION_SECS);
        if secs != self.discussion_secs {
            log::warn!(
                "Discussion length {}s outside {MIN_DISCUSSION_SECS}..={MAX_DISCUSSION_SECS}, using {secs}s",
                self.discussion_secs
            );
        }
        Duration::seconds(i64::from(secs).max(MIN_PHASE_SECS))
    }
}

/// What the room gateway hands over when it starts a game.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomSettings {
    pub room_id: Uuid,
    pub owner_id: Uuid,
    #[serde(default)]
    pub game: GameSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Uuid,
    pub name: String,
    #[serde(default = "connected_by_default")]
    pub is_connected: bool,
}

fn connected_by_default() -> bool {
    true
}

impl Member {
    pub fn new(user_id: Uuid, name: &str) -> Self {
        Self {
            user_id,
            name: name.to_string(),
            is_connected: true,
        }
    }
}
