use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timeline entry as stored. `params` only ever holds what the event
/// already discloses publicly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: i64,
    pub round: u32,
    pub event_type: String,
    pub message_key: String,
    pub params: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResultRecord {
    pub player_id: Uuid,
    pub role: String,
    pub faction: String,
    pub survived: bool,
    pub eliminated_at_round: Option<u32>,
    pub won: bool,
}
