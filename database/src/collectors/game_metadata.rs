use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub game_id: Uuid,
    pub room_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub num_players: usize,
    /// Player ids in seat order.
    pub player_order: Vec<Uuid>,
    pub configuration: Option<serde_json::Value>,
}
