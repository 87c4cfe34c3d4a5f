use async_trait::async_trait;
use uuid::Uuid;

use super::game_handle::GameHandle;
use crate::{collectors::GameMetadata, DatabaseError, EventRecord, GameResultRecord};

/// Append-only sink for game timelines. Shared between tasks, so every
/// method takes `&self`.
#[async_trait]
pub trait EventLogWriter: Send + Sync {
    async fn record_player(&self, player_id: Uuid, name: &str) -> Result<(), DatabaseError>;
    async fn start_game(&self, game_meta: GameMetadata) -> Result<GameHandle, DatabaseError>;
    async fn record_event(
        &self,
        handle: GameHandle,
        event: &EventRecord,
    ) -> Result<(), DatabaseError>;
    async fn finish_game(
        &self,
        handle: GameHandle,
        winner: &str,
        results: &[GameResultRecord],
    ) -> Result<(), DatabaseError>;
    /// Drops a game's timeline. Returns how many events went.
    async fn purge_game(&self, handle: GameHandle) -> Result<u64, DatabaseError>;
}
