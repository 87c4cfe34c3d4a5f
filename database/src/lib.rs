pub mod collectors;
pub mod config;
pub mod error;
pub mod models;
pub mod retry;
pub mod writers;

pub use collectors::{GameEventCollector, GameMetadata};
pub use config::{DatabaseConfig, WriterMode};
pub use error::DatabaseError;
pub use models::{EventRecord, GameResultRecord};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use writers::{BulkEventWriter, EventLogWriter, GameHandle, StreamingEventWriter};

use uuid::Uuid;

pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))
}

// NoopRecorder for when the event log is not persisted
#[derive(Debug, Default)]
pub struct NoopRecorder;

#[async_trait::async_trait]
impl EventLogWriter for NoopRecorder {
    async fn record_player(&self, _player_id: Uuid, _name: &str) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn start_game(&self, _game_meta: GameMetadata) -> Result<GameHandle, DatabaseError> {
        Ok(GameHandle::new(0))
    }

    async fn record_event(
        &self,
        _handle: GameHandle,
        _event: &EventRecord,
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn finish_game(
        &self,
        _handle: GameHandle,
        _winner: &str,
        _results: &[GameResultRecord],
    ) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn purge_game(&self, _handle: GameHandle) -> Result<u64, DatabaseError> {
        Ok(0)
    }
}
