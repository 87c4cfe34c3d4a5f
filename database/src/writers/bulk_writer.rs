use std::collections::HashMap;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    streaming_writer::{delete_events, insert_event, insert_game, insert_player, insert_result},
    EventLogWriter, GameHandle,
};
use crate::collectors::{GameEventCollector, GameMetadata};
use crate::{DatabaseError, EventRecord, GameResultRecord};
use sqlx::SqlitePool;

#[derive(Default)]
struct BulkState {
    active_games: HashMap<GameHandle, GameEventCollector>,
    /// Handle of a flushed game to its row id.
    saved_games: HashMap<GameHandle, i64>,
    next_game_id: i64,
}

/// Keeps each game in memory and writes it in one transaction at the end.
/// Player rows are shared by every game, so they go straight to the pool.
pub struct BulkEventWriter {
    pool: SqlitePool,
    state: Mutex<BulkState>,
}

impl BulkEventWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            state: Mutex::new(BulkState {
                next_game_id: 1,
                ..BulkState::default()
            }),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Events collected so far for a game that hasn't been flushed.
    pub async fn pending_events(&self, handle: GameHandle) -> usize {
        let state = self.state.lock().await;
        state
            .active_games
            .get(&handle)
            .map_or(0, |collector| collector.events().len())
    }

    async fn save_collector(
        &self,
        collector: &GameEventCollector,
        winner: &str,
    ) -> Result<i64, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        let game_id = insert_game(&mut *tx, &collector.metadata).await?;
        for event in collector.events() {
            insert_event(&mut *tx, game_id, event).await?;
        }
        for result in collector.results() {
            insert_result(&mut *tx, game_id, result).await?;
        }

        sqlx::query("UPDATE games SET finished_at = ?, winner = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(winner)
            .bind(game_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        tracing::info!(
            game_id,
            events = collector.events().len(),
            "flushed game event log"
        );
        Ok(game_id)
    }
}

#[async_trait::async_trait]
impl EventLogWriter for BulkEventWriter {
    async fn record_player(&self, player_id: Uuid, name: &str) -> Result<(), DatabaseError> {
        insert_player(&self.pool, player_id, name).await
    }

    async fn start_game(&self, game_meta: GameMetadata) -> Result<GameHandle, DatabaseError> {
        let mut state = self.state.lock().await;
        let handle = GameHandle::new(state.next_game_id);
        state.next_game_id += 1;
        state
            .active_games
            .insert(handle, GameEventCollector::new(game_meta));
        Ok(handle)
    }

    async fn record_event(
        &self,
        handle: GameHandle,
        event: &EventRecord,
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        match state.active_games.get_mut(&handle) {
            Some(collector) => {
                collector.add_event(event.clone());
                Ok(())
            }
            None => Err(DatabaseError::GameNotFound(handle.as_i64())),
        }
    }

    async fn finish_game(
        &self,
        handle: GameHandle,
        winner: &str,
        results: &[GameResultRecord],
    ) -> Result<(), DatabaseError> {
        let mut state = self.state.lock().await;
        let Some(collector) = state.active_games.get_mut(&handle) else {
            return Err(DatabaseError::GameNotFound(handle.as_i64()));
        };
        collector.results.clear();
        for result in results {
            collector.add_result(result.clone());
        }
        let collector = collector.clone();
        // stays active on failure so a retry can flush it again
        let game_id = self.save_collector(&collector, winner).await?;
        state.active_games.remove(&handle);
        state.saved_games.insert(handle, game_id);
        Ok(())
    }

    async fn purge_game(&self, handle: GameHandle) -> Result<u64, DatabaseError> {
        let mut state = self.state.lock().await;
        if let Some(collector) = state.active_games.remove(&handle) {
            return Ok(collector.events().len() as u64);
        }
        let Some(&game_id) = state.saved_games.get(&handle) else {
            return Err(DatabaseError::GameNotFound(handle.as_i64()));
        };
        let purged = delete_events(&self.pool, game_id).await?;
        state.saved_games.remove(&handle);
        Ok(purged)
    }
}
