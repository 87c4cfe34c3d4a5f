use super::{EventLogWriter, GameHandle};
use crate::collectors::GameMetadata;
use crate::{DatabaseError, EventRecord, GameResultRecord};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Writes each event the moment it is recorded.
pub struct StreamingEventWriter {
    pool: SqlitePool,
}

impl StreamingEventWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The stored timeline of a game, in sequence order.
    pub async fn events(&self, handle: GameHandle) -> Result<Vec<EventRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT sequence, round, event_type, message_key, params, created_at FROM game_events WHERE game_id = ? ORDER BY sequence",
        )
        .bind(handle.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let params: String = row.get("params");
                let round: i64 = row.get("round");
                Ok(EventRecord {
                    sequence: row.get("sequence"),
                    round: round as u32,
                    event_type: row.get("event_type"),
                    message_key: row.get("message_key"),
                    params: serde_json::from_str(&params)?,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }
}

pub(crate) async fn insert_player<'e, E>(
    executor: E,
    player_id: Uuid,
    name: &str,
) -> Result<(), DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query("INSERT OR IGNORE INTO players (id, name) VALUES (?, ?)")
        .bind(player_id.to_string())
        .bind(name)
        .execute(executor)
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(())
}

/// Event rows are write-once: a retried sequence number leaves the stored
/// row as it was.
pub(crate) async fn insert_event<'e, E>(
    executor: E,
    game_id: i64,
    event: &EventRecord,
) -> Result<(), DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let params_json = serde_json::to_string(&event.params)?;
    sqlx::query(
        "INSERT OR IGNORE INTO game_events (game_id, sequence, round, event_type, message_key, params, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(game_id)
    .bind(event.sequence)
    .bind(event.round as i64)
    .bind(&event.event_type)
    .bind(&event.message_key)
    .bind(params_json)
    .bind(event.created_at)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(())
}

pub(crate) async fn insert_result<'e, E>(
    executor: E,
    game_id: i64,
    result: &GameResultRecord,
) -> Result<(), DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        "INSERT OR REPLACE INTO game_results (game_id, player_id, role, faction, survived, eliminated_at_round, won) VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(game_id)
    .bind(result.player_id.to_string())
    .bind(&result.role)
    .bind(&result.faction)
    .bind(result.survived)
    .bind(result.eliminated_at_round.map(i64::from))
    .bind(result.won)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(())
}

pub(crate) async fn insert_game<'e, E>(
    executor: E,
    game_meta: &GameMetadata,
) -> Result<i64, DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let player_order_json = serde_json::to_string(&game_meta.player_order)?;
    let configuration_json = game_meta
        .configuration
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let result = sqlx::query(
        "INSERT INTO games (game_uuid, room_id, started_at, num_players, player_order, configuration) VALUES (?, ?, ?, ?, ?, ?)"
    )
    .bind(game_meta.game_id.to_string())
    .bind(game_meta.room_id.to_string())
    .bind(game_meta.started_at)
    .bind(game_meta.num_players as i64)
    .bind(player_order_json)
    .bind(configuration_json)
    .execute(executor)
    .await
    .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(result.last_insert_rowid())
}

pub(crate) async fn delete_events<'e, E>(executor: E, game_id: i64) -> Result<u64, DatabaseError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query("DELETE FROM game_events WHERE game_id = ?")
        .bind(game_id)
        .execute(executor)
        .await
        .map_err(|e| DatabaseError::Query(e.to_string()))?;
    Ok(result.rows_affected())
}

#[async_trait::async_trait]
impl EventLogWriter for StreamingEventWriter {
    async fn record_player(&self, player_id: Uuid, name: &str) -> Result<(), DatabaseError> {
        insert_player(&self.pool, player_id, name).await
    }

    async fn start_game(&self, game_meta: GameMetadata) -> Result<GameHandle, DatabaseError> {
        let game_id = insert_game(&self.pool, &game_meta).await?;
        tracing::debug!(game_id, game = %game_meta.game_id, "started streaming event log");
        Ok(GameHandle::new(game_id))
    }

    async fn record_event(
        &self,
        handle: GameHandle,
        event: &EventRecord,
    ) -> Result<(), DatabaseError> {
        insert_event(&self.pool, handle.as_i64(), event).await
    }

    async fn finish_game(
        &self,
        handle: GameHandle,
        winner: &str,
        results: &[GameResultRecord],
    ) -> Result<(), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        for result in results {
            insert_result(&mut *tx, handle.as_i64(), result).await?;
        }

        let updated = sqlx::query("UPDATE games SET finished_at = ?, winner = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(winner)
            .bind(handle.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::GameNotFound(handle.as_i64()));
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;
        Ok(())
    }

    async fn purge_game(&self, handle: GameHandle) -> Result<u64, DatabaseError> {
        let purged = delete_events(&self.pool, handle.as_i64()).await?;
        tracing::info!(game_id = handle.as_i64(), purged, "purged game events");
        Ok(purged)
    }
}
