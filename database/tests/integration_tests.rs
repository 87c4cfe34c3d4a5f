//! Event log writers against an in-memory SQLite database with the real
//! schema applied.

use std::sync::Arc;

use chrono::Utc;
use database::{
    run_migrations, BulkEventWriter, DatabaseConfig, EventLogWriter, EventRecord, GameHandle,
    GameMetadata, GameResultRecord, NoopRecorder, StreamingEventWriter,
};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use uuid::Uuid;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool).await.expect("Failed to migrate");
    pool
}

fn metadata(players: &[Uuid]) -> GameMetadata {
    GameMetadata {
        game_id: Uuid::new_v4(),
        room_id: Uuid::new_v4(),
        started_at: Utc::now(),
        num_players: players.len(),
        player_order: players.to_vec(),
        configuration: Some(serde_json::json!({"discussion_secs": 120})),
    }
}

fn event(sequence: i64, event_type: &str, params: serde_json::Value) -> EventRecord {
    EventRecord {
        sequence,
        round: 1,
        event_type: event_type.to_string(),
        message_key: format!("game.event.{event_type}"),
        params,
        created_at: Utc::now(),
    }
}

fn results(players: &[Uuid]) -> Vec<GameResultRecord> {
    players
        .iter()
        .enumerate()
        .map(|(i, id)| GameResultRecord {
            player_id: *id,
            role: if i == 0 { "mafia" } else { "citizen" }.to_string(),
            faction: if i == 0 { "mafia" } else { "citizens" }.to_string(),
            survived: i != 2,
            eliminated_at_round: (i == 2).then_some(1),
            won: i == 0,
        })
        .collect()
}

async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query(sql)
        .fetch_one(pool)
        .await
        .expect("count query")
        .get(0)
}

#[tokio::test]
async fn test_streaming_writer_persists_immediately() {
    let pool = setup_test_db().await;
    let writer = StreamingEventWriter::new(pool.clone());
    let players = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    for (i, id) in players.iter().enumerate() {
        writer.record_player(*id, &format!("P{i}")).await.unwrap();
    }
    let handle = writer.start_game(metadata(&players)).await.unwrap();

    writer
        .record_event(handle, &event(0, "phase_changed", serde_json::json!({"to": "card_distribution"})))
        .await
        .unwrap();
    writer
        .record_event(handle, &event(1, "roles_assigned", serde_json::json!({"players": "3"})))
        .await
        .unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 2);

    let stored = writer.events(handle).await.unwrap();
    assert_eq!(stored[1].event_type, "roles_assigned");
    assert_eq!(stored[1].params["players"], "3");

    writer.finish_game(handle, "mafia", &results(&players)).await.unwrap();
    let row = sqlx::query("SELECT winner, finished_at FROM games WHERE id = ?")
        .bind(handle.as_i64())
        .fetch_one(&pool)
        .await
        .unwrap();
    let winner: String = row.get("winner");
    assert_eq!(winner, "mafia");
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_results").await, 3);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM players").await, 3);
}

#[tokio::test]
async fn test_streaming_rewrite_of_sequence_is_idempotent() {
    let pool = setup_test_db().await;
    let writer = StreamingEventWriter::new(pool.clone());
    let handle = writer.start_game(metadata(&[Uuid::new_v4()])).await.unwrap();
    let record = event(0, "phase_changed", serde_json::json!({}));
    writer.record_event(handle, &record).await.unwrap();
    writer.record_event(handle, &record).await.unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 1);
}

#[tokio::test]
async fn test_streaming_retry_keeps_the_first_write() {
    let pool = setup_test_db().await;
    let writer = StreamingEventWriter::new(pool.clone());
    let handle = writer.start_game(metadata(&[Uuid::new_v4()])).await.unwrap();
    writer
        .record_event(handle, &event(0, "player_voted", serde_json::json!({"target": "Ann"})))
        .await
        .unwrap();
    writer
        .record_event(handle, &event(0, "player_voted", serde_json::json!({"target": "Bob"})))
        .await
        .unwrap();

    let stored = writer.events(handle).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].params["target"], "Ann");
}

#[tokio::test]
async fn test_streaming_finish_of_unknown_game_fails() {
    let writer = StreamingEventWriter::new(setup_test_db().await);
    let err = writer
        .finish_game(GameHandle::new(99), "citizens", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, database::DatabaseError::GameNotFound(99)));
}

#[tokio::test]
async fn test_bulk_writer_flushes_once_at_finish() {
    let pool = setup_test_db().await;
    let writer = BulkEventWriter::new(pool.clone());
    let players = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    for (i, id) in players.iter().enumerate() {
        writer.record_player(*id, &format!("P{i}")).await.unwrap();
    }
    let first = writer.start_game(metadata(&players)).await.unwrap();
    let second = writer.start_game(metadata(&players)).await.unwrap();
    assert_ne!(first, second);

    for seq in 0..4 {
        writer
            .record_event(first, &event(seq, "phase_changed", serde_json::json!({})))
            .await
            .unwrap();
    }
    assert_eq!(writer.pending_events(first).await, 4);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 0);

    writer.finish_game(first, "citizens", &results(&players)).await.unwrap();
    assert_eq!(writer.pending_events(first).await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 4);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM players").await, 3);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM games WHERE winner = 'citizens'").await,
        1
    );
}

#[tokio::test]
async fn test_purge_removes_events_but_keeps_results() {
    let pool = setup_test_db().await;
    let writer = StreamingEventWriter::new(pool.clone());
    let players = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let handle = writer.start_game(metadata(&players)).await.unwrap();
    for seq in 0..3 {
        writer
            .record_event(handle, &event(seq, "player_eliminated", serde_json::json!({})))
            .await
            .unwrap();
    }
    writer.finish_game(handle, "mafia", &results(&players)).await.unwrap();

    assert_eq!(writer.purge_game(handle).await.unwrap(), 3);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_events").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM game_results").await, 3);
}

#[tokio::test]
async fn test_bulk_purge_after_flush() {
    let pool = setup_test_db().await;
    let writer = BulkEventWriter::new(pool.clone());
    let handle = writer.start_game(metadata(&[Uuid::new_v4()])).await.unwrap();
    writer
        .record_event(handle, &event(0, "game_finished", serde_json::json!({"winner": "mafia"})))
        .await
        .unwrap();
    writer.finish_game(handle, "mafia", &[]).await.unwrap();
    assert_eq!(writer.purge_game(handle).await.unwrap(), 1);
    assert!(writer.purge_game(handle).await.is_err());
}

#[tokio::test]
async fn test_writers_as_shared_trait_objects() {
    let config = DatabaseConfig::from_cli_or_env_or_yaml(Some("sqlite::memory:".to_string()), None);
    let writers: Vec<Arc<dyn EventLogWriter>> = vec![
        config.connect_writer().await.unwrap(),
        config
            .clone()
            .with_mode(database::WriterMode::Bulk)
            .connect_writer()
            .await
            .unwrap(),
        Arc::new(NoopRecorder),
    ];
    for writer in writers {
        let handle = writer.start_game(metadata(&[Uuid::new_v4()])).await.unwrap();
        writer
            .record_event(handle, &event(0, "phase_changed", serde_json::json!({})))
            .await
            .unwrap();
        writer.finish_game(handle, "citizens", &[]).await.unwrap();
    }
}

#[tokio::test]
async fn test_bulk_interleaved_games_keep_their_players() {
    let pool = setup_test_db().await;
    let writer = BulkEventWriter::new(pool.clone());
    let first = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let second = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

    // both rosters are recorded before either game is opened
    for (i, id) in first.iter().enumerate() {
        writer.record_player(*id, &format!("A{i}")).await.unwrap();
    }
    for (i, id) in second.iter().enumerate() {
        writer.record_player(*id, &format!("B{i}")).await.unwrap();
    }
    let first_handle = writer.start_game(metadata(&first)).await.unwrap();
    let second_handle = writer.start_game(metadata(&second)).await.unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM players").await, 6);

    writer
        .record_event(second_handle, &event(0, "phase_changed", serde_json::json!({})))
        .await
        .unwrap();
    writer
        .finish_game(second_handle, "citizens", &results(&second))
        .await
        .unwrap();

    let joined = count(
        &pool,
        "SELECT COUNT(*) FROM game_results r JOIN players p ON p.id = r.player_id",
    )
    .await;
    assert_eq!(joined, 3);
    assert_eq!(writer.pending_events(first_handle).await, 0);
    writer
        .finish_game(first_handle, "mafia", &results(&first))
        .await
        .unwrap();
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM players").await, 6);
}
