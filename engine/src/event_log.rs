use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use database::{
    retry::BoxedAttempt, retry_with_backoff, EventLogWriter, EventRecord, GameHandle,
    GameMetadata, GameResultRecord, NoopRecorder, RetryPolicy,
};
use types::{GameEvent, GameState};
use uuid::Uuid;

/// Forwards committed events to the event log writer. Failures here are
/// retried, then logged; they never reach the player who caused them.
pub struct EventLog {
    writer: Arc<dyn EventLogWriter>,
    handles: Mutex<HashMap<Uuid, GameHandle>>,
    policy: RetryPolicy,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(Arc::new(NoopRecorder))
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("games", &self.lock().len())
            .field("policy", &self.policy)
            .finish()
    }
}

pub fn to_record(event: &GameEvent) -> EventRecord {
    EventRecord {
        sequence: event.sequence as i64,
        round: event.round,
        event_type: event.kind.as_str().to_string(),
        message_key: event.message_key.clone(),
        params: serde_json::Value::Object(
            event
                .params
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        ),
        created_at: event.created_at,
    }
}

/// Final standings, one row per seat. Only built once roles are public.
pub fn results(state: &GameState) -> Vec<GameResultRecord> {
    let winner = state.winner();
    state
        .players()
        .iter()
        .filter_map(|p| {
            let role = p.role()?;
            Some(GameResultRecord {
                player_id: p.id,
                role: role.to_string(),
                faction: role.faction().to_string(),
                survived: p.is_alive(),
                eliminated_at_round: p.eliminated_at_round(),
                won: winner == Some(role.faction()),
            })
        })
        .collect()
}

impl EventLog {
    pub fn new(writer: Arc<dyn EventLogWriter>) -> Self {
        Self {
            writer,
            handles: Mutex::new(HashMap::new()),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Registers the seats and opens the game's timeline.
    pub async fn open(&self, state: &GameState) {
        for player in state.players() {
            let writer = self.writer.clone();
            let (id, name) = (player.id, player.name.clone());
            let recorded = retry_with_backoff(
                move || {
                    let (writer, name) = (writer.clone(), name.clone());
                    Box::pin(async move { writer.record_player(id, &name).await })
                        as BoxedAttempt<_, _>
                },
                self.policy,
            )
            .await;
            if let Err(err) = recorded {
                log::warn!("Could not record player {id}: {err}");
            }
        }

        let meta = GameMetadata {
            game_id: state.id(),
            room_id: state.game().room_id,
            started_at: state.game().started_at,
            num_players: state.players().len(),
            player_order: state.players().iter().map(|p| p.id).collect(),
            configuration: serde_json::to_value(state.settings()).ok(),
        };
        let writer = self.writer.clone();
        let opened = retry_with_backoff(
            move || {
                let (writer, meta) = (writer.clone(), meta.clone());
                Box::pin(async move { writer.start_game(meta).await }) as BoxedAttempt<_, _>
            },
            self.policy,
        )
        .await;
        match opened {
            Ok(handle) => {
                self.lock().insert(state.id(), handle);
            }
            Err(err) => log::error!("Event log unavailable for game {}: {err}", state.id()),
        }
    }

    pub async fn append(&self, game_id: Uuid, events: &[GameEvent]) {
        let Some(handle) = self.handle(game_id) else {
            return;
        };
        for event in events {
            let record = to_record(event);
            let writer = self.writer.clone();
            let written = retry_with_backoff(
                move || {
                    let (writer, record) = (writer.clone(), record.clone());
                    Box::pin(async move { writer.record_event(handle, &record).await })
                        as BoxedAttempt<_, _>
                },
                self.policy,
            )
            .await;
            if let Err(err) = written {
                log::error!(
                    "Dropped {} event #{} for game {game_id}: {err}",
                    event.kind.as_str(),
                    event.sequence
                );
            }
        }
    }

    pub async fn close(&self, game_id: Uuid, winner: String, results: Vec<GameResultRecord>) {
        let Some(handle) = self.handle(game_id) else {
            return;
        };
        let writer = self.writer.clone();
        let closed = retry_with_backoff(
            move || {
                let (writer, winner, results) = (writer.clone(), winner.clone(), results.clone());
                Box::pin(async move { writer.finish_game(handle, &winner, &results).await })
                    as BoxedAttempt<_, _>
            },
            self.policy,
        )
        .await;
        if let Err(err) = closed {
            log::error!("Could not close event log for game {game_id}: {err}");
        }
    }

    /// Bulk-deletes the timeline of a torn down game.
    pub async fn purge(&self, game_id: Uuid) -> u64 {
        let handle = self.lock().remove(&game_id);
        let Some(handle) = handle else {
            return 0;
        };
        match self.writer.purge_game(handle).await {
            Ok(purged) => purged,
            Err(err) => {
                log::warn!("Could not purge events of game {game_id}: {err}");
                0
            }
        }
    }

    fn handle(&self, game_id: Uuid) -> Option<GameHandle> {
        self.lock().get(&game_id).copied()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, GameHandle>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
