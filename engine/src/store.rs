use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use types::{Effects, GameError, GameState};
use uuid::Uuid;

/// The transactional boundary for every game. Writers work on a copy of the
/// aggregate; the copy replaces the stored one only if the closure succeeds,
/// so a rejected call leaves nothing behind.
#[derive(Debug, Default)]
pub struct GameStore {
    games: Mutex<HashMap<Uuid, GameState>>,
}

impl GameStore {
    pub fn insert(&self, state: GameState) {
        self.lock().insert(state.id(), state);
    }

    pub fn transact<T, F>(&self, game_id: Uuid, f: F) -> Result<(T, Effects), GameError>
    where
        F: FnOnce(&mut GameState) -> Result<T, GameError>,
    {
        let mut games = self.lock();
        let stored = games
            .get_mut(&game_id)
            .ok_or(GameError::GameNotFound(game_id))?;
        let mut draft = stored.clone();
        let value = f(&mut draft)?;
        let effects = draft.drain_effects();
        *stored = draft;
        Ok((value, effects))
    }

    pub fn read<T, F>(&self, game_id: Uuid, f: F) -> Result<T, GameError>
    where
        F: FnOnce(&GameState) -> T,
    {
        let games = self.lock();
        games
            .get(&game_id)
            .map(f)
            .ok_or(GameError::GameNotFound(game_id))
    }

    pub fn remove(&self, game_id: Uuid) -> Option<GameState> {
        self.lock().remove(&game_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // a panic inside a closure only ever touched a draft
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, GameState>> {
        self.games.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
