use super::GameMetadata;
use crate::{EventRecord, GameResultRecord};

/// Everything one game wrote to the log, held until the game ends.
#[derive(Debug, Clone)]
pub struct GameEventCollector {
    pub metadata: GameMetadata,
    pub events: Vec<EventRecord>,
    pub results: Vec<GameResultRecord>,
}

impl GameEventCollector {
    pub fn new(metadata: GameMetadata) -> Self {
        Self {
            metadata,
            events: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Re-recording a sequence number replaces the earlier copy.
    pub fn add_event(&mut self, event: EventRecord) {
        self.events.retain(|e| e.sequence != event.sequence);
        self.events.push(event);
    }

    pub fn add_result(&mut self, result: GameResultRecord) {
        self.results.push(result);
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn results(&self) -> &[GameResultRecord] {
        &self.results
    }
}
