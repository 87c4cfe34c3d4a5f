mod game_collector;
mod game_metadata;

pub use game_collector::GameEventCollector;
pub use game_metadata::GameMetadata;
