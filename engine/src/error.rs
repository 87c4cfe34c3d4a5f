use database::DatabaseError;
use thiserror::Error;
use types::GameError;
use uuid::Uuid;

/// Failures outside a single game operation: setup, config, persistence.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Game {0} stalled: nobody can act and no timer is pending")]
    Stalled(Uuid),
}
