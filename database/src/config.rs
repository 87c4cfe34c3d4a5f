use std::{str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::{
    error::DatabaseError,
    run_migrations,
    writers::{BulkEventWriter, EventLogWriter, StreamingEventWriter},
};

pub const IN_MEMORY_URL: &str = "sqlite::memory:";

/// Streaming writes every event as it happens; bulk holds a game in memory
/// and writes it in one transaction when the game ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterMode {
    #[default]
    Streaming,
    Bulk,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub mode: WriterMode,
}

impl DatabaseConfig {
    pub fn from_cli_or_env_or_yaml(cli_arg: Option<String>, yaml_config: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else if let Some(yaml) = yaml_config {
            yaml
        } else {
            IN_MEMORY_URL.to_string()
        };

        Self {
            url,
            pool_size: 20,
            mode: WriterMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: WriterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url == IN_MEMORY_URL || self.url.contains(":memory:")
    }

    pub async fn create_pool(&self) -> Result<sqlx::SqlitePool, DatabaseError> {
        // every connection to :memory: is its own database
        let (options, pool_size) = if self.is_in_memory() {
            (SqliteConnectOptions::from_str(IN_MEMORY_URL), 1)
        } else {
            let path = self.url.trim_start_matches("sqlite://");
            (
                Ok(SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)),
                self.pool_size,
            )
        };
        let options = options.map_err(|e| DatabaseError::Connection(e.to_string()))?;
        SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_with(options.foreign_keys(true))
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))
    }

    /// Opens the pool, brings the schema up to date and builds the writer
    /// for `mode`.
    pub async fn connect_writer(&self) -> Result<Arc<dyn EventLogWriter>, DatabaseError> {
        let pool = self.create_pool().await?;
        run_migrations(&pool).await?;
        tracing::info!(url = %self.url, mode = ?self.mode, "event log ready");
        Ok(match self.mode {
            WriterMode::Streaming => Arc::new(StreamingEventWriter::new(pool)),
            WriterMode::Bulk => Arc::new(BulkEventWriter::new(pool)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_beats_yaml() {
        let config = DatabaseConfig::from_cli_or_env_or_yaml(
            Some("games.db".to_string()),
            Some("other.db".to_string()),
        );
        assert_eq!(config.url, "games.db");
        assert!(!config.is_in_memory());
        assert_eq!(config.mode, WriterMode::Streaming);
    }

    #[test]
    fn test_writer_mode_from_yaml_name() {
        let mode: WriterMode = serde_json::from_str("\"bulk\"").unwrap();
        assert_eq!(mode, WriterMode::Bulk);
    }
}
