use std::path::Path;

use database::WriterMode;
use serde::{Deserialize, Serialize};
use strategies::{DefaultStrategy, InputStrategy, RandomStrategy};
use types::{GameSettings, Strategy};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Default,
    Random,
    Input,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Default => Box::<DefaultStrategy>::default(),
            StrategyKind::Random => Box::<RandomStrategy>::default(),
            StrategyKind::Input => Box::<InputStrategy>::default(),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(StrategyKind::Default),
            "random" => Ok(StrategyKind::Random),
            "input" | "human" => Ok(StrategyKind::Input),
            other => Err(EngineError::Config(format!("unknown strategy {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl std::str::FromStr for PlayerConfig {
    type Err = EngineError;

    /// `name` or `name=strategy`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, strategy) = match s.split_once('=') {
            Some((name, strategy)) => (name, strategy.parse()?),
            None => (s, StrategyKind::Default),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Config(format!("player {s:?} has no name")));
        }
        Ok(Self {
            name: name.to_string(),
            strategy,
        })
    }
}

/// Everything a simulation run needs, usually read from a YAML file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub game: GameSettings,
    pub players: Vec<PlayerConfig>,
    pub database_url: Option<String>,
    pub writer_mode: WriterMode,
    /// Seeds a ChaCha20 stream instead of OS randomness. Simulations only.
    pub seed: Option<u64>,
    pub delay_ms: Option<u64>,
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&yaml)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
