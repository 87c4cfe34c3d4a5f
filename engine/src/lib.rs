pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod event_log;
pub mod scheduler;
pub mod simulation;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, PlayerConfig, StrategyKind};
pub use coordinator::Coordinator;
pub use error::EngineError;
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use simulation::{run_game, Seat, Simulation};
pub use store::GameStore;
pub use types;
