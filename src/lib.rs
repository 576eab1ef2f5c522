pub mod config;
pub mod engine;
pub mod error;
pub mod import;
pub mod model;
pub mod probability;
pub mod repository;
pub mod scoring;
pub mod simulation;
pub mod sqlite_store;
pub mod standings;
pub mod strength;

pub use config::EngineConfig;
pub use engine::{Engine, ProbabilityRun};
pub use error::{EngineError, IntegrityError, PeriodError, SimulationError};
pub use repository::{MemoryRepository, Repository};
pub use sqlite_store::SqliteRepository;
