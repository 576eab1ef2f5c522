use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::simulation::{
    DEFAULT_CHUNK_SIZE, DEFAULT_TRIALS, DEFAULT_UISP_PERIODS, SimulationConfig,
};
use crate::strength::StrengthModel;

const CACHE_DIR: &str = "league_engine";
const DB_FILE: &str = "league.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub trials: u32,
    /// Fixed seed for reproducible runs; entropy when unset.
    pub seed: Option<u64>,
    pub chunk_size: u32,
    pub uisp_periods: u8,
    pub deadline: Option<Duration>,
    pub strength_model: StrengthModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trials: DEFAULT_TRIALS,
            seed: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            uisp_periods: DEFAULT_UISP_PERIODS,
            deadline: None,
            strength_model: StrengthModel::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            trials: parse_var(&lookup, "MONTE_CARLO_SIMULATIONS").unwrap_or(defaults.trials),
            seed: parse_var(&lookup, "MONTE_CARLO_SEED"),
            chunk_size: parse_var(&lookup, "MONTE_CARLO_CHUNK")
                .unwrap_or(defaults.chunk_size)
                .max(1),
            uisp_periods: parse_var(&lookup, "UISP_SIMULATED_PERIODS")
                .unwrap_or(defaults.uisp_periods)
                .max(1),
            deadline: parse_var::<u64>(&lookup, "MONTE_CARLO_DEADLINE_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            strength_model: lookup("STRENGTH_MODEL")
                .and_then(|raw| StrengthModel::parse(&raw))
                .unwrap_or(defaults.strength_model),
        }
    }

    pub fn with_trials(mut self, trials: u32) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Simulation settings for a run starting now.
    pub fn simulation(&self) -> SimulationConfig {
        SimulationConfig {
            trials: self.trials,
            chunk_size: self.chunk_size,
            uisp_periods: self.uisp_periods,
            deadline: self.deadline.map(|d| Instant::now() + d),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|val| val.trim().parse::<T>().ok())
}

/// `LEAGUE_DB`, else the XDG cache dir, else `~/.cache`.
pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LEAGUE_DB") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR).join(DB_FILE));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR).join(DB_FILE))
}
