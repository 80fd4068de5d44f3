use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::simulation::{DEFAULT_MAP_HEIGHT, DEFAULT_MAP_WIDTH, MAX_COLONIES};

/// Relative weights used when drawing a job for a newly spawned ant.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct JobWeights {
    pub worker: u32,
    pub builder: u32,
    pub scout: u32,
    pub soldier: u32,
}

impl Default for JobWeights {
    fn default() -> Self {
        Self {
            worker: 6,
            builder: 1,
            scout: 2,
            soldier: 1,
        }
    }
}

impl JobWeights {
    pub fn total(&self) -> u32 {
        self.worker + self.builder + self.scout + self.soldier
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for the simulation RNG. A fixed seed reproduces a run exactly.
    pub seed: u64,
    pub map_width: u32,
    pub map_height: u32,
    pub colony_initial_population: u32,
    /// Food withdrawn from the stockpile per spawned ant.
    pub spawn_food_cost: u32,
    pub max_colonies: usize,
    pub job_weights: JobWeights,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0xA17,
            map_width: DEFAULT_MAP_WIDTH,
            map_height: DEFAULT_MAP_HEIGHT,
            colony_initial_population: 100,
            spawn_food_cost: 5,
            max_colonies: MAX_COLONIES,
            job_weights: JobWeights::default(),
        }
    }
}

/// Loads the simulation configuration from a TOML file or uses defaults.
pub fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            let config: SimulationConfig = toml::from_str(&content)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            info!(path = %path.display(), "loaded config");
            Ok(config)
        }
        None => {
            info!("no config file provided, using defaults");
            Ok(SimulationConfig::default())
        }
    }
}
