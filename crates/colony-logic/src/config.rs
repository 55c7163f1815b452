//! Simulation tunables and their validation.
//!
//! ```
//! use colony_logic::config::{validate_config, SimConfig};
//!
//! let config = SimConfig::default();
//! assert!(validate_config(&config).is_empty());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{population, timing, GRID_SIZE};

/// Tunable parameters for one simulation instance.
/// Missing fields fall back to [`SimConfig::default`] when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Side length of the occupancy grid.
    pub grid_size: i32,
    /// Fixed period of the orchestrated tick, in seconds.
    pub tick_seconds: f64,
    /// Minimum accumulated frame time before the movement system commits.
    pub movement_step_seconds: f64,
    /// Worker walking speed (world units per second).
    pub worker_speed: f32,
    /// Seconds without progress before a moving worker is re-pathed.
    pub stuck_threshold_seconds: f64,
    /// Construction progress per tick per builder.
    pub build_progress_step: f64,
    /// Search radius used when a path target cell is blocked.
    pub nearest_walkable_radius: i32,
    /// Whether the task system sweeps idle workers onto free job slots.
    pub auto_assign_idle: bool,
    pub recruit_seconds: f64,
    pub recruit_food_cost: f64,
    /// Population cap before any housing is built.
    pub base_population_cap: u32,
    /// Seed for recruit placement.
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            tick_seconds: timing::TICK_SECONDS,
            movement_step_seconds: timing::MOVEMENT_STEP_SECONDS,
            worker_speed: timing::WORKER_SPEED,
            stuck_threshold_seconds: timing::STUCK_THRESHOLD_SECONDS,
            build_progress_step: timing::BUILD_PROGRESS_STEP,
            nearest_walkable_radius: 3,
            auto_assign_idle: true,
            recruit_seconds: population::RECRUIT_SECONDS,
            recruit_food_cost: population::RECRUIT_FOOD_COST,
            base_population_cap: population::BASE_CAP,
            seed: 0x5eed,
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("grid size {0} is outside 2..=256")]
    GridSize(i32),
    #[error("tick interval must be positive, got {0}")]
    TickSeconds(f64),
    #[error("movement step must be positive, got {0}")]
    MovementStep(f64),
    #[error("worker speed must be positive, got {0}")]
    WorkerSpeed(f32),
    #[error("stuck threshold must be positive, got {0}")]
    StuckThreshold(f64),
    #[error("build progress step must be in (0, 1], got {0}")]
    BuildProgressStep(f64),
    #[error("nearest-walkable radius must not be negative, got {0}")]
    WalkableRadius(i32),
    #[error("recruit time must not be negative, got {0}")]
    RecruitSeconds(f64),
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &SimConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if !(2..=256).contains(&config.grid_size) {
        errors.push(ConfigError::GridSize(config.grid_size));
    }
    if !positive(config.tick_seconds) {
        errors.push(ConfigError::TickSeconds(config.tick_seconds));
    }
    if !positive(config.movement_step_seconds) {
        errors.push(ConfigError::MovementStep(config.movement_step_seconds));
    }
    if !(config.worker_speed.is_finite() && config.worker_speed > 0.0) {
        errors.push(ConfigError::WorkerSpeed(config.worker_speed));
    }
    if !positive(config.stuck_threshold_seconds) {
        errors.push(ConfigError::StuckThreshold(config.stuck_threshold_seconds));
    }
    if !positive(config.build_progress_step) || config.build_progress_step > 1.0 {
        errors.push(ConfigError::BuildProgressStep(config.build_progress_step));
    }
    if config.nearest_walkable_radius < 0 {
        errors.push(ConfigError::WalkableRadius(config.nearest_walkable_radius));
    }
    if !(config.recruit_seconds.is_finite() && config.recruit_seconds >= 0.0) {
        errors.push(ConfigError::RecruitSeconds(config.recruit_seconds));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&SimConfig::default()).is_empty());
    }

    #[test]
    fn test_collects_every_error() {
        let config = SimConfig {
            grid_size: 1,
            tick_seconds: 0.0,
            worker_speed: -1.0,
            build_progress_step: 1.5,
            ..Default::default()
        };
        let errors = validate_config(&config);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ConfigError::GridSize(1)));
        assert!(errors.contains(&ConfigError::TickSeconds(0.0)));
    }

    #[test]
    fn test_nan_tick_rejected() {
        let config = SimConfig {
            tick_seconds: f64::NAN,
            ..Default::default()
        };
        assert_eq!(validate_config(&config).len(), 1);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: SimConfig =
            serde_json::from_str(r#"{ "auto_assign_idle": false, "seed": 7 }"#).unwrap();
        assert!(!parsed.auto_assign_idle);
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.grid_size, GRID_SIZE);
        assert_eq!(parsed.tick_seconds, timing::TICK_SECONDS);
    }
}
