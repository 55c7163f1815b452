//! Simulation constants: grid dimensions, market tuning, default timings.
//!
//! Plain numeric constants with no engine dependency. Tunables that a
//! scenario may want to override are mirrored in [`crate::config::SimConfig`].

/// Side length of the square occupancy grid, in cells.
pub const GRID_SIZE: i32 = 64;

pub mod market {
    /// Fraction of demand/supply pressure removed per decay period.
    pub const DECAY_RATE: f64 = 0.1;
    /// Seconds of elapsed simulation time per decay step.
    pub const DECAY_PERIOD_SECONDS: f64 = 30.0;
    /// Price sensitivity to net pressure.
    pub const ALPHA: f64 = 0.4;
    /// Pressure normalisation constant.
    pub const PRESSURE_CAP: f64 = 200.0;
    /// No price ever drops below this.
    pub const PRICE_FLOOR: f64 = 0.1;

    pub const BASE_WOOD: f64 = 1.0;
    pub const BASE_STONE: f64 = 2.0;
    pub const BASE_FOOD: f64 = 1.5;
}

pub mod timing {
    /// Length of one orchestrated tick.
    pub const TICK_SECONDS: f64 = 1.0;
    /// Movement updates are throttled to roughly 15 Hz.
    pub const MOVEMENT_STEP_SECONDS: f64 = 1.0 / 15.0;
    /// Worker walking speed in world units per second.
    pub const WORKER_SPEED: f32 = 1.5;
    /// A moving worker that has not advanced for this long is re-pathed.
    pub const STUCK_THRESHOLD_SECONDS: f64 = 3.0;
    /// Construction progress added per tick by one builder.
    pub const BUILD_PROGRESS_STEP: f64 = 0.2;
}

pub mod population {
    pub const BASE_CAP: u32 = 5;
    pub const RECRUIT_SECONDS: f64 = 10.0;
    pub const RECRUIT_FOOD_COST: f64 = 20.0;
}

/// Starting ledger balances after a full reset.
pub mod baseline {
    pub const WOOD: f64 = 100.0;
    pub const STONE: f64 = 5.0;
    pub const FOOD: f64 = 50.0;
    pub const GOLD: f64 = 100.0;
}
