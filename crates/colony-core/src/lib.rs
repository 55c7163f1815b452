//! Colony Core - tick-driven colony economy simulation engine
//!
//! Workers walk a 64×64 grid to farms, forests and mines, turn working
//! time into resources, and build new buildings; a small market prices
//! wood, stone and food from supply and demand.
//!
//! # Architecture
//!
//! All state lives in one [`context::SimContext`] that is passed explicitly
//! to every system and command:
//! - **Entities**: workers and buildings, one tagged type, held in a
//!   copy-on-write store keyed by stable string ids
//! - **Systems**: resource → task → production once per tick, movement
//!   once per throttled frame
//! - **Commands**: validated, atomic player actions
//!
//! # Example
//!
//! ```rust,no_run
//! use colony_core::prelude::*;
//!
//! let mut sim = ColonySim::new(SimConfig::default()).expect("valid config");
//! let result = sim.assign("farm1");
//! assert!(result.success);
//!
//! loop {
//!     sim.frame(1.0 / 60.0);
//!     sim.advance(1.0 / 60.0);
//! }
//! ```

pub mod commands;
pub mod components;
pub mod context;
pub mod engine;
pub mod events;
pub mod persistence;
pub mod scheduler;
pub mod snapshot;
pub mod systems;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::commands::{Command, CommandResult};
    pub use crate::components::*;
    pub use crate::engine::ColonySim;
    pub use crate::events::SimEvent;
    pub use crate::snapshot::SimSnapshot;
    pub use colony_logic::config::SimConfig;
    pub use colony_logic::market::TradeGood;
}
