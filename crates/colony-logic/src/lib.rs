//! Pure simulation logic for the colony economy.
//!
//! This crate contains the game rules that are independent of the entity
//! store, the tick driver and any renderer. Functions take plain data and
//! return results, which keeps them unit-testable and lets the engine crate
//! and the headless harness share one implementation.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | Building kinds, production rules, upgrades and their modifiers |
//! | [`config`] | Simulation tunables and validation |
//! | [`constants`] | Grid size, market tuning, default timings and baselines |
//! | [`grid`] | Occupancy grid, world/grid conversion, A* pathfinding |
//! | [`market`] | Supply/demand pricing with exponential pressure decay |
//! | [`population`] | Population aggregate and recruitment countdown |
//! | [`resources`] | Resource kinds and the colony resource ledger |

pub mod catalog;
pub mod config;
pub mod constants;
pub mod grid;
pub mod market;
pub mod population;
pub mod resources;
