//! Simulation engine - main entry point for running the simulation

use std::io::{Read, Write};
use std::sync::Arc;

use colony_logic::catalog::{Catalog, CatalogError};
use colony_logic::config::{validate_config, ConfigError, SimConfig};
use colony_logic::market::TradeGood;
use thiserror::Error;

use crate::commands::{self, Command, CommandResult};
use crate::components::{Entity, EntityId};
use crate::context::SimContext;
use crate::events::SimEvent;
use crate::persistence::{self, SaveError};
use crate::scheduler::{FrameThrottle, Scheduler};
use crate::snapshot::SimSnapshot;
use crate::systems::*;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ConfigError>),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main simulation engine
///
/// Two independent drivers feed it time: [`ColonySim::advance`] from a
/// fixed-interval timer and [`ColonySim::frame`] from the render loop.
/// Commands run between driver calls and never inside a tick.
pub struct ColonySim {
    ctx: SimContext,
    scheduler: Scheduler,
    throttle: FrameThrottle,
}

/// Resource, task and production systems, in that order.
pub fn tick_scheduler(config: &SimConfig) -> Scheduler {
    Scheduler::new(config.tick_seconds)
        .with_system("resource", resource_system)
        .with_system("task", task_system)
        .with_system("production", production_system)
}

impl ColonySim {
    /// Create a simulation with the built-in catalog, already reset.
    pub fn new(config: SimConfig) -> Result<Self, EngineError> {
        Self::with_catalog(config, Catalog::default())
    }

    pub fn with_catalog(config: SimConfig, catalog: Catalog) -> Result<Self, EngineError> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            return Err(EngineError::Config(errors));
        }
        catalog.validate()?;
        Ok(Self::from_context(SimContext::new(config, Arc::new(catalog))))
    }

    fn from_context(ctx: SimContext) -> Self {
        Self {
            scheduler: tick_scheduler(&ctx.config),
            throttle: FrameThrottle::new(ctx.config.movement_step_seconds),
            ctx,
        }
    }

    /// Back to the starting roster and baseline ledgers.
    pub fn reset(&mut self) {
        self.ctx.reset();
        self.scheduler.reset();
        self.throttle.reset();
    }

    /// Run exactly one orchestrated tick.
    pub fn tick(&mut self) {
        self.scheduler.run_tick(&mut self.ctx);
    }

    /// Feed timer time; runs every whole tick it covers.
    pub fn advance(&mut self, elapsed: f64) -> u32 {
        self.scheduler.advance(&mut self.ctx, elapsed)
    }

    /// Feed one rendered frame. Returns true if movement was committed.
    pub fn frame(&mut self, delta: f64) -> bool {
        match self.throttle.accumulate(delta) {
            Some(elapsed) => {
                movement_system(&mut self.ctx, elapsed);
                true
            }
            None => false,
        }
    }

    /// Drive both clocks for `seconds` in frames of `frame_seconds`.
    pub fn run_for(&mut self, seconds: f64, frame_seconds: f64) {
        if !(frame_seconds.is_finite() && frame_seconds > 0.0) {
            return;
        }
        let frames = (seconds / frame_seconds).round().max(0.0) as u64;
        for _ in 0..frames {
            self.frame(frame_seconds);
            self.advance(frame_seconds);
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    pub fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    pub fn tick_count(&self) -> u64 {
        self.ctx.tick
    }

    pub fn sim_time(&self) -> f64 {
        self.ctx.sim_time
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.ctx.store.get(&EntityId::from(id))
    }

    pub fn price(&self, good: TradeGood) -> f64 {
        self.ctx.market.price(good)
    }

    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot::capture(&self.ctx)
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.ctx.drain_events()
    }

    // ── Commands ────────────────────────────────────────────────────────

    pub fn execute(&mut self, command: &Command) -> CommandResult {
        commands::execute(&mut self.ctx, command)
    }

    pub fn build(&mut self, kind: &str, x: f32, z: f32) -> CommandResult {
        self.execute(&Command::Build {
            kind: kind.to_string(),
            x,
            z,
        })
    }

    pub fn upgrade(&mut self, building_id: &str, upgrade_id: &str) -> CommandResult {
        self.execute(&Command::Upgrade {
            building: EntityId::from(building_id),
            upgrade: upgrade_id.to_string(),
        })
    }

    pub fn assign(&mut self, building_id: &str) -> CommandResult {
        self.execute(&Command::Assign {
            building: EntityId::from(building_id),
        })
    }

    pub fn unassign(&mut self, building_id: &str) -> CommandResult {
        self.execute(&Command::Unassign {
            building: EntityId::from(building_id),
        })
    }

    pub fn buy(&mut self, good: TradeGood, amount: f64) -> CommandResult {
        self.execute(&Command::Buy { good, amount })
    }

    pub fn sell(&mut self, good: TradeGood, amount: f64) -> CommandResult {
        self.execute(&Command::Sell { good, amount })
    }

    pub fn recruit(&mut self) -> CommandResult {
        self.execute(&Command::Recruit)
    }

    // ── Persistence ─────────────────────────────────────────────────────

    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_context(writer, &self.ctx)
    }

    /// Replace the running simulation with a saved one.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let ctx = persistence::load_context(reader)?;
        *self = Self::from_context(ctx);
        Ok(())
    }

    pub fn save_json<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        persistence::save_context_json(writer, &self.ctx)
    }

    pub fn load_json<R: Read>(&mut self, reader: R) -> Result<(), SaveError> {
        let ctx = persistence::load_context_json(reader)?;
        *self = Self::from_context(ctx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_config() {
        let config = SimConfig {
            tick_seconds: 0.0,
            worker_speed: -1.0,
            ..SimConfig::default()
        };
        match ColonySim::new(config) {
            Err(EngineError::Config(errors)) => assert_eq!(errors.len(), 2),
            _ => panic!("expected config errors"),
        }
    }

    #[test]
    fn test_rejects_bad_catalog() {
        let mut catalog = Catalog::default();
        if let Some(upgrade) = catalog.upgrades.get_mut("irrigation") {
            upgrade.mods.insert("yield:+".to_string(), 2.0);
        }
        assert!(matches!(
            ColonySim::with_catalog(SimConfig::default(), catalog),
            Err(EngineError::Catalog(_))
        ));
    }

    #[test]
    fn test_tick_order_is_fixed() {
        let sim = ColonySim::new(SimConfig::default()).unwrap();
        assert_eq!(
            sim.scheduler.system_names(),
            vec!["resource", "task", "production"]
        );
    }

    #[test]
    fn test_frame_is_throttled() {
        let mut sim = ColonySim::new(SimConfig::default()).unwrap();
        let committed = (0..60).filter(|_| sim.frame(1.0 / 60.0)).count();
        assert_eq!(committed, 15);
    }

    #[test]
    fn test_reset_restores_roster() {
        let mut sim = ColonySim::new(SimConfig::default()).unwrap();
        assert!(sim.build("house", 4.0, 4.0).success);
        sim.run_for(5.0, 0.1);
        sim.reset();
        assert_eq!(sim.tick_count(), 0);
        assert_eq!(sim.context().store.len(), 5);
        assert_eq!(sim.context().resources.wood, 100.0);
        assert!(sim.entity("house1").is_none());
    }
}
