//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for compact binary saves; JSON is offered for inspection
//! and hand-edited scenarios. Both carry a format version.

use std::io::{Read, Write};
use std::sync::Arc;

use colony_logic::catalog::Catalog;
use colony_logic::config::{validate_config, SimConfig};
use colony_logic::grid::Grid;
use colony_logic::market::Market;
use colony_logic::population::PopulationLedger;
use colony_logic::resources::ResourceLedger;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::Entity;
use crate::context::{IdAllocator, SimContext};
use crate::world::ObjectStore;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable copy of a simulation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    pub config: SimConfig,
    pub catalog: Catalog,
    pub sim_time: f64,
    pub tick: u64,
    pub entities: Vec<Entity>,
    pub resources: ResourceLedger,
    pub population: PopulationLedger,
    pub market: Market,
    pub grid: Grid,
    pub ids: IdAllocator,
}

impl SaveData {
    pub fn capture(ctx: &SimContext) -> Self {
        Self {
            version: SAVE_VERSION,
            config: ctx.config.clone(),
            catalog: ctx.catalog.as_ref().clone(),
            sim_time: ctx.sim_time,
            tick: ctx.tick,
            entities: ctx.store.to_vec(),
            resources: ctx.resources,
            population: ctx.population,
            market: ctx.market.clone(),
            grid: ctx.grid.clone(),
            ids: ctx.ids.clone(),
        }
    }

    /// Rebuild a context. The event queue starts empty and the RNG is
    /// reseeded from the config seed and the saved tick.
    pub fn restore(self) -> Result<SimContext, SaveError> {
        if self.version != SAVE_VERSION {
            return Err(SaveError::VersionMismatch {
                expected: SAVE_VERSION,
                found: self.version,
            });
        }
        self.check()?;
        let mut store = ObjectStore::new();
        store.replace(self.entities);
        Ok(SimContext {
            rng: StdRng::seed_from_u64(self.config.seed ^ self.tick),
            config: self.config,
            catalog: Arc::new(self.catalog),
            store,
            resources: self.resources,
            population: self.population,
            market: self.market,
            grid: self.grid,
            sim_time: self.sim_time,
            tick: self.tick,
            events: Default::default(),
            ids: self.ids,
        })
    }

    /// The same checks `ColonySim::new` applies, plus consistency between
    /// the grid, the catalog and the saved entities.
    fn check(&self) -> Result<(), SaveError> {
        let config_errors = validate_config(&self.config);
        if !config_errors.is_empty() {
            let reasons: Vec<String> = config_errors.iter().map(|e| e.to_string()).collect();
            return Err(SaveError::Invalid(format!("config: {}", reasons.join("; "))));
        }
        self.catalog
            .validate()
            .map_err(|e| SaveError::Invalid(format!("catalog: {e}")))?;
        if !self.grid.is_well_formed() || self.grid.size() != self.config.grid_size {
            return Err(SaveError::Invalid(format!(
                "grid does not match configured size {}",
                self.config.grid_size
            )));
        }
        for entity in &self.entities {
            if let Some(building) = entity.building() {
                if self.catalog.building(building.kind).is_none() {
                    return Err(SaveError::Invalid(format!(
                        "{}: building kind {} is not in the catalog",
                        entity.id, building.kind
                    )));
                }
            }
            if let Some(unknown) = entity
                .upgrades
                .iter()
                .find(|id| self.catalog.upgrade(id.as_str()).is_none())
            {
                return Err(SaveError::Invalid(format!(
                    "{}: unknown upgrade {unknown}",
                    entity.id
                )));
            }
        }
        Ok(())
    }
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("Invalid save: {0}")]
    Invalid(String),
}

/// Save the complete simulation to a writer
pub fn save_context<W: Write>(writer: W, ctx: &SimContext) -> Result<(), SaveError> {
    bincode::serialize_into(writer, &SaveData::capture(ctx))?;
    Ok(())
}

pub fn load_context<R: Read>(reader: R) -> Result<SimContext, SaveError> {
    let data: SaveData = bincode::deserialize_from(reader)?;
    data.restore()
}

pub fn save_context_json<W: Write>(writer: W, ctx: &SimContext) -> Result<(), SaveError> {
    serde_json::to_writer_pretty(writer, &SaveData::capture(ctx))?;
    Ok(())
}

pub fn load_context_json<R: Read>(reader: R) -> Result<SimContext, SaveError> {
    let data: SaveData = serde_json::from_reader(reader)?;
    data.restore()
}
