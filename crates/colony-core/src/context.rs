//! Simulation context: the single owner of all mutable simulation state.
//!
//! Systems and command handlers receive `&mut SimContext` explicitly; there
//! is no ambient global state. The helpers here are the shared vocabulary
//! those callers use to keep worker ↔ building back-references consistent.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use colony_logic::catalog::{BuildingKind, Catalog};
use colony_logic::config::SimConfig;
use colony_logic::grid::{Grid, GridCell};
use colony_logic::market::Market;
use colony_logic::population::PopulationLedger;
use colony_logic::resources::{ResourceKind, ResourceLedger};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::events::SimEvent;
use crate::world::ObjectStore;

/// Events kept for observers that never drain the queue.
pub const MAX_PENDING_EVENTS: usize = 4096;

/// Hands out `"<prefix><n>"` ids, counting from 1 per prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdAllocator {
    counters: BTreeMap<String, u32>,
}

impl IdAllocator {
    pub fn next(&mut self, prefix: &str) -> EntityId {
        let n = self.counters.entry(prefix.to_string()).or_insert(0);
        *n += 1;
        EntityId(format!("{prefix}{n}"))
    }
}

#[derive(Debug, Clone)]
pub struct SimContext {
    pub config: SimConfig,
    pub catalog: Arc<Catalog>,
    pub store: ObjectStore,
    pub resources: ResourceLedger,
    pub population: PopulationLedger,
    pub market: Market,
    pub grid: Grid,
    /// Simulation seconds elapsed since reset.
    pub sim_time: f64,
    /// Completed orchestrated ticks since reset.
    pub tick: u64,
    /// Pending observer events, oldest first. Bounded by [`MAX_PENDING_EVENTS`].
    pub events: VecDeque<SimEvent>,
    pub(crate) rng: StdRng,
    pub(crate) ids: IdAllocator,
}

impl SimContext {
    /// Fresh context with the starting roster in place.
    pub fn new(config: SimConfig, catalog: Arc<Catalog>) -> Self {
        let mut ctx = Self {
            grid: Grid::new(config.grid_size),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            catalog,
            store: ObjectStore::new(),
            resources: ResourceLedger::baseline(),
            population: PopulationLedger::default(),
            market: Market::new(0.0),
            sim_time: 0.0,
            tick: 0,
            events: VecDeque::new(),
            ids: IdAllocator::default(),
        };
        ctx.reset();
        ctx
    }

    /// Full-state reset: three idle workers, one farm, one forest, baseline
    /// ledgers.
    pub fn reset(&mut self) {
        self.store.clear();
        self.grid = Grid::new(self.config.grid_size);
        self.ids = IdAllocator::default();
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.resources = ResourceLedger::baseline();
        self.market = Market::new(0.0);
        self.sim_time = 0.0;
        self.tick = 0;
        self.events.clear();

        for pos in [Vec3::ground(0.0, 0.0), Vec3::ground(1.0, 0.0), Vec3::ground(0.0, 1.0)] {
            self.spawn_worker(pos);
        }
        self.spawn_building(BuildingKind::Farm, Vec3::ground(-6.0, 4.0), true);
        self.spawn_building(BuildingKind::Forest, Vec3::ground(8.0, -5.0), true);

        self.population = PopulationLedger::new(self.idle_worker_count(), self.population_cap());
        log::info!("simulation reset: {} entities", self.store.len());
    }

    /// Queue an event. The oldest event is dropped once the queue is full.
    pub fn emit(&mut self, event: SimEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain(..).collect()
    }

    // ── Spawning ────────────────────────────────────────────────────────

    pub fn spawn_worker(&mut self, position: Vec3) -> EntityId {
        let id = self.ids.next("worker");
        self.store.push(Entity {
            id: id.clone(),
            position,
            upgrades: Vec::new(),
            body: EntityBody::Worker(Worker::default()),
        });
        id
    }

    /// Place a building on the grid cell under `position` and block that cell.
    pub fn spawn_building(&mut self, kind: BuildingKind, position: Vec3, complete: bool) -> EntityId {
        let id = self.ids.next(kind.as_str());
        let cell = self.cell_of(&position);
        let (wx, wz) = self.grid.cell_to_world(cell);
        self.grid.set_blocked(cell.x, cell.z);

        let (capacity, stock, storage_max) = match self.catalog.building(kind) {
            Some(spec) => (
                self.catalog.effective_jobs(kind, &[]),
                spec.stock.clone(),
                spec.storage_max(),
            ),
            None => (0, Default::default(), Default::default()),
        };
        let storage = storage_max.keys().map(|&r| (r, 0.0)).collect();

        self.store.push(Entity {
            id: id.clone(),
            position: Vec3::new(wx, position.y, wz),
            upgrades: Vec::new(),
            body: EntityBody::Building(Building {
                kind,
                capacity,
                assigned_workers: Vec::new(),
                stock,
                storage,
                storage_max,
                progress: if complete { 1.0 } else { 0.0 },
            }),
        });
        id
    }

    // ── Paths ───────────────────────────────────────────────────────────

    pub fn cell_of(&self, position: &Vec3) -> GridCell {
        self.grid.world_to_cell(position.x, position.z)
    }

    /// Path from `from` to the nearest walkable cell at or next to `to`.
    pub fn plan_path(&self, from: &Vec3, to: &Vec3) -> Vec<GridCell> {
        let start = self.cell_of(from);
        let goal = self
            .grid
            .find_nearest_walkable(self.cell_of(to), self.config.nearest_walkable_radius);
        self.grid.find_path(start, goal)
    }

    /// Whether `from` already stands on the cell a path to `to` would end at.
    fn at_destination(&self, from: &Vec3, to: &Vec3) -> bool {
        let start = self.grid.clamp_cell(self.cell_of(from));
        let goal = self
            .grid
            .find_nearest_walkable(self.cell_of(to), self.config.nearest_walkable_radius);
        start == goal
    }

    /// Start a worker walking toward `target`. A worker already there starts
    /// working; an unreachable target leaves it moving with no path, which
    /// the movement system's stuck check resolves.
    pub fn send_worker(&mut self, worker_id: &EntityId, target: Vec3) {
        let Some(from) = self.store.get(worker_id).map(|e| e.position) else {
            return;
        };
        let path = self.plan_path(&from, &target);
        let arrived = path.is_empty() && self.at_destination(&from, &target);
        self.store.modify(worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.stuck_timer = 0.0;
                if arrived {
                    w.begin_work();
                } else {
                    w.state = WorkerState::Moving;
                    w.path = path.into();
                }
            }
        });
    }

    // ── Assignment ──────────────────────────────────────────────────────

    /// Link an idle worker to a production building and send it there.
    /// Callers have already checked capacity and idleness.
    pub fn assign_worker(&mut self, worker_id: &EntityId, building_id: &EntityId) {
        let Some(building) = self.store.get(building_id) else {
            return;
        };
        let target = building.position;
        let Some(resource) = building
            .building()
            .and_then(|b| self.catalog.effective_production(b.kind, &building.upgrades))
            .map(|p| p.resource)
        else {
            return;
        };

        self.store.modify(building_id, |e| {
            if let Some(b) = e.building_mut() {
                b.assigned_workers.push(worker_id.clone());
            }
        });
        self.store.modify(worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.assigned_target = Some(building_id.clone());
                w.task = Some(Task::Gather {
                    resource,
                    target: building_id.clone(),
                });
            }
        });
        self.send_worker(worker_id, target);
    }

    /// Unlink the most recently assigned worker of a building and return it
    /// to idle.
    pub fn release_last_worker(&mut self, building_id: &EntityId) -> Option<EntityId> {
        let worker_id = self
            .store
            .modify(building_id, |e| e.building_mut().and_then(|b| b.assigned_workers.pop()))
            .flatten()?;
        self.store.modify(&worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.release();
            }
        });
        Some(worker_id)
    }

    /// Send a worker to build the site at `target_pos`.
    pub fn start_construction(&mut self, worker_id: &EntityId, blueprint: BuildingKind, target_pos: Vec3) {
        self.store.modify(worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.task = Some(Task::Build {
                    blueprint,
                    target_pos,
                });
            }
        });
        self.send_worker(worker_id, target_pos);
    }

    // ── Queries ─────────────────────────────────────────────────────────

    /// Nearest idle worker to `position`; ties go to the earlier entity.
    pub fn nearest_idle_worker(&self, position: &Vec3) -> Option<EntityId> {
        self.store
            .iter()
            .filter(|e| e.worker().map(|w| w.is_idle()).unwrap_or(false))
            .min_by(|a, b| {
                a.position
                    .distance_xz(position)
                    .total_cmp(&b.position.distance_xz(position))
            })
            .map(|e| e.id.clone())
    }

    /// Nearest completed production building with a free job slot.
    pub fn nearest_open_production(&self, position: &Vec3) -> Option<EntityId> {
        self.store
            .iter()
            .filter(|e| {
                e.building()
                    .map(|b| {
                        b.is_complete()
                            && b.has_free_slot()
                            && self
                                .catalog
                                .building(b.kind)
                                .map(|s| s.is_production())
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
            })
            .min_by(|a, b| {
                a.position
                    .distance_xz(position)
                    .total_cmp(&b.position.distance_xz(position))
            })
            .map(|e| e.id.clone())
    }

    /// Nearest construction site no worker is building.
    pub fn nearest_unattended_site(&self, position: &Vec3) -> Option<(BuildingKind, Vec3)> {
        let attended: Vec<Vec3> = self
            .store
            .iter()
            .filter_map(|e| match e.worker()?.task {
                Some(Task::Build { target_pos, .. }) => Some(target_pos),
                _ => None,
            })
            .collect();
        self.store
            .iter()
            .filter_map(|e| {
                let b = e.building()?;
                let unattended = !b.is_complete()
                    && !attended.iter().any(|p| p.same_ground_point(&e.position));
                unattended.then_some((b.kind, e.position))
            })
            .min_by(|(_, a), (_, b)| a.distance_xz(position).total_cmp(&b.distance_xz(position)))
    }

    pub fn idle_worker_count(&self) -> u32 {
        self.store
            .iter()
            .filter(|e| e.worker().map(|w| w.is_idle()).unwrap_or(false))
            .count() as u32
    }

    /// Base cap plus the housing of every completed building.
    pub fn population_cap(&self) -> u32 {
        let housing: u32 = self
            .store
            .iter()
            .filter_map(|e| e.building())
            .filter(|b| b.is_complete())
            .filter_map(|b| self.catalog.building(b.kind))
            .map(|s| s.housing)
            .sum();
        self.config.base_population_cap + housing
    }

    /// Aggregate storage for `resource` over completed buildings, or `None`
    /// when no building stores it (the resource is then uncapped).
    pub fn storage_cap(&self, resource: ResourceKind) -> Option<f64> {
        self.store
            .iter()
            .filter_map(|e| e.building())
            .filter(|b| b.is_complete())
            .filter_map(|b| b.storage_max.get(&resource))
            .fold(None, |acc, max| Some(acc.unwrap_or(0.0) + max))
    }

    /// Spread ledger totals over storage buildings in store order.
    pub fn refresh_storage(&mut self) {
        let mut remaining: BTreeMap<ResourceKind, f64> = ResourceKind::ALL
            .iter()
            .map(|&r| (r, self.resources.get(r).max(0.0)))
            .collect();
        let ids = self.store.ids_where(|e| {
            e.building()
                .map(|b| b.is_complete() && !b.storage_max.is_empty())
                .unwrap_or(false)
        });
        for id in ids {
            self.store.modify(&id, |e| {
                if let Some(b) = e.building_mut() {
                    for (&r, &max) in &b.storage_max {
                        let left = remaining.entry(r).or_insert(0.0);
                        let fill = left.min(max);
                        *left -= fill;
                        b.storage.insert(r, fill);
                    }
                }
            });
        }
    }
}
