//! Command interface - validated, atomic operations issued by the UI.
//!
//! Every handler validates against the current context before touching it,
//! and [`run_staged`] runs handlers on a copy that is committed only on
//! success. A failed or panicking command therefore leaves the simulation
//! exactly as it was. Failures surface as a [`CommandResult`], never as an
//! error or panic past this module.

use std::panic::{self, AssertUnwindSafe};

use colony_logic::catalog::BuildingKind;
use colony_logic::market::TradeGood;
use colony_logic::resources::{amounts, ResourceAmounts, ResourceKind, ResourceLedger};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::{EntityId, Vec3};
use crate::context::SimContext;
use crate::systems::land_recruit;

/// Outcome of a command, as shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Validation failures. Rendered into a failed [`CommandResult`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown building type '{0}'")]
    UnknownBuildingType(String),
    #[error("{0} cannot be built")]
    NotBuildable(BuildingKind),
    #[error("position ({x}, {z}) is outside the map")]
    OutOfBounds { x: f32, z: f32 },
    #[error("grid cell ({x}, {z}) is already occupied")]
    CellOccupied { x: i32, z: i32 },
    #[error("unknown upgrade '{0}'")]
    UnknownUpgrade(String),
    #[error("upgrade '{upgrade}' applies to {parent}, not {kind}")]
    UpgradeParentMismatch {
        upgrade: String,
        parent: BuildingKind,
        kind: BuildingKind,
    },
    #[error("upgrade '{upgrade}' is already applied to {building}")]
    UpgradeAlreadyApplied { upgrade: String, building: EntityId },
    #[error("not enough {resource}: need {needed:.1}, have {available:.1}")]
    Insufficient {
        resource: ResourceKind,
        needed: f64,
        available: f64,
    },
    #[error("no entity with id '{0}'")]
    EntityNotFound(EntityId),
    #[error("{0} is not a building")]
    NotABuilding(EntityId),
    #[error("{0} is still under construction")]
    UnderConstruction(EntityId),
    #[error("{0} has no jobs")]
    NoJobSlots(EntityId),
    #[error("{building} is at capacity ({capacity} workers)")]
    AtCapacity { building: EntityId, capacity: u32 },
    #[error("no idle worker available")]
    NoIdleWorker,
    #[error("{0} has no assigned workers")]
    NoAssignedWorker(EntityId),
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),
    #[error("population cap of {0} reached")]
    PopulationCap(u32),
    #[error("a recruit is already on the way")]
    RecruitInProgress,
}

/// Data form of the command surface, for scripts and harnesses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Build { kind: String, x: f32, z: f32 },
    Upgrade { building: EntityId, upgrade: String },
    Assign { building: EntityId },
    Unassign { building: EntityId },
    Buy { good: TradeGood, amount: f64 },
    Sell { good: TradeGood, amount: f64 },
    Recruit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Build { .. } => "build",
            Command::Upgrade { .. } => "upgrade",
            Command::Assign { .. } => "assign",
            Command::Unassign { .. } => "unassign",
            Command::Buy { .. } => "buy",
            Command::Sell { .. } => "sell",
            Command::Recruit => "recruit",
        }
    }
}

type Handled = Result<String, CommandError>;

/// Run `handler` on a staged copy of `ctx`, committing the copy only when
/// the handler succeeds. Panics are caught, logged and reported as failures.
pub fn run_staged<F>(ctx: &mut SimContext, name: &str, handler: F) -> CommandResult
where
    F: FnOnce(&mut SimContext) -> Handled,
{
    let mut staged = ctx.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| handler(&mut staged))) {
        Ok(Ok(message)) => {
            *ctx = staged;
            log::info!("{name}: {message}");
            CommandResult::ok(message)
        }
        Ok(Err(err)) => {
            log::debug!("{name} rejected: {err}");
            CommandResult::fail(err.to_string())
        }
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{name} panicked: {detail}");
            CommandResult::fail(format!("{name} failed: internal error"))
        }
    }
}

/// Dispatch a data-form command through [`run_staged`].
pub fn execute(ctx: &mut SimContext, command: &Command) -> CommandResult {
    run_staged(ctx, command.name(), |ctx| match command {
        Command::Build { kind, x, z } => build(ctx, kind, *x, *z),
        Command::Upgrade { building, upgrade: id } => upgrade(ctx, building, id),
        Command::Assign { building } => assign(ctx, building),
        Command::Unassign { building } => unassign(ctx, building),
        Command::Buy { good, amount } => buy(ctx, *good, *amount),
        Command::Sell { good, amount } => sell(ctx, *good, *amount),
        Command::Recruit => recruit(ctx),
    })
}

fn check_cost(ledger: &ResourceLedger, cost: &ResourceAmounts) -> Result<(), CommandError> {
    match ledger.shortfall(cost) {
        Some((resource, needed, available)) => Err(CommandError::Insufficient {
            resource,
            needed,
            available,
        }),
        None => Ok(()),
    }
}

fn check_amount(amount: f64) -> Result<(), CommandError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(CommandError::InvalidAmount(amount))
    }
}

/// Pay for and place a construction site at world (x, z), then send the
/// nearest idle worker to build it.
pub fn build(ctx: &mut SimContext, kind: &str, x: f32, z: f32) -> Handled {
    let kind: BuildingKind = kind
        .parse()
        .map_err(|_| CommandError::UnknownBuildingType(kind.to_string()))?;
    let spec = ctx
        .catalog
        .building(kind)
        .ok_or_else(|| CommandError::UnknownBuildingType(kind.to_string()))?;
    if !spec.buildable {
        return Err(CommandError::NotBuildable(kind));
    }
    let cost = spec.cost.clone();

    let cell = ctx.grid.world_to_cell(x, z);
    if !x.is_finite() || !z.is_finite() || !ctx.grid.in_bounds(cell.x, cell.z) {
        return Err(CommandError::OutOfBounds { x, z });
    }
    if !ctx.grid.is_walkable(cell.x, cell.z) {
        return Err(CommandError::CellOccupied {
            x: cell.x,
            z: cell.z,
        });
    }
    check_cost(&ctx.resources, &cost)?;

    ctx.resources.deduct(&cost);
    let id = ctx.spawn_building(kind, Vec3::ground(x, z), false);
    let site = ctx.store.get(&id).map(|e| e.position).unwrap_or_default();
    match ctx.nearest_idle_worker(&site) {
        Some(worker) => {
            ctx.start_construction(&worker, kind, site);
            Ok(format!("{id} placed, {worker} is building it"))
        }
        None => Ok(format!("{id} placed, waiting for a free worker")),
    }
}

/// Buy an upgrade for a building and apply its job-slot modifiers.
pub fn upgrade(ctx: &mut SimContext, building_id: &EntityId, upgrade_id: &str) -> Handled {
    let spec = ctx
        .catalog
        .upgrade(upgrade_id)
        .ok_or_else(|| CommandError::UnknownUpgrade(upgrade_id.to_string()))?
        .clone();
    let entity = ctx
        .store
        .get(building_id)
        .ok_or_else(|| CommandError::EntityNotFound(building_id.clone()))?;
    let building = entity
        .building()
        .ok_or_else(|| CommandError::NotABuilding(building_id.clone()))?;
    if building.kind != spec.parent {
        return Err(CommandError::UpgradeParentMismatch {
            upgrade: upgrade_id.to_string(),
            parent: spec.parent,
            kind: building.kind,
        });
    }
    if entity.upgrades.iter().any(|u| u == upgrade_id) {
        return Err(CommandError::UpgradeAlreadyApplied {
            upgrade: upgrade_id.to_string(),
            building: building_id.clone(),
        });
    }
    if !building.is_complete() {
        return Err(CommandError::UnderConstruction(building_id.clone()));
    }
    check_cost(&ctx.resources, &spec.cost)?;

    let kind = building.kind;
    let mut upgrades = entity.upgrades.clone();
    upgrades.push(upgrade_id.to_string());
    let capacity = ctx.catalog.effective_jobs(kind, &upgrades);

    ctx.resources.deduct(&spec.cost);
    let excess = ctx
        .store
        .modify(building_id, |e| {
            e.upgrades = upgrades;
            e.building_mut().map(|b| {
                b.capacity = capacity;
                b.assigned_workers.len().saturating_sub(capacity as usize)
            })
        })
        .flatten()
        .unwrap_or(0);
    for _ in 0..excess {
        ctx.release_last_worker(building_id);
    }
    Ok(format!("{upgrade_id} applied to {building_id}"))
}

/// Send the nearest idle worker to work at a production building.
pub fn assign(ctx: &mut SimContext, building_id: &EntityId) -> Handled {
    let entity = ctx
        .store
        .get(building_id)
        .ok_or_else(|| CommandError::EntityNotFound(building_id.clone()))?;
    let building = entity
        .building()
        .ok_or_else(|| CommandError::NotABuilding(building_id.clone()))?;
    if !building.is_complete() {
        return Err(CommandError::UnderConstruction(building_id.clone()));
    }
    let produces = ctx
        .catalog
        .building(building.kind)
        .map(|s| s.is_production())
        .unwrap_or(false);
    if !produces || building.capacity == 0 {
        return Err(CommandError::NoJobSlots(building_id.clone()));
    }
    if !building.has_free_slot() {
        return Err(CommandError::AtCapacity {
            building: building_id.clone(),
            capacity: building.capacity,
        });
    }
    let worker = ctx
        .nearest_idle_worker(&entity.position)
        .ok_or(CommandError::NoIdleWorker)?;

    ctx.assign_worker(&worker, building_id);
    Ok(format!("{worker} assigned to {building_id}"))
}

/// Return the most recently assigned worker of a building to idle.
pub fn unassign(ctx: &mut SimContext, building_id: &EntityId) -> Handled {
    let entity = ctx
        .store
        .get(building_id)
        .ok_or_else(|| CommandError::EntityNotFound(building_id.clone()))?;
    if entity.building().is_none() {
        return Err(CommandError::NotABuilding(building_id.clone()));
    }
    let worker = ctx
        .release_last_worker(building_id)
        .ok_or_else(|| CommandError::NoAssignedWorker(building_id.clone()))?;
    Ok(format!("{worker} unassigned from {building_id}"))
}

/// Buy goods for gold. Purchases are not limited by storage.
pub fn buy(ctx: &mut SimContext, good: TradeGood, amount: f64) -> Handled {
    check_amount(amount)?;
    let quote = ctx.market.quote(good, amount);
    check_cost(&ctx.resources, &amounts(&[(ResourceKind::Gold, quote)]))?;

    let now = ctx.sim_time;
    let cost = ctx.market.buy_resource(good, amount, now);
    ctx.resources.add(ResourceKind::Gold, -cost);
    ctx.resources.add(good.resource(), amount);
    Ok(format!("bought {amount} {good} for {cost:.2} gold"))
}

/// Sell goods for gold.
pub fn sell(ctx: &mut SimContext, good: TradeGood, amount: f64) -> Handled {
    check_amount(amount)?;
    check_cost(&ctx.resources, &amounts(&[(good.resource(), amount)]))?;

    let now = ctx.sim_time;
    let revenue = ctx.market.sell_resource(good, amount, now);
    ctx.resources.add(good.resource(), -amount);
    ctx.resources.add(ResourceKind::Gold, revenue);
    Ok(format!("sold {amount} {good} for {revenue:.2} gold"))
}

/// Pay food to start recruiting one worker.
pub fn recruit(ctx: &mut SimContext) -> Handled {
    let cap = ctx.population_cap();
    if ctx.store.worker_count() as u32 >= cap {
        return Err(CommandError::PopulationCap(cap));
    }
    if ctx.population.is_recruiting() {
        return Err(CommandError::RecruitInProgress);
    }
    let cost = amounts(&[(ResourceKind::Food, ctx.config.recruit_food_cost)]);
    check_cost(&ctx.resources, &cost)?;

    ctx.resources.deduct(&cost);
    let seconds = ctx.config.recruit_seconds;
    if seconds <= 0.0 {
        let worker = land_recruit(ctx).ok_or(CommandError::PopulationCap(cap))?;
        return Ok(format!("{worker} recruited"));
    }
    ctx.population.start_recruit(seconds);
    Ok(format!("recruit arrives in {seconds} s"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::WorkerState;
    use colony_logic::catalog::Catalog;
    use colony_logic::config::SimConfig;
    use std::sync::Arc;

    fn ctx() -> SimContext {
        SimContext::new(SimConfig::default(), Arc::new(Catalog::default()))
    }

    fn farm() -> EntityId {
        EntityId::from("farm1")
    }

    #[test]
    fn test_build_deducts_and_dispatches_builder() {
        let mut ctx = ctx();
        let result = execute(
            &mut ctx,
            &Command::Build {
                kind: "house".into(),
                x: 4.0,
                z: 4.0,
            },
        );
        assert!(result.success, "{}", result.message);
        assert_eq!(ctx.resources.wood, 70.0);
        let house = ctx.store.get(&EntityId::from("house1")).unwrap();
        assert_eq!(house.building().unwrap().progress, 0.0);
        let cell = ctx.cell_of(&house.position);
        assert!(!ctx.grid.is_walkable(cell.x, cell.z));
        assert_eq!(ctx.idle_worker_count(), 2);
    }

    #[test]
    fn test_build_rejections() {
        let mut ctx = ctx();
        let before = ctx.resources;
        let cases = [
            ("castle", 4.0, 4.0),
            ("forest", 4.0, 4.0),
            ("house", 500.0, 0.0),
            ("house", -6.0, 4.0),
            ("mine", 5.0, 5.0),
        ];
        for (kind, x, z) in cases {
            let result = execute(
                &mut ctx,
                &Command::Build {
                    kind: kind.into(),
                    x,
                    z,
                },
            );
            assert!(!result.success, "{kind} at ({x}, {z}) should fail");
        }
        assert_eq!(ctx.resources, before);
        assert_eq!(ctx.store.len(), 5);
    }

    #[test]
    fn test_assign_until_capacity() {
        let mut ctx = ctx();
        assert!(execute(&mut ctx, &Command::Assign { building: farm() }).success);
        assert!(execute(&mut ctx, &Command::Assign { building: farm() }).success);
        let third = execute(&mut ctx, &Command::Assign { building: farm() });
        assert!(!third.success);
        assert!(third.message.contains("capacity"));

        assert!(execute(&mut ctx, &Command::Unassign { building: farm() }).success);
        assert!(execute(&mut ctx, &Command::Assign { building: farm() }).success);
    }

    #[test]
    fn test_assign_needs_production_building() {
        let mut ctx = ctx();
        let house = ctx.spawn_building(BuildingKind::House, Vec3::ground(3.0, 3.0), true);
        assert!(!execute(&mut ctx, &Command::Assign { building: house }).success);
        let worker = EntityId::from("worker1");
        assert!(!execute(&mut ctx, &Command::Assign { building: worker }).success);
        assert!(!execute(&mut ctx, &Command::Assign { building: EntityId::from("nope") }).success);
    }

    #[test]
    fn test_assign_without_idle_worker() {
        let mut ctx = ctx();
        for e in ctx.store.ids_where(|e| e.is_worker()) {
            ctx.store
                .modify(&e, |e| e.worker_mut().unwrap().state = WorkerState::Working);
        }
        let result = execute(&mut ctx, &Command::Assign { building: farm() });
        assert_eq!(result.message, CommandError::NoIdleWorker.to_string());
    }

    #[test]
    fn test_unassign_empty_building_fails() {
        let mut ctx = ctx();
        assert!(!execute(&mut ctx, &Command::Unassign { building: farm() }).success);
    }

    #[test]
    fn test_upgrade_rules() {
        let mut ctx = ctx();
        let forest = EntityId::from("forest1");
        let mismatch = execute(
            &mut ctx,
            &Command::Upgrade {
                building: forest,
                upgrade: "irrigation".into(),
            },
        );
        assert!(!mismatch.success);

        let ok = execute(
            &mut ctx,
            &Command::Upgrade {
                building: farm(),
                upgrade: "irrigation".into(),
            },
        );
        assert!(ok.success, "{}", ok.message);
        assert_eq!(ctx.resources.wood, 70.0);
        assert_eq!(ctx.resources.gold, 80.0);

        let again = execute(
            &mut ctx,
            &Command::Upgrade {
                building: farm(),
                upgrade: "irrigation".into(),
            },
        );
        assert!(!again.success);
        assert_eq!(ctx.store.get(&farm()).unwrap().upgrades, vec!["irrigation".to_string()]);
    }

    #[test]
    fn test_jobs_upgrade_raises_capacity() {
        let mut ctx = ctx();
        assert!(upgrade(&mut ctx, &farm(), "extra_plots").is_ok());
        assert_eq!(ctx.store.get(&farm()).unwrap().building().unwrap().capacity, 3);
    }

    #[test]
    fn test_buy_and_sell_move_gold() {
        let mut ctx = ctx();
        assert!(buy(&mut ctx, TradeGood::Wood, 10.0).is_ok());
        assert_eq!(ctx.resources.wood, 110.0);
        assert!((ctx.resources.gold - 90.0).abs() < 1e-9);

        assert!(sell(&mut ctx, TradeGood::Stone, 5.0).is_ok());
        assert_eq!(ctx.resources.stone, 0.0);
        assert!(ctx.resources.gold > 90.0);

        assert_eq!(
            sell(&mut ctx, TradeGood::Stone, 1.0),
            Err(CommandError::Insufficient {
                resource: ResourceKind::Stone,
                needed: 1.0,
                available: 0.0
            })
        );
        assert!(matches!(
            buy(&mut ctx, TradeGood::Food, 0.0),
            Err(CommandError::InvalidAmount(_))
        ));
        assert!(matches!(
            buy(&mut ctx, TradeGood::Stone, 1000.0),
            Err(CommandError::Insufficient { resource: ResourceKind::Gold, .. })
        ));
    }

    #[test]
    fn test_recruit_rules() {
        let mut ctx = ctx();
        assert!(recruit(&mut ctx).is_ok());
        assert_eq!(ctx.resources.food, 30.0);
        assert!(ctx.population.is_recruiting());
        assert_eq!(recruit(&mut ctx), Err(CommandError::RecruitInProgress));

        let mut full = self::ctx();
        full.config.base_population_cap = 3;
        assert_eq!(recruit(&mut full), Err(CommandError::PopulationCap(3)));
    }

    #[test]
    fn test_instant_recruit() {
        let mut ctx = ctx();
        ctx.config.recruit_seconds = 0.0;
        assert!(recruit(&mut ctx).is_ok());
        assert_eq!(ctx.store.worker_count(), 4);
    }

    #[test]
    fn test_panicking_handler_rolls_back() {
        let mut ctx = ctx();
        let before = ctx.resources;
        let result = run_staged(&mut ctx, "explode", |ctx| {
            ctx.resources.gold = 0.0;
            panic!("boom");
        });
        assert!(!result.success);
        assert_eq!(ctx.resources, before);
    }

    #[test]
    fn test_command_json_shape() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"buy","good":"food","amount":5}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Buy {
                good: TradeGood::Food,
                amount: 5.0
            }
        );
        let cmd: Command = serde_json::from_str(r#"{"command":"recruit"}"#).unwrap();
        assert_eq!(cmd, Command::Recruit);
    }
}
