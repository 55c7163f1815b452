//! Resource system - population aggregate, recruitment and market decay

use colony_logic::catalog::BuildingKind;
use colony_logic::grid::GridCell;
use rand::Rng;

use crate::components::{EntityId, Vec3};
use crate::context::SimContext;
use crate::events::SimEvent;

/// Refresh the population aggregate, land a pending recruit and let market
/// pressure decay on the simulation clock.
pub fn resource_system(ctx: &mut SimContext, tick_seconds: f64) {
    ctx.population.cap = ctx.population_cap();
    if ctx.population.tick_recruit(tick_seconds) {
        land_recruit(ctx);
    }
    ctx.population.idle = ctx.idle_worker_count();

    let now = ctx.sim_time;
    ctx.market.update_prices(now);
}

/// Spawn the recruited worker on a walkable cell near the townhall, or near
/// the origin without one. Dropped when the cap was reached meanwhile.
pub fn land_recruit(ctx: &mut SimContext) -> Option<EntityId> {
    let cap = ctx.population_cap();
    if ctx.store.worker_count() as u32 >= cap {
        log::warn!("recruit dropped: population cap {cap} reached");
        return None;
    }

    let anchor = ctx
        .store
        .iter()
        .find(|e| {
            e.building()
                .map(|b| b.kind == BuildingKind::Townhall && b.is_complete())
                .unwrap_or(false)
        })
        .map(|e| e.position)
        .unwrap_or(Vec3::ZERO);
    let cell = ctx.cell_of(&anchor);
    let dx = ctx.rng.gen_range(-2..=2);
    let dz = ctx.rng.gen_range(-2..=2);
    let spot = ctx.grid.find_nearest_walkable(
        GridCell::new(cell.x + dx, cell.z + dz),
        ctx.config.nearest_walkable_radius,
    );
    let (x, z) = ctx.grid.cell_to_world(spot);

    let id = ctx.spawn_worker(Vec3::ground(x, z));
    log::info!("{id} arrived at ({x}, {z})");
    ctx.emit(SimEvent::WorkerRecruited { worker: id.clone() });
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_logic::catalog::Catalog;
    use colony_logic::config::SimConfig;
    use colony_logic::market::TradeGood;
    use std::sync::Arc;

    fn ctx() -> SimContext {
        SimContext::new(SimConfig::default(), Arc::new(Catalog::default()))
    }

    #[test]
    fn test_recruit_arrives_when_timer_runs_out() {
        let mut ctx = ctx();
        ctx.population.start_recruit(2.0);
        resource_system(&mut ctx, 1.0);
        assert_eq!(ctx.store.worker_count(), 3);
        resource_system(&mut ctx, 1.0);
        assert_eq!(ctx.store.worker_count(), 4);
        assert_eq!(ctx.population.idle, 4);
        assert!(ctx
            .drain_events()
            .contains(&SimEvent::WorkerRecruited { worker: EntityId::from("worker4") }));
    }

    #[test]
    fn test_recruit_lands_on_walkable_cell_in_grid() {
        let mut ctx = ctx();
        let id = land_recruit(&mut ctx).unwrap();
        let pos = ctx.store.get(&id).unwrap().position;
        let cell = ctx.cell_of(&pos);
        assert!(ctx.grid.is_walkable(cell.x, cell.z));
        assert!(pos.distance_xz(&Vec3::ZERO) <= 4.0);
    }

    #[test]
    fn test_recruit_dropped_at_cap() {
        let mut ctx = ctx();
        ctx.config.base_population_cap = 3;
        assert!(land_recruit(&mut ctx).is_none());
        assert_eq!(ctx.store.worker_count(), 3);
    }

    #[test]
    fn test_cap_includes_completed_housing() {
        let mut ctx = ctx();
        ctx.spawn_building(BuildingKind::House, Vec3::ground(4.0, 4.0), true);
        resource_system(&mut ctx, 1.0);
        assert_eq!(ctx.population.cap, 9);
    }

    #[test]
    fn test_prices_decay_on_sim_clock() {
        let mut ctx = ctx();
        ctx.market.buy_resource(TradeGood::Food, 100.0, 0.0);
        let spiked = ctx.market.price(TradeGood::Food);
        ctx.sim_time = 600.0;
        resource_system(&mut ctx, 1.0);
        let later = ctx.market.price(TradeGood::Food);
        assert!(later < spiked);
        assert!(later >= TradeGood::Food.base_price());
    }
}
