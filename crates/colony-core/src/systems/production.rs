//! Worker/production system - turns working time into resources and
//! construction progress.

use colony_logic::resources::ResourceKind;

use crate::components::*;
use crate::context::SimContext;
use crate::events::SimEvent;

const EPS: f64 = 1e-9;

pub fn production_system(ctx: &mut SimContext, tick_seconds: f64) {
    let working = ctx.store.ids_where(|e| {
        e.worker()
            .map(|w| w.state == WorkerState::Working)
            .unwrap_or(false)
    });

    for worker_id in working {
        let task = ctx
            .store
            .get(&worker_id)
            .and_then(|e| e.worker())
            .and_then(|w| w.task.clone());
        match task {
            Some(Task::Gather { target, .. }) => gather(ctx, &worker_id, &target, tick_seconds),
            Some(Task::Build { target_pos, .. }) => build(ctx, &worker_id, target_pos),
            None => release(ctx, &worker_id),
        }
    }

    ctx.refresh_storage();
}

/// Deposit into the ledger, clipped to the remaining storage room.
/// Returns the amount that landed.
pub fn deposit_capped(ctx: &mut SimContext, resource: ResourceKind, amount: f64) -> f64 {
    let room = match ctx.storage_cap(resource) {
        Some(cap) => (cap - ctx.resources.get(resource)).max(0.0),
        None => f64::INFINITY,
    };
    let landed = amount.max(0.0).min(room);
    ctx.resources.add(resource, landed);
    landed
}

fn release(ctx: &mut SimContext, worker_id: &EntityId) {
    ctx.store.modify(worker_id, |e| {
        if let Some(w) = e.worker_mut() {
            w.release();
        }
    });
}

fn gather(ctx: &mut SimContext, worker_id: &EntityId, building_id: &EntityId, tick_seconds: f64) {
    let Some((kind, upgrades, still_assigned)) = ctx.store.get(building_id).and_then(|e| {
        let b = e.building()?;
        Some((b.kind, e.upgrades.clone(), b.is_assigned(worker_id)))
    }) else {
        log::warn!("{worker_id} works at missing building {building_id}, returning to idle");
        release(ctx, worker_id);
        return;
    };
    let Some(prod) = ctx.catalog.effective_production(kind, &upgrades) else {
        log::warn!("{building_id} ({kind}) produces nothing, releasing {worker_id}");
        ctx.store.modify(building_id, |e| {
            if let Some(b) = e.building_mut() {
                b.assigned_workers.retain(|w| w != worker_id);
            }
        });
        release(ctx, worker_id);
        return;
    };

    let timer = ctx
        .store
        .modify(worker_id, |e| {
            e.worker_mut().map(|w| {
                w.work_timer += tick_seconds;
                w.work_timer
            })
        })
        .flatten()
        .unwrap_or(0.0);
    if timer + EPS < prod.cycle {
        return;
    }

    // Depletable buildings give up at most what they still hold.
    let withdrawn = ctx
        .store
        .modify(building_id, |e| {
            let b = e.building_mut()?;
            let stock = b.stock.get_mut(&prod.resource)?;
            let take = prod.yield_per_cycle.min(*stock).max(0.0);
            *stock -= take;
            Some(take)
        })
        .flatten()
        .unwrap_or(prod.yield_per_cycle);
    let deposited = deposit_capped(ctx, prod.resource, withdrawn);

    ctx.store.modify(worker_id, |e| {
        if let Some(w) = e.worker_mut() {
            if still_assigned {
                w.work_timer = 0.0;
            } else {
                w.release();
            }
        }
    });

    log::debug!(
        "{worker_id} finished a {kind} cycle: {deposited} of {withdrawn} {} deposited",
        prod.resource
    );
    ctx.emit(SimEvent::CycleCompleted {
        worker: worker_id.clone(),
        building: building_id.clone(),
        resource: prod.resource,
        deposited,
    });
}

fn build(ctx: &mut SimContext, worker_id: &EntityId, target_pos: Vec3) {
    let site = ctx
        .store
        .iter()
        .find(|e| e.building().is_some() && e.position.same_ground_point(&target_pos))
        .map(|e| e.id.clone());
    let Some(site) = site else {
        log::warn!("{worker_id} has no construction site at ({}, {})", target_pos.x, target_pos.z);
        release(ctx, worker_id);
        return;
    };

    let step = ctx.config.build_progress_step;
    // (was already complete, is complete now)
    let (was_complete, complete) = ctx
        .store
        .modify(&site, |e| {
            let b = e.building_mut()?;
            let was = b.is_complete();
            if !was {
                b.progress = (b.progress + step).min(1.0);
                if b.progress + EPS >= 1.0 {
                    b.progress = 1.0;
                }
            }
            Some((was, b.is_complete()))
        })
        .flatten()
        .unwrap_or((true, true));

    if complete {
        if !was_complete {
            log::info!("construction of {site} finished");
            ctx.emit(SimEvent::ConstructionFinished { building: site });
        }
        release(ctx, worker_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_logic::catalog::{BuildingKind, Catalog};
    use colony_logic::config::SimConfig;
    use std::sync::Arc;

    fn ctx() -> SimContext {
        SimContext::new(SimConfig::default(), Arc::new(Catalog::default()))
    }

    /// Assign a worker and teleport it to work.
    fn put_to_work(ctx: &mut SimContext, building: &str) -> EntityId {
        let building = EntityId::from(building);
        let pos = ctx.store.get(&building).unwrap().position;
        let worker = ctx.nearest_idle_worker(&pos).unwrap();
        ctx.assign_worker(&worker, &building);
        ctx.store.modify(&worker, |e| e.worker_mut().unwrap().begin_work());
        worker
    }

    #[test]
    fn test_farm_deposits_after_cycle() {
        let mut ctx = ctx();
        put_to_work(&mut ctx, "farm1");
        for _ in 0..4 {
            production_system(&mut ctx, 1.0);
        }
        assert_eq!(ctx.resources.food, 50.0);
        production_system(&mut ctx, 1.0);
        assert_eq!(ctx.resources.food, 55.0);
    }

    #[test]
    fn test_forest_draws_down_stock() {
        let mut ctx = ctx();
        let forest = EntityId::from("forest1");
        ctx.store.modify(&forest, |e| {
            e.building_mut().unwrap().stock.insert(ResourceKind::Wood, 3.0);
        });
        let worker = put_to_work(&mut ctx, "forest1");
        for _ in 0..8 {
            production_system(&mut ctx, 1.0);
        }
        // 4 per cycle, only 3 left: first cycle takes 3, second takes 0
        assert_eq!(ctx.resources.wood, 103.0);
        let stock = ctx.store.get(&forest).unwrap().building().unwrap().stock[&ResourceKind::Wood];
        assert_eq!(stock, 0.0);
        let w = ctx.store.get(&worker).unwrap().worker().unwrap();
        assert_eq!(w.state, WorkerState::Working);
        assert_eq!(w.work_timer, 0.0);
    }

    #[test]
    fn test_deposit_respects_storage_cap() {
        let mut ctx = ctx();
        ctx.spawn_building(BuildingKind::Warehouse, Vec3::ground(3.0, -3.0), true);
        ctx.resources.food = 198.0;
        put_to_work(&mut ctx, "farm1");
        for _ in 0..5 {
            production_system(&mut ctx, 1.0);
        }
        assert_eq!(ctx.resources.food, 200.0);
        let events = ctx.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            SimEvent::CycleCompleted { deposited, .. } if (*deposited - 2.0).abs() < 1e-9
        )));
    }

    #[test]
    fn test_unassigned_worker_goes_idle_after_cycle() {
        let mut ctx = ctx();
        let farm = EntityId::from("farm1");
        let worker = put_to_work(&mut ctx, "farm1");
        ctx.store.modify(&farm, |e| e.building_mut().unwrap().assigned_workers.clear());
        for _ in 0..5 {
            production_system(&mut ctx, 1.0);
        }
        assert!(ctx.store.get(&worker).unwrap().worker().unwrap().is_idle());
        assert_eq!(ctx.resources.food, 55.0);
    }

    #[test]
    fn test_build_finishes_after_five_ticks() {
        let mut ctx = ctx();
        let site_pos = Vec3::ground(3.0, 3.0);
        let site = ctx.spawn_building(BuildingKind::House, site_pos, false);
        let site_pos = ctx.store.get(&site).unwrap().position;
        let worker = ctx.nearest_idle_worker(&site_pos).unwrap();
        ctx.start_construction(&worker, BuildingKind::House, site_pos);
        ctx.store.modify(&worker, |e| e.worker_mut().unwrap().begin_work());

        for _ in 0..4 {
            production_system(&mut ctx, 1.0);
        }
        assert!(!ctx.store.get(&site).unwrap().building().unwrap().is_complete());
        production_system(&mut ctx, 1.0);
        assert!(ctx.store.get(&site).unwrap().building().unwrap().is_complete());
        assert!(ctx.store.get(&worker).unwrap().worker().unwrap().is_idle());
        assert!(ctx
            .drain_events()
            .contains(&SimEvent::ConstructionFinished { building: site }));
    }
}
