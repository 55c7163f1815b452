//! Task system - sweeps idle workers onto open work

use crate::context::SimContext;

/// Dispatch every idle worker: unattended construction sites first, then
/// the nearest production building with a free slot. Workers with nothing
/// to do stay idle.
pub fn task_system(ctx: &mut SimContext, _tick_seconds: f64) {
    if !ctx.config.auto_assign_idle {
        return;
    }

    let idle = ctx
        .store
        .ids_where(|e| e.worker().map(|w| w.is_idle()).unwrap_or(false));

    for worker_id in idle {
        let Some(position) = ctx.store.get(&worker_id).map(|e| e.position) else {
            continue;
        };

        if let Some((blueprint, site)) = ctx.nearest_unattended_site(&position) {
            log::debug!("{worker_id} sent to build {blueprint}");
            ctx.start_construction(&worker_id, blueprint, site);
            continue;
        }

        if let Some(building_id) = ctx.nearest_open_production(&position) {
            log::debug!("{worker_id} auto-assigned to {building_id}");
            ctx.assign_worker(&worker_id, &building_id);
        }
    }
}
