//! Movement system - walks moving workers along their grid paths

use crate::components::*;
use crate::context::SimContext;
use crate::events::SimEvent;

/// Advance every moving worker by `speed * elapsed` toward its next
/// waypoint. `elapsed` is the throttled time since the last commit.
pub fn movement_system(ctx: &mut SimContext, elapsed: f64) {
    let moving = ctx.store.ids_where(|e| {
        e.worker()
            .map(|w| w.state == WorkerState::Moving)
            .unwrap_or(false)
    });
    let step = ctx.config.worker_speed * elapsed as f32;

    for worker_id in moving {
        move_worker(ctx, &worker_id, step, elapsed);
    }
}

fn move_worker(ctx: &mut SimContext, worker_id: &EntityId, step: f32, elapsed: f64) {
    let Some(entity) = ctx.store.get(worker_id) else {
        return;
    };
    let Some(worker) = entity.worker() else {
        return;
    };
    if worker.task.is_none() {
        ctx.store.modify(worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.release();
            }
        });
        return;
    }

    let position = entity.position;
    let here = ctx.cell_of(&position);
    let next = worker
        .path
        .front()
        .copied()
        .filter(|cell| *cell == here || ctx.grid.is_walkable(cell.x, cell.z));

    let Some(cell) = next else {
        // No usable waypoint: count towards the stuck threshold.
        let stuck = ctx
            .store
            .modify(worker_id, |e| {
                e.worker_mut().map(|w| {
                    w.stuck_timer += elapsed;
                    w.stuck_timer
                })
            })
            .flatten()
            .unwrap_or(0.0);
        if stuck > ctx.config.stuck_threshold_seconds {
            recover_stuck(ctx, worker_id);
        }
        return;
    };

    let (wx, wz) = ctx.grid.cell_to_world(cell);
    let waypoint = Vec3::new(wx, position.y, wz);
    let distance = position.distance_xz(&waypoint);
    let arrived = distance <= step;

    ctx.store.modify(worker_id, |e| {
        e.position = if arrived {
            waypoint
        } else {
            position + (waypoint - position) * (step / distance)
        };
        if let Some(w) = e.worker_mut() {
            w.stuck_timer = 0.0;
            if arrived {
                w.path.pop_front();
                if w.path.is_empty() {
                    w.begin_work();
                }
            }
        }
    });
}

/// Re-path a stuck worker to its task target. If no path exists the worker
/// starts working where it stands.
fn recover_stuck(ctx: &mut SimContext, worker_id: &EntityId) {
    let Some((position, task)) = ctx
        .store
        .get(worker_id)
        .and_then(|e| Some((e.position, e.worker()?.task.clone()?)))
    else {
        return;
    };
    let target = match task {
        Task::Gather { target, .. } => ctx.store.get(&target).map(|e| e.position),
        Task::Build { target_pos, .. } => Some(target_pos),
    };
    let Some(target) = target else {
        log::warn!("{worker_id} is stuck with a vanished target, returning to idle");
        ctx.store.modify(worker_id, |e| {
            if let Some(w) = e.worker_mut() {
                w.release();
            }
        });
        return;
    };

    let path = ctx.plan_path(&position, &target);
    let recovered = !path.is_empty();
    ctx.store.modify(worker_id, |e| {
        if let Some(w) = e.worker_mut() {
            if recovered {
                w.path = path.into();
                w.stuck_timer = 0.0;
            } else {
                w.begin_work();
            }
        }
    });
    log::debug!("{worker_id} was stuck, re-pathed: {recovered}");
    ctx.emit(SimEvent::WorkerStuck {
        worker: worker_id.clone(),
        recovered,
    });
}
