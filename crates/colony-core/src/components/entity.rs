//! Workers and buildings as one tagged entity type.
//!
//! Fields that only make sense for one role live in that role's payload,
//! so a building never carries a path and a worker never carries stock.
//! Worker ↔ building relations are stored as ids, never references.

use std::collections::VecDeque;

use colony_logic::catalog::BuildingKind;
use colony_logic::grid::GridCell;
use colony_logic::resources::{ResourceAmounts, ResourceKind};
use serde::{Deserialize, Serialize};

use super::common::{EntityId, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec3,
    /// Applied upgrade ids, in purchase order. Unique per entity.
    pub upgrades: Vec<String>,
    pub body: EntityBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityBody {
    Worker(Worker),
    Building(Building),
}

impl Entity {
    pub fn worker(&self) -> Option<&Worker> {
        match &self.body {
            EntityBody::Worker(w) => Some(w),
            EntityBody::Building(_) => None,
        }
    }

    pub fn worker_mut(&mut self) -> Option<&mut Worker> {
        match &mut self.body {
            EntityBody::Worker(w) => Some(w),
            EntityBody::Building(_) => None,
        }
    }

    pub fn building(&self) -> Option<&Building> {
        match &self.body {
            EntityBody::Building(b) => Some(b),
            EntityBody::Worker(_) => None,
        }
    }

    pub fn building_mut(&mut self) -> Option<&mut Building> {
        match &mut self.body {
            EntityBody::Building(b) => Some(b),
            EntityBody::Worker(_) => None,
        }
    }

    pub fn is_worker(&self) -> bool {
        matches!(self.body, EntityBody::Worker(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Moving,
    Working,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Repeatedly work a production building.
    Gather {
        resource: ResourceKind,
        target: EntityId,
    },
    /// Advance construction of the building standing at `target_pos`.
    Build {
        blueprint: BuildingKind,
        target_pos: Vec3,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub state: WorkerState,
    pub task: Option<Task>,
    /// Remaining waypoints, consumed from the front.
    pub path: VecDeque<GridCell>,
    /// Building this worker is assigned to; mirrored in that building's
    /// `assigned_workers`.
    pub assigned_target: Option<EntityId>,
    /// Seconds accumulated in the current production cycle.
    pub work_timer: f64,
    /// Seconds since the last successful movement.
    pub stuck_timer: f64,
}

impl Default for Worker {
    fn default() -> Self {
        Self {
            state: WorkerState::Idle,
            task: None,
            path: VecDeque::new(),
            assigned_target: None,
            work_timer: 0.0,
            stuck_timer: 0.0,
        }
    }
}

impl Worker {
    pub fn is_idle(&self) -> bool {
        self.state == WorkerState::Idle
    }

    /// Drop task, path and assignment and return to idle.
    pub fn release(&mut self) {
        *self = Worker::default();
    }

    /// Arrived (or close enough): start a fresh production cycle.
    pub fn begin_work(&mut self) {
        self.state = WorkerState::Working;
        self.path.clear();
        self.work_timer = 0.0;
        self.stuck_timer = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub kind: BuildingKind,
    /// Effective job slots (catalog + upgrades).
    pub capacity: u32,
    pub assigned_workers: Vec<EntityId>,
    /// Depletable stock; only forests hold one.
    pub stock: ResourceAmounts,
    /// Stored amount per resource, refreshed from the ledger.
    pub storage: ResourceAmounts,
    pub storage_max: ResourceAmounts,
    /// Construction progress in 0..=1; 1 means complete.
    pub progress: f64,
}

impl Building {
    pub fn is_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn has_free_slot(&self) -> bool {
        (self.assigned_workers.len() as u32) < self.capacity
    }

    pub fn is_assigned(&self, worker: &EntityId) -> bool {
        self.assigned_workers.contains(worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_clears_everything() {
        let mut w = Worker {
            state: WorkerState::Working,
            task: Some(Task::Gather {
                resource: ResourceKind::Food,
                target: EntityId::from("farm1"),
            }),
            path: VecDeque::from(vec![GridCell::new(1, 1)]),
            assigned_target: Some(EntityId::from("farm1")),
            work_timer: 2.0,
            stuck_timer: 1.0,
        };
        w.release();
        assert_eq!(w, Worker::default());
        assert!(w.is_idle());
    }

    #[test]
    fn test_body_accessors() {
        let e = Entity {
            id: EntityId::from("worker1"),
            position: Vec3::ZERO,
            upgrades: vec![],
            body: EntityBody::Worker(Worker::default()),
        };
        assert!(e.is_worker());
        assert!(e.building().is_none());
    }

    #[test]
    fn test_building_slots() {
        let mut b = Building {
            kind: BuildingKind::Farm,
            capacity: 1,
            assigned_workers: vec![],
            stock: ResourceAmounts::new(),
            storage: ResourceAmounts::new(),
            storage_max: ResourceAmounts::new(),
            progress: 1.0,
        };
        assert!(b.has_free_slot());
        b.assigned_workers.push(EntityId::from("worker1"));
        assert!(!b.has_free_slot());
        assert!(b.is_assigned(&EntityId::from("worker1")));
        assert!(b.is_complete());
    }
}
