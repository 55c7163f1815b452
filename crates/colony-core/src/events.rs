//! Observer events published by the simulation.
//!
//! Events queue up on the context and are drained by whoever renders or
//! logs them; the simulation never reads them back.

use colony_logic::resources::ResourceKind;
use serde::{Deserialize, Serialize};

use crate::components::EntityId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Published after every orchestrated tick.
    Tick { tick: u64 },
    CycleCompleted {
        worker: EntityId,
        building: EntityId,
        resource: ResourceKind,
        /// Amount that reached the ledger after storage caps.
        deposited: f64,
    },
    ConstructionFinished { building: EntityId },
    WorkerRecruited { worker: EntityId },
    /// A stuck worker was re-pathed (`recovered`) or put straight to work.
    WorkerStuck { worker: EntityId, recovered: bool },
}
