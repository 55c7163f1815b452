//! Systems - logic that runs over the simulation context
//!
//! Per tick, in order: resource, task, production. Movement runs per frame
//! behind its own throttle.

mod movement;
mod production;
mod resource;
mod task;

pub use movement::*;
pub use production::*;
pub use resource::*;
pub use task::*;
