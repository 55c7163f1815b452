//! Entity data for the simulation store.
//!
//! Entities are plain data with no behaviour; the systems in
//! [`crate::systems`] and the command handlers own every state change.

mod common;
mod entity;

pub use common::*;
pub use entity::*;
