//! Read-only view of the simulation for renderers and UI panels.

use std::collections::BTreeMap;

use colony_logic::market::TradeGood;
use colony_logic::population::PopulationLedger;
use colony_logic::resources::ResourceLedger;
use serde::{Deserialize, Serialize};

use crate::components::Entity;
use crate::context::SimContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimSnapshot {
    pub tick: u64,
    pub sim_time: f64,
    pub entities: Vec<Entity>,
    pub resources: ResourceLedger,
    pub population: PopulationLedger,
    pub prices: BTreeMap<TradeGood, f64>,
}

impl SimSnapshot {
    pub fn capture(ctx: &SimContext) -> Self {
        Self {
            tick: ctx.tick,
            sim_time: ctx.sim_time,
            entities: ctx.store.to_vec(),
            resources: ctx.resources,
            population: ctx.population,
            prices: TradeGood::ALL
                .iter()
                .map(|&g| (g, ctx.market.price(g)))
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_logic::catalog::Catalog;
    use colony_logic::config::SimConfig;
    use std::sync::Arc;

    #[test]
    fn test_snapshot_json_is_readable() {
        let ctx = SimContext::new(SimConfig::default(), Arc::new(Catalog::default()));
        let json = SimSnapshot::capture(&ctx).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["entities"].as_array().unwrap().len(), 5);
        assert_eq!(value["prices"]["stone"], 2.0);
        assert_eq!(value["resources"]["wood"], 100.0);
        assert_eq!(value["entities"][3]["id"], "farm1");
        assert_eq!(value["entities"][3]["body"]["building"]["kind"], "farm");
    }
}
