//! Resource kinds and the colony-wide resource ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::baseline;

/// The four counted resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Wood,
    Stone,
    Food,
    Gold,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Wood,
        ResourceKind::Stone,
        ResourceKind::Food,
        ResourceKind::Gold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Wood => "wood",
            ResourceKind::Stone => "stone",
            ResourceKind::Food => "food",
            ResourceKind::Gold => "gold",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wood" => Ok(ResourceKind::Wood),
            "stone" => Ok(ResourceKind::Stone),
            "food" => Ok(ResourceKind::Food),
            "gold" => Ok(ResourceKind::Gold),
            other => Err(format!("unknown resource '{other}'")),
        }
    }
}

/// Amount per resource, used for costs, stocks and ledger deltas.
pub type ResourceAmounts = BTreeMap<ResourceKind, f64>;

/// Colony-wide counters. No caps are enforced here; the production system
/// applies storage limits before depositing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLedger {
    pub wood: f64,
    pub stone: f64,
    pub food: f64,
    pub gold: f64,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::baseline()
    }
}

impl ResourceLedger {
    pub fn baseline() -> Self {
        Self {
            wood: baseline::WOOD,
            stone: baseline::STONE,
            food: baseline::FOOD,
            gold: baseline::GOLD,
        }
    }

    pub fn empty() -> Self {
        Self {
            wood: 0.0,
            stone: 0.0,
            food: 0.0,
            gold: 0.0,
        }
    }

    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Wood => self.wood,
            ResourceKind::Stone => self.stone,
            ResourceKind::Food => self.food,
            ResourceKind::Gold => self.gold,
        }
    }

    fn slot(&mut self, kind: ResourceKind) -> &mut f64 {
        match kind {
            ResourceKind::Wood => &mut self.wood,
            ResourceKind::Stone => &mut self.stone,
            ResourceKind::Food => &mut self.food,
            ResourceKind::Gold => &mut self.gold,
        }
    }

    /// Apply every delta. A negative delta larger than the balance is a
    /// caller bug; it is not guarded here.
    pub fn add_resources(&mut self, deltas: &ResourceAmounts) {
        for (&kind, &delta) in deltas {
            *self.slot(kind) += delta;
        }
    }

    pub fn add(&mut self, kind: ResourceKind, delta: f64) {
        *self.slot(kind) += delta;
    }

    /// First resource in `cost` the ledger cannot cover, with (needed, available).
    pub fn shortfall(&self, cost: &ResourceAmounts) -> Option<(ResourceKind, f64, f64)> {
        cost.iter()
            .find(|&(&kind, &needed)| self.get(kind) < needed)
            .map(|(&kind, &needed)| (kind, needed, self.get(kind)))
    }

    pub fn can_afford(&self, cost: &ResourceAmounts) -> bool {
        self.shortfall(cost).is_none()
    }

    /// Subtract `cost`. Callers check [`ResourceLedger::can_afford`] first.
    pub fn deduct(&mut self, cost: &ResourceAmounts) {
        for (&kind, &amount) in cost {
            *self.slot(kind) -= amount;
        }
    }
}

/// Build a [`ResourceAmounts`] from pairs.
pub fn amounts(pairs: &[(ResourceKind, f64)]) -> ResourceAmounts {
    pairs.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resources_applies_all() {
        let mut ledger = ResourceLedger::empty();
        ledger.add_resources(&amounts(&[
            (ResourceKind::Wood, 10.0),
            (ResourceKind::Gold, 3.5),
        ]));
        assert_eq!(ledger.wood, 10.0);
        assert_eq!(ledger.gold, 3.5);
        assert_eq!(ledger.stone, 0.0);
    }

    #[test]
    fn test_negative_delta_not_guarded() {
        let mut ledger = ResourceLedger::empty();
        ledger.add(ResourceKind::Food, -4.0);
        assert_eq!(ledger.food, -4.0);
    }

    #[test]
    fn test_shortfall_reports_first_missing() {
        let ledger = ResourceLedger::baseline();
        let cost = amounts(&[
            (ResourceKind::Wood, 40.0),
            (ResourceKind::Stone, 20.0),
        ]);
        let (kind, needed, available) = ledger.shortfall(&cost).unwrap();
        assert_eq!(kind, ResourceKind::Stone);
        assert_eq!(needed, 20.0);
        assert_eq!(available, baseline::STONE);
        assert!(!ledger.can_afford(&cost));
    }

    #[test]
    fn test_deduct() {
        let mut ledger = ResourceLedger::baseline();
        let cost = amounts(&[(ResourceKind::Wood, 30.0)]);
        assert!(ledger.can_afford(&cost));
        ledger.deduct(&cost);
        assert_eq!(ledger.wood, baseline::WOOD - 30.0);
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("stone".parse::<ResourceKind>(), Ok(ResourceKind::Stone));
        assert!("iron".parse::<ResourceKind>().is_err());
        assert_eq!(ResourceKind::Gold.to_string(), "gold");
    }
}
