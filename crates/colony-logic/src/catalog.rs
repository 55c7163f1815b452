//! Static building and upgrade configuration.
//!
//! Every building kind maps to job slots, a base production rule (resource,
//! yield per cycle, cycle seconds), a build cost and optional storage. An
//! upgrade names a parent kind, a cost and a set of modifiers keyed as
//! `"<property>:<operator>"`. Only the multiplicative operator `x` exists;
//! several upgrades on one building compose multiplicatively in list order.
//!
//! The catalog ships with built-in defaults ([`Catalog::default`]) and can
//! be loaded from JSON of the same shape:
//!
//! ```
//! use colony_logic::catalog::{BuildingKind, Catalog};
//!
//! let catalog = Catalog::from_json(r#"{
//!     "buildings": {
//!         "farm": { "jobs": 2, "base": { "resource": "food", "yield": 5, "cycle": 5 },
//!                   "cost": { "wood": 20 } }
//!     },
//!     "upgrades": {
//!         "crop_rotation": { "parent": "farm", "mods": { "cycle:x": 0.8 } }
//!     }
//! }"#).unwrap();
//!
//! let upgrades = vec!["crop_rotation".to_string()];
//! let prod = catalog.effective_production(BuildingKind::Farm, &upgrades).unwrap();
//! assert!((prod.cycle - 4.0).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resources::{amounts, ResourceAmounts, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    Farm,
    Forest,
    Mine,
    House,
    Townhall,
    Warehouse,
    Market,
    Mountain,
    Generic,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 9] = [
        BuildingKind::Farm,
        BuildingKind::Forest,
        BuildingKind::Mine,
        BuildingKind::House,
        BuildingKind::Townhall,
        BuildingKind::Warehouse,
        BuildingKind::Market,
        BuildingKind::Mountain,
        BuildingKind::Generic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildingKind::Farm => "farm",
            BuildingKind::Forest => "forest",
            BuildingKind::Mine => "mine",
            BuildingKind::House => "house",
            BuildingKind::Townhall => "townhall",
            BuildingKind::Warehouse => "warehouse",
            BuildingKind::Market => "market",
            BuildingKind::Mountain => "mountain",
            BuildingKind::Generic => "generic",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown building type '{s}'"))
    }
}

/// Base production rule of a building kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionSpec {
    pub resource: ResourceKind,
    #[serde(rename = "yield")]
    pub yield_per_cycle: f64,
    /// Seconds of work per completed cycle.
    pub cycle: f64,
}

fn default_buildable() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingSpec {
    /// Maximum number of assigned workers.
    #[serde(default)]
    pub jobs: u32,
    #[serde(default)]
    pub base: Option<ProductionSpec>,
    #[serde(default)]
    pub cost: ResourceAmounts,
    /// Capacity per stored resource; zero for non-storage buildings.
    #[serde(default)]
    pub storage: f64,
    /// Resources this building provides storage for.
    #[serde(default)]
    pub stores: Vec<ResourceKind>,
    /// Initial depletable stock (forests).
    #[serde(default)]
    pub stock: ResourceAmounts,
    /// Population cap added once construction completes.
    #[serde(default)]
    pub housing: u32,
    #[serde(default = "default_buildable")]
    pub buildable: bool,
}

impl BuildingSpec {
    fn empty() -> Self {
        Self {
            jobs: 0,
            base: None,
            cost: ResourceAmounts::new(),
            storage: 0.0,
            stores: Vec::new(),
            stock: ResourceAmounts::new(),
            housing: 0,
            buildable: true,
        }
    }

    /// Whether workers can be assigned here to gather resources.
    pub fn is_production(&self) -> bool {
        self.base.is_some() && self.jobs > 0
    }

    pub fn storage_max(&self) -> ResourceAmounts {
        if self.storage <= 0.0 {
            return ResourceAmounts::new();
        }
        self.stores.iter().map(|&r| (r, self.storage)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeSpec {
    pub parent: BuildingKind,
    #[serde(default)]
    pub cost: ResourceAmounts,
    /// Raw modifier table, e.g. `{"yield:x": 1.5}`.
    #[serde(default)]
    pub mods: BTreeMap<String, f64>,
}

impl UpgradeSpec {
    /// Parse every modifier key. Catalog construction has already rejected
    /// malformed keys, so this only fails on hand-built specs.
    pub fn modifiers(&self) -> Result<Vec<Modifier>, CatalogError> {
        self.mods
            .iter()
            .map(|(key, &value)| Modifier::parse(key, value))
            .collect()
    }
}

/// Property a modifier acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModProperty {
    Yield,
    Cycle,
    Jobs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOperator {
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modifier {
    pub property: ModProperty,
    pub operator: ModOperator,
    pub value: f64,
}

impl Modifier {
    pub fn parse(key: &str, value: f64) -> Result<Self, CatalogError> {
        let (property, operator) = key
            .split_once(':')
            .ok_or_else(|| CatalogError::MalformedModifier(key.to_string()))?;
        let property = match property {
            "yield" => ModProperty::Yield,
            "cycle" => ModProperty::Cycle,
            "jobs" => ModProperty::Jobs,
            other => {
                return Err(CatalogError::UnknownProperty {
                    key: key.to_string(),
                    property: other.to_string(),
                })
            }
        };
        let operator = match operator {
            "x" => ModOperator::Multiply,
            other => {
                return Err(CatalogError::UnknownOperator {
                    key: key.to_string(),
                    operator: other.to_string(),
                })
            }
        };
        if !(value.is_finite() && value > 0.0) {
            return Err(CatalogError::BadMultiplier {
                key: key.to_string(),
                value,
            });
        }
        Ok(Self {
            property,
            operator,
            value,
        })
    }

    fn apply(&self, v: f64) -> f64 {
        match self.operator {
            ModOperator::Multiply => v * self.value,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("modifier key '{0}' is not of the form <property>:<operator>")]
    MalformedModifier(String),
    #[error("modifier '{key}' names unknown property '{property}'")]
    UnknownProperty { key: String, property: String },
    #[error("modifier '{key}' uses unknown operator '{operator}'")]
    UnknownOperator { key: String, operator: String },
    #[error("modifier '{key}' has invalid multiplier {value}")]
    BadMultiplier { key: String, value: f64 },
    #[error("upgrade '{upgrade}' names parent '{parent}' which is not in the catalog")]
    MissingParent {
        upgrade: String,
        parent: BuildingKind,
    },
    #[error("building '{kind}' has non-positive cycle time {cycle}")]
    BadCycle { kind: BuildingKind, cycle: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub buildings: BTreeMap<BuildingKind, BuildingSpec>,
    #[serde(default)]
    pub upgrades: BTreeMap<String, UpgradeSpec>,
}

impl Catalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        for (&kind, spec) in &self.buildings {
            if let Some(base) = spec.base {
                if !(base.cycle.is_finite() && base.cycle > 0.0) {
                    return Err(CatalogError::BadCycle {
                        kind,
                        cycle: base.cycle,
                    });
                }
            }
        }
        for (id, upgrade) in &self.upgrades {
            if !self.buildings.contains_key(&upgrade.parent) {
                return Err(CatalogError::MissingParent {
                    upgrade: id.clone(),
                    parent: upgrade.parent,
                });
            }
            upgrade.modifiers()?;
        }
        Ok(())
    }

    pub fn building(&self, kind: BuildingKind) -> Option<&BuildingSpec> {
        self.buildings.get(&kind)
    }

    pub fn upgrade(&self, id: &str) -> Option<&UpgradeSpec> {
        self.upgrades.get(id)
    }

    /// Upgrade ids whose parent is `kind`, in id order.
    pub fn upgrades_for(&self, kind: BuildingKind) -> impl Iterator<Item = &str> {
        self.upgrades
            .iter()
            .filter(move |(_, u)| u.parent == kind)
            .map(|(id, _)| id.as_str())
    }

    fn modifiers_for<'a>(
        &'a self,
        upgrades: &'a [String],
        property: ModProperty,
    ) -> impl Iterator<Item = Modifier> + 'a {
        upgrades
            .iter()
            .filter_map(|id| match self.upgrades.get(id) {
                Some(spec) => Some(spec),
                None => {
                    log::warn!("ignoring unknown upgrade '{id}'");
                    None
                }
            })
            .flat_map(|spec| spec.mods.iter())
            .filter_map(|(key, &value)| Modifier::parse(key, value).ok())
            .filter(move |m| m.property == property)
    }

    /// Base production of `kind` with every listed upgrade applied in order.
    pub fn effective_production(
        &self,
        kind: BuildingKind,
        upgrades: &[String],
    ) -> Option<ProductionSpec> {
        let mut prod = self.building(kind)?.base?;
        for m in self.modifiers_for(upgrades, ModProperty::Yield) {
            prod.yield_per_cycle = m.apply(prod.yield_per_cycle);
        }
        for m in self.modifiers_for(upgrades, ModProperty::Cycle) {
            prod.cycle = m.apply(prod.cycle);
        }
        Some(prod)
    }

    /// Job slots of `kind` after upgrades, rounded down.
    pub fn effective_jobs(&self, kind: BuildingKind, upgrades: &[String]) -> u32 {
        let Some(spec) = self.building(kind) else {
            return 0;
        };
        let jobs = self
            .modifiers_for(upgrades, ModProperty::Jobs)
            .fold(spec.jobs as f64, |acc, m| m.apply(acc));
        jobs.floor().max(0.0) as u32
    }
}

impl Default for Catalog {
    fn default() -> Self {
        use ResourceKind::*;

        let mut buildings = BTreeMap::new();
        buildings.insert(
            BuildingKind::Farm,
            BuildingSpec {
                jobs: 2,
                base: Some(ProductionSpec {
                    resource: Food,
                    yield_per_cycle: 5.0,
                    cycle: 5.0,
                }),
                cost: amounts(&[(Wood, 20.0)]),
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Forest,
            BuildingSpec {
                jobs: 3,
                base: Some(ProductionSpec {
                    resource: Wood,
                    yield_per_cycle: 4.0,
                    cycle: 4.0,
                }),
                stock: amounts(&[(Wood, 300.0)]),
                buildable: false,
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Mine,
            BuildingSpec {
                jobs: 2,
                base: Some(ProductionSpec {
                    resource: Stone,
                    yield_per_cycle: 3.0,
                    cycle: 6.0,
                }),
                cost: amounts(&[(Wood, 40.0), (Stone, 20.0)]),
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::House,
            BuildingSpec {
                cost: amounts(&[(Wood, 30.0)]),
                housing: 4,
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Townhall,
            BuildingSpec {
                cost: amounts(&[(Wood, 100.0), (Stone, 50.0)]),
                storage: 100.0,
                stores: vec![Wood, Stone, Food],
                housing: 5,
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Warehouse,
            BuildingSpec {
                cost: amounts(&[(Wood, 60.0)]),
                storage: 200.0,
                stores: vec![Wood, Stone, Food],
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Market,
            BuildingSpec {
                cost: amounts(&[(Wood, 50.0), (Stone, 20.0)]),
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Mountain,
            BuildingSpec {
                buildable: false,
                ..BuildingSpec::empty()
            },
        );
        buildings.insert(
            BuildingKind::Generic,
            BuildingSpec {
                buildable: false,
                ..BuildingSpec::empty()
            },
        );

        let upgrade = |parent, cost: &[(ResourceKind, f64)], mods: &[(&str, f64)]| UpgradeSpec {
            parent,
            cost: amounts(cost),
            mods: mods.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        };
        let mut upgrades = BTreeMap::new();
        upgrades.insert(
            "irrigation".to_string(),
            upgrade(BuildingKind::Farm, &[(Wood, 30.0), (Gold, 20.0)], &[("yield:x", 1.5)]),
        );
        upgrades.insert(
            "crop_rotation".to_string(),
            upgrade(BuildingKind::Farm, &[(Gold, 40.0)], &[("cycle:x", 0.8)]),
        );
        upgrades.insert(
            "extra_plots".to_string(),
            upgrade(BuildingKind::Farm, &[(Wood, 40.0)], &[("jobs:x", 1.5)]),
        );
        upgrades.insert(
            "sharp_axes".to_string(),
            upgrade(BuildingKind::Forest, &[(Gold, 25.0)], &[("yield:x", 1.25)]),
        );
        upgrades.insert(
            "deep_shaft".to_string(),
            upgrade(BuildingKind::Mine, &[(Wood, 50.0), (Gold, 30.0)], &[("yield:x", 1.5)]),
        );
        upgrades.insert(
            "pickaxes".to_string(),
            upgrade(BuildingKind::Mine, &[(Gold, 35.0)], &[("cycle:x", 0.75)]),
        );

        Self {
            buildings,
            upgrades,
        }
    }
}
