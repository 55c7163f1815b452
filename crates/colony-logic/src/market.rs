//! Supply/demand market for the three tradable goods.
//!
//! Each good carries accumulated demand and supply pressure. Trades shift
//! pressure, and pressure decays exponentially toward zero with elapsed
//! simulation time:
//!
//! ```text
//! decay   = (1 - DECAY_RATE) ^ (dt / DECAY_PERIOD)
//! price   = max(FLOOR, base * (1 + ALPHA * (demand - supply) / CAP))
//! ```
//!
//! Timestamps are simulation seconds supplied by the caller, never wall
//! clock, so replaying the same inputs reproduces the same prices.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::market::*;
use crate::resources::ResourceKind;

/// Goods that can be bought and sold for gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeGood {
    Wood,
    Stone,
    Food,
}

impl TradeGood {
    pub const ALL: [TradeGood; 3] = [TradeGood::Wood, TradeGood::Stone, TradeGood::Food];

    pub fn base_price(&self) -> f64 {
        match self {
            TradeGood::Wood => BASE_WOOD,
            TradeGood::Stone => BASE_STONE,
            TradeGood::Food => BASE_FOOD,
        }
    }

    pub fn resource(&self) -> ResourceKind {
        match self {
            TradeGood::Wood => ResourceKind::Wood,
            TradeGood::Stone => ResourceKind::Stone,
            TradeGood::Food => ResourceKind::Food,
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl From<TradeGood> for ResourceKind {
    fn from(good: TradeGood) -> Self {
        good.resource()
    }
}

impl fmt::Display for TradeGood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.resource(), f)
    }
}

impl FromStr for TradeGood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wood" => Ok(TradeGood::Wood),
            "stone" => Ok(TradeGood::Stone),
            "food" => Ok(TradeGood::Food),
            other => Err(format!("'{other}' is not a tradable good")),
        }
    }
}

/// Price and pressure for one good.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoodState {
    pub base: f64,
    pub price: f64,
    pub demand: f64,
    pub supply: f64,
}

impl GoodState {
    fn new(base: f64) -> Self {
        Self {
            base,
            price: base,
            demand: 0.0,
            supply: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    goods: [GoodState; 3],
    last_update: f64,
}

impl Default for Market {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Market {
    pub fn new(now: f64) -> Self {
        Self {
            goods: TradeGood::ALL.map(|g| GoodState::new(g.base_price())),
            last_update: now,
        }
    }

    pub fn price(&self, good: TradeGood) -> f64 {
        self.goods[good.index()].price
    }

    pub fn state(&self, good: TradeGood) -> &GoodState {
        &self.goods[good.index()]
    }

    /// Cost of `amount` at the current price, without trading.
    pub fn quote(&self, good: TradeGood, amount: f64) -> f64 {
        self.price(good) * amount
    }

    /// Buy at the current price, then push demand up. Returns the cost; the
    /// caller pays it.
    pub fn buy_resource(&mut self, good: TradeGood, amount: f64, now: f64) -> f64 {
        let cost = self.quote(good, amount);
        let state = &mut self.goods[good.index()];
        state.demand += amount;
        state.supply = (state.supply - amount).max(0.0);
        self.update_prices(now);
        cost
    }

    /// Sell at the current price, then push supply up. Returns the revenue.
    pub fn sell_resource(&mut self, good: TradeGood, amount: f64, now: f64) -> f64 {
        let revenue = self.quote(good, amount);
        let state = &mut self.goods[good.index()];
        state.supply += amount;
        state.demand = (state.demand - amount).max(0.0);
        self.update_prices(now);
        revenue
    }

    /// Decay pressure by the time elapsed since the last update, then
    /// recompute every price. Calls within the same instant apply no decay.
    pub fn update_prices(&mut self, now: f64) {
        let dt = (now - self.last_update).max(0.0);
        let decay = (1.0 - DECAY_RATE).powf(dt / DECAY_PERIOD_SECONDS);
        for state in &mut self.goods {
            state.demand *= decay;
            state.supply *= decay;
            let pressure = (state.demand - state.supply) / PRESSURE_CAP;
            state.price = (state.base * (1.0 + ALPHA * pressure)).max(PRICE_FLOOR);
        }
        self.last_update = self.last_update.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_base() {
        let market = Market::new(0.0);
        assert_eq!(market.price(TradeGood::Wood), 1.0);
        assert_eq!(market.price(TradeGood::Stone), 2.0);
        assert_eq!(market.price(TradeGood::Food), 1.5);
    }

    #[test]
    fn test_buy_uses_price_before_impact() {
        let mut market = Market::new(0.0);
        let cost = market.buy_resource(TradeGood::Wood, 10.0, 0.0);
        assert!((cost - 10.0).abs() < 1e-9);
        // 1 * (1 + 0.4 * 10 / 200) = 1.02
        assert!((market.price(TradeGood::Wood) - 1.02).abs() < 1e-9);
    }

    #[test]
    fn test_buy_then_sell_prices_differ() {
        let mut market = Market::new(0.0);
        let cost = market.buy_resource(TradeGood::Stone, 20.0, 0.0);
        let revenue = market.sell_resource(TradeGood::Stone, 20.0, 0.0);
        assert!((cost - revenue).abs() > 1e-9);
        assert!(revenue > cost);
    }

    #[test]
    fn test_repeated_buys_non_decreasing() {
        let mut market = Market::new(0.0);
        let mut last = 0.0;
        for i in 0..20 {
            let cost = market.buy_resource(TradeGood::Food, 5.0, i as f64 * 0.5);
            assert!(cost >= last, "cost dropped at buy {i}");
            last = cost;
        }
    }

    #[test]
    fn test_sell_pressure_floors_price() {
        let mut market = Market::new(0.0);
        market.sell_resource(TradeGood::Wood, 10_000.0, 0.0);
        assert_eq!(market.price(TradeGood::Wood), PRICE_FLOOR);
    }

    #[test]
    fn test_pressure_never_negative() {
        let mut market = Market::new(0.0);
        market.sell_resource(TradeGood::Food, 5.0, 0.0);
        market.buy_resource(TradeGood::Food, 50.0, 0.0);
        assert_eq!(market.state(TradeGood::Food).supply, 0.0);
        market.sell_resource(TradeGood::Food, 500.0, 0.0);
        assert_eq!(market.state(TradeGood::Food).demand, 0.0);
    }

    #[test]
    fn test_decay_over_one_period() {
        let mut market = Market::new(0.0);
        market.buy_resource(TradeGood::Wood, 100.0, 0.0);
        market.update_prices(30.0);
        let state = market.state(TradeGood::Wood);
        assert!((state.demand - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_converges_to_base() {
        let mut market = Market::new(0.0);
        market.buy_resource(TradeGood::Stone, 150.0, 0.0);
        market.sell_resource(TradeGood::Food, 150.0, 0.0);
        let mut prev_gap = f64::MAX;
        for step in 1..=200 {
            market.update_prices(step as f64 * 30.0);
            let gap = (market.price(TradeGood::Stone) - 2.0).abs();
            assert!(gap <= prev_gap);
            prev_gap = gap;
        }
        assert!((market.price(TradeGood::Stone) - 2.0).abs() < 1e-6);
        assert!((market.price(TradeGood::Food) - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_same_instant_no_decay() {
        let mut market = Market::new(10.0);
        market.buy_resource(TradeGood::Wood, 40.0, 10.0);
        market.update_prices(10.0);
        assert_eq!(market.state(TradeGood::Wood).demand, 40.0);
    }

    #[test]
    fn test_parse_good() {
        assert_eq!("food".parse::<TradeGood>(), Ok(TradeGood::Food));
        assert!("gold".parse::<TradeGood>().is_err());
    }
}
