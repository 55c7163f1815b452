//! Population aggregate and the recruitment countdown.

use serde::{Deserialize, Serialize};

/// Presentation aggregate plus recruitment scheduler. Worker states remain
/// the authoritative idle signal; `idle` is refreshed from them each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationLedger {
    pub idle: u32,
    pub cap: u32,
    /// Seconds until the pending recruit arrives; zero when none is pending.
    pub recruit_timer: f64,
}

impl PopulationLedger {
    pub fn new(idle: u32, cap: u32) -> Self {
        Self {
            idle,
            cap,
            recruit_timer: 0.0,
        }
    }

    pub fn start_recruit(&mut self, seconds: f64) {
        self.recruit_timer = seconds.max(0.0);
    }

    pub fn is_recruiting(&self) -> bool {
        self.recruit_timer > 0.0
    }

    /// Decrement by one tick, clamped at zero. Returns true on the tick the
    /// timer runs out.
    pub fn tick_recruit(&mut self, tick_seconds: f64) -> bool {
        if !self.is_recruiting() {
            return false;
        }
        self.recruit_timer = (self.recruit_timer - tick_seconds).max(0.0);
        self.recruit_timer == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recruit_countdown() {
        let mut pop = PopulationLedger::new(3, 5);
        pop.start_recruit(3.0);
        assert!(pop.is_recruiting());
        assert!(!pop.tick_recruit(1.0));
        assert!(!pop.tick_recruit(1.0));
        assert!(pop.tick_recruit(1.0));
        assert!(!pop.is_recruiting());
        // stays at zero
        assert!(!pop.tick_recruit(1.0));
        assert_eq!(pop.recruit_timer, 0.0);
    }

    #[test]
    fn test_overshoot_clamps() {
        let mut pop = PopulationLedger::default();
        pop.start_recruit(0.5);
        assert!(pop.tick_recruit(1.0));
        assert_eq!(pop.recruit_timer, 0.0);
    }
}
