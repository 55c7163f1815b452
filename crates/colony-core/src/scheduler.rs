//! Fixed-period tick driver and the per-frame movement throttle.
//!
//! Neither type reads a clock. Callers feed elapsed seconds in, which keeps
//! runs deterministic and lets tests step time by hand.

use crate::context::SimContext;
use crate::events::SimEvent;

/// A system run once per orchestrated tick with the tick length in seconds.
pub type SystemFn = fn(&mut SimContext, f64);

/// Runs an ordered list of systems every `tick_seconds` of fed time.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tick_seconds: f64,
    accumulated: f64,
    systems: Vec<(&'static str, SystemFn)>,
}

impl Scheduler {
    pub fn new(tick_seconds: f64) -> Self {
        Self {
            tick_seconds,
            accumulated: 0.0,
            systems: Vec::new(),
        }
    }

    /// Append a system; systems run in the order they were added.
    pub fn with_system(mut self, name: &'static str, system: SystemFn) -> Self {
        self.systems.push((name, system));
        self
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.systems.iter().map(|(name, _)| *name).collect()
    }

    /// Run one tick unconditionally and publish the new tick counter.
    pub fn run_tick(&self, ctx: &mut SimContext) {
        ctx.sim_time += self.tick_seconds;
        for (name, system) in &self.systems {
            log::trace!("tick {}: {}", ctx.tick + 1, name);
            system(ctx, self.tick_seconds);
        }
        ctx.tick += 1;
        let tick = ctx.tick;
        ctx.emit(SimEvent::Tick { tick });
    }

    /// Feed elapsed time and run as many whole ticks as it covers.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, ctx: &mut SimContext, elapsed: f64) -> u32 {
        if !(elapsed.is_finite() && elapsed > 0.0) {
            return 0;
        }
        self.accumulated += elapsed;
        let mut ran = 0;
        while self.accumulated + 1e-9 >= self.tick_seconds {
            self.accumulated -= self.tick_seconds;
            self.run_tick(ctx);
            ran += 1;
        }
        self.accumulated = self.accumulated.max(0.0);
        ran
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

/// Accumulates frame time and releases it once it crosses `interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameThrottle {
    interval: f64,
    accumulated: f64,
}

impl FrameThrottle {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            accumulated: 0.0,
        }
    }

    /// Add one frame's time. Returns the accumulated time when the
    /// threshold is crossed, resetting the accumulator.
    pub fn accumulate(&mut self, delta: f64) -> Option<f64> {
        if delta.is_finite() && delta > 0.0 {
            self.accumulated += delta;
        }
        if self.accumulated + 1e-9 >= self.interval {
            Some(std::mem::take(&mut self.accumulated))
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_logic::catalog::Catalog;
    use colony_logic::config::SimConfig;
    use std::sync::Arc;

    fn ctx() -> SimContext {
        SimContext::new(SimConfig::default(), Arc::new(Catalog::default()))
    }

    fn mark_a(ctx: &mut SimContext, _dt: f64) {
        ctx.resources.gold += 1.0;
    }

    fn mark_b(ctx: &mut SimContext, _dt: f64) {
        ctx.resources.gold *= 10.0;
    }

    #[test]
    fn test_systems_run_in_order() {
        let mut ctx = ctx();
        ctx.resources.gold = 0.0;
        let scheduler = Scheduler::new(1.0)
            .with_system("a", mark_a)
            .with_system("b", mark_b);
        scheduler.run_tick(&mut ctx);
        // (0 + 1) * 10, not 0 * 10 + 1
        assert_eq!(ctx.resources.gold, 10.0);
        assert_eq!(scheduler.system_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_advance_counts_whole_ticks() {
        let mut ctx = ctx();
        let mut scheduler = Scheduler::new(1.0);
        assert_eq!(scheduler.advance(&mut ctx, 0.6), 0);
        assert_eq!(scheduler.advance(&mut ctx, 0.6), 1);
        assert_eq!(scheduler.advance(&mut ctx, 2.0), 2);
        assert_eq!(ctx.tick, 3);
        assert!((ctx.sim_time - 3.0).abs() < 1e-9);
        assert_eq!(
            ctx.drain_events(),
            vec![
                SimEvent::Tick { tick: 1 },
                SimEvent::Tick { tick: 2 },
                SimEvent::Tick { tick: 3 }
            ]
        );
    }

    #[test]
    fn test_advance_ignores_bad_input() {
        let mut ctx = ctx();
        let mut scheduler = Scheduler::new(1.0);
        assert_eq!(scheduler.advance(&mut ctx, -5.0), 0);
        assert_eq!(scheduler.advance(&mut ctx, f64::NAN), 0);
        assert_eq!(ctx.tick, 0);
    }

    #[test]
    fn test_throttle_bounds_frequency() {
        let mut throttle = FrameThrottle::new(1.0 / 15.0);
        let released: Vec<f64> = (0..60).filter_map(|_| throttle.accumulate(1.0 / 60.0)).collect();
        assert_eq!(released.len(), 15);
        assert!(released.iter().all(|dt| (dt - 1.0 / 15.0).abs() < 1e-6));
    }
}
