//! Colony Headless Simulation Harness
//!
//! Validates simulation logic and the catalog data without any renderer.
//! Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p colony-simtest
//!   cargo run -p colony-simtest -- --verbose
//!   cargo run -p colony-simtest -- --ticks 1200 --dump

use colony_core::prelude::*;
use colony_logic::catalog::{BuildingKind, Catalog};
use colony_logic::config::validate_config;
use colony_logic::grid::{Grid, GridCell};
use colony_logic::market::Market;
use colony_logic::resources::ResourceKind;

// ── Building catalog (same JSON a UI would ship) ────────────────────────
const CATALOG_JSON: &str = include_str!("../../../data/catalog.json");

const FRAME: f64 = 1.0 / 15.0;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

struct Options {
    verbose: bool,
    dump: bool,
    soak_ticks: u64,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let soak_ticks = args
        .iter()
        .position(|a| a == "--ticks")
        .and_then(|i| args.get(i + 1))
        .and_then(|n| n.parse().ok())
        .unwrap_or(600);
    Options {
        verbose: args.iter().any(|a| a == "--verbose"),
        dump: args.iter().any(|a| a == "--dump"),
        soak_ticks,
    }
}

fn main() {
    let opts = parse_args();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if opts.verbose { "info" } else { "warn" }),
    )
    .init();

    println!("=== Colony Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Catalog data
    results.extend(validate_catalog(opts.verbose));

    // 2. Configuration
    results.extend(validate_configuration(opts.verbose));

    // 3. Pathfinding properties
    results.extend(validate_pathfinding(opts.verbose));

    // 4. Market properties
    results.extend(validate_market(opts.verbose));

    // 5. End-to-end scenarios
    results.extend(validate_scenarios(opts.verbose));

    // 6. Soak run
    let (soak, sim) = soak_run(opts.soak_ticks, opts.verbose);
    results.extend(soak);

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || opts.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    if opts.dump {
        match sim.snapshot().to_json() {
            Ok(json) => println!("\n{json}"),
            Err(e) => log::error!("snapshot could not be rendered: {e}"),
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Catalog ──────────────────────────────────────────────────────────

fn validate_catalog(verbose: bool) -> Vec<TestResult> {
    println!("--- Building Catalog ---");
    let mut results = Vec::new();

    let catalog = match Catalog::from_json(CATALOG_JSON) {
        Ok(c) => c,
        Err(e) => {
            results.push(TestResult::new("catalog_parse", false, format!("{e}")));
            return results;
        }
    };

    results.push(TestResult::new(
        "catalog_matches_builtin",
        catalog == Catalog::default(),
        "data/catalog.json equals the built-in catalog",
    ));

    let missing: Vec<_> = BuildingKind::ALL
        .iter()
        .filter(|k| catalog.building(**k).is_none())
        .collect();
    results.push(TestResult::new(
        "catalog_all_kinds",
        missing.is_empty(),
        format!("missing kinds: {missing:?}"),
    ));

    let producers: Vec<_> = BuildingKind::ALL
        .iter()
        .filter(|k| catalog.building(**k).map(|s| s.is_production()).unwrap_or(false))
        .collect();
    if verbose {
        println!("  producers: {producers:?}");
    }
    results.push(TestResult::new(
        "catalog_producers",
        producers.len() == 3,
        format!("{} production kinds", producers.len()),
    ));

    let bad_upgrades: Vec<_> = catalog
        .upgrades
        .iter()
        .filter(|(_, u)| {
            catalog
                .building(u.parent)
                .map(|s| !s.is_production())
                .unwrap_or(true)
        })
        .map(|(id, _)| id.clone())
        .collect();
    results.push(TestResult::new(
        "catalog_upgrades_target_producers",
        bad_upgrades.is_empty(),
        format!("{} upgrades, bad: {bad_upgrades:?}", catalog.upgrades.len()),
    ));

    results
}

// ── 2. Configuration ────────────────────────────────────────────────────

fn validate_configuration(_verbose: bool) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    let errors = validate_config(&SimConfig::default());
    results.push(TestResult::new(
        "config_default_valid",
        errors.is_empty(),
        format!("{} errors", errors.len()),
    ));

    let broken = SimConfig {
        grid_size: 1,
        movement_step_seconds: 0.0,
        ..SimConfig::default()
    };
    let errors = validate_config(&broken);
    results.push(TestResult::new(
        "config_rejects_broken",
        errors.len() == 2 && ColonySim::new(broken).is_err(),
        format!("{} errors", errors.len()),
    ));

    results
}

// ── 3. Pathfinding ──────────────────────────────────────────────────────

fn is_orthogonal_walk(path: &[GridCell]) -> bool {
    path.windows(2).all(|p| p[0].manhattan(&p[1]) == 1)
}

fn validate_pathfinding(verbose: bool) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();

    let mut grid = Grid::new(64);
    // a wall with one gap
    for z in 10..54 {
        if z != 40 {
            grid.set_blocked(32, z);
        }
    }

    let same = (0..64).all(|i| grid.find_path(GridCell::new(i, i), GridCell::new(i, i)).is_empty());
    results.push(TestResult::new(
        "path_same_endpoints_empty",
        same,
        "from == to gives an empty path",
    ));

    let pairs = [
        (GridCell::new(5, 5), GridCell::new(60, 60)),
        (GridCell::new(20, 30), GridCell::new(45, 30)),
        (GridCell::new(0, 63), GridCell::new(63, 0)),
        (GridCell::new(31, 12), GridCell::new(33, 12)),
    ];
    let mut ok = true;
    for (from, to) in pairs {
        let path = grid.find_path(from, to);
        let valid = path.first() == Some(&from)
            && path.last() == Some(&to)
            && is_orthogonal_walk(&path)
            && path.iter().all(|c| grid.is_walkable(c.x, c.z));
        if verbose {
            println!("  {from:?} -> {to:?}: {} cells", path.len());
        }
        ok &= valid;
    }
    results.push(TestResult::new(
        "path_endpoints_and_steps",
        ok,
        format!("{} reachable pairs checked", pairs.len()),
    ));

    let from = GridCell::new(10, 20);
    let to = GridCell::new(20, 20);
    let before = grid.find_path(from, to);
    let middle = before[before.len() / 2];
    grid.set_blocked(middle.x, middle.z);
    let after = grid.find_path(from, to);
    results.push(TestResult::new(
        "path_blocking_lengthens",
        after.is_empty() || after.len() > before.len(),
        format!("{} -> {} cells", before.len(), after.len()),
    ));

    let (west, east) = (GridCell::new(20, 30), GridCell::new(45, 30));
    let through_gap = grid.find_path(west, east);
    grid.set_blocked(32, 40);
    let around = grid.find_path(west, east);
    results.push(TestResult::new(
        "path_detours_closed_gap",
        around.len() > through_gap.len() && around.iter().all(|c| grid.is_walkable(c.x, c.z)),
        format!("{} -> {} cells after closing the gap", through_gap.len(), around.len()),
    ));

    let pocket = GridCell::new(5, 60);
    for n in pocket.neighbors() {
        grid.set_blocked(n.x, n.z);
    }
    results.push(TestResult::new(
        "path_unreachable_empty",
        grid.find_path(GridCell::new(5, 5), pocket).is_empty(),
        "walled-in goal gives an empty path",
    ));

    results
}

// ── 4. Market ───────────────────────────────────────────────────────────

fn validate_market(_verbose: bool) -> Vec<TestResult> {
    println!("--- Market ---");
    let mut results = Vec::new();

    let mut market = Market::new(0.0);
    let cost = market.buy_resource(TradeGood::Wood, 30.0, 0.0);
    let revenue = market.sell_resource(TradeGood::Wood, 30.0, 0.0);
    results.push(TestResult::new(
        "market_buy_sell_differ",
        (cost - revenue).abs() > 1e-9,
        format!("bought for {cost:.3}, sold for {revenue:.3}"),
    ));

    let mut market = Market::new(0.0);
    let mut prices = Vec::new();
    for _ in 0..10 {
        market.buy_resource(TradeGood::Food, 10.0, 0.0);
        prices.push(market.price(TradeGood::Food));
    }
    results.push(TestResult::new(
        "market_buys_non_decreasing",
        prices.windows(2).all(|w| w[1] >= w[0]),
        format!("food {:.3} -> {:.3}", prices[0], prices[prices.len() - 1]),
    ));

    let spiked = market.price(TradeGood::Food);
    market.update_prices(3600.0);
    let relaxed = market.price(TradeGood::Food);
    results.push(TestResult::new(
        "market_converges_to_base",
        (relaxed - TradeGood::Food.base_price()).abs() < (spiked - TradeGood::Food.base_price()).abs() * 0.1,
        format!("{spiked:.3} -> {relaxed:.3} after an hour"),
    ));

    let mut market = Market::new(0.0);
    market.sell_resource(TradeGood::Stone, 10_000.0, 0.0);
    results.push(TestResult::new(
        "market_price_floor",
        market.price(TradeGood::Stone) >= 0.1,
        format!("stone at {:.3}", market.price(TradeGood::Stone)),
    ));

    results
}

// ── 5. Scenarios ────────────────────────────────────────────────────────

fn manual_sim() -> Option<ColonySim> {
    ColonySim::new(SimConfig {
        auto_assign_idle: false,
        ..SimConfig::default()
    })
    .ok()
}

fn first_assigned(sim: &ColonySim, building: &str) -> Option<EntityId> {
    sim.entity(building)?
        .building()?
        .assigned_workers
        .first()
        .cloned()
}

fn walk_to_work(sim: &mut ColonySim, worker: &EntityId) -> bool {
    for _ in 0..3000 {
        let working = sim
            .context()
            .store
            .get(worker)
            .and_then(|e| e.worker())
            .map(|w| w.state == WorkerState::Working)
            .unwrap_or(false);
        if working {
            return true;
        }
        sim.frame(FRAME);
    }
    false
}

/// Ticks until the ledger for `resource` changes, up to `limit`.
fn ticks_until_deposit(sim: &mut ColonySim, resource: ResourceKind, limit: u32) -> Option<(u32, f64)> {
    let start = sim.context().resources.get(resource);
    for n in 1..=limit {
        sim.tick();
        let now = sim.context().resources.get(resource);
        if now != start {
            return Some((n, now - start));
        }
    }
    None
}

fn validate_scenarios(verbose: bool) -> Vec<TestResult> {
    println!("--- Scenarios ---");
    let mut results = Vec::new();

    // A: assign, walk, produce
    let outcome = manual_sim().and_then(|mut sim| {
        if !sim.assign("farm1").success {
            return None;
        }
        let worker = first_assigned(&sim, "farm1")?;
        walk_to_work(&mut sim, &worker).then_some(())?;
        ticks_until_deposit(&mut sim, ResourceKind::Food, 20)
    });
    results.push(TestResult::new(
        "scenario_a_farm_cycle",
        outcome == Some((5, 5.0)),
        format!("{outcome:?}"),
    ));

    // B: unaffordable build
    let outcome = manual_sim().map(|mut sim| {
        let before = sim.snapshot();
        let result = sim.build("mine", 5.0, 5.0);
        (result, sim.snapshot() == before)
    });
    results.push(TestResult::new(
        "scenario_b_build_rejected",
        matches!(&outcome, Some((r, true)) if !r.success),
        outcome
            .map(|(r, _)| r.message)
            .unwrap_or_else(|| "engine did not start".into()),
    ));

    // C: empty forest
    let outcome = {
        let mut catalog = Catalog::default();
        if let Some(forest) = catalog.buildings.get_mut(&BuildingKind::Forest) {
            forest.stock.insert(ResourceKind::Wood, 0.0);
        }
        ColonySim::with_catalog(
            SimConfig {
                auto_assign_idle: false,
                ..SimConfig::default()
            },
            catalog,
        )
        .ok()
        .and_then(|mut sim| {
            sim.assign("forest1").success.then_some(())?;
            let worker = first_assigned(&sim, "forest1")?;
            walk_to_work(&mut sim, &worker).then_some(())?;
            sim.drain_events();
            for _ in 0..12 {
                sim.tick();
            }
            let cycles = sim
                .drain_events()
                .iter()
                .filter(|e| matches!(e, SimEvent::CycleCompleted { deposited, .. } if *deposited == 0.0))
                .count();
            Some((cycles, sim.context().resources.wood))
        })
    };
    results.push(TestResult::new(
        "scenario_c_empty_forest",
        outcome == Some((3, 100.0)),
        format!("(cycles, wood) = {outcome:?}"),
    ));

    // D: cycle upgrade
    let outcome = manual_sim().and_then(|mut sim| {
        sim.upgrade("farm1", "crop_rotation").success.then_some(())?;
        sim.assign("farm1").success.then_some(())?;
        let worker = first_assigned(&sim, "farm1")?;
        walk_to_work(&mut sim, &worker).then_some(())?;
        ticks_until_deposit(&mut sim, ResourceKind::Food, 20)
    });
    if verbose {
        println!("  crop rotation: {outcome:?}");
    }
    results.push(TestResult::new(
        "scenario_d_cycle_upgrade",
        outcome.map(|(n, _)| n) == Some(4),
        format!("{outcome:?}"),
    ));

    // Capacity guard
    let outcome = manual_sim().map(|mut sim| {
        let a = sim.assign("farm1").success;
        let b = sim.assign("farm1").success;
        let c = sim.assign("farm1").success;
        let d = sim.unassign("farm1").success;
        let e = sim.assign("farm1").success;
        [a, b, c, d, e]
    });
    results.push(TestResult::new(
        "assign_capacity_guard",
        outcome == Some([true, true, false, true, true]),
        format!("{outcome:?}"),
    ));

    results
}

// ── 6. Soak ─────────────────────────────────────────────────────────────

fn check_invariants(sim: &ColonySim) -> Vec<String> {
    let ctx = sim.context();
    let mut problems = Vec::new();

    for e in ctx.store.iter() {
        if let Some(w) = e.worker() {
            if let Some(target) = &w.assigned_target {
                let listed = ctx
                    .store
                    .get(target)
                    .and_then(|t| t.building())
                    .map(|b| b.is_assigned(&e.id))
                    .unwrap_or(false);
                if !listed {
                    problems.push(format!("{} not listed by {}", e.id, target));
                }
            }
            if w.path.iter().any(|c| !ctx.grid.in_bounds(c.x, c.z)) {
                problems.push(format!("{} has an off-grid path", e.id));
            }
        }
        if let Some(b) = e.building() {
            if b.assigned_workers.len() as u32 > b.capacity {
                problems.push(format!("{} over capacity", e.id));
            }
        }
    }
    for kind in ResourceKind::ALL {
        if ctx.resources.get(kind) < 0.0 {
            problems.push(format!("{kind} negative"));
        }
        if let Some(cap) = ctx.storage_cap(kind) {
            let stored: f64 = ctx
                .store
                .iter()
                .filter_map(|e| e.building())
                .filter_map(|b| b.storage.get(&kind))
                .sum();
            if stored > cap + 1e-9 {
                problems.push(format!("{kind} storage {stored} over cap {cap}"));
            }
        }
    }
    for good in TradeGood::ALL {
        if sim.price(good) < 0.1 {
            problems.push(format!("{good} below price floor"));
        }
    }
    problems
}

fn soak_run(ticks: u64, verbose: bool) -> (Vec<TestResult>, ColonySim) {
    println!("--- Soak ({ticks} ticks) ---");
    let mut results = Vec::new();

    let mut sim = match ColonySim::new(SimConfig::default()) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("engine refused default config: {e}");
            std::process::exit(1);
        }
    };

    let script = [
        Command::Build { kind: "house".into(), x: 4.0, z: 6.0 },
        Command::Build { kind: "warehouse".into(), x: -4.0, z: -6.0 },
        Command::Recruit,
    ];
    for command in &script {
        let result = sim.execute(command);
        if verbose {
            println!("  {}: {}", command.name(), result.message);
        }
    }

    let mut problems = Vec::new();
    let mut cycles = 0;
    while sim.tick_count() < ticks && problems.is_empty() {
        for _ in 0..15 {
            sim.frame(FRAME);
        }
        sim.tick();
        if sim.tick_count() % 60 == 0 {
            sim.execute(&Command::Sell { good: TradeGood::Wood, amount: 5.0 });
            sim.execute(&Command::Recruit);
        }
        cycles += sim
            .drain_events()
            .iter()
            .filter(|e| matches!(e, SimEvent::CycleCompleted { .. }))
            .count();
        problems = check_invariants(&sim);
    }

    results.push(TestResult::new(
        "soak_invariants",
        problems.is_empty(),
        if problems.is_empty() {
            format!("{} ticks clean", sim.tick_count())
        } else {
            format!("tick {}: {}", sim.tick_count(), problems.join("; "))
        },
    ));
    results.push(TestResult::new(
        "soak_production",
        cycles > 0,
        format!("{cycles} production cycles"),
    ));

    let mut buffer = Vec::new();
    let reloaded = sim.save(&mut buffer).and_then(|_| {
        let mut copy = ColonySim::new(SimConfig::default()).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        copy.load(&buffer[..])?;
        Ok(copy.snapshot() == sim.snapshot())
    });
    results.push(TestResult::new(
        "soak_save_roundtrip",
        matches!(reloaded, Ok(true)),
        format!("{} bytes, {reloaded:?}", buffer.len()),
    ));

    (results, sim)
}
