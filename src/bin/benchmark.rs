//! Benchmark runner for coverage strategies
//!
//! Plans the 10x10 square (resolution 0.5, radius 3, target 0.8) with every
//! strategy and prints coverage, cost and timing.

use std::time::Instant;

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

use coverage_planner::{
    build_grid, AdditionOptimizer, CoverageStrategy, GeneticConfig, GreedyMclpSolver, GroundSensor,
    HybridGeneticOptimizer, PlanningProblem, PositionOptimizer, Region, ResourceConstraints, Sensor,
    SmartOptimizer,
};

const RESOLUTION: f64 = 0.5;
const RADIUS: f64 = 3.0;
const TARGET: f64 = 0.8;

fn entry<S: CoverageStrategy + 'static>(strategy: S, existing: &[Sensor]) -> (Box<dyn CoverageStrategy>, &[Sensor]) {
    (Box::new(strategy), existing)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let runs: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(3);
    let seed: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(42);

    println!("Coverage Planner Benchmark");
    println!("==========================\n");

    let region = Region::rectangle((0.0, 0.0), (10.0, 10.0))?;
    let grid = build_grid(&region, RESOLUTION)?;
    println!("Region 10x10, {} inside grid points, {} runs\n", grid.inside_count(), runs);

    // Four stations crowded into one corner, for the strategies that start
    // from an existing network.
    let crowded: Vec<Sensor> = [(1.0, 1.0), (2.0, 1.0), (1.0, 2.0), (2.0, 2.0)]
        .iter()
        .enumerate()
        .map(|(i, &(x, y))| Sensor::from(GroundSensor::new(format!("base-{}", i + 1), x, y, RADIUS)))
        .collect();

    let constraints = ResourceConstraints::new(6, 0, 6.0, TARGET)?;
    let strategies = vec![
        entry(GreedyMclpSolver::new(TARGET, RADIUS, RESOLUTION)?, &[]),
        entry(PositionOptimizer::for_sensor_radius(RESOLUTION, RADIUS), &crowded),
        entry(PositionOptimizer::for_sensor_radius(RESOLUTION, RADIUS).hill_climb(), &crowded),
        entry(AdditionOptimizer::new(RESOLUTION, RADIUS)?, &crowded[..1]),
        entry(
            HybridGeneticOptimizer::new(constraints, RADIUS, 1.0)?.with_config(GeneticConfig {
                generations: 40,
                ..Default::default()
            }),
            &[],
        ),
        entry(SmartOptimizer::new(RESOLUTION, RADIUS)?, &crowded),
    ];

    println!(
        "{:<22} {:>8} {:>8} {:>8} {:>10}  {}",
        "strategy", "best", "mean", "sensors", "avg time", "status"
    );
    for (strategy, existing) in &strategies {
        let existing: &[Sensor] = existing;
        let problem = PlanningProblem {
            region: &region,
            grid: &grid,
            existing,
            target_coverage: TARGET,
        };

        let mut best = f64::NEG_INFINITY;
        let mut total = 0.0;
        let mut total_time = 0.0;
        let mut last = None;
        for run in 0..runs {
            let mut rng = ChaCha8Rng::seed_from_u64(seed + run as u64);
            let start = Instant::now();
            let solution = strategy.optimize(&problem, &mut rng)?;
            total_time += start.elapsed().as_secs_f64();

            let ratio = solution.coverage_ratio();
            total += ratio;
            if ratio > best {
                best = ratio;
            }
            last = Some(solution);
        }

        if let Some(solution) = last {
            println!(
                "{:<22} {:>8.4} {:>8.4} {:>8} {:>9.3}s  {:?}",
                strategy.name(),
                best,
                total / runs as f64,
                solution.len(),
                total_time / runs as f64,
                solution.status()
            );
        }
    }

    Ok(())
}
