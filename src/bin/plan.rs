//! Coverage planning CLI.
//!
//! Every subcommand reads a scenario JSON file and prints its result as JSON
//! on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coverage_planner::analysis::{budget_sweep, cost_effectiveness, marginal_efficiency, pareto_front};
use coverage_planner::{
    CoverageEvaluator, CoverageStrategy, Grid, PlanningProblem, Provenance, RelationshipAnalyzer, Scenario,
    Sensor, SmartOptimizer, Solution,
};

#[derive(Parser)]
#[command(name = "plan")]
#[command(about = "Plan ground station and satellite coverage for a region")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Override the scenario's random seed
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Place stations from scratch with the greedy MCLP heuristic.
    Greedy {
        scenario: PathBuf,
        /// Stop after this many stations
        #[arg(long)]
        max_stations: Option<usize>,
    },

    /// Move the existing ground stations to better sites.
    Position {
        scenario: PathBuf,
        /// Deterministic steepest ascent instead of annealing
        #[arg(long)]
        hill_climb: bool,
    },

    /// Add stations or passes to the existing network.
    Addition { scenario: PathBuf },

    /// Mixed ground/satellite search under resource constraints.
    Hybrid {
        scenario: PathBuf,
        /// Sweep these cost ceilings (comma-separated) instead of a single run
        #[arg(long, value_delimiter = ',')]
        budgets: Vec<f64>,
    },

    /// Reposition first, then add only if still short of target.
    Smart { scenario: PathBuf },

    /// Pairwise relationships between existing sensors and candidate passes.
    Relate { scenario: PathBuf },

    /// Coverage statistics of the existing network.
    Stats { scenario: PathBuf },
}

fn load(path: &Path, seed: Option<u64>) -> Result<(Scenario, Grid)> {
    let mut scenario =
        Scenario::from_json_file(path).with_context(|| format!("loading scenario {}", path.display()))?;
    if seed.is_some() {
        scenario.config.random_seed = seed;
    }
    let grid = scenario.build_grid().context("building sample grid")?;
    info!(
        inside = grid.inside_count(),
        resolution = grid.resolution(),
        existing = scenario.existing.len(),
        "scenario loaded"
    );
    Ok((scenario, grid))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Greedy { scenario, max_stations } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            let mut solver = scenario.config.greedy_solver()?;
            solver.max_stations = max_stations;
            let solution = solver.solve_on_grid(&scenario.region, &grid)?;
            print_json(&solution)?;
        }

        Commands::Position { scenario, hill_climb } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            if scenario.existing.is_empty() {
                bail!("scenario has no existing sensors to reposition");
            }
            let mut optimizer = scenario.config.position_optimizer()?;
            if hill_climb {
                optimizer = optimizer.hill_climb();
            }
            let mut rng = scenario.config.rng();
            let solution = optimizer.optimize(&scenario.region, &scenario.existing, &grid, &mut rng)?;
            let before = Solution::from_sensors(
                scenario.existing.clone(),
                &grid,
                scenario.config.coverage_ratio_target,
                Provenance::Existing,
            );
            print_json(&json!({
                "before_ratio": before.coverage_ratio(),
                "solution": solution,
            }))?;
        }

        Commands::Addition { scenario } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            let config = &scenario.config;
            let optimizer = config.addition_optimizer(scenario.satellite_candidates.clone())?;
            let original = Solution::from_sensors(
                scenario.existing.clone(),
                &grid,
                config.coverage_ratio_target,
                Provenance::Existing,
            );
            let extended = optimizer.extend(
                &original,
                &scenario.region,
                &grid,
                config.coverage_ratio_target,
                config.addition_budget(),
            )?;
            print_json(&json!({
                "solution": extended,
                "effectiveness": cost_effectiveness(&original, &extended),
            }))?;
        }

        Commands::Hybrid { scenario, budgets } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            let optimizer = scenario
                .config
                .genetic_optimizer(scenario.satellite_candidates.clone())?;
            let mut rng = scenario.config.rng();
            if budgets.is_empty() {
                let outcome = if scenario.existing.is_empty() {
                    optimizer.optimize(&scenario.region, &grid, &mut rng)?
                } else {
                    optimizer.refine(&scenario.region, &grid, &scenario.existing, &mut rng)?
                };
                print_json(&outcome)?;
            } else {
                let points = budget_sweep(&optimizer, &scenario.region, &grid, &budgets, &mut rng)?;
                print_json(&json!({
                    "pareto_front": pareto_front(&points),
                    "marginal_efficiency": marginal_efficiency(&points),
                    "points": points,
                }))?;
            }
        }

        Commands::Smart { scenario } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            let config = &scenario.config;
            let smart = SmartOptimizer {
                position: config.position_optimizer()?,
                addition: config.addition_optimizer(scenario.satellite_candidates.clone())?,
                budget: config.addition_budget(),
            };
            let problem = PlanningProblem {
                region: &scenario.region,
                grid: &grid,
                existing: &scenario.existing,
                target_coverage: config.coverage_ratio_target,
            };
            let mut rng = config.rng();
            let solution = smart.optimize(&problem, &mut rng)?;
            print_json(&solution)?;
        }

        Commands::Relate { scenario } => {
            let (scenario, _grid) = load(&scenario, cli.seed)?;
            let roster: Vec<Sensor> = scenario
                .existing
                .iter()
                .cloned()
                .chain(scenario.satellite_candidates.iter().cloned().map(Sensor::from))
                .collect();
            let analyzer = RelationshipAnalyzer::default();
            print_json(&json!({
                "pairs": analyzer.analyze_roster(&roster),
                "matrix": analyzer.relationship_matrix(&roster),
            }))?;
        }

        Commands::Stats { scenario } => {
            let (scenario, grid) = load(&scenario, cli.seed)?;
            let stats = CoverageEvaluator::new().statistics(&scenario.existing, &grid, &scenario.region);
            print_json(&stats)?;
        }
    }

    Ok(())
}
