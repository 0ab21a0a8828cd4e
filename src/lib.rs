//! Coverage Planner
//!
//! Place ground stations and select satellite passes so that a polygonal
//! region is covered at a target ratio, measured on a regular sample grid.

pub mod addition;
pub mod analysis;
pub mod candidates;
pub mod config;
pub mod constraints;
pub mod coverage;
pub mod error;
pub mod genetic;
pub mod geometry;
pub mod greedy;
pub mod grid;
pub mod position;
pub mod region;
pub mod relationship;
pub mod sensor;
pub mod solution;

pub use addition::{AdditionBudget, AdditionOptimizer, GainRanking};
pub use candidates::{CandidateGenerator, CandidateSite};
pub use config::{ConfigError, PlannerConfig, Scenario, WeightZone};
pub use constraints::ResourceConstraints;
pub use coverage::{CoverageEvaluator, CoverageReport, CoverageStatistics, PointCoverage};
pub use error::{PlannerError, Result};
pub use genetic::{GeneticConfig, GeneticOutcome, GeneticState, HybridGeneticOptimizer};
pub use geometry::Point;
pub use greedy::GreedyMclpSolver;
pub use grid::{build_grid, Grid, GridPoint};
pub use position::{PositionOptimizer, SearchMode};
pub use region::Region;
pub use relationship::{RelationshipAnalyzer, RelationshipScore, SpatialRelation, TemporalRelation};
pub use sensor::{Covering, Footprint, GroundSensor, SatelliteSensor, Sensor, TimeWindow};
pub use solution::{Provenance, Solution, SolutionStatus};

use rand::RngCore;
use tracing::info;

/// Everything a strategy needs to plan one region.
#[derive(Debug, Clone, Copy)]
pub struct PlanningProblem<'a> {
    pub region: &'a Region,
    /// Must have been built from `region`.
    pub grid: &'a Grid,
    /// Network already deployed; empty when planning from scratch.
    pub existing: &'a [Sensor],
    pub target_coverage: f64,
}

/// Trait for coverage strategies
pub trait CoverageStrategy: Send + Sync {
    /// Plan a network for `problem`. Deterministic strategies ignore `rng`.
    fn optimize(&self, problem: &PlanningProblem<'_>, rng: &mut dyn RngCore) -> Result<Solution>;

    /// Name of the strategy
    fn name(&self) -> &'static str;
}

/// Reposition the existing network, then add sensors only if the target is
/// still out of reach.
#[derive(Debug, Clone)]
pub struct SmartOptimizer {
    pub position: PositionOptimizer,
    pub addition: AdditionOptimizer,
    pub budget: AdditionBudget,
}

impl SmartOptimizer {
    pub fn new(grid_resolution: f64, sensor_radius: f64) -> Result<Self> {
        Ok(Self {
            position: PositionOptimizer::for_sensor_radius(grid_resolution, sensor_radius),
            addition: AdditionOptimizer::new(grid_resolution, sensor_radius)?,
            budget: AdditionBudget::unlimited(),
        })
    }

    pub fn with_budget(mut self, budget: AdditionBudget) -> Self {
        self.budget = budget;
        self
    }
}

impl CoverageStrategy for SmartOptimizer {
    fn name(&self) -> &'static str {
        "smart"
    }

    fn optimize(&self, problem: &PlanningProblem<'_>, rng: &mut dyn RngCore) -> Result<Solution> {
        let target = problem.target_coverage;
        let repositioned = if problem.existing.is_empty() {
            None
        } else {
            let position = self.position.clone().with_target(target);
            let moved = position.optimize(problem.region, problem.existing, problem.grid, rng)?;
            info!(ratio = moved.coverage_ratio(), "smart: repositioning done");
            if moved.coverage_ratio() >= target || moved.status() == SolutionStatus::EmptyRegion {
                return Ok(moved.relabel(Provenance::Smart, moved.status()));
            }
            Some(moved)
        };

        let base = repositioned
            .as_ref()
            .map_or(problem.existing, |s| s.sensors());
        let extended = self
            .addition
            .optimize(base, problem.region, problem.grid, target, self.budget)?;
        info!(
            ratio = extended.coverage_ratio(),
            sensors = extended.len(),
            status = ?extended.status(),
            "smart: addition done"
        );
        Ok(extended.relabel(Provenance::Smart, extended.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Region, Grid) {
        let region = Region::rectangle((0.0, 0.0), (10.0, 10.0)).unwrap();
        let grid = build_grid(&region, 0.5).unwrap();
        (region, grid)
    }

    #[test]
    fn test_strategies_share_interface() {
        let strategies: Vec<Box<dyn CoverageStrategy>> = vec![
            Box::new(GreedyMclpSolver::new(0.8, 3.0, 0.5).unwrap()),
            Box::new(AdditionOptimizer::new(0.5, 3.0).unwrap()),
            Box::new(SmartOptimizer::new(0.5, 3.0).unwrap()),
        ];
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["greedy_mclp", "addition", "smart"]);

        let (region, grid) = setup();
        let problem = PlanningProblem {
            region: &region,
            grid: &grid,
            existing: &[],
            target_coverage: 0.8,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for strategy in &strategies {
            let sol = strategy.optimize(&problem, &mut rng).unwrap();
            assert!(sol.coverage_ratio() >= 0.8, "{} fell short", strategy.name());
        }
    }

    #[test]
    fn test_smart_skips_addition_when_reposition_suffices() {
        let (region, grid) = setup();
        // Two stations stacked in a corner; spreading them out covers far more.
        let existing = vec![
            Sensor::from(GroundSensor::new("a", 0.0, 0.0, 4.0)),
            Sensor::from(GroundSensor::new("b", 0.5, 0.0, 4.0)),
        ];
        let problem = PlanningProblem {
            region: &region,
            grid: &grid,
            existing: &existing,
            target_coverage: 0.3,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sol = SmartOptimizer::new(0.5, 4.0)
            .unwrap()
            .optimize(&problem, &mut rng)
            .unwrap();
        assert_eq!(sol.len(), 2);
        assert_eq!(sol.provenance(), Provenance::Smart);
        assert_eq!(sol.status(), SolutionStatus::TargetMet);
        assert!(sol.coverage_ratio() >= 0.3);
    }

    #[test]
    fn test_smart_adds_when_reposition_falls_short() {
        let (region, grid) = setup();
        let existing = vec![Sensor::from(GroundSensor::new("a", 5.0, 5.0, 3.0))];
        let problem = PlanningProblem {
            region: &region,
            grid: &grid,
            existing: &existing,
            target_coverage: 0.8,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let sol = SmartOptimizer::new(0.5, 3.0)
            .unwrap()
            .optimize(&problem, &mut rng)
            .unwrap();
        assert!(sol.len() > 1);
        assert!(sol.coverage_ratio() >= 0.8);
        assert!(sol.sensors().iter().any(|s| s.id() == "a"));
    }
}
