//! Reporting helpers: layout comparison, cost effectiveness and budget sweeps.

use crate::coverage::CoverageEvaluator;
use crate::error::{ensure_non_negative, Result};
use crate::genetic::HybridGeneticOptimizer;
use crate::grid::Grid;
use crate::region::Region;
use crate::sensor::Sensor;
use crate::solution::Solution;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutComparison {
    pub before_ratio: f64,
    pub after_ratio: f64,
    pub improvement: f64,
    pub before_sensors: usize,
    pub after_sensors: usize,
    /// Mean multiplicity over covered points.
    pub before_redundancy: f64,
    pub after_redundancy: f64,
}

/// Compare two layouts of the same region on one grid.
pub fn compare_layouts(region: &Region, grid: &Grid, before: &[Sensor], after: &[Sensor]) -> LayoutComparison {
    let evaluator = CoverageEvaluator::new();
    let b = evaluator.statistics(before, grid, region);
    let a = evaluator.statistics(after, grid, region);
    LayoutComparison {
        before_ratio: b.coverage_ratio,
        after_ratio: a.coverage_ratio,
        improvement: a.coverage_ratio - b.coverage_ratio,
        before_sensors: before.len(),
        after_sensors: after.len(),
        before_redundancy: b.mean_redundancy,
        after_redundancy: a.mean_redundancy,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEffectiveness {
    pub coverage_gain: f64,
    pub added_cost: f64,
    pub added_sensors: isize,
    /// `None` when nothing was spent.
    pub gain_per_cost: Option<f64>,
    /// `None` when no sensor was added.
    pub gain_per_sensor: Option<f64>,
}

/// What an extension bought relative to the network it extended.
pub fn cost_effectiveness(original: &Solution, extended: &Solution) -> CostEffectiveness {
    let coverage_gain = extended.coverage_ratio() - original.coverage_ratio();
    let added_cost = extended.total_cost() - original.total_cost();
    let added_sensors = extended.len() as isize - original.len() as isize;
    CostEffectiveness {
        coverage_gain,
        added_cost,
        added_sensors,
        gain_per_cost: (added_cost > 0.0).then(|| coverage_gain / added_cost),
        gain_per_sensor: (added_sensors > 0).then(|| coverage_gain / added_sensors as f64),
    }
}

/// Result of the hybrid optimizer at one cost ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetPoint {
    pub budget: f64,
    pub solution: Solution,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginalEfficiency {
    pub from_budget: f64,
    pub to_budget: f64,
    pub coverage_gain: f64,
    pub cost_increase: f64,
    /// Coverage gained per unit of extra cost; `None` when cost did not rise.
    pub efficiency: Option<f64>,
}

/// Run the hybrid optimizer once per budget level, ascending, keeping only
/// results within their budget.
pub fn budget_sweep<R: Rng + ?Sized>(
    optimizer: &HybridGeneticOptimizer,
    region: &Region,
    grid: &Grid,
    budgets: &[f64],
    rng: &mut R,
) -> Result<Vec<BudgetPoint>> {
    let mut levels = budgets.to_vec();
    for &b in &levels {
        ensure_non_negative("budget level", b)?;
    }
    levels.sort_by(f64::total_cmp);
    levels.dedup();

    let mut points = Vec::with_capacity(levels.len());
    for budget in levels {
        let tuned = HybridGeneticOptimizer {
            constraints: optimizer.constraints.with_max_total_cost(budget)?,
            ..optimizer.clone()
        };
        let solution = tuned.optimize(region, grid, rng)?.solution;
        info!(
            budget,
            ratio = solution.coverage_ratio(),
            cost = solution.total_cost(),
            "budget level evaluated"
        );
        if solution.total_cost() <= budget + 1e-9 {
            points.push(BudgetPoint { budget, solution });
        }
    }
    Ok(points)
}

/// Points not dominated by any other (higher or equal coverage at lower or
/// equal cost, strictly better in one), in input order.
pub fn pareto_front(points: &[BudgetPoint]) -> Vec<BudgetPoint> {
    points
        .iter()
        .filter(|p| {
            !points.iter().any(|q| {
                let (pc, pr) = (p.solution.total_cost(), p.solution.coverage_ratio());
                let (qc, qr) = (q.solution.total_cost(), q.solution.coverage_ratio());
                qc <= pc && qr >= pr && (qc < pc || qr > pr)
            })
        })
        .cloned()
        .collect()
}

/// Marginal coverage per unit cost between consecutive budget levels.
pub fn marginal_efficiency(points: &[BudgetPoint]) -> Vec<MarginalEfficiency> {
    let mut sorted: Vec<&BudgetPoint> = points.iter().collect();
    sorted.sort_by(|a, b| a.budget.total_cmp(&b.budget));
    sorted
        .windows(2)
        .map(|w| {
            let coverage_gain = w[1].solution.coverage_ratio() - w[0].solution.coverage_ratio();
            let cost_increase = w[1].solution.total_cost() - w[0].solution.total_cost();
            MarginalEfficiency {
                from_budget: w[0].budget,
                to_budget: w[1].budget,
                coverage_gain,
                cost_increase,
                efficiency: (cost_increase > 0.0).then(|| coverage_gain / cost_increase),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ResourceConstraints;
    use crate::genetic::GeneticConfig;
    use crate::grid::build_grid;
    use crate::sensor::GroundSensor;
    use crate::solution::{Provenance, SolutionStatus};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Region, Grid) {
        let region = Region::rectangle((0.0, 0.0), (10.0, 10.0)).unwrap();
        let grid = build_grid(&region, 0.5).unwrap();
        (region, grid)
    }

    fn solution(ratio: f64, costs: &[f64]) -> Solution {
        let sensors = costs
            .iter()
            .enumerate()
            .map(|(i, &c)| Sensor::from(GroundSensor::new(format!("s{i}"), 0.0, 0.0, 1.0).with_cost(c)))
            .collect();
        Solution::new(sensors, ratio, Provenance::Existing, SolutionStatus::TargetMet)
    }

    #[test]
    fn test_compare_layouts() {
        let (region, grid) = setup();
        let before = vec![Sensor::from(GroundSensor::new("a", 5.0, 5.0, 2.0))];
        let mut after = before.clone();
        after.push(Sensor::from(GroundSensor::new("b", 5.5, 5.0, 2.0)));
        let cmp = compare_layouts(&region, &grid, &before, &after);
        assert!(cmp.improvement > 0.0);
        assert_relative_eq!(cmp.before_redundancy, 1.0);
        assert!(cmp.after_redundancy > 1.0);
        assert_eq!(cmp.after_sensors, 2);
    }

    #[test]
    fn test_cost_effectiveness() {
        let original = solution(0.5, &[10.0]);
        let extended = solution(0.8, &[10.0, 5.0, 5.0]);
        let ce = cost_effectiveness(&original, &extended);
        assert_relative_eq!(ce.coverage_gain, 0.3, epsilon = 1e-12);
        assert_relative_eq!(ce.gain_per_cost.unwrap(), 0.03, epsilon = 1e-12);
        assert_relative_eq!(ce.gain_per_sensor.unwrap(), 0.15, epsilon = 1e-12);

        let same = cost_effectiveness(&original, &original);
        assert_eq!(same.gain_per_cost, None);
        assert_eq!(same.gain_per_sensor, None);
    }

    #[test]
    fn test_pareto_and_marginal_efficiency() {
        let points = vec![
            BudgetPoint { budget: 10.0, solution: solution(0.4, &[10.0]) },
            BudgetPoint { budget: 30.0, solution: solution(0.7, &[10.0, 10.0]) },
            BudgetPoint { budget: 20.0, solution: solution(0.35, &[10.0, 10.0]) },
        ];
        let front = pareto_front(&points);
        let budgets: Vec<f64> = front.iter().map(|p| p.budget).collect();
        assert_eq!(budgets, vec![10.0, 30.0]);

        let steps = marginal_efficiency(&front);
        assert_eq!(steps.len(), 1);
        assert_relative_eq!(steps[0].coverage_gain, 0.3, epsilon = 1e-12);
        assert_relative_eq!(steps[0].efficiency.unwrap(), 0.03, epsilon = 1e-12);
    }

    #[test]
    fn test_budget_sweep_respects_levels() {
        let (region, grid) = setup();
        let constraints = ResourceConstraints::new(4, 0, 100.0, 0.9).unwrap();
        let optimizer = HybridGeneticOptimizer::new(constraints, 3.0, 10.0)
            .unwrap()
            .with_config(GeneticConfig {
                population_size: 12,
                generations: 10,
                elite_count: 1,
                ..Default::default()
            });
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let points = budget_sweep(&optimizer, &region, &grid, &[40.0, 10.0, 20.0], &mut rng).unwrap();
        let budgets: Vec<f64> = points.iter().map(|p| p.budget).collect();
        assert_eq!(budgets, vec![10.0, 20.0, 40.0]);
        assert!(points.iter().all(|p| p.solution.total_cost() <= p.budget));
        assert!(points[0].solution.ground_count() <= 1);
    }
}
