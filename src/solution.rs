//! Solver output value objects.

use crate::coverage::CoverageEvaluator;
use crate::grid::Grid;
use crate::sensor::{Covering, Sensor};
use serde::{Deserialize, Serialize};

/// Which stage produced a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Existing,
    GreedyMclp,
    PositionOptimizer,
    AdditionOptimizer,
    HybridGenetic,
    Smart,
}

/// How a search ended. Only the error taxonomy aborts a call; everything
/// here comes back attached to a usable solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    TargetMet,
    /// No remaining candidate adds coverage; the partial solution is returned.
    CoverageTargetUnreachable,
    /// A count or cost cap stopped the search before the target.
    BudgetExhausted,
    /// Search stalled for a patience window.
    Converged,
    IterationLimitReached,
    /// Grid has no inside points, so the ratio is 0 by definition.
    EmptyRegion,
}

/// Selected sensors with their achieved coverage and cost.
///
/// Fields are private: a returned solution is never mutated, later stages
/// build new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    sensors: Vec<Sensor>,
    coverage_ratio: f64,
    total_cost: f64,
    provenance: Provenance,
    status: SolutionStatus,
}

impl Solution {
    pub fn new(
        sensors: Vec<Sensor>,
        coverage_ratio: f64,
        provenance: Provenance,
        status: SolutionStatus,
    ) -> Self {
        let total_cost = sensors.iter().map(|s| s.cost()).sum();
        Self {
            sensors,
            coverage_ratio,
            total_cost,
            provenance,
            status,
        }
    }

    /// Evaluate `sensors` on `grid` and wrap them. The status is `TargetMet`
    /// when `target` is reached, `EmptyRegion` for an empty grid, and
    /// `CoverageTargetUnreachable` otherwise.
    pub fn from_sensors(sensors: Vec<Sensor>, grid: &Grid, target: f64, provenance: Provenance) -> Self {
        let ratio = CoverageEvaluator::new().coverage_ratio(&sensors, grid);
        let status = if grid.is_empty() {
            SolutionStatus::EmptyRegion
        } else if ratio >= target {
            SolutionStatus::TargetMet
        } else {
            SolutionStatus::CoverageTargetUnreachable
        };
        Self::new(sensors, ratio, provenance, status)
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn into_sensors(self) -> Vec<Sensor> {
        self.sensors
    }

    pub fn coverage_ratio(&self) -> f64 {
        self.coverage_ratio
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn status(&self) -> SolutionStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    pub fn ground_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_ground()).count()
    }

    pub fn satellite_count(&self) -> usize {
        self.sensors.len() - self.ground_count()
    }

    pub fn is_success(&self) -> bool {
        self.status == SolutionStatus::TargetMet
    }

    /// Re-label as the product of a later stage without touching the sensors.
    pub fn relabel(&self, provenance: Provenance, status: SolutionStatus) -> Self {
        Self {
            provenance,
            status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::build_grid;
    use crate::region::Region;
    use crate::sensor::{GroundSensor, SatelliteSensor, TimeWindow};
    use approx::assert_relative_eq;

    #[test]
    fn test_from_sensors_status_and_cost() {
        let region = Region::rectangle((0.0, 0.0), (4.0, 4.0)).unwrap();
        let grid = build_grid(&region, 1.0).unwrap();
        let sensors = vec![
            Sensor::from(GroundSensor::new("a", 2.0, 2.0, 10.0).with_cost(3.0)),
            Sensor::from(SatelliteSensor::swath(
                "s",
                (0.0, 0.0),
                (4.0, 0.0),
                1.0,
                TimeWindow::new(0.0, 1.0).unwrap(),
                7.5,
            )),
        ];
        let sol = Solution::from_sensors(sensors, &grid, 0.9, Provenance::Existing);
        assert_eq!(sol.status(), SolutionStatus::TargetMet);
        assert!(sol.is_success());
        assert_relative_eq!(sol.coverage_ratio(), 1.0);
        assert_relative_eq!(sol.total_cost(), 10.5);
        assert_eq!(sol.ground_count(), 1);
        assert_eq!(sol.satellite_count(), 1);

        let later = sol.relabel(Provenance::Smart, SolutionStatus::Converged);
        assert_eq!(later.sensors(), sol.sensors());
        assert_eq!(later.provenance(), Provenance::Smart);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SolutionStatus::CoverageTargetUnreachable).unwrap();
        assert_eq!(json, "\"coverage_target_unreachable\"");
    }
}
