//! Validated resource limits for mixed ground/satellite planning.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};

/// Cardinality, cost and coverage limits checked once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConstraints")]
pub struct ResourceConstraints {
    max_ground_sensors: usize,
    max_satellites: usize,
    max_total_cost: f64,
    target_coverage: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConstraints {
    max_ground_sensors: usize,
    max_satellites: usize,
    max_total_cost: f64,
    target_coverage: f64,
}

impl TryFrom<RawConstraints> for ResourceConstraints {
    type Error = PlannerError;

    fn try_from(raw: RawConstraints) -> Result<Self> {
        ResourceConstraints::new(
            raw.max_ground_sensors,
            raw.max_satellites,
            raw.max_total_cost,
            raw.target_coverage,
        )
    }
}

impl ResourceConstraints {
    /// Fails with [`PlannerError::InfeasibleConstraints`] when the target lies
    /// outside (0, 1], the cost bound is negative or not a number, or no
    /// sensor of any kind is allowed.
    pub fn new(
        max_ground_sensors: usize,
        max_satellites: usize,
        max_total_cost: f64,
        target_coverage: f64,
    ) -> Result<Self> {
        if !(target_coverage > 0.0 && target_coverage <= 1.0) {
            return Err(PlannerError::InfeasibleConstraints(format!(
                "target coverage {target_coverage} is outside (0, 1]"
            )));
        }
        if max_total_cost.is_nan() || max_total_cost < 0.0 {
            return Err(PlannerError::InfeasibleConstraints(format!(
                "max total cost {max_total_cost} must be non-negative"
            )));
        }
        if max_ground_sensors == 0 && max_satellites == 0 {
            return Err(PlannerError::InfeasibleConstraints(
                "no sensors allowed but a positive coverage target is required".to_string(),
            ));
        }
        Ok(Self {
            max_ground_sensors,
            max_satellites,
            max_total_cost,
            target_coverage,
        })
    }

    pub fn max_ground_sensors(&self) -> usize {
        self.max_ground_sensors
    }

    pub fn max_satellites(&self) -> usize {
        self.max_satellites
    }

    pub fn max_total_cost(&self) -> f64 {
        self.max_total_cost
    }

    pub fn target_coverage(&self) -> f64 {
        self.target_coverage
    }

    /// Gene slot budget for the genetic encoding.
    pub fn slot_count(&self) -> usize {
        self.max_ground_sensors + self.max_satellites
    }

    /// Same limits with a different cost ceiling.
    pub fn with_max_total_cost(&self, max_total_cost: f64) -> Result<Self> {
        Self::new(
            self.max_ground_sensors,
            self.max_satellites,
            max_total_cost,
            self.target_coverage,
        )
    }

    /// Same limits with a different coverage target.
    pub fn with_target_coverage(&self, target_coverage: f64) -> Result<Self> {
        Self::new(
            self.max_ground_sensors,
            self.max_satellites,
            self.max_total_cost,
            target_coverage,
        )
    }

    /// Whether a deployment of the given shape respects every limit.
    pub fn is_feasible(&self, ground: usize, satellites: usize, total_cost: f64) -> bool {
        ground <= self.max_ground_sensors
            && satellites <= self.max_satellites
            && total_cost <= self.max_total_cost + 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_constraints() {
        let c = ResourceConstraints::new(5, 2, 1000.0, 0.9).unwrap();
        assert_eq!(c.slot_count(), 7);
        assert!(c.is_feasible(5, 2, 1000.0));
        assert!(!c.is_feasible(6, 0, 10.0));
        assert!(!c.is_feasible(1, 3, 10.0));
        assert!(!c.is_feasible(1, 1, 1000.5));
    }

    #[test]
    fn test_rejects_contradictions() {
        for (g, s, cost, target) in [
            (5, 2, 100.0, 1.2),
            (5, 2, 100.0, 0.0),
            (5, 2, -1.0, 0.5),
            (5, 2, f64::NAN, 0.5),
            (0, 0, 100.0, 0.5),
            (1, 0, 100.0, f64::NAN),
        ] {
            assert!(matches!(
                ResourceConstraints::new(g, s, cost, target),
                Err(PlannerError::InfeasibleConstraints(_))
            ));
        }
    }

    #[test]
    fn test_unbounded_cost_is_allowed() {
        let c = ResourceConstraints::new(1, 0, f64::INFINITY, 1.0).unwrap();
        assert!(c.is_feasible(1, 0, 1e12));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ResourceConstraints = serde_json::from_str(
            r#"{"max_ground_sensors":3,"max_satellites":1,"max_total_cost":50.0,"target_coverage":0.8}"#,
        )
        .unwrap();
        assert_eq!(ok.max_satellites(), 1);
        assert!(serde_json::from_str::<ResourceConstraints>(
            r#"{"max_ground_sensors":3,"max_satellites":1,"max_total_cost":50.0,"target_coverage":1.5}"#,
        )
        .is_err());
    }
}
