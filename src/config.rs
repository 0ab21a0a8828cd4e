//! Planner configuration and scenario files.
//!
//! Both are JSON. Every solver is built through [`PlannerConfig`], which
//! validates once before constructing anything.

use crate::addition::{AdditionBudget, AdditionOptimizer};
use crate::constraints::ResourceConstraints;
use crate::error::{ensure_non_negative, ensure_positive, ensure_probability, ensure_ratio, PlannerError};
use crate::genetic::{GeneticConfig, HybridGeneticOptimizer};
use crate::geometry::{self, Point};
use crate::greedy::GreedyMclpSolver;
use crate::grid::{build_grid, Grid};
use crate::position::PositionOptimizer;
use crate::region::Region;
use crate::sensor::{validate_satellites, validate_sensors, SatelliteSensor, Sensor};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] PlannerError),
}

/// Recognized planning options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    pub coverage_ratio_target: f64,
    pub sensor_radius: f64,
    pub grid_resolution: f64,
    pub sensor_cost: f64,
    pub max_ground_sensors: usize,
    pub max_satellites: usize,
    pub max_total_cost: f64,
    /// Position optimizer move budget.
    pub max_iterations: usize,
    /// Stall window shared by the position and genetic optimizers.
    pub patience: usize,
    pub generations: usize,
    pub population_size: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub random_seed: Option<u64>,
    pub max_additional_sensors: Option<usize>,
    pub addition_budget_cost: Option<f64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            coverage_ratio_target: 0.8,
            sensor_radius: 3.0,
            grid_resolution: 0.5,
            sensor_cost: 1.0,
            max_ground_sensors: 10,
            max_satellites: 2,
            max_total_cost: 1000.0,
            max_iterations: 2000,
            patience: 50,
            generations: 50,
            population_size: 30,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            random_seed: None,
            max_additional_sensors: None,
            addition_budget_cost: None,
        }
    }
}

impl PlannerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Single validation entry point for every option.
    pub fn validate(&self) -> Result<(), PlannerError> {
        ensure_ratio("coverage_ratio_target", self.coverage_ratio_target)?;
        ensure_positive("sensor_radius", self.sensor_radius)?;
        ensure_positive("grid_resolution", self.grid_resolution)?;
        ensure_non_negative("sensor_cost", self.sensor_cost)?;
        ensure_probability("mutation_rate", self.mutation_rate)?;
        ensure_probability("crossover_rate", self.crossover_rate)?;
        if self.max_iterations == 0 || self.generations == 0 {
            return Err(PlannerError::InvalidParameter(
                "max_iterations and generations must be positive".to_string(),
            ));
        }
        if let Some(cost) = self.addition_budget_cost {
            ensure_non_negative("addition_budget_cost", cost)?;
        }
        self.resource_constraints()?;
        self.genetic_config().validate()
    }

    pub fn resource_constraints(&self) -> Result<ResourceConstraints, PlannerError> {
        ResourceConstraints::new(
            self.max_ground_sensors,
            self.max_satellites,
            self.max_total_cost,
            self.coverage_ratio_target,
        )
    }

    pub fn greedy_solver(&self) -> Result<GreedyMclpSolver, PlannerError> {
        self.validate()?;
        Ok(
            GreedyMclpSolver::new(self.coverage_ratio_target, self.sensor_radius, self.grid_resolution)?
                .with_sensor_cost(self.sensor_cost),
        )
    }

    pub fn position_optimizer(&self) -> Result<PositionOptimizer, PlannerError> {
        self.validate()?;
        let optimizer = PositionOptimizer {
            max_iterations: self.max_iterations,
            patience: self.patience,
            ..PositionOptimizer::for_sensor_radius(self.grid_resolution, self.sensor_radius)
        }
        .with_target(self.coverage_ratio_target);
        optimizer.validate()?;
        Ok(optimizer)
    }

    pub fn addition_optimizer(&self, satellites: Vec<SatelliteSensor>) -> Result<AdditionOptimizer, PlannerError> {
        self.validate()?;
        Ok(AdditionOptimizer::new(self.grid_resolution, self.sensor_radius)?
            .with_sensor_cost(self.sensor_cost)
            .with_satellite_candidates(satellites))
    }

    pub fn addition_budget(&self) -> AdditionBudget {
        AdditionBudget {
            max_sensors: self.max_additional_sensors,
            max_cost: self.addition_budget_cost,
        }
    }

    pub fn genetic_config(&self) -> GeneticConfig {
        GeneticConfig {
            population_size: self.population_size,
            generations: self.generations,
            patience: self.patience,
            mutation_rate: self.mutation_rate,
            crossover_rate: self.crossover_rate,
            elite_count: (self.population_size / 10).max(1),
            ..Default::default()
        }
    }

    pub fn genetic_optimizer(&self, satellites: Vec<SatelliteSensor>) -> Result<HybridGeneticOptimizer, PlannerError> {
        self.validate()?;
        Ok(
            HybridGeneticOptimizer::new(self.resource_constraints()?, self.sensor_radius, self.sensor_cost)?
                .with_config(self.genetic_config())
                .with_satellite_candidates(satellites),
        )
    }

    /// The run's random source: seeded when `random_seed` is set.
    pub fn rng(&self) -> ChaCha8Rng {
        match self.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        }
    }
}

/// Polygon whose inside grid points get a non-default importance weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightZone {
    pub polygon: Vec<Point>,
    pub weight: f64,
}

/// A complete planning input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub region: Region,
    #[serde(default)]
    pub existing: Vec<Sensor>,
    #[serde(default)]
    pub satellite_candidates: Vec<SatelliteSensor>,
    /// Later zones override earlier ones where they overlap.
    #[serde(default)]
    pub weight_zones: Vec<WeightZone>,
    #[serde(default)]
    pub config: PlannerConfig,
}

impl Scenario {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let scenario: Self = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Config, sensors and weight zones; run by every loader.
    pub fn validate(&self) -> Result<(), PlannerError> {
        self.config.validate()?;
        validate_sensors(&self.existing)?;
        validate_satellites(&self.satellite_candidates)?;
        for zone in &self.weight_zones {
            ensure_non_negative("weight zone weight", zone.weight)?;
        }
        Ok(())
    }

    /// Grid at the configured resolution with weight zones applied.
    pub fn build_grid(&self) -> Result<Grid, PlannerError> {
        let grid = build_grid(&self.region, self.config.grid_resolution)?;
        if self.weight_zones.is_empty() {
            return Ok(grid);
        }
        grid.with_weights(|p| {
            self.weight_zones
                .iter()
                .rev()
                .find(|z| geometry::point_in_polygon(p, &z.polygon))
                .map_or(1.0, |z| z.weight)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    #[test]
    fn test_default_is_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.greedy_solver().is_ok());
        assert!(config.position_optimizer().is_ok());
        assert_eq!(config.genetic_config().elite_count, 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PlannerConfig::from_json_str(r#"{"sensor_radius": 5.0, "random_seed": 7}"#).unwrap();
        assert_relative_eq!(config.sensor_radius, 5.0);
        assert_relative_eq!(config.grid_resolution, 0.5);
        assert_eq!(config.random_seed, Some(7));
    }

    #[test]
    fn test_rejects_unknown_and_invalid() {
        assert!(matches!(
            PlannerConfig::from_json_str(r#"{"sensor_radus": 5.0}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            PlannerConfig::from_json_str(r#"{"coverage_ratio_target": 1.5}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PlannerConfig::from_json_str(r#"{"max_ground_sensors": 0, "max_satellites": 0}"#),
            Err(ConfigError::Invalid(PlannerError::InfeasibleConstraints(_)))
        ));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = PlannerConfig {
            random_seed: Some(99),
            ..Default::default()
        };
        let a: u64 = config.rng().gen();
        let b: u64 = config.rng().gen();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scenario_with_weight_zone() {
        let json = r#"{
            "region": [[0, 0], [4, 0], [4, 4], [0, 4]],
            "existing": [{"kind": "ground", "id": "a", "x": 1.0, "y": 1.0, "radius": 1.0}],
            "weight_zones": [{"polygon": [[0, 0], [2, 0], [2, 4], [0, 4]], "weight": 3.0}],
            "config": {"grid_resolution": 1.0}
        }"#;
        let scenario = Scenario::from_json_str(json).unwrap();
        assert_eq!(scenario.existing.len(), 1);
        let grid = scenario.build_grid().unwrap();
        // columns x = 0, 1, 2 weigh 3; x = 3, 4 weigh 1
        assert_relative_eq!(grid.total_weight(), 15.0 * 3.0 + 10.0);
    }

    #[test]
    fn test_scenario_rejects_invalid_sensors() {
        let negative_ground = r#"{
            "region": [[0, 0], [4, 0], [4, 4], [0, 4]],
            "existing": [{"kind": "ground", "id": "a", "x": 1.0, "y": 1.0, "radius": -2.0, "cost": -50.0}]
        }"#;
        assert!(matches!(
            Scenario::from_json_str(negative_ground),
            Err(ConfigError::Invalid(PlannerError::InvalidParameter(_)))
        ));

        let cheap_pass = r#"{
            "region": [[0, 0], [4, 0], [4, 4], [0, 4]],
            "satellite_candidates": [{
                "id": "p",
                "footprints": [{"window": {"start": 0.0, "end": 1.0}, "polygon": [[0, 0], [4, 0], [4, 4]]}],
                "cost": -1000.0
            }]
        }"#;
        assert!(matches!(Scenario::from_json_str(cheap_pass), Err(ConfigError::Invalid(_))));

        let degenerate_footprint = r#"{
            "region": [[0, 0], [4, 0], [4, 4], [0, 4]],
            "satellite_candidates": [{
                "id": "p",
                "footprints": [{"window": {"start": 0.0, "end": 1.0}, "polygon": [[0, 0], [4, 0]]}]
            }]
        }"#;
        assert!(matches!(Scenario::from_json_str(degenerate_footprint), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_scenario_rejects_bad_region() {
        let json = r#"{"region": [[0, 0], [1, 1]]}"#;
        assert!(matches!(Scenario::from_json_str(json), Err(ConfigError::Parse(_))));
    }
}
