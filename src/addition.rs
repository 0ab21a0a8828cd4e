//! Addition optimizer: extend an existing deployment to close a coverage gap.
//!
//! Existing sensors are never moved or removed. New sensors are drawn from
//! a ground candidate lattice (kept clear of existing stations) and from an
//! optional list of pre-computed satellite passes, using the same greedy
//! selection kernel as the from-scratch solver.

use crate::candidates::CandidateGenerator;
use crate::coverage::{CoverageEvaluator, CoverageSet};
use crate::error::{ensure_non_negative, ensure_positive, ensure_ratio, Result};
use crate::greedy::{select_best, site_covers};
use crate::grid::Grid;
use crate::region::Region;
use crate::sensor::{validate_satellites, validate_sensors, Covering, GroundSensor, SatelliteSensor, Sensor};
use crate::solution::{Provenance, Solution, SolutionStatus};
use crate::{CoverageStrategy, PlanningProblem};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Limits on what may be added. Unset fields are unbounded; the cost cap
/// applies to the added sensors only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionBudget {
    pub max_sensors: Option<usize>,
    pub max_cost: Option<f64>,
}

impl AdditionBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn sensors(max_sensors: usize) -> Self {
        Self {
            max_sensors: Some(max_sensors),
            max_cost: None,
        }
    }

    pub fn cost(max_cost: f64) -> Self {
        Self {
            max_sensors: None,
            max_cost: Some(max_cost),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(cost) = self.max_cost {
            ensure_non_negative("addition budget cost", cost)?;
        }
        Ok(())
    }

    fn affords(&self, spent: f64, cost: f64) -> bool {
        self.max_cost.map_or(true, |cap| spent + cost <= cap + 1e-9)
    }
}

/// How candidates are ranked each round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainRanking {
    /// Largest newly covered weight.
    #[default]
    MarginalGain,
    /// Largest newly covered weight per unit cost.
    CostEffectiveness,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdditionOptimizer {
    pub sensor_radius: f64,
    pub sensor_cost: f64,
    pub candidates: CandidateGenerator,
    pub satellite_candidates: Vec<SatelliteSensor>,
    pub ranking: GainRanking,
}

/// One admissible addition.
enum Addition {
    Site(f64, f64),
    Pass(usize),
}

impl AdditionOptimizer {
    /// Ground-only optimizer. New stations keep half a radius away from
    /// existing ground sensors.
    pub fn new(grid_resolution: f64, sensor_radius: f64) -> Result<Self> {
        ensure_positive("grid_resolution", grid_resolution)?;
        ensure_positive("sensor_radius", sensor_radius)?;
        Ok(Self {
            sensor_radius,
            sensor_cost: 0.0,
            candidates: CandidateGenerator::for_sensor_radius(grid_resolution, sensor_radius)
                .with_min_separation(sensor_radius * 0.5),
            satellite_candidates: Vec::new(),
            ranking: GainRanking::MarginalGain,
        })
    }

    pub fn with_sensor_cost(mut self, cost: f64) -> Self {
        self.sensor_cost = cost;
        self
    }

    pub fn with_satellite_candidates(mut self, satellites: Vec<SatelliteSensor>) -> Self {
        self.satellite_candidates = satellites;
        self
    }

    pub fn with_ranking(mut self, ranking: GainRanking) -> Self {
        self.ranking = ranking;
        self
    }

    /// Extend `existing` towards `target_coverage` within `budget`.
    ///
    /// Already meeting the target returns `existing` unchanged with
    /// `TargetMet`. Running out of budget first yields `BudgetExhausted`;
    /// running out of useful candidates yields `CoverageTargetUnreachable`.
    pub fn optimize(
        &self,
        existing: &[Sensor],
        region: &Region,
        grid: &Grid,
        target_coverage: f64,
        budget: AdditionBudget,
    ) -> Result<Solution> {
        ensure_ratio("target_coverage", target_coverage)?;
        ensure_positive("sensor_radius", self.sensor_radius)?;
        ensure_non_negative("sensor_cost", self.sensor_cost)?;
        budget.validate()?;
        validate_sensors(existing)?;
        validate_satellites(&self.satellite_candidates)?;

        let evaluator = CoverageEvaluator::new();
        let mut set = CoverageSet::new(grid);
        for sensor in existing {
            set.add(&evaluator.covered_by(sensor, grid));
        }
        let initial_ratio = set.ratio();
        info!(
            existing = existing.len(),
            initial_ratio,
            target = target_coverage,
            "addition optimization started"
        );

        if grid.is_empty() {
            warn!("region has no inside grid points; nothing to add");
            return Ok(Solution::new(
                existing.to_vec(),
                0.0,
                Provenance::AdditionOptimizer,
                SolutionStatus::EmptyRegion,
            ));
        }
        if initial_ratio >= target_coverage {
            info!(initial_ratio, "existing deployment already meets target");
            return Ok(Solution::new(
                existing.to_vec(),
                initial_ratio,
                Provenance::AdditionOptimizer,
                SolutionStatus::TargetMet,
            ));
        }

        let (options, covers, costs) = self.build_options(existing, region, grid)?;
        let mut available = vec![true; options.len()];
        let mut sensors = existing.to_vec();
        let mut added = 0usize;
        let mut spent = 0.0;

        let status = loop {
            if set.ratio() >= target_coverage {
                break SolutionStatus::TargetMet;
            }
            if budget.max_sensors.is_some_and(|cap| added >= cap) {
                break SolutionStatus::BudgetExhausted;
            }

            let affordable: Vec<bool> = available
                .iter()
                .zip(&costs)
                .map(|(&open, &cost)| open && budget.affords(spent, cost))
                .collect();
            let ranking = self.ranking;
            let pick = select_best(&set, &covers, &affordable, |index, gain| match ranking {
                GainRanking::MarginalGain => gain,
                GainRanking::CostEffectiveness => gain / costs[index].max(1e-9),
            });

            let Some(pick) = pick else {
                let useful_left = available
                    .iter()
                    .zip(&covers)
                    .any(|(&open, cover)| open && set.gain_of(cover) > 0.0);
                break if useful_left {
                    SolutionStatus::BudgetExhausted
                } else {
                    SolutionStatus::CoverageTargetUnreachable
                };
            };

            available[pick.index] = false;
            set.add(&covers[pick.index]);
            spent += costs[pick.index];
            added += 1;
            let sensor = match options[pick.index] {
                Addition::Site(x, y) => Sensor::from(
                    GroundSensor::new(format!("add-{added}"), x, y, self.sensor_radius)
                        .with_cost(self.sensor_cost),
                ),
                Addition::Pass(i) => Sensor::from(self.satellite_candidates[i].clone()),
            };
            debug!(
                id = sensor.id(),
                gain = pick.gain,
                ratio = set.ratio(),
                spent,
                "added sensor"
            );
            sensors.push(sensor);
        };

        let ratio = set.ratio();
        if status == SolutionStatus::TargetMet {
            info!(added, ratio, spent, "addition reached target");
        } else {
            warn!(added, ratio, spent, ?status, "addition stopped short of target");
        }
        Ok(Solution::new(sensors, ratio, Provenance::AdditionOptimizer, status))
    }

    /// Extend a previous stage's solution.
    pub fn extend(
        &self,
        existing: &Solution,
        region: &Region,
        grid: &Grid,
        target_coverage: f64,
        budget: AdditionBudget,
    ) -> Result<Solution> {
        self.optimize(existing.sensors(), region, grid, target_coverage, budget)
    }

    #[allow(clippy::type_complexity)]
    fn build_options(
        &self,
        existing: &[Sensor],
        region: &Region,
        grid: &Grid,
    ) -> Result<(Vec<Addition>, Vec<Vec<usize>>, Vec<f64>)> {
        let sites: Vec<(f64, f64)> = self
            .candidates
            .generate_avoiding(region, existing)?
            .iter()
            .map(|s| s.position())
            .collect();
        let mut covers = site_covers(grid, &sites, self.sensor_radius);
        let mut costs = vec![self.sensor_cost; sites.len()];
        let mut options: Vec<Addition> = sites.iter().map(|&(x, y)| Addition::Site(x, y)).collect();

        let deployed: HashSet<&str> = existing.iter().map(|s| s.id()).collect();
        let evaluator = CoverageEvaluator::new();
        for (i, sat) in self.satellite_candidates.iter().enumerate() {
            if deployed.contains(sat.id.as_str()) {
                continue;
            }
            covers.push(evaluator.covered_by(&Sensor::Satellite(sat.clone()), grid));
            costs.push(sat.cost);
            options.push(Addition::Pass(i));
        }
        Ok((options, covers, costs))
    }
}

impl CoverageStrategy for AdditionOptimizer {
    fn name(&self) -> &'static str {
        "addition"
    }

    fn optimize(&self, problem: &PlanningProblem<'_>, _rng: &mut dyn RngCore) -> Result<Solution> {
        AdditionOptimizer::optimize(
            self,
            problem.existing,
            problem.region,
            problem.grid,
            problem.target_coverage,
            AdditionBudget::unlimited(),
        )
    }
}
