//! Greedy Maximum Coverage Location solver.
//!
//! Stations are added one at a time, each at the candidate site with the
//! largest newly covered weight, until the coverage target is met or no
//! site adds anything. Per-candidate work is parallel; the winner is chosen
//! by a `(gain, lowest index)` reduction so results match a sequential scan.

use crate::candidates::CandidateGenerator;
use crate::coverage::CoverageSet;
use crate::error::{ensure_non_negative, ensure_positive, ensure_ratio, Result};
use crate::grid::{build_grid, Grid};
use crate::region::Region;
use crate::sensor::{GroundSensor, Sensor};
use crate::solution::{Provenance, Solution, SolutionStatus};
use crate::{CoverageStrategy, PlanningProblem};
use rand::RngCore;
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::{debug, info, warn};

/// Winner of one greedy round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Pick {
    pub index: usize,
    pub gain: f64,
    pub score: f64,
}

/// Deterministic preference: higher score, then lower index.
fn better(a: Pick, b: Pick) -> Pick {
    match a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal) {
        Ordering::Greater => a,
        Ordering::Less => b,
        Ordering::Equal => {
            if a.index <= b.index {
                a
            } else {
                b
            }
        }
    }
}

/// Best still-available candidate with positive gain.
///
/// `score` maps `(index, gain)` to the ranking key; plain marginal gain is
/// `|_, gain| gain`. The reduction is order-independent, so the pick is the
/// same as a left-to-right scan.
pub(crate) fn select_best<F>(
    set: &CoverageSet<'_>,
    covers: &[Vec<usize>],
    available: &[bool],
    score: F,
) -> Option<Pick>
where
    F: Fn(usize, f64) -> f64 + Sync,
{
    covers
        .par_iter()
        .enumerate()
        .filter(|(index, _)| available[*index])
        .filter_map(|(index, cover)| {
            let gain = set.gain_of(cover);
            (gain > 0.0).then(|| Pick {
                index,
                gain,
                score: score(index, gain),
            })
        })
        .reduce_with(better)
}

/// Inside-point cover lists for a ground sensor of `radius` at every site.
pub(crate) fn site_covers(grid: &Grid, sites: &[(f64, f64)], radius: f64) -> Vec<Vec<usize>> {
    sites
        .par_iter()
        .map(|&site| grid.inside_within(site, radius))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GreedyMclpSolver {
    pub coverage_ratio_target: f64,
    pub sensor_radius: f64,
    pub grid_resolution: f64,
    /// Candidate lattice spacing; twice the grid resolution when unset.
    pub candidate_spacing: Option<f64>,
    /// Cost assigned to each placed station.
    pub sensor_cost: f64,
    /// Upper bound on stations, the MCLP "at most k sites" form.
    pub max_stations: Option<usize>,
}

impl GreedyMclpSolver {
    pub fn new(coverage_ratio_target: f64, sensor_radius: f64, grid_resolution: f64) -> Result<Self> {
        let solver = Self {
            coverage_ratio_target,
            sensor_radius,
            grid_resolution,
            candidate_spacing: None,
            sensor_cost: 0.0,
            max_stations: None,
        };
        solver.validate()?;
        Ok(solver)
    }

    pub fn with_max_stations(mut self, max_stations: usize) -> Self {
        self.max_stations = Some(max_stations);
        self
    }

    pub fn with_sensor_cost(mut self, cost: f64) -> Self {
        self.sensor_cost = cost;
        self
    }

    pub fn with_candidate_spacing(mut self, spacing: f64) -> Self {
        self.candidate_spacing = Some(spacing);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_ratio("coverage_ratio_target", self.coverage_ratio_target)?;
        ensure_positive("sensor_radius", self.sensor_radius)?;
        ensure_positive("grid_resolution", self.grid_resolution)?;
        ensure_non_negative("sensor_cost", self.sensor_cost)?;
        if let Some(spacing) = self.candidate_spacing {
            ensure_positive("candidate_spacing", spacing)?;
        }
        Ok(())
    }

    fn candidate_generator(&self) -> CandidateGenerator {
        let mut gen = CandidateGenerator::for_sensor_radius(self.grid_resolution, self.sensor_radius);
        if let Some(spacing) = self.candidate_spacing {
            gen.spacing = spacing;
        }
        gen
    }

    /// Build the grid at `grid_resolution` and solve on it.
    pub fn solve(&self, region: &Region) -> Result<Solution> {
        self.validate()?;
        let grid = build_grid(region, self.grid_resolution)?;
        self.solve_on_grid(region, &grid)
    }

    /// Solve on a caller-supplied grid, which may carry non-uniform weights.
    pub fn solve_on_grid(&self, region: &Region, grid: &Grid) -> Result<Solution> {
        self.validate()?;
        self.run(region, grid, self.coverage_ratio_target)
    }

    fn run(&self, region: &Region, grid: &Grid, target: f64) -> Result<Solution> {
        info!(
            target,
            radius = self.sensor_radius,
            inside_points = grid.inside_count(),
            "greedy MCLP solve started"
        );

        if grid.is_empty() {
            warn!("region has no inside grid points; coverage ratio is 0");
            return Ok(Solution::new(
                Vec::new(),
                0.0,
                Provenance::GreedyMclp,
                SolutionStatus::EmptyRegion,
            ));
        }

        let sites: Vec<(f64, f64)> = self
            .candidate_generator()
            .generate(region)?
            .iter()
            .map(|s| s.position())
            .collect();
        let covers = site_covers(grid, &sites, self.sensor_radius);

        let mut set = CoverageSet::new(grid);
        let mut available = vec![true; sites.len()];
        let mut sensors: Vec<Sensor> = Vec::new();

        let status = loop {
            if set.ratio() >= target {
                break SolutionStatus::TargetMet;
            }
            if self.max_stations.is_some_and(|k| sensors.len() >= k) {
                break SolutionStatus::BudgetExhausted;
            }
            let Some(pick) = select_best(&set, &covers, &available, |_, gain| gain) else {
                break SolutionStatus::CoverageTargetUnreachable;
            };

            available[pick.index] = false;
            set.add(&covers[pick.index]);
            let (x, y) = sites[pick.index];
            sensors.push(Sensor::from(
                GroundSensor::new(format!("gs-{}", sensors.len() + 1), x, y, self.sensor_radius)
                    .with_cost(self.sensor_cost),
            ));
            debug!(
                station = sensors.len(),
                x,
                y,
                gain = pick.gain,
                ratio = set.ratio(),
                "placed station"
            );
        };

        let ratio = set.ratio();
        match status {
            SolutionStatus::TargetMet => {
                info!(stations = sensors.len(), ratio, "greedy MCLP reached target")
            }
            _ => warn!(
                stations = sensors.len(),
                ratio,
                target,
                ?status,
                "greedy MCLP stopped short of target"
            ),
        }

        Ok(Solution::new(sensors, ratio, Provenance::GreedyMclp, status))
    }
}

/// One-shot form: build the grid, generate candidates and solve.
pub fn solve(
    region: &Region,
    coverage_ratio_target: f64,
    sensor_radius: f64,
    grid_resolution: f64,
) -> Result<Solution> {
    GreedyMclpSolver::new(coverage_ratio_target, sensor_radius, grid_resolution)?.solve(region)
}

impl CoverageStrategy for GreedyMclpSolver {
    fn name(&self) -> &'static str {
        "greedy_mclp"
    }

    fn optimize(&self, problem: &PlanningProblem<'_>, _rng: &mut dyn RngCore) -> Result<Solution> {
        self.validate()?;
        ensure_ratio("target_coverage", problem.target_coverage)?;
        self.run(problem.region, problem.grid, problem.target_coverage)
    }
}
