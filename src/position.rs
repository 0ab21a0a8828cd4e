//! Fixed-cardinality position optimizer.
//!
//! Relocates ground sensors between candidate sites to raise the coverage
//! ratio without adding or removing any sensor. Two modes:
//!
//! - [`SearchMode::Annealing`]: one sensor per iteration, round-robin, moved
//!   to a nearby or random site. Strict improvements are always accepted;
//!   other moves are accepted with probability
//!   `(T / T0) * exp(delta / T)`, so both the temperature factor and the
//!   cooling schedule shrink the chance of a sideways or downhill step.
//! - [`SearchMode::HillClimb`]: deterministic steepest ascent that tries
//!   every site for every sensor and moves only on strict improvement.
//!
//! Satellites in the input are kept as fixed background coverage.

use crate::candidates::CandidateGenerator;
use crate::coverage::{CoverageCounts, CoverageEvaluator};
use crate::error::{ensure_positive, ensure_probability, ensure_ratio, PlannerError, Result};
use crate::geometry::Point;
use crate::grid::Grid;
use crate::region::Region;
use crate::sensor::{validate_sensors, Sensor};
use crate::solution::{Provenance, Solution, SolutionStatus};
use crate::{CoverageStrategy, PlanningProblem};
use rand::{Rng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Annealing,
    HillClimb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionOptimizer {
    /// Annealing: single moves. Hill climb: full passes over all sensors.
    pub max_iterations: usize,
    /// Annealing iterations without a new best before stopping.
    pub patience: usize,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    /// Radius around a sensor searched for neighbouring sites.
    pub neighbor_radius: f64,
    /// Chance of jumping to a uniformly random site instead of a neighbour.
    pub random_site_probability: f64,
    /// Stop as soon as this ratio is reached.
    pub target_coverage: Option<f64>,
    pub candidates: CandidateGenerator,
    pub mode: SearchMode,
}

impl Default for PositionOptimizer {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            patience: 400,
            initial_temperature: 0.02, // in coverage-ratio units
            cooling_rate: 0.997,
            neighbor_radius: 2.0,
            random_site_probability: 0.2,
            target_coverage: None,
            candidates: CandidateGenerator::default(),
            mode: SearchMode::Annealing,
        }
    }
}

impl PositionOptimizer {
    /// Candidate lattice and neighbourhood sized for the given grid and radius.
    pub fn for_sensor_radius(grid_resolution: f64, sensor_radius: f64) -> Self {
        Self {
            neighbor_radius: sensor_radius,
            candidates: CandidateGenerator::for_sensor_radius(grid_resolution, sensor_radius),
            ..Default::default()
        }
    }

    pub fn hill_climb(mut self) -> Self {
        self.mode = SearchMode::HillClimb;
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target_coverage = Some(target);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("initial_temperature", self.initial_temperature)?;
        ensure_positive("neighbor_radius", self.neighbor_radius)?;
        ensure_probability("random_site_probability", self.random_site_probability)?;
        if !(self.cooling_rate > 0.0 && self.cooling_rate <= 1.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "cooling_rate must lie in (0, 1], got {}",
                self.cooling_rate
            )));
        }
        if let Some(target) = self.target_coverage {
            ensure_ratio("target_coverage", target)?;
        }
        Ok(())
    }

    /// Reposition the ground sensors of `initial`. The output always has the
    /// same sensors, ids and radii; only positions change.
    pub fn optimize<R: Rng + ?Sized>(
        &self,
        region: &Region,
        initial: &[Sensor],
        grid: &Grid,
        rng: &mut R,
    ) -> Result<Solution> {
        self.validate()?;
        if initial.is_empty() {
            return Err(PlannerError::EmptySensorSet);
        }
        validate_sensors(initial)?;

        let target = self.target_coverage.unwrap_or(f64::INFINITY);
        let mut state = SearchState::new(initial, grid);
        info!(
            sensors = initial.len(),
            movable = state.movable.len(),
            initial_ratio = state.counts.ratio(),
            mode = ?self.mode,
            "position optimization started"
        );

        if grid.is_empty() {
            return Ok(Solution::new(
                initial.to_vec(),
                0.0,
                Provenance::PositionOptimizer,
                SolutionStatus::EmptyRegion,
            ));
        }

        let sites: Vec<Point> = self
            .candidates
            .generate(region)?
            .iter()
            .map(|s| s.position())
            .collect();

        let status = if state.movable.is_empty() || sites.is_empty() {
            SolutionStatus::Converged
        } else {
            match self.mode {
                SearchMode::Annealing => self.anneal(&mut state, &sites, grid, target, rng),
                SearchMode::HillClimb => self.climb(&mut state, &sites, grid, target),
            }
        };

        let sensors = state.best_sensors();
        let ratio = CoverageEvaluator::new().coverage_ratio(&sensors, grid);
        info!(ratio, ?status, "position optimization finished");
        Ok(Solution::new(sensors, ratio, Provenance::PositionOptimizer, status))
    }

    fn anneal<R: Rng + ?Sized>(
        &self,
        state: &mut SearchState<'_>,
        sites: &[Point],
        grid: &Grid,
        target: f64,
        rng: &mut R,
    ) -> SolutionStatus {
        let mut temp = self.initial_temperature;
        let mut stall = 0;
        let neighbors = neighbor_lists(sites, self.neighbor_radius);
        // lattice index of each slot once it has moved onto a site
        let mut at_site: Vec<Option<usize>> = vec![None; state.positions.len()];

        for iter in 0..self.max_iterations {
            if state.best_ratio >= target {
                return SolutionStatus::TargetMet;
            }
            if stall >= self.patience {
                return SolutionStatus::Converged;
            }

            let slot = state.movable[iter % state.movable.len()];
            let jump = rng.gen::<f64>() < self.random_site_probability;
            let pick = if jump {
                rng.gen_range(0..sites.len())
            } else {
                let scanned;
                let nearby: &[usize] = match at_site[slot] {
                    Some(idx) => &neighbors[idx],
                    None => {
                        scanned = within(sites, state.positions[slot], self.neighbor_radius);
                        &scanned
                    }
                };
                if nearby.is_empty() {
                    rng.gen_range(0..sites.len())
                } else {
                    nearby[rng.gen_range(0..nearby.len())]
                }
            };
            let site = sites[pick];

            let current = state.counts.ratio();
            let moved = state.try_move(slot, site, grid);
            let delta = state.counts.ratio() - current;

            let accept = delta > 0.0
                || rng.gen::<f64>() < (temp / self.initial_temperature) * (delta / temp).exp();

            if accept {
                state.commit(slot, site, moved);
                at_site[slot] = Some(pick);
                if state.counts.ratio() > state.best_ratio {
                    state.record_best();
                    stall = 0;
                    debug!(iteration = iter, ratio = state.best_ratio, "new best layout");
                } else {
                    stall += 1;
                }
            } else {
                state.revert(slot, moved);
                stall += 1;
            }

            temp *= self.cooling_rate;
        }

        if state.best_ratio >= target {
            SolutionStatus::TargetMet
        } else {
            SolutionStatus::IterationLimitReached
        }
    }

    fn climb(&self, state: &mut SearchState<'_>, sites: &[Point], grid: &Grid, target: f64) -> SolutionStatus {
        for pass in 0..self.max_iterations {
            let mut improved = false;

            for m in 0..state.movable.len() {
                if state.best_ratio >= target {
                    return SolutionStatus::TargetMet;
                }
                let slot = state.movable[m];
                let mut best: Option<(Point, f64)> = None;
                let mut best_ratio = state.counts.ratio();

                for &site in sites {
                    if site == state.positions[slot] {
                        continue;
                    }
                    let moved = state.try_move(slot, site, grid);
                    let ratio = state.counts.ratio();
                    state.revert(slot, moved);
                    if ratio > best_ratio {
                        best_ratio = ratio;
                        best = Some((site, ratio));
                    }
                }

                if let Some((site, _)) = best {
                    let moved = state.try_move(slot, site, grid);
                    state.commit(slot, site, moved);
                    state.record_best();
                    improved = true;
                }
            }

            debug!(pass, ratio = state.best_ratio, improved, "hill-climb pass");
            if state.best_ratio >= target {
                return SolutionStatus::TargetMet;
            }
            // a pass without a move is a fixed point
            if !improved {
                return SolutionStatus::Converged;
            }
        }
        SolutionStatus::IterationLimitReached
    }
}

/// Indices of the sites within `radius` of `here`, excluding `here` itself.
fn within(sites: &[Point], here: Point, radius: f64) -> Vec<usize> {
    let radius_sq = radius * radius;
    sites
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            let d = (s.0 - here.0).powi(2) + (s.1 - here.1).powi(2);
            d > 0.0 && d <= radius_sq
        })
        .map(|(i, _)| i)
        .collect()
}

fn neighbor_lists(sites: &[Point], radius: f64) -> Vec<Vec<usize>> {
    sites.par_iter().map(|&here| within(sites, here, radius)).collect()
}

/// Mutable working layout owned by one `optimize` call.
struct SearchState<'g> {
    sensors: Vec<Sensor>,
    positions: Vec<Point>,
    covers: Vec<Vec<usize>>,
    movable: Vec<usize>,
    counts: CoverageCounts<'g>,
    best_positions: Vec<Point>,
    best_ratio: f64,
}

impl<'g> SearchState<'g> {
    fn new(initial: &[Sensor], grid: &'g Grid) -> Self {
        let evaluator = CoverageEvaluator::new();
        let covers: Vec<Vec<usize>> = initial.iter().map(|s| evaluator.covered_by(s, grid)).collect();
        let mut counts = CoverageCounts::new(grid);
        for cover in &covers {
            counts.add(cover);
        }
        let positions: Vec<Point> = initial
            .iter()
            .map(|s| s.as_ground().map_or((f64::NAN, f64::NAN), |g| g.position()))
            .collect();
        let movable = initial
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_ground())
            .map(|(i, _)| i)
            .collect();
        let best_ratio = counts.ratio();

        Self {
            sensors: initial.to_vec(),
            best_positions: positions.clone(),
            positions,
            covers,
            movable,
            counts,
            best_ratio,
        }
    }

    fn radius(&self, slot: usize) -> f64 {
        self.sensors[slot].as_ground().map_or(0.0, |g| g.radius)
    }

    /// Apply a tentative move to the counts; returns the new cover list.
    fn try_move(&mut self, slot: usize, site: Point, grid: &Grid) -> Vec<usize> {
        let cover = grid.inside_within(site, self.radius(slot));
        self.counts.remove(&self.covers[slot]);
        self.counts.add(&cover);
        cover
    }

    fn revert(&mut self, slot: usize, moved: Vec<usize>) {
        self.counts.remove(&moved);
        self.counts.add(&self.covers[slot]);
    }

    fn commit(&mut self, slot: usize, site: Point, moved: Vec<usize>) {
        self.positions[slot] = site;
        self.covers[slot] = moved;
    }

    fn record_best(&mut self) {
        self.best_ratio = self.counts.ratio();
        self.best_positions.clone_from(&self.positions);
    }

    fn best_sensors(&self) -> Vec<Sensor> {
        self.sensors
            .iter()
            .zip(&self.best_positions)
            .map(|(sensor, &p)| match sensor {
                Sensor::Ground(g) => Sensor::Ground(g.moved_to(p)),
                other => other.clone(),
            })
            .collect()
    }
}

impl CoverageStrategy for PositionOptimizer {
    fn name(&self) -> &'static str {
        match self.mode {
            SearchMode::Annealing => "position_annealing",
            SearchMode::HillClimb => "position_hill_climb",
        }
    }

    fn optimize(&self, problem: &PlanningProblem<'_>, rng: &mut dyn RngCore) -> Result<Solution> {
        let mut tuned = self.clone();
        tuned.target_coverage = Some(self.target_coverage.unwrap_or(problem.target_coverage));
        PositionOptimizer::optimize(&tuned, problem.region, problem.existing, problem.grid, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::build_grid;
    use crate::sensor::{GroundSensor, SatelliteSensor, TimeWindow};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Region, Grid) {
        let region = Region::rectangle((0.0, 0.0), (10.0, 10.0)).unwrap();
        let grid = build_grid(&region, 0.5).unwrap();
        (region, grid)
    }

    fn clustered() -> Vec<Sensor> {
        (0..4)
            .map(|i| Sensor::from(GroundSensor::new(format!("s{i}"), 5.0, 5.0 + i as f64 * 0.5, 3.0).with_cost(2.0)))
            .collect()
    }

    #[test]
    fn test_annealing_improves_clustered_layout() {
        let (region, grid) = setup();
        let initial = clustered();
        let before = CoverageEvaluator::new().coverage_ratio(&initial, &grid);

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let opt = PositionOptimizer::for_sensor_radius(0.5, 3.0);
        let sol = opt.optimize(&region, &initial, &grid, &mut rng).unwrap();

        assert_eq!(sol.len(), 4);
        assert!(sol.coverage_ratio() > before);
        assert_eq!(sol.provenance(), Provenance::PositionOptimizer);
        let ids: Vec<&str> = sol.sensors().iter().map(|s| s.as_ground().unwrap().id.as_str()).collect();
        assert_eq!(ids, vec!["s0", "s1", "s2", "s3"]);
        assert!(sol.sensors().iter().all(|s| s.as_ground().unwrap().radius == 3.0));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let (region, grid) = setup();
        let opt = PositionOptimizer::for_sensor_radius(0.5, 3.0);
        let a = opt
            .optimize(&region, &clustered(), &grid, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        let b = opt
            .optimize(&region, &clustered(), &grid, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hill_climb_is_deterministic_and_improves() {
        let (region, grid) = setup();
        let initial = clustered();
        let before = CoverageEvaluator::new().coverage_ratio(&initial, &grid);
        let opt = PositionOptimizer::for_sensor_radius(0.5, 3.0).hill_climb();

        let a = opt.optimize(&region, &initial, &grid, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let b = opt.optimize(&region, &initial, &grid, &mut ChaCha8Rng::seed_from_u64(2)).unwrap();
        assert_eq!(a, b);
        assert!(a.coverage_ratio() > before);
        assert_eq!(a.status(), SolutionStatus::Converged);
    }

    #[test]
    fn test_target_stops_early() {
        let (region, grid) = setup();
        let opt = PositionOptimizer::for_sensor_radius(0.5, 3.0).hill_climb().with_target(0.5);
        let sol = opt
            .optimize(&region, &clustered(), &grid, &mut ChaCha8Rng::seed_from_u64(3))
            .unwrap();
        assert_eq!(sol.status(), SolutionStatus::TargetMet);
        assert!(sol.coverage_ratio() >= 0.5);
    }

    #[test]
    fn test_neighbor_lists_match_direct_scan() {
        let sites: Vec<Point> = (0..5).flat_map(|i| (0..5).map(move |j| (i as f64, j as f64))).collect();
        let lists = neighbor_lists(&sites, 1.5);
        assert_eq!(lists.len(), sites.len());
        for (i, list) in lists.iter().enumerate() {
            assert_eq!(list, &within(&sites, sites[i], 1.5));
            assert!(!list.contains(&i));
        }
        // corner sees its two edge neighbours and the diagonal
        assert_eq!(lists[0], vec![1, 5, 6]);
    }

    #[test]
    fn test_invalid_sensor_is_rejected() {
        let (region, grid) = setup();
        let mut initial = clustered();
        initial.push(Sensor::from(GroundSensor::new("bad", 5.0, 5.0, 3.0).with_cost(-50.0)));
        let err = PositionOptimizer::default()
            .optimize(&region, &initial, &grid, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));

        let negative = vec![Sensor::from(GroundSensor::new("neg", 5.0, 5.0, -3.0))];
        let err = PositionOptimizer::default()
            .optimize(&region, &negative, &grid, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));
    }

    #[test]
    fn test_empty_sensor_set_is_an_error() {
        let (region, grid) = setup();
        let err = PositionOptimizer::default()
            .optimize(&region, &[], &grid, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err, PlannerError::EmptySensorSet);
    }

    #[test]
    fn test_satellites_stay_fixed() {
        let (region, grid) = setup();
        let sat = Sensor::from(SatelliteSensor::swath(
            "sat",
            (0.0, 1.0),
            (10.0, 1.0),
            2.0,
            TimeWindow::new(0.0, 1.0).unwrap(),
            50.0,
        ));
        let mut initial = vec![sat.clone()];
        initial.extend(clustered());
        let sol = PositionOptimizer::for_sensor_radius(0.5, 3.0)
            .optimize(&region, &initial, &grid, &mut ChaCha8Rng::seed_from_u64(5))
            .unwrap();
        assert_eq!(sol.sensors()[0], sat);
        assert_eq!(sol.len(), 5);
    }

    #[test]
    fn test_rejects_bad_cooling_rate() {
        let (region, grid) = setup();
        let opt = PositionOptimizer {
            cooling_rate: 1.5,
            ..Default::default()
        };
        assert!(opt
            .optimize(&region, &clustered(), &grid, &mut ChaCha8Rng::seed_from_u64(0))
            .is_err());
    }
}
