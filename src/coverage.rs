//! Coverage evaluation over a grid.
//!
//! The evaluator is a pure function of `(sensors, grid)`; every call builds
//! its own working [`CoverageSet`] and returns a fresh report, so it can be
//! called from many threads at once.

use crate::grid::Grid;
use crate::region::Region;
use crate::sensor::{Covering, Sensor, TimeWindow};
use serde::{Deserialize, Serialize};

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Indices into [`Grid::points`] of covered inside points, ascending.
    pub covered: Vec<usize>,
    pub coverage_ratio: f64,
    pub covered_weight: f64,
    pub total_weight: f64,
    pub inside_points: usize,
    /// No inside points: the ratio is 0 by definition and must not be read
    /// as success.
    pub is_empty_region: bool,
}

/// Per-point entry of a [`CoverageStatistics`] summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCoverage {
    pub x: f64,
    pub y: f64,
    pub weight: f64,
    pub covered: bool,
    /// Number of sensors covering this point.
    pub multiplicity: u32,
}

/// Reporting summary of a deployment on a grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStatistics {
    pub points: Vec<PointCoverage>,
    pub coverage_ratio: f64,
    pub covered_weight: f64,
    pub total_weight: f64,
    pub covered_points: usize,
    pub inside_points: usize,
    /// `covered_points * resolution^2`
    pub covered_area_estimate: f64,
    pub region_area: f64,
    /// Mean multiplicity over covered points, 0 when nothing is covered.
    pub mean_redundancy: f64,
    pub is_empty_region: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageEvaluator {
    window: Option<TimeWindow>,
}

impl CoverageEvaluator {
    /// Evaluator that accepts every satellite footprint regardless of time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict satellite coverage to footprints intersecting `window`.
    pub fn with_window(window: TimeWindow) -> Self {
        Self {
            window: Some(window),
        }
    }

    pub fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }

    /// Positions in [`Grid::inside_indices`] that `sensor` covers, ascending.
    pub fn covered_by(&self, sensor: &Sensor, grid: &Grid) -> Vec<usize> {
        match sensor {
            Sensor::Ground(g) => grid.inside_within(g.position(), g.radius),
            Sensor::Satellite(_) => {
                let Some(bounds) = sensor.bounds() else {
                    return Vec::new();
                };
                (0..grid.inside_count())
                    .filter(|&k| {
                        let p = grid.inside_point(k).position();
                        bounds.contains(p) && sensor.covers(p, self.window.as_ref())
                    })
                    .collect()
            }
        }
    }

    pub fn evaluate(&self, sensors: &[Sensor], grid: &Grid) -> CoverageReport {
        let mut set = CoverageSet::new(grid);
        for sensor in sensors {
            set.add(&self.covered_by(sensor, grid));
        }

        let inside = grid.inside_indices();
        let covered = set
            .flags
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(|(k, _)| inside[k])
            .collect();

        CoverageReport {
            covered,
            coverage_ratio: set.ratio(),
            covered_weight: set.covered_weight(),
            total_weight: grid.total_weight(),
            inside_points: grid.inside_count(),
            is_empty_region: grid.is_empty(),
        }
    }

    /// Shorthand for `evaluate(..).coverage_ratio`.
    pub fn coverage_ratio(&self, sensors: &[Sensor], grid: &Grid) -> f64 {
        let mut set = CoverageSet::new(grid);
        for sensor in sensors {
            set.add(&self.covered_by(sensor, grid));
        }
        set.ratio()
    }

    pub fn statistics(&self, sensors: &[Sensor], grid: &Grid, region: &Region) -> CoverageStatistics {
        let mut counts = CoverageCounts::new(grid);
        for sensor in sensors {
            counts.add(&self.covered_by(sensor, grid));
        }

        let points: Vec<PointCoverage> = (0..grid.inside_count())
            .map(|k| {
                let p = grid.inside_point(k);
                PointCoverage {
                    x: p.x,
                    y: p.y,
                    weight: p.weight,
                    covered: counts.counts[k] > 0,
                    multiplicity: counts.counts[k],
                }
            })
            .collect();

        let covered_points = points.iter().filter(|p| p.covered).count();
        let multiplicity_sum: u64 = points.iter().map(|p| p.multiplicity as u64).sum();
        let mean_redundancy = if covered_points > 0 {
            multiplicity_sum as f64 / covered_points as f64
        } else {
            0.0
        };

        CoverageStatistics {
            coverage_ratio: counts.ratio(),
            covered_weight: counts.covered_weight(),
            total_weight: grid.total_weight(),
            covered_points,
            inside_points: grid.inside_count(),
            covered_area_estimate: covered_points as f64 * grid.cell_area(),
            region_area: region.area(),
            mean_redundancy,
            is_empty_region: grid.is_empty(),
            points,
        }
    }
}

fn ratio_of(covered: f64, total: f64) -> f64 {
    if total > 0.0 {
        covered / total
    } else {
        0.0
    }
}

/// Covered flags over inside points, with the running covered weight.
#[derive(Debug, Clone)]
pub(crate) struct CoverageSet<'g> {
    grid: &'g Grid,
    flags: Vec<bool>,
    covered_weight: f64,
}

impl<'g> CoverageSet<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self {
            grid,
            flags: vec![false; grid.inside_count()],
            covered_weight: 0.0,
        }
    }

    /// Weight that adding `cover` would newly cover.
    pub fn gain_of(&self, cover: &[usize]) -> f64 {
        cover
            .iter()
            .filter(|&&k| !self.flags[k])
            .map(|&k| self.grid.inside_point(k).weight)
            .sum()
    }

    /// Mark `cover` as covered, returning the newly covered weight.
    pub fn add(&mut self, cover: &[usize]) -> f64 {
        let mut gain = 0.0;
        for &k in cover {
            if !self.flags[k] {
                self.flags[k] = true;
                gain += self.grid.inside_point(k).weight;
            }
        }
        self.covered_weight += gain;
        gain
    }

    pub fn covered_weight(&self) -> f64 {
        self.covered_weight
    }

    pub fn ratio(&self) -> f64 {
        ratio_of(self.covered_weight, self.grid.total_weight())
    }
}

/// Coverage multiplicity per inside point; supports removing a sensor, which
/// the boolean [`CoverageSet`] cannot.
#[derive(Debug, Clone)]
pub(crate) struct CoverageCounts<'g> {
    grid: &'g Grid,
    counts: Vec<u32>,
    covered_weight: f64,
}

impl<'g> CoverageCounts<'g> {
    pub fn new(grid: &'g Grid) -> Self {
        Self {
            grid,
            counts: vec![0; grid.inside_count()],
            covered_weight: 0.0,
        }
    }

    pub fn add(&mut self, cover: &[usize]) {
        for &k in cover {
            if self.counts[k] == 0 {
                self.covered_weight += self.grid.inside_point(k).weight;
            }
            self.counts[k] += 1;
        }
    }

    pub fn remove(&mut self, cover: &[usize]) {
        for &k in cover {
            self.counts[k] -= 1;
            if self.counts[k] == 0 {
                self.covered_weight -= self.grid.inside_point(k).weight;
            }
        }
    }

    pub fn covered_weight(&self) -> f64 {
        self.covered_weight
    }

    pub fn ratio(&self) -> f64 {
        ratio_of(self.covered_weight, self.grid.total_weight())
    }
}
