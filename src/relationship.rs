//! Pairwise spatial and temporal relationships between sensors.
//!
//! A [`RelationshipScore`] keeps the categorical spatial and temporal
//! relations next to the scalar terms they were derived from, so callers can
//! weight redundancy and complementarity themselves.
//!
//! Spatial extent is exact for two ground discs. Any pair involving a
//! satellite uses polygon predicates for the category and a sampling
//! lattice for the overlap ratio.

use crate::error::{ensure_probability, PlannerError, Result};
use crate::geometry::{self, circle_intersection_area, Point};
use crate::sensor::{mean_gap, Covering, GroundSensor, Sensor, TimeWindow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelation {
    /// No shared area; touching boundaries count as disjoint.
    Disjoint,
    Overlapping,
    /// The first sensor's extent contains the second's. Identical extents
    /// report this variant.
    FirstContainsSecond,
    SecondContainsFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalRelation {
    /// Windows overlap heavily over shared ground: the second pass adds
    /// little.
    Competing,
    /// Interleaved windows shorten the mean revisit gap.
    Complementary,
    Independent,
    /// At least one sensor observes continuously (a ground station).
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelationshipScore {
    pub spatial: SpatialRelation,
    pub temporal: TemporalRelation,
    /// Intersection over union of the two coverage extents.
    pub spatial_overlap: f64,
    /// Shared observation time over the shorter total observation time.
    pub temporal_overlap: f64,
    /// Relative reduction of the best individual mean revisit gap when both
    /// sensors are combined.
    pub revisit_gain: f64,
    pub redundancy: f64,
    pub complementarity: f64,
    /// `complementarity - redundancy`, in [-1, 1]. Positive pairs help each
    /// other, negative pairs duplicate effort.
    pub composite: f64,
}

/// One entry of a roster analysis, for the pair `(first, second)` with
/// `first < second`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRelationship {
    pub first: usize,
    pub second: usize,
    pub first_id: String,
    pub second_id: String,
    pub score: RelationshipScore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipAnalyzer {
    /// Minimum revisit gain that counts as complementary.
    pub time_tolerance: f64,
    /// Temporal overlap at or above which spatially overlapping passes compete.
    pub competing_overlap: f64,
    /// Lattice cells per side when sampling polygon overlap.
    pub sample_resolution: usize,
    /// Vertices used when a ground disc is compared against polygons.
    pub circle_segments: usize,
    /// Redundancy multiplier for overlapping sensors of different modality.
    pub modality_discount: f64,
}

impl Default for RelationshipAnalyzer {
    fn default() -> Self {
        Self {
            time_tolerance: 0.1,
            competing_overlap: 0.5,
            sample_resolution: 24,
            circle_segments: 64,
            modality_discount: 0.5,
        }
    }
}

impl RelationshipAnalyzer {
    pub fn validate(&self) -> Result<()> {
        ensure_probability("time_tolerance", self.time_tolerance)?;
        ensure_probability("competing_overlap", self.competing_overlap)?;
        ensure_probability("modality_discount", self.modality_discount)?;
        if self.sample_resolution == 0 {
            return Err(PlannerError::InvalidParameter(
                "sample_resolution must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn analyze(&self, a: &Sensor, b: &Sensor) -> RelationshipScore {
        let (spatial, spatial_overlap) = match (a, b) {
            (Sensor::Ground(ga), Sensor::Ground(gb)) => disc_relation(ga, gb),
            _ => self.sampled_relation(a, b),
        };

        let (temporal, temporal_overlap, revisit_gain) = match (a, b) {
            (Sensor::Satellite(sa), Sensor::Satellite(sb)) => {
                let wa = sa.observation_windows();
                let wb = sb.observation_windows();
                let overlap = window_overlap(&wa, &wb);
                let gain = revisit_gain(&wa, &wb, sa.revisit_interval, sb.revisit_interval);
                let shares_ground = spatial != SpatialRelation::Disjoint;
                let relation = if shares_ground && overlap >= self.competing_overlap {
                    TemporalRelation::Competing
                } else if shares_ground && gain > self.time_tolerance {
                    TemporalRelation::Complementary
                } else {
                    TemporalRelation::Independent
                };
                (relation, overlap, gain)
            }
            _ => (TemporalRelation::Continuous, 1.0, 0.0),
        };

        let different_modality = matches!(
            (a.modality(), b.modality()),
            (Some(ma), Some(mb)) if ma != mb
        );
        let modality_factor = if different_modality {
            self.modality_discount
        } else {
            1.0
        };

        let redundancy = (spatial_overlap * temporal_overlap * modality_factor).clamp(0.0, 1.0);
        let enhancement = if different_modality {
            spatial_overlap * (1.0 - self.modality_discount)
        } else {
            0.0
        };
        let complementarity = if temporal == TemporalRelation::Complementary {
            revisit_gain.max(enhancement)
        } else {
            enhancement
        }
        .clamp(0.0, 1.0);

        RelationshipScore {
            spatial,
            temporal,
            spatial_overlap,
            temporal_overlap,
            revisit_gain,
            redundancy,
            complementarity,
            composite: complementarity - redundancy,
        }
    }

    /// Score every unordered pair `i < j`, in lexicographic pair order.
    pub fn analyze_roster(&self, sensors: &[Sensor]) -> Vec<PairRelationship> {
        let pairs: Vec<(usize, usize)> = (0..sensors.len())
            .flat_map(|i| ((i + 1)..sensors.len()).map(move |j| (i, j)))
            .collect();

        pairs
            .par_iter()
            .map(|&(i, j)| PairRelationship {
                first: i,
                second: j,
                first_id: sensors[i].id().to_string(),
                second_id: sensors[j].id().to_string(),
                score: self.analyze(&sensors[i], &sensors[j]),
            })
            .collect()
    }

    /// Symmetric matrix of composite scores with a zero diagonal.
    pub fn relationship_matrix(&self, sensors: &[Sensor]) -> Vec<Vec<f64>> {
        let n = sensors.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for pair in self.analyze_roster(sensors) {
            matrix[pair.first][pair.second] = pair.score.composite;
            matrix[pair.second][pair.first] = pair.score.composite;
        }
        matrix
    }

    /// Polygon outlines standing in for a sensor's extent.
    fn outlines(&self, sensor: &Sensor) -> Vec<Vec<Point>> {
        match sensor {
            Sensor::Ground(g) => {
                if g.radius > 0.0 {
                    vec![geometry::circle_polygon(g.position(), g.radius, self.circle_segments)]
                } else {
                    Vec::new()
                }
            }
            Sensor::Satellite(s) => s
                .footprints
                .iter()
                .filter_map(|f| f.polygon.clone())
                .filter(|p| p.len() >= 3)
                .collect(),
        }
    }

    fn sampled_relation(&self, a: &Sensor, b: &Sensor) -> (SpatialRelation, f64) {
        let shapes_a = self.outlines(a);
        let shapes_b = self.outlines(b);

        // a zero-radius station is a point: contained or disjoint, never any area
        let holds = |shapes: &[Vec<Point>], p: Point| shapes.iter().any(|poly| geometry::point_in_polygon(p, poly));
        match (point_station(a), point_station(b)) {
            (Some(p), _) if holds(&shapes_b, p) => return (SpatialRelation::SecondContainsFirst, 0.0),
            (_, Some(p)) if holds(&shapes_a, p) => return (SpatialRelation::FirstContainsSecond, 0.0),
            (Some(_), _) | (_, Some(_)) => return (SpatialRelation::Disjoint, 0.0),
            _ => {}
        }

        let overlaps = shapes_a
            .iter()
            .any(|pa| shapes_b.iter().any(|pb| geometry::polygons_overlap(pa, pb)));
        if !overlaps {
            return (SpatialRelation::Disjoint, 0.0);
        }

        let covered_by = |outer: &[Vec<Point>], inner: &[Vec<Point>]| {
            inner
                .iter()
                .all(|pi| outer.iter().any(|po| geometry::polygon_contains_polygon(po, pi)))
        };
        let relation = if covered_by(&shapes_a, &shapes_b) {
            SpatialRelation::FirstContainsSecond
        } else if covered_by(&shapes_b, &shapes_a) {
            SpatialRelation::SecondContainsFirst
        } else {
            SpatialRelation::Overlapping
        };

        (relation, self.sampled_jaccard(a, b))
    }

    fn sampled_jaccard(&self, a: &Sensor, b: &Sensor) -> f64 {
        let bounds = match (a.bounds(), b.bounds()) {
            (Some(ba), Some(bb)) => ba.union(&bb),
            _ => return 0.0,
        };
        let n = self.sample_resolution;
        let step_x = bounds.width() / n as f64;
        let step_y = bounds.height() / n as f64;

        let (mut both, mut either) = (0usize, 0usize);
        for row in 0..=n {
            for col in 0..=n {
                let p = (
                    bounds.min_x + col as f64 * step_x,
                    bounds.min_y + row as f64 * step_y,
                );
                let in_a = a.covers(p, None);
                let in_b = b.covers(p, None);
                if in_a && in_b {
                    both += 1;
                }
                if in_a || in_b {
                    either += 1;
                }
            }
        }
        if either == 0 {
            0.0
        } else {
            both as f64 / either as f64
        }
    }
}

/// Score one pair with default settings.
pub fn analyze(a: &Sensor, b: &Sensor) -> RelationshipScore {
    RelationshipAnalyzer::default().analyze(a, b)
}

/// Exact disc-disc relation and intersection-over-union.
fn disc_relation(a: &GroundSensor, b: &GroundSensor) -> (SpatialRelation, f64) {
    let d = a.distance_to(b);
    let (r1, r2) = (a.radius.max(0.0), b.radius.max(0.0));
    // tangent discs are disjoint but a point on a rim is covered
    let touching_only = d == r1 + r2 && r1 > 0.0 && r2 > 0.0;
    if d > r1 + r2 || touching_only {
        return (SpatialRelation::Disjoint, 0.0);
    }

    let relation = if d + r2 <= r1 {
        SpatialRelation::FirstContainsSecond
    } else if d + r1 <= r2 {
        SpatialRelation::SecondContainsFirst
    } else {
        SpatialRelation::Overlapping
    };

    let lens = circle_intersection_area(d, r1, r2);
    let union = PI * (r1 * r1 + r2 * r2) - lens;
    let jaccard = if union > 0.0 { lens / union } else { 0.0 };
    (relation, jaccard)
}

fn point_station(sensor: &Sensor) -> Option<Point> {
    match sensor {
        Sensor::Ground(g) if g.radius == 0.0 => Some(g.position()),
        _ => None,
    }
}

fn total_duration(windows: &[TimeWindow]) -> f64 {
    windows.iter().map(|w| w.duration()).sum()
}

/// Shared time over the shorter total observation time, in [0, 1].
fn window_overlap(a: &[TimeWindow], b: &[TimeWindow]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shortest = total_duration(a).min(total_duration(b));
    if shortest <= 0.0 {
        // instantaneous passes: overlap is all or nothing
        let touch = a.iter().any(|wa| b.iter().any(|wb| wa.intersects(wb)));
        return if touch { 1.0 } else { 0.0 };
    }
    let shared: f64 = a
        .iter()
        .map(|wa| b.iter().map(|wb| wa.overlap(wb)).sum::<f64>())
        .sum();
    (shared / shortest).clamp(0.0, 1.0)
}

/// Relative shortening of the revisit gap from combining two schedules.
///
/// A schedule with fewer than two windows and no nominal interval has no
/// revisit at all, so any combined revisit counts as a full gain.
fn revisit_gain(a: &[TimeWindow], b: &[TimeWindow], nominal_a: Option<f64>, nominal_b: Option<f64>) -> f64 {
    let mut merged: Vec<TimeWindow> = a.iter().chain(b).copied().collect();
    merged.sort_by(|x, y| x.start.total_cmp(&y.start));
    let Some(combined) = mean_gap(&merged) else {
        return 0.0;
    };

    let individual = [mean_gap(a).or(nominal_a), mean_gap(b).or(nominal_b)]
        .into_iter()
        .flatten()
        .fold(f64::INFINITY, f64::min);

    if individual.is_infinite() {
        1.0
    } else if individual <= 0.0 {
        0.0
    } else {
        ((individual - combined) / individual).clamp(0.0, 1.0)
    }
}
