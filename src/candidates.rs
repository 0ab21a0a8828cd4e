//! Candidate placement sites for ground sensors.

use crate::error::{ensure_non_negative, ensure_positive, PlannerError, Result, MAX_GRID_POINTS};
use crate::geometry::{Point, EPSILON};
use crate::region::Region;
use crate::sensor::Sensor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An admissible ground sensor location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateSite {
    pub x: f64,
    pub y: f64,
    /// Inside or on the region; false for sites in the outer margin.
    pub inside: bool,
}

impl CandidateSite {
    pub fn position(&self) -> Point {
        (self.x, self.y)
    }
}

/// Produces a deterministic, ordered list of candidate sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateGenerator {
    /// Lattice spacing over the region's bounding box.
    pub spacing: f64,
    /// Lattice nodes outside the region are kept when within this distance.
    pub boundary_margin: f64,
    /// Add polygon vertices and samples along each edge at `spacing`.
    pub include_boundary: bool,
    /// Minimum distance from existing ground sensors.
    pub min_separation: f64,
}

impl Default for CandidateGenerator {
    fn default() -> Self {
        Self {
            spacing: 1.0,
            boundary_margin: 0.0,
            include_boundary: false,
            min_separation: 0.0,
        }
    }
}

impl CandidateGenerator {
    /// Lattice at twice the grid resolution, admitting nodes within one
    /// sensor radius of the region.
    pub fn for_sensor_radius(grid_resolution: f64, sensor_radius: f64) -> Self {
        Self {
            spacing: 2.0 * grid_resolution,
            boundary_margin: sensor_radius,
            ..Default::default()
        }
    }

    pub fn with_min_separation(mut self, min_separation: f64) -> Self {
        self.min_separation = min_separation;
        self
    }

    pub fn with_boundary_samples(mut self, include: bool) -> Self {
        self.include_boundary = include;
        self
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("candidate spacing", self.spacing)?;
        ensure_non_negative("boundary margin", self.boundary_margin)?;
        ensure_non_negative("min separation", self.min_separation)
    }

    pub fn generate(&self, region: &Region) -> Result<Vec<CandidateSite>> {
        self.generate_avoiding(region, &[])
    }

    /// Candidates at least `min_separation` away from every ground sensor in
    /// `existing`. Satellites never block a site.
    pub fn generate_avoiding(&self, region: &Region, existing: &[Sensor]) -> Result<Vec<CandidateSite>> {
        self.validate()?;

        let bounds = region.bounds();
        let columns = ((bounds.width() / self.spacing) + EPSILON).floor() as usize + 1;
        let rows = ((bounds.height() / self.spacing) + EPSILON).floor() as usize + 1;
        let total = columns.saturating_mul(rows);
        if total > MAX_GRID_POINTS {
            return Err(PlannerError::GridTooLarge {
                points: total,
                limit: MAX_GRID_POINTS,
            });
        }

        let blockers: Vec<Point> = existing
            .iter()
            .filter_map(|s| s.as_ground())
            .map(|g| g.position())
            .collect();
        let sep_sq = self.min_separation * self.min_separation;
        let clear = |p: Point| {
            self.min_separation <= 0.0
                || blockers
                    .iter()
                    .all(|b| (p.0 - b.0).powi(2) + (p.1 - b.1).powi(2) >= sep_sq)
        };

        let mut seen = HashSet::new();
        let mut sites = Vec::new();
        let mut push = |p: Point, inside: bool, sites: &mut Vec<CandidateSite>| {
            if clear(p) && seen.insert(site_key(p)) {
                sites.push(CandidateSite {
                    x: p.0,
                    y: p.1,
                    inside,
                });
            }
        };

        for row in 0..rows {
            let y = bounds.min_y + row as f64 * self.spacing;
            for col in 0..columns {
                let p = (bounds.min_x + col as f64 * self.spacing, y);
                if region.contains(p) {
                    push(p, true, &mut sites);
                } else if self.boundary_margin > 0.0 && region.distance_to(p) <= self.boundary_margin {
                    push(p, false, &mut sites);
                }
            }
        }

        if self.include_boundary {
            for p in boundary_samples(region.vertices(), self.spacing) {
                push(p, true, &mut sites);
            }
        }

        tracing::debug!(
            candidates = sites.len(),
            spacing = self.spacing,
            "generated candidate sites"
        );
        Ok(sites)
    }
}

/// Vertices plus evenly spaced points along every edge.
fn boundary_samples(vertices: &[Point], spacing: f64) -> Vec<Point> {
    let n = vertices.len();
    let mut samples = Vec::new();
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let steps = (len / spacing).floor() as usize;
        samples.push(a);
        for s in 1..=steps {
            let t = s as f64 * spacing / len;
            if t < 1.0 - EPSILON {
                samples.push((a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)));
            }
        }
    }
    samples
}

fn site_key(p: Point) -> (i64, i64) {
    ((p.0 * 1e6).round() as i64, (p.1 * 1e6).round() as i64)
}
