//! Lattice discretization of a region.
//!
//! The grid spans the region's bounding box at a fixed resolution. Nodes are
//! enumerated row-major (y outer, x inner) starting at the lower-left corner,
//! so the point order is a pure function of `(region, resolution)`.

use crate::error::{ensure_positive, PlannerError, Result, MAX_GRID_POINTS};
use crate::geometry::{Point, EPSILON};
use crate::region::Region;
use serde::{Deserialize, Serialize};

/// A lattice sample with its inside flag and importance weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
    pub inside: bool,
    pub weight: f64,
}

impl GridPoint {
    pub fn position(&self) -> Point {
        (self.x, self.y)
    }
}

/// Immutable evaluation grid for one `(region, resolution)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    points: Vec<GridPoint>,
    inside: Vec<usize>,
    resolution: f64,
    origin: Point,
    columns: usize,
    rows: usize,
    total_weight: f64,
}

/// Number of lattice steps from `min` to `max` inclusive, tolerant of
/// floating error at the upper edge.
fn lattice_count(min: f64, max: f64, resolution: f64) -> usize {
    ((max - min) / resolution + EPSILON).floor() as usize + 1
}

/// Build the evaluation grid for `region` at `resolution` spacing.
///
/// Boundary points count as inside. Fails with
/// [`PlannerError::InvalidParameter`] for a non-positive resolution and
/// [`PlannerError::GridTooLarge`] when the lattice would exceed
/// [`MAX_GRID_POINTS`].
pub fn build_grid(region: &Region, resolution: f64) -> Result<Grid> {
    ensure_positive("grid_resolution", resolution)?;

    let bounds = region.bounds();
    let columns = lattice_count(bounds.min_x, bounds.max_x, resolution);
    let rows = lattice_count(bounds.min_y, bounds.max_y, resolution);
    let total = columns.saturating_mul(rows);
    if total > MAX_GRID_POINTS {
        return Err(PlannerError::GridTooLarge {
            points: total,
            limit: MAX_GRID_POINTS,
        });
    }

    let mut points = Vec::with_capacity(total);
    let mut inside = Vec::new();
    for row in 0..rows {
        let y = bounds.min_y + row as f64 * resolution;
        for col in 0..columns {
            let x = bounds.min_x + col as f64 * resolution;
            let is_inside = region.contains((x, y));
            if is_inside {
                inside.push(points.len());
            }
            points.push(GridPoint {
                x,
                y,
                inside: is_inside,
                weight: 1.0,
            });
        }
    }

    let total_weight = inside.len() as f64;
    tracing::debug!(
        columns,
        rows,
        inside = inside.len(),
        resolution,
        "built coverage grid"
    );

    Ok(Grid {
        points,
        inside,
        resolution,
        origin: (bounds.min_x, bounds.min_y),
        columns,
        rows,
        total_weight,
    })
}

impl Grid {
    /// Every lattice node, inside or not, in enumeration order.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Indices into [`points`](Self::points) of the inside nodes.
    pub fn inside_indices(&self) -> &[usize] {
        &self.inside
    }

    pub fn inside_points(&self) -> impl Iterator<Item = &GridPoint> + '_ {
        self.inside.iter().map(move |&i| &self.points[i])
    }

    pub fn inside_count(&self) -> usize {
        self.inside.len()
    }

    /// True when no lattice node falls inside the region.
    pub fn is_empty(&self) -> bool {
        self.inside.is_empty()
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Sum of weights over inside points.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Area represented by one lattice node.
    pub fn cell_area(&self) -> f64 {
        self.resolution * self.resolution
    }

    /// Return a copy with each inside point's weight set by `weight_fn`.
    ///
    /// Weights must be finite and non-negative. Outside points keep weight
    /// 1.0 and never contribute to coverage.
    pub fn with_weights<F>(&self, weight_fn: F) -> Result<Grid>
    where
        F: Fn(Point) -> f64,
    {
        let mut grid = self.clone();
        let mut total = 0.0;
        for &i in &grid.inside {
            let p = &mut grid.points[i];
            let w = weight_fn((p.x, p.y));
            if !w.is_finite() || w < 0.0 {
                return Err(PlannerError::InvalidParameter(format!(
                    "grid weight at ({}, {}) must be finite and non-negative, got {w}",
                    p.x, p.y
                )));
            }
            p.weight = w;
            total += w;
        }
        grid.total_weight = total;
        Ok(grid)
    }

    /// Positions in the `inside` list of points within `radius` of `center`.
    ///
    /// Uses the lattice structure to visit only the enclosing window of rows
    /// and columns.
    pub fn inside_within(&self, center: Point, radius: f64) -> Vec<usize> {
        if radius < 0.0 || !radius.is_finite() || self.inside.is_empty() {
            return Vec::new();
        }
        let r_sq = radius * radius;
        let res = self.resolution;

        let col_lo = ((center.0 - radius - self.origin.0) / res - EPSILON).ceil().max(0.0);
        let col_hi = ((center.0 + radius - self.origin.0) / res + EPSILON).floor();
        let row_lo = ((center.1 - radius - self.origin.1) / res - EPSILON).ceil().max(0.0);
        let row_hi = ((center.1 + radius - self.origin.1) / res + EPSILON).floor();
        if col_hi < 0.0 || row_hi < 0.0 {
            return Vec::new();
        }
        let col_lo = col_lo as usize;
        let row_lo = row_lo as usize;
        let col_hi = (col_hi as usize).min(self.columns.saturating_sub(1));
        let row_hi = (row_hi as usize).min(self.rows.saturating_sub(1));
        if col_lo > col_hi || row_lo > row_hi {
            return Vec::new();
        }

        let mut hits = Vec::new();
        for row in row_lo..=row_hi {
            let start = row * self.columns + col_lo;
            let end = row * self.columns + col_hi;
            // inside is sorted, so the row slice is a contiguous range of it
            let from = self.inside.partition_point(|&i| i < start);
            let to = self.inside.partition_point(|&i| i <= end);
            for (k, &i) in self.inside[from..to].iter().enumerate() {
                let p = &self.points[i];
                let dx = p.x - center.0;
                let dy = p.y - center.1;
                if dx * dx + dy * dy <= r_sq {
                    hits.push(from + k);
                }
            }
        }
        hits
    }

    /// Inside point by its position in the `inside` list.
    pub(crate) fn inside_point(&self, k: usize) -> &GridPoint {
        &self.points[self.inside[k]]
    }
}
