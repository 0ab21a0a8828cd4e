//! Planar geometry predicates used by grid, candidate and coverage code.
//!
//! Polygons are slices of `(x, y)` vertices in order, without a repeated
//! closing vertex. Orientation may be clockwise or counter-clockwise.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A planar coordinate pair.
pub type Point = (f64, f64);

/// Tolerance for boundary and collinearity tests.
pub const EPSILON: f64 = 1e-9;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Largest side, used to scale jitter and sampling steps.
    pub fn extent(&self) -> f64 {
        self.width().max(self.height())
    }

    pub fn contains(&self, p: Point) -> bool {
        p.0 >= self.min_x - EPSILON
            && p.0 <= self.max_x + EPSILON
            && p.1 >= self.min_y - EPSILON
            && p.1 <= self.max_y + EPSILON
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || other.max_x < self.min_x
            || self.max_y < other.min_y
            || other.max_y < self.min_y)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Clamp a point into the box.
    pub fn clamp(&self, p: Point) -> Point {
        (
            p.0.clamp(self.min_x, self.max_x),
            p.1.clamp(self.min_y, self.max_y),
        )
    }
}

/// Bounding box of a vertex list.
pub fn polygon_bounds(poly: &[Point]) -> BoundingBox {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for &(x, y) in poly {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    BoundingBox {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

/// Shoelace area, positive for counter-clockwise rings.
pub fn signed_area(poly: &[Point]) -> f64 {
    let n = poly.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let (x1, y1) = poly[i];
        let (x2, y2) = poly[(i + 1) % n];
        acc += x1 * y2 - x2 * y1;
    }
    acc / 2.0
}

pub fn polygon_area(poly: &[Point]) -> f64 {
    signed_area(poly).abs()
}

/// Area-weighted centroid; falls back to the vertex mean for degenerate rings.
pub fn polygon_centroid(poly: &[Point]) -> Point {
    let area = signed_area(poly);
    let n = poly.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if area.abs() < EPSILON {
        let sx: f64 = poly.iter().map(|p| p.0).sum();
        let sy: f64 = poly.iter().map(|p| p.1).sum();
        return (sx / n as f64, sy / n as f64);
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let (x1, y1) = poly[i];
        let (x2, y2) = poly[(i + 1) % n];
        let cross = x1 * y2 - x2 * y1;
        cx += (x1 + x2) * cross;
        cy += (y1 + y2) * cross;
    }
    (cx / (6.0 * area), cy / (6.0 * area))
}

pub fn cross_product_sign(a: Point, b: Point, c: Point) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Check if two segments properly intersect (cross each other, not just touch)
pub fn segments_intersect_proper(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross_product_sign(b1, b2, a1);
    let d2 = cross_product_sign(b1, b2, a2);
    let d3 = cross_product_sign(a1, a2, b1);
    let d4 = cross_product_sign(a1, a2, b2);

    ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
}

/// Check if two segments share at least one point, touching included.
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    if segments_intersect_proper(a1, a2, b1, b2) {
        return true;
    }
    point_segment_distance(a1, b1, b2) <= EPSILON
        || point_segment_distance(a2, b1, b2) <= EPSILON
        || point_segment_distance(b1, a1, a2) <= EPSILON
        || point_segment_distance(b2, a1, a2) <= EPSILON
}

/// Euclidean distance from `p` to the closed segment `a`-`b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return ((p.0 - a.0).powi(2) + (p.1 - a.1).powi(2)).sqrt();
    }
    let t = (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0);
    let px = a.0 + t * dx;
    let py = a.1 + t * dy;
    ((p.0 - px).powi(2) + (p.1 - py).powi(2)).sqrt()
}

/// Check if point is strictly inside polygon (not on boundary)
pub fn point_strictly_inside_polygon(p: Point, poly: &[Point]) -> bool {
    let mut winding = 0i32;
    let n = poly.len();

    for i in 0..n {
        let j = (i + 1) % n;
        let (x1, y1) = poly[i];
        let (x2, y2) = poly[j];

        if y1 <= p.1 {
            if y2 > p.1 {
                // Upward crossing
                let cross = (x2 - x1) * (p.1 - y1) - (p.0 - x1) * (y2 - y1);
                if cross > 1e-10 {
                    winding += 1;
                }
            }
        } else if y2 <= p.1 {
            // Downward crossing
            let cross = (x2 - x1) * (p.1 - y1) - (p.0 - x1) * (y2 - y1);
            if cross < -1e-10 {
                winding -= 1;
            }
        }
    }

    winding != 0 && !point_on_boundary(p, poly)
}

pub fn point_on_boundary(p: Point, poly: &[Point]) -> bool {
    let n = poly.len();
    (0..n).any(|i| point_segment_distance(p, poly[i], poly[(i + 1) % n]) <= EPSILON)
}

/// Inside-or-on-boundary test.
pub fn point_in_polygon(p: Point, poly: &[Point]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let bounds = polygon_bounds(poly);
    if !bounds.contains(p) {
        return false;
    }
    point_on_boundary(p, poly) || point_strictly_inside_polygon(p, poly)
}

/// Distance from `p` to the polygon; zero when `p` is inside or on it.
pub fn distance_to_polygon(p: Point, poly: &[Point]) -> f64 {
    if point_in_polygon(p, poly) {
        return 0.0;
    }
    let n = poly.len();
    (0..n)
        .map(|i| point_segment_distance(p, poly[i], poly[(i + 1) % n]))
        .fold(f64::INFINITY, f64::min)
}

/// A ring with no repeated consecutive vertices, non-zero area and no
/// intersections between non-adjacent edges.
pub fn is_simple(poly: &[Point]) -> bool {
    let n = poly.len();
    if n < 3 || polygon_area(poly) <= EPSILON {
        return false;
    }

    for i in 0..n {
        let a1 = poly[i];
        let a2 = poly[(i + 1) % n];
        if (a1.0 - a2.0).abs() <= EPSILON && (a1.1 - a2.1).abs() <= EPSILON {
            return false;
        }

        for j in (i + 1)..n {
            let b1 = poly[j];
            let b2 = poly[(j + 1) % n];
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);

            if adjacent {
                // Adjacent edges may only share their common vertex.
                let (shared, a_far, b_far) = if j == i + 1 { (a2, a1, b2) } else { (a1, a2, b1) };
                let folds_back = cross_product_sign(shared, a_far, b_far).abs() <= EPSILON
                    && ((a_far.0 - shared.0) * (b_far.0 - shared.0)
                        + (a_far.1 - shared.1) * (b_far.1 - shared.1))
                        > 0.0;
                if folds_back {
                    return false;
                }
            } else if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

/// Check if two polygons share interior area. Touching edges do not count.
pub fn polygons_overlap(poly1: &[Point], poly2: &[Point]) -> bool {
    if poly1.len() < 3 || poly2.len() < 3 {
        return false;
    }
    if !polygon_bounds(poly1).intersects(&polygon_bounds(poly2)) {
        return false;
    }

    // Check if any edges cross
    for i in 0..poly1.len() {
        let (a1, a2) = (poly1[i], poly1[(i + 1) % poly1.len()]);
        for k in 0..poly2.len() {
            let (b1, b2) = (poly2[k], poly2[(k + 1) % poly2.len()]);
            if segments_intersect_proper(a1, a2, b1, b2) {
                return true;
            }
        }
    }

    if poly1.iter().any(|&p| point_strictly_inside_polygon(p, poly2))
        || poly2.iter().any(|&p| point_strictly_inside_polygon(p, poly1))
    {
        return true;
    }

    // Coincident or nested rings whose vertices all sit on the other boundary.
    let c1 = polygon_centroid(poly1);
    let c2 = polygon_centroid(poly2);
    (point_strictly_inside_polygon(c1, poly1) && point_strictly_inside_polygon(c1, poly2))
        || (point_strictly_inside_polygon(c2, poly2) && point_strictly_inside_polygon(c2, poly1))
}

/// Check if `inner` lies entirely inside or on `outer`.
pub fn polygon_contains_polygon(outer: &[Point], inner: &[Point]) -> bool {
    if !inner.iter().all(|&p| point_in_polygon(p, outer)) {
        return false;
    }
    for i in 0..outer.len() {
        let (a1, a2) = (outer[i], outer[(i + 1) % outer.len()]);
        for k in 0..inner.len() {
            let (b1, b2) = (inner[k], inner[(k + 1) % inner.len()]);
            if segments_intersect_proper(a1, a2, b1, b2) {
                return false;
            }
        }
    }
    true
}

/// Regular polygon approximating a disc, i.e. a buffered point.
pub fn circle_polygon(center: Point, radius: f64, segments: usize) -> Vec<Point> {
    let segments = segments.max(8);
    (0..segments)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / segments as f64;
            (
                center.0 + radius * angle.cos(),
                center.1 + radius * angle.sin(),
            )
        })
        .collect()
}

/// Area of the lens shared by two discs whose centers are `distance` apart.
pub fn circle_intersection_area(distance: f64, r1: f64, r2: f64) -> f64 {
    if distance >= r1 + r2 {
        return 0.0;
    }
    if distance <= (r1 - r2).abs() {
        let r = r1.min(r2);
        return PI * r * r;
    }

    let term1 = r1 * r1 * ((distance * distance + r1 * r1 - r2 * r2) / (2.0 * distance * r1)).acos();
    let term2 = r2 * r2 * ((distance * distance + r2 * r2 - r1 * r1) / (2.0 * distance * r2)).acos();
    let term3 = 0.5
        * ((-distance + r1 + r2) * (distance + r1 - r2) * (distance - r1 + r2) * (distance + r1 + r2))
            .max(0.0)
            .sqrt();
    term1 + term2 - term3
}
