//! Validated, immutable planning region.

use crate::error::{PlannerError, Result};
use crate::geometry::{self, BoundingBox, Point, EPSILON};
use serde::{Deserialize, Serialize};

/// A simple polygon describing the area to cover.
///
/// Construction validates the ring once; afterwards the region is read-only
/// and cheap to share between solvers and threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Region {
    vertices: Vec<Point>,
    bounds: BoundingBox,
    area: f64,
}

impl Region {
    /// Build a region from an ordered vertex ring.
    ///
    /// A trailing vertex equal to the first one is treated as an explicit
    /// ring closure and dropped. Fails with [`PlannerError::InvalidRegion`]
    /// for fewer than three distinct vertices, non-finite coordinates, zero
    /// area, or self-intersection.
    pub fn new(vertices: Vec<Point>) -> Result<Self> {
        let mut vertices = vertices;
        if vertices.len() > 1 {
            let first = vertices[0];
            let last = vertices[vertices.len() - 1];
            if (first.0 - last.0).abs() <= EPSILON && (first.1 - last.1).abs() <= EPSILON {
                vertices.pop();
            }
        }

        if vertices.len() < 3 {
            return Err(PlannerError::InvalidRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
            return Err(PlannerError::InvalidRegion(
                "polygon has non-finite coordinates".to_string(),
            ));
        }
        if !geometry::is_simple(&vertices) {
            return Err(PlannerError::InvalidRegion(
                "polygon is degenerate or self-intersecting".to_string(),
            ));
        }

        let bounds = geometry::polygon_bounds(&vertices);
        let area = geometry::polygon_area(&vertices);
        Ok(Self {
            vertices,
            bounds,
            area,
        })
    }

    /// Axis-aligned rectangle, convenient for tests and benchmarks.
    pub fn rectangle(min: Point, max: Point) -> Result<Self> {
        Self::new(vec![min, (max.0, min.1), max, (min.0, max.1)])
    }

    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn centroid(&self) -> Point {
        geometry::polygon_centroid(&self.vertices)
    }

    /// Inside-or-on-boundary test.
    pub fn contains(&self, p: Point) -> bool {
        geometry::point_in_polygon(p, &self.vertices)
    }

    /// Distance to the region, zero for points inside it.
    pub fn distance_to(&self, p: Point) -> f64 {
        geometry::distance_to_polygon(p, &self.vertices)
    }
}

impl TryFrom<Vec<Point>> for Region {
    type Error = PlannerError;

    fn try_from(vertices: Vec<Point>) -> Result<Self> {
        Region::new(vertices)
    }
}

impl From<Region> for Vec<Point> {
    fn from(region: Region) -> Self {
        region.vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_region() {
        let region = Region::new(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]).unwrap();
        assert_relative_eq!(region.area(), 100.0);
        assert_relative_eq!(region.bounds().width(), 10.0);
        assert!(region.contains((0.0, 5.0)));
        assert!(!region.contains((-0.1, 5.0)));
        assert_relative_eq!(region.distance_to((13.0, 14.0)), 5.0);
    }

    #[test]
    fn test_closed_ring_is_accepted() {
        let region = Region::new(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]).unwrap();
        assert_eq!(region.vertices().len(), 3);
    }

    #[test]
    fn test_rejects_invalid_polygons() {
        assert!(matches!(
            Region::new(vec![(0.0, 0.0), (1.0, 1.0)]),
            Err(PlannerError::InvalidRegion(_))
        ));
        assert!(matches!(
            Region::new(vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)]),
            Err(PlannerError::InvalidRegion(_))
        ));
        assert!(matches!(
            Region::new(vec![(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            Err(PlannerError::InvalidRegion(_))
        ));
        assert!(Region::new(vec![(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0)]).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let region: Region = serde_json::from_str("[[0,0],[3,0],[3,3],[0,3]]").unwrap();
        assert_relative_eq!(region.area(), 9.0);
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "[[0.0,0.0],[3.0,0.0],[3.0,3.0],[0.0,3.0]]");
        assert!(serde_json::from_str::<Region>("[[0,0],[1,1]]").is_err());
    }
}
