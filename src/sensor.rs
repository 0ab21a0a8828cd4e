//! Ground and satellite sensors behind one covering predicate.

use crate::error::{ensure_non_negative, PlannerError, Result};
use crate::geometry::{self, BoundingBox, Point, EPSILON};
use serde::{Deserialize, Serialize};

/// Closed observation interval, in caller-defined time units (hours in the
/// bundled scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() || end < start {
            return Err(PlannerError::InvalidParameter(format!(
                "time window [{start}, {end}] is not a finite forward interval"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Length of the shared interval, zero when disjoint.
    pub fn overlap(&self, other: &TimeWindow) -> f64 {
        (self.end.min(other.end) - self.start.max(other.start)).max(0.0)
    }

    /// True when the closed intervals share at least one instant.
    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Ground projection of a satellite's coverage during one time window.
/// `polygon: None` means the satellite covers nothing in that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub window: TimeWindow,
    #[serde(default)]
    pub polygon: Option<Vec<Point>>,
}

impl Footprint {
    /// A polygon, when present, needs three finite vertices.
    pub fn validate(&self) -> Result<()> {
        TimeWindow::new(self.window.start, self.window.end)?;
        if let Some(poly) = &self.polygon {
            if poly.len() < 3 || poly.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
                return Err(PlannerError::InvalidParameter(format!(
                    "footprint polygon needs at least 3 finite vertices, got {}",
                    poly.len()
                )));
            }
        }
        Ok(())
    }

    pub fn covers(&self, p: Point) -> bool {
        self.polygon
            .as_deref()
            .is_some_and(|poly| geometry::point_in_polygon(p, poly))
    }
}

/// The single capability every sensor exposes to the evaluator.
pub trait Covering {
    fn id(&self) -> &str;

    fn cost(&self) -> f64;

    /// Does this sensor cover `p`? `window` restricts time-varying sensors to
    /// footprints whose window intersects it; `None` accepts any window.
    fn covers(&self, p: Point, window: Option<&TimeWindow>) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundSensor {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
}

impl GroundSensor {
    pub fn new(id: impl Into<String>, x: f64, y: f64, radius: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            radius,
            cost: 0.0,
            modality: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn position(&self) -> Point {
        (self.x, self.y)
    }

    /// Same sensor at another site.
    pub fn moved_to(&self, p: Point) -> Self {
        Self {
            x: p.0,
            y: p.1,
            ..self.clone()
        }
    }

    pub fn distance_to(&self, other: &GroundSensor) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Finite position, non-negative radius and cost.
    pub fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(PlannerError::InvalidParameter(format!(
                "ground sensor {} has a non-finite position",
                self.id
            )));
        }
        ensure_non_negative(&format!("radius of {}", self.id), self.radius)?;
        ensure_non_negative(&format!("cost of {}", self.id), self.cost)
    }
}

impl Covering for GroundSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn covers(&self, p: Point, _window: Option<&TimeWindow>) -> bool {
        if self.radius.is_nan() || self.radius < 0.0 {
            return false;
        }
        let dx = p.0 - self.x;
        let dy = p.1 - self.y;
        dx * dx + dy * dy <= self.radius * self.radius
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteSensor {
    pub id: String,
    pub footprints: Vec<Footprint>,
    #[serde(default)]
    pub cost: f64,
    /// Nominal revisit interval, used when the footprint list is too short to
    /// measure gaps from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revisit_interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
}

impl SatelliteSensor {
    pub fn new(id: impl Into<String>, footprints: Vec<Footprint>, cost: f64) -> Self {
        Self {
            id: id.into(),
            footprints,
            cost,
            revisit_interval: None,
            modality: None,
        }
    }

    /// Single-pass sensor whose footprint is the strip of `width` swept along
    /// the ground track from `start` to `end`. A stationary track yields a
    /// square of side `width` centred on `start`.
    pub fn swath(
        id: impl Into<String>,
        start: Point,
        end: Point,
        width: f64,
        window: TimeWindow,
        cost: f64,
    ) -> Self {
        let half = width / 2.0;
        let dx = end.0 - start.0;
        let dy = end.1 - start.1;
        let len = (dx * dx + dy * dy).sqrt();

        let polygon = if len <= EPSILON {
            vec![
                (start.0 - half, start.1 - half),
                (start.0 + half, start.1 - half),
                (start.0 + half, start.1 + half),
                (start.0 - half, start.1 + half),
            ]
        } else {
            let nx = -dy / len * half;
            let ny = dx / len * half;
            vec![
                (start.0 + nx, start.1 + ny),
                (start.0 - nx, start.1 - ny),
                (end.0 - nx, end.1 - ny),
                (end.0 + nx, end.1 + ny),
            ]
        };

        Self::new(
            id,
            vec![Footprint {
                window,
                polygon: Some(polygon),
            }],
            cost,
        )
    }

    pub fn with_revisit_interval(mut self, interval: f64) -> Self {
        self.revisit_interval = Some(interval);
        self
    }

    /// Windows in which the satellite actually covers something, by start time.
    pub fn observation_windows(&self) -> Vec<TimeWindow> {
        let mut windows: Vec<TimeWindow> = self
            .footprints
            .iter()
            .filter(|f| f.polygon.is_some())
            .map(|f| f.window)
            .collect();
        windows.sort_by(|a, b| a.start.total_cmp(&b.start));
        windows
    }

    /// Mean idle time between consecutive observation windows.
    pub fn mean_revisit_gap(&self) -> Option<f64> {
        mean_gap(&self.observation_windows()).or(self.revisit_interval)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative(&format!("cost of {}", self.id), self.cost)?;
        if let Some(interval) = self.revisit_interval {
            ensure_non_negative(&format!("revisit interval of {}", self.id), interval)?;
        }
        self.footprints.iter().try_for_each(Footprint::validate)
    }

    /// Union bounding box of all footprint polygons.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.footprints
            .iter()
            .filter_map(|f| f.polygon.as_deref())
            .map(geometry::polygon_bounds)
            .reduce(|a, b| a.union(&b))
    }
}

/// Mean positive gap between sorted windows, `None` with fewer than two.
pub(crate) fn mean_gap(sorted: &[TimeWindow]) -> Option<f64> {
    if sorted.len() < 2 {
        return None;
    }
    let mut reach = sorted[0].end;
    let mut total = 0.0;
    for w in &sorted[1..] {
        total += (w.start - reach).max(0.0);
        reach = reach.max(w.end);
    }
    Some(total / (sorted.len() - 1) as f64)
}

impl Covering for SatelliteSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn cost(&self) -> f64 {
        self.cost
    }

    fn covers(&self, p: Point, window: Option<&TimeWindow>) -> bool {
        self.footprints
            .iter()
            .filter(|f| window.map_or(true, |w| f.window.intersects(w)))
            .any(|f| f.covers(p))
    }
}

/// A placed sensor of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sensor {
    Ground(GroundSensor),
    Satellite(SatelliteSensor),
}

impl Sensor {
    pub fn as_ground(&self) -> Option<&GroundSensor> {
        match self {
            Sensor::Ground(g) => Some(g),
            Sensor::Satellite(_) => None,
        }
    }

    pub fn as_satellite(&self) -> Option<&SatelliteSensor> {
        match self {
            Sensor::Ground(_) => None,
            Sensor::Satellite(s) => Some(s),
        }
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, Sensor::Ground(_))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Sensor::Ground(g) => g.validate(),
            Sensor::Satellite(s) => s.validate(),
        }
    }

    pub fn modality(&self) -> Option<&str> {
        match self {
            Sensor::Ground(g) => g.modality.as_deref(),
            Sensor::Satellite(s) => s.modality.as_deref(),
        }
    }

    /// Extent of everything the sensor could ever cover.
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Sensor::Ground(g) => Some(BoundingBox {
                min_x: g.x - g.radius,
                min_y: g.y - g.radius,
                max_x: g.x + g.radius,
                max_y: g.y + g.radius,
            }),
            Sensor::Satellite(s) => s.bounds(),
        }
    }
}

impl Covering for Sensor {
    fn id(&self) -> &str {
        match self {
            Sensor::Ground(g) => g.id(),
            Sensor::Satellite(s) => s.id(),
        }
    }

    fn cost(&self) -> f64 {
        match self {
            Sensor::Ground(g) => g.cost(),
            Sensor::Satellite(s) => s.cost(),
        }
    }

    fn covers(&self, p: Point, window: Option<&TimeWindow>) -> bool {
        match self {
            Sensor::Ground(g) => g.covers(p, window),
            Sensor::Satellite(s) => s.covers(p, window),
        }
    }
}

/// Reject the first malformed sensor of a roster.
pub fn validate_sensors(sensors: &[Sensor]) -> Result<()> {
    sensors.iter().try_for_each(Sensor::validate)
}

pub fn validate_satellites(satellites: &[SatelliteSensor]) -> Result<()> {
    satellites.iter().try_for_each(SatelliteSensor::validate)
}

impl From<GroundSensor> for Sensor {
    fn from(g: GroundSensor) -> Self {
        Sensor::Ground(g)
    }
}

impl From<SatelliteSensor> for Sensor {
    fn from(s: SatelliteSensor) -> Self {
        Sensor::Satellite(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn window(start: f64, end: f64) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    #[test]
    fn test_ground_covers_disc_boundary() {
        let g = GroundSensor::new("g", 0.0, 0.0, 2.0);
        assert!(g.covers((2.0, 0.0), None));
        assert!(g.covers((1.0, 1.0), None));
        assert!(!g.covers((2.0, 0.1), None));
    }

    #[test]
    fn test_zero_radius_covers_only_its_position() {
        let g = GroundSensor::new("g", 1.5, 2.5, 0.0);
        assert!(g.covers((1.5, 2.5), None));
        assert!(!g.covers((1.5, 2.5 + 1e-9), None));
    }

    #[test]
    fn test_negative_radius_covers_nothing() {
        let g = GroundSensor::new("neg", 5.0, 5.0, -3.0);
        assert!(!g.covers((5.0, 6.0), None));
        assert!(!g.covers((5.0, 5.0), None));
        assert!(matches!(g.validate(), Err(PlannerError::InvalidParameter(_))));
    }

    #[test]
    fn test_validate_rejects_bad_sensors() {
        assert!(GroundSensor::new("ok", 1.0, 1.0, 2.0).with_cost(5.0).validate().is_ok());
        assert!(GroundSensor::new("c", 1.0, 1.0, 2.0).with_cost(-50.0).validate().is_err());
        assert!(GroundSensor::new("n", f64::NAN, 1.0, 2.0).validate().is_err());
        assert!(GroundSensor::new("r", 1.0, 1.0, f64::INFINITY).validate().is_err());

        let pass = SatelliteSensor::swath("s", (0.0, 0.0), (5.0, 0.0), 2.0, window(0.0, 1.0), 10.0);
        assert!(pass.validate().is_ok());
        let mut cheap = pass.clone();
        cheap.cost = -1000.0;
        assert!(cheap.validate().is_err());

        let sliver = SatelliteSensor::new(
            "t",
            vec![Footprint { window: window(0.0, 1.0), polygon: Some(vec![(0.0, 0.0), (1.0, 1.0)]) }],
            1.0,
        );
        assert!(sliver.validate().is_err());

        let roster = vec![Sensor::from(pass), Sensor::from(GroundSensor::new("r", 0.0, 0.0, -1.0))];
        assert!(validate_sensors(&roster).is_err());
        assert!(validate_sensors(&roster[..1]).is_ok());
    }

    #[test]
    fn test_time_window_overlap() {
        let a = window(0.0, 4.0);
        let b = window(3.0, 10.0);
        assert_relative_eq!(a.overlap(&b), 1.0);
        assert_relative_eq!(a.overlap(&window(5.0, 6.0)), 0.0);
        assert!(a.intersects(&window(4.0, 5.0)));
        assert!(TimeWindow::new(3.0, 1.0).is_err());
    }

    #[test]
    fn test_satellite_respects_window() {
        let sat = SatelliteSensor::swath("s", (0.0, 5.0), (10.0, 5.0), 2.0, window(0.0, 1.0), 100.0);
        assert!(sat.covers((5.0, 5.9), None));
        assert!(!sat.covers((5.0, 6.5), None));
        assert!(sat.covers((5.0, 5.0), Some(&window(0.5, 2.0))));
        assert!(!sat.covers((5.0, 5.0), Some(&window(2.0, 3.0))));
    }

    #[test]
    fn test_stationary_swath_is_square() {
        let sat = SatelliteSensor::swath("s", (3.0, 3.0), (3.0, 3.0), 2.0, window(0.0, 1.0), 1.0);
        let poly = sat.footprints[0].polygon.as_ref().unwrap();
        assert_relative_eq!(geometry::polygon_area(poly), 4.0);
        assert!(sat.covers((4.0, 4.0), None));
    }

    #[test]
    fn test_mean_revisit_gap() {
        let mut sat = SatelliteSensor::new(
            "s",
            vec![
                Footprint { window: window(10.0, 11.0), polygon: Some(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]) },
                Footprint { window: window(0.0, 1.0), polygon: Some(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]) },
                Footprint { window: window(4.0, 5.0), polygon: None },
                Footprint { window: window(5.0, 6.0), polygon: Some(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]) },
            ],
            1.0,
        );
        // gaps 1->5 and 6->10
        assert_relative_eq!(sat.mean_revisit_gap().unwrap(), 4.0);

        sat.footprints.truncate(1);
        assert_eq!(sat.mean_revisit_gap(), None);
        assert_eq!(sat.with_revisit_interval(12.0).mean_revisit_gap(), Some(12.0));
    }

    #[test]
    fn test_sensor_json_tagging() {
        let json = r#"{"kind":"ground","id":"a","x":1.0,"y":2.0,"radius":3.0}"#;
        let sensor: Sensor = serde_json::from_str(json).unwrap();
        assert!(sensor.is_ground());
        assert_eq!(sensor.id(), "a");
        assert_relative_eq!(sensor.cost(), 0.0);
        let bounds = sensor.bounds().unwrap();
        assert_relative_eq!(bounds.min_x, -2.0);
    }
}
