//! Planar geometry helpers
//!
//! Points are plain pixel pairs in the base image's coordinate space. There is
//! no projection here; "latitude"/"longitude" on the wire are just the first
//! and second components.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Polygon used whenever stored coordinates are unusable.
pub const DEFAULT_POLYGON: [Point; 4] = [
    Point::new(100.0, 100.0),
    Point::new(100.0, 300.0),
    Point::new(300.0, 300.0),
    Point::new(300.0, 100.0),
];

/// Known bad-data value some backend records carry instead of coordinates.
const BAD_DATA_SENTINEL: &str = "string";

/// Minimum vertex count of a polygon.
pub const MIN_POLYGON_POINTS: usize = 3;

/// A point in image pixel space, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Display bounds of a base map image, known once its natural size has been
/// probed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageBounds {
    pub width: u32,
    pub height: u32,
}

impl ImageBounds {
    /// `None` for degenerate (zero-sized) images.
    pub fn from_natural_size(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(
            Point::new(0.0, 0.0),
            Point::new(f64::from(self.width), f64::from(self.height)),
        )
    }
}

pub fn default_polygon() -> Vec<Point> {
    DEFAULT_POLYGON.to_vec()
}

/// Parse a JSON-encoded `[[x, y], ...]` polygon.
///
/// Absent, empty, the `"string"` sentinel, invalid JSON and polygons with
/// fewer than three points all fall back to [`DEFAULT_POLYGON`].
pub fn parse_polygon_coordinates(raw: Option<&str>) -> Vec<Point> {
    let Some(raw) = raw.map(str::trim) else {
        warn!("Region has no polygon coordinates, using default shape");
        return default_polygon();
    };

    if raw.is_empty() {
        warn!("Region has empty polygon coordinates, using default shape");
        return default_polygon();
    }

    if raw == BAD_DATA_SENTINEL {
        warn!("Region carries placeholder coordinates \"string\", using default shape");
        return default_polygon();
    }

    match serde_json::from_str::<Vec<Point>>(raw) {
        Ok(points) if points.len() >= MIN_POLYGON_POINTS => points,
        Ok(points) => {
            warn!(
                "Region polygon has {} points (need {}), using default shape",
                points.len(),
                MIN_POLYGON_POINTS
            );
            default_polygon()
        }
        Err(e) => {
            warn!("Region polygon is not valid JSON ({}), using default shape", e);
            default_polygon()
        }
    }
}

/// Encode points as the JSON string the backend stores.
pub fn encode_polygon(points: &[Point]) -> String {
    let pairs: Vec<[f64; 2]> = points.iter().map(|p| (*p).into()).collect();
    // Serializing plain float arrays cannot fail.
    serde_json::to_string(&pairs).unwrap_or_else(|_| "[]".to_string())
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Vertex mean, each component rounded to 6 decimals.
///
/// This is not the area centroid of the polygon; it is what the backend has
/// always been sent.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(round_to(sx / n, 6), round_to(sy / n, 6)))
}

/// Even-odd point-in-polygon test.
pub fn polygon_contains(points: &[Point], p: Point) -> bool {
    if points.len() < MIN_POLYGON_POINTS {
        return false;
    }
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (a, b) = (points[i], points[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[[f64; 2]]) -> Vec<Point> {
        raw.iter().map(|p| Point::from(*p)).collect()
    }

    #[test]
    fn test_parse_sentinel_string() {
        assert_eq!(parse_polygon_coordinates(Some("string")), default_polygon());
    }

    #[test]
    fn test_parse_valid_triangle() {
        let parsed = parse_polygon_coordinates(Some("[[1,2],[3,4],[5,6]]"));
        assert_eq!(parsed, pts(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
    }

    #[test]
    fn test_parse_too_few_points() {
        assert_eq!(parse_polygon_coordinates(Some("[[1,2]]")), default_polygon());
        assert_eq!(
            parse_polygon_coordinates(Some("[[1,2],[3,4]]")),
            default_polygon()
        );
    }

    #[test]
    fn test_parse_absent_empty_and_garbage() {
        assert_eq!(parse_polygon_coordinates(None), default_polygon());
        assert_eq!(parse_polygon_coordinates(Some("")), default_polygon());
        assert_eq!(parse_polygon_coordinates(Some("   ")), default_polygon());
        assert_eq!(parse_polygon_coordinates(Some("[[1,2],")), default_polygon());
        assert_eq!(parse_polygon_coordinates(Some("{\"x\":1}")), default_polygon());
    }

    #[test]
    fn test_default_polygon_shape() {
        assert_eq!(
            default_polygon(),
            pts(&[[100.0, 100.0], [100.0, 300.0], [300.0, 300.0], [300.0, 100.0]])
        );
    }

    #[test]
    fn test_encode_then_parse_keeps_points() {
        let square = pts(&[[0.5, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]);
        let encoded = encode_polygon(&square);
        assert!(encoded.starts_with("[[0.5,0.0]"));
        assert_eq!(parse_polygon_coordinates(Some(&encoded)), square);
    }

    #[test]
    fn test_centroid_of_square() {
        let square = pts(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]);
        assert_eq!(centroid(&square), Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn test_centroid_is_vertex_mean_rounded() {
        // Repeating a vertex skews the mean; the true area centroid would not move.
        let skewed = pts(&[[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(centroid(&skewed), Some(Point::new(0.25, 0.25)));

        let thirds = pts(&[[0.0, 0.0], [1.0, 0.0], [0.0, 0.0]]);
        assert_eq!(centroid(&thirds), Some(Point::new(0.333333, 0.0)));
        assert_eq!(centroid(&[]), None);
    }

    #[test]
    fn test_image_bounds() {
        assert!(ImageBounds::from_natural_size(0, 10).is_none());
        let b = ImageBounds::from_natural_size(800, 600).unwrap().bounds();
        assert_eq!(b.width(), 800.0);
        assert_eq!(b.height(), 600.0);
        assert_eq!(b.center(), Point::new(400.0, 300.0));
    }

    #[test]
    fn test_polygon_contains() {
        let square = pts(&[[0.0, 0.0], [0.0, 10.0], [10.0, 10.0], [10.0, 0.0]]);
        assert!(polygon_contains(&square, Point::new(5.0, 5.0)));
        assert!(!polygon_contains(&square, Point::new(15.0, 5.0)));
    }
}
