use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::PolygonError;

/// Points closer than this to an edge count as lying on it.
const ON_EDGE_EPS: f32 = 1e-3;

/// Screen boundary in color-frame pixel coordinates.
///
/// Vertices are kept in the order they were given; the polygon is implicitly
/// closed. Points on the boundary are inside.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct ScreenPolygon {
    vertices: Vec<Point2<f32>>,
}

impl ScreenPolygon {
    pub fn new(vertices: Vec<Point2<f32>>) -> Result<Self, PolygonError> {
        if vertices.len() < 3 {
            return Err(PolygonError::TooFewVertices {
                got: vertices.len(),
            });
        }
        if let Some(index) = vertices
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(PolygonError::NonFiniteVertex { index });
        }
        Ok(Self { vertices })
    }

    /// Build from integer pixel pairs, as stored in the screen area file.
    pub fn from_pixels(points: &[(i32, i32)]) -> Result<Self, PolygonError> {
        Self::new(
            points
                .iter()
                .map(|&(x, y)| Point2::new(x as f32, y as f32))
                .collect(),
        )
    }

    /// Axis-aligned rectangle from its top-left and bottom-right corners (TL, TR, BR, BL).
    pub fn from_corners(top_left: (i32, i32), bottom_right: (i32, i32)) -> Self {
        let (x0, y0) = (top_left.0 as f32, top_left.1 as f32);
        let (x1, y1) = (bottom_right.0 as f32, bottom_right.1 as f32);
        Self {
            vertices: vec![
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
        }
    }

    pub fn vertices(&self) -> &[Point2<f32>] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (Point2<f32>, Point2<f32>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Inclusive point-in-polygon test (even-odd rule plus on-edge check).
    pub fn contains(&self, p: Point2<f32>) -> bool {
        if self.distance_to_boundary(p) <= ON_EDGE_EPS {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Unsigned distance from `p` to the nearest edge.
    pub fn distance_to_boundary(&self, p: Point2<f32>) -> f32 {
        self.edges()
            .map(|(a, b)| distance_to_segment(p, a, b))
            .fold(f32::INFINITY, f32::min)
    }

    /// Distance to the boundary, positive inside and negative outside.
    pub fn signed_distance(&self, p: Point2<f32>) -> f32 {
        let d = self.distance_to_boundary(p);
        if self.contains(p) {
            d
        } else {
            -d
        }
    }

    /// Area centroid; falls back to the vertex mean for degenerate polygons.
    pub fn centroid(&self) -> Point2<f32> {
        let mut area2 = 0.0f64;
        let mut cx = 0.0f64;
        let mut cy = 0.0f64;
        for (a, b) in self.edges() {
            let cross = a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
            area2 += cross;
            cx += (a.x as f64 + b.x as f64) * cross;
            cy += (a.y as f64 + b.y as f64) * cross;
        }
        if area2.abs() < 1e-9 {
            let n = self.vertices.len() as f32;
            let sum = self
                .vertices
                .iter()
                .fold(Vector2::zeros(), |acc, p| acc + p.coords);
            return Point2::from(sum / n);
        }
        Point2::new((cx / (3.0 * area2)) as f32, (cy / (3.0 * area2)) as f32)
    }
}

impl TryFrom<Vec<[f32; 2]>> for ScreenPolygon {
    type Error = PolygonError;

    fn try_from(raw: Vec<[f32; 2]>) -> Result<Self, Self::Error> {
        Self::new(raw.into_iter().map(|[x, y]| Point2::new(x, y)).collect())
    }
}

impl From<ScreenPolygon> for Vec<[f32; 2]> {
    fn from(poly: ScreenPolygon) -> Self {
        poly.vertices.iter().map(|p| [p.x, p.y]).collect()
    }
}

fn distance_to_segment(p: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= f32::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}
