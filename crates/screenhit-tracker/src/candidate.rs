use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Which detector produced a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Color,
    Motion,
}

/// A possible target position in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionCandidate {
    /// Centroid in color-frame pixel coordinates.
    pub position: Point2<f32>,
    /// Pixel area of the supporting region, measured in the plane it was found in.
    pub area: usize,
    /// Heuristic trust in `[0, 1]`.
    pub confidence: f32,
    /// Mean depth change inside the region (mm), motion candidates only.
    #[serde(default)]
    pub depth_delta_mm: Option<f32>,
    pub source: DetectorKind,
}
