//! Hue/saturation/value blob detector.
//!
//! Thresholds the frame in HSV space, opens the mask to drop speckle, labels
//! the surviving regions and reports the largest one. Only as good as the
//! lighting: an ambient shift that moves the ball's hue out of the range
//! loses it, and the depth later read at the centroid may belong to a
//! slightly different instant than the color frame.

use std::f32::consts::FRAC_PI_4;

use log::debug;
use serde::{Deserialize, Serialize};

use screenhit_core::{label_regions, rgb_to_hsv, ColorFrameView, Hsv, Mask, StructuringElement};

use crate::candidate::{DetectionCandidate, DetectorKind};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Inclusive HSV box, `[h, s, v]` with hue in `[0, 180)`.
///
/// When `lower[0] > upper[0]` the hue interval wraps through 0, which is how
/// red is usually described.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const RED: HsvRange = HsvRange {
        lower: [0, 100, 100],
        upper: [10, 255, 255],
    };
    pub const PINK: HsvRange = HsvRange {
        lower: [140, 100, 100],
        upper: [170, 255, 255],
    };

    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Look up a named preset (`"red"`, `"pink"`).
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "red" => Some(Self::RED),
            "pink" => Some(Self::PINK),
            _ => None,
        }
    }

    pub fn contains(&self, px: Hsv) -> bool {
        let hue_ok = if self.lower[0] <= self.upper[0] {
            px.h >= self.lower[0] && px.h <= self.upper[0]
        } else {
            px.h >= self.lower[0] || px.h <= self.upper[0]
        };
        hue_ok
            && (self.lower[1]..=self.upper[1]).contains(&px.s)
            && (self.lower[2]..=self.upper[2]).contains(&px.v)
    }
}

impl Default for HsvRange {
    fn default() -> Self {
        Self::RED
    }
}

/// Parameters for [`ColorDetector`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorDetectorParams {
    pub range: HsvRange,
    /// Regions smaller than this many pixels are ignored.
    pub min_area: usize,
    /// Diameter of the elliptical opening element.
    pub kernel_size: usize,
}

impl Default for ColorDetectorParams {
    fn default() -> Self {
        Self {
            range: HsvRange::RED,
            min_area: 100,
            kernel_size: 5,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColorDetector {
    params: ColorDetectorParams,
    element: StructuringElement,
}

impl Default for ColorDetector {
    fn default() -> Self {
        Self::new(ColorDetectorParams::default())
    }
}

impl ColorDetector {
    pub fn new(params: ColorDetectorParams) -> Self {
        Self {
            element: StructuringElement::ellipse(params.kernel_size),
            params,
        }
    }

    pub fn params(&self) -> &ColorDetectorParams {
        &self.params
    }

    pub fn range(&self) -> HsvRange {
        self.params.range
    }

    pub fn set_range(&mut self, range: HsvRange) {
        self.params.range = range;
    }

    /// Raw in-range mask, before opening.
    pub fn threshold(&self, frame: &ColorFrameView<'_>) -> Mask {
        let range = self.params.range;
        Mask::from_fn(frame.width, frame.height, |x, y| {
            frame
                .pixel(x, y)
                .is_some_and(|rgb| range.contains(rgb_to_hsv(rgb)))
        })
    }

    /// Largest in-range blob of at least `min_area` pixels.
    ///
    /// Confidence rewards round, compact blobs: the ratio of the blob's fill
    /// of its bounding box to that of a disk, times the box aspect ratio.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(w = frame.width, h = frame.height))
    )]
    pub fn detect(&self, frame: &ColorFrameView<'_>) -> Option<DetectionCandidate> {
        let mask = self.threshold(frame).open(&self.element);
        let regions = label_regions(&mask);
        let total = regions.len();

        let best = regions
            .into_iter()
            .filter(|r| r.area() >= self.params.min_area)
            .max_by_key(|r| r.area())?;

        let (w, h) = (best.bbox_width() as f32, best.bbox_height() as f32);
        let compactness = (best.fill_ratio() / FRAC_PI_4).min(1.0);
        let aspect = w.min(h) / w.max(h);
        let candidate = DetectionCandidate {
            position: best.centroid(),
            area: best.area(),
            confidence: (compactness * aspect).clamp(0.0, 1.0),
            depth_delta_mm: None,
            source: DetectorKind::Color,
        };
        debug!(
            "color blob at ({:.1}, {:.1}) area {} conf {:.2} ({} regions)",
            candidate.position.x, candidate.position.y, candidate.area, candidate.confidence, total
        );
        Some(candidate)
    }
}
