//! Depth-delta motion detector.
//!
//! Compares two consecutive depth frames and reports regions that moved
//! towards the camera by more than a threshold. Works regardless of color or
//! lighting and ignores static background by construction, but needs two
//! temporally adjacent frames.

use log::debug;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use screenhit_core::{
    is_sentinel, label_regions, DepthFrame, DepthFrameView, Mask, ScreenPolygon, StructuringElement,
};
use screenhit_depth::CoordinateScaler;

use crate::candidate::{DetectionCandidate, DetectorKind};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Parameters for [`MotionDetector`] and [`MotionTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDetectorParams {
    /// A pixel moved if `depth_t - depth_{t-1}` is below this (mm, negative = closer).
    pub depth_change_threshold_mm: f32,
    pub min_area: usize,
    pub max_area: usize,
    /// Regions whose delta standard deviation exceeds this (mm) are rejected.
    pub max_delta_std_mm: f32,
    /// Mean approach (mm) that earns full magnitude credit.
    pub full_credit_delta_mm: f32,
    /// Confidence multiplier for candidates outside the screen polygon.
    pub outside_screen_factor: f32,
    /// The tracker drops its best candidate when it scores below this.
    pub approach_confidence_threshold: f32,
    pub kernel_size: usize,
}

impl Default for MotionDetectorParams {
    fn default() -> Self {
        Self {
            depth_change_threshold_mm: -50.0,
            min_area: 50,
            max_area: 10_000,
            max_delta_std_mm: 200.0,
            full_credit_delta_mm: 200.0,
            outside_screen_factor: 0.5,
            approach_confidence_threshold: 0.5,
            kernel_size: 5,
        }
    }
}

/// Per-call context for [`MotionDetector::detect`].
#[derive(Clone, Copy, Debug)]
pub struct MotionContext<'a> {
    /// Maps depth centroids back to color coordinates. An unobserved scaler
    /// is treated as identity.
    pub scaler: &'a CoordinateScaler,
    pub screen: Option<&'a ScreenPolygon>,
    /// Color-frame position of the target in the previous frame.
    pub previous: Option<Point2<f32>>,
}

/// Stateless frame-pair detector.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    params: MotionDetectorParams,
    element: StructuringElement,
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new(MotionDetectorParams::default())
    }
}

impl MotionDetector {
    pub fn new(params: MotionDetectorParams) -> Self {
        Self {
            element: StructuringElement::ellipse(params.kernel_size),
            params,
        }
    }

    pub fn params(&self) -> &MotionDetectorParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut MotionDetectorParams {
        &mut self.params
    }

    /// Opened mask of pixels valid in both frames that moved closer by more
    /// than the threshold. Frames must have equal dimensions.
    pub fn motion_mask(&self, curr: &DepthFrameView<'_>, prev: &DepthFrameView<'_>) -> Mask {
        let threshold = self.params.depth_change_threshold_mm;
        let w = curr.width;
        Mask::from_fn(curr.width, curr.height, |x, y| {
            let i = y * w + x;
            let (c, p) = (curr.data[i], prev.data[i]);
            if is_sentinel(c) || is_sentinel(p) {
                return false;
            }
            (c as f32 - p as f32) < threshold
        })
        .open(&self.element)
    }

    /// Candidates ranked by confidence, ties broken by larger area.
    ///
    /// Frames of different size yield nothing.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn detect(
        &self,
        curr: &DepthFrameView<'_>,
        prev: &DepthFrameView<'_>,
        ctx: &MotionContext<'_>,
    ) -> Vec<DetectionCandidate> {
        if curr.dimensions() != prev.dimensions() {
            debug!(
                "depth frame size changed {:?} -> {:?}, skipping motion",
                prev.dimensions(),
                curr.dimensions()
            );
            return Vec::new();
        }

        let mask = self.motion_mask(curr, prev);
        if !mask.any() {
            return Vec::new();
        }

        let p = &self.params;
        let mut out = Vec::new();
        for region in label_regions(&mask) {
            let area = region.area();
            if area < p.min_area || area > p.max_area {
                continue;
            }

            let deltas: Vec<f64> = region
                .pixels
                .iter()
                .map(|&i| curr.data[i] as f64 - prev.data[i] as f64)
                .collect();
            let n = deltas.len() as f64;
            let mean = deltas.iter().sum::<f64>() / n;
            let std = (deltas.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / n).sqrt();
            if std > p.max_delta_std_mm as f64 {
                debug!("motion region of {area}px rejected: delta std {std:.0}mm");
                continue;
            }

            let c = region.centroid();
            let position = if ctx.scaler.scale().is_some() {
                match ctx.scaler.to_color_coords(c.x, c.y) {
                    Some(p) => p,
                    None => continue,
                }
            } else {
                c
            };

            let avg = mean as f32;
            out.push(DetectionCandidate {
                position,
                area,
                confidence: self.score(avg, position, ctx),
                depth_delta_mm: Some(avg),
                source: DetectorKind::Motion,
            });
        }

        out.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.area.cmp(&a.area))
        });
        debug!("{} motion candidates", out.len());
        out
    }

    /// `magnitude * direction * in_screen`.
    fn score(&self, avg_delta_mm: f32, position: Point2<f32>, ctx: &MotionContext<'_>) -> f32 {
        let p = &self.params;
        let magnitude = (avg_delta_mm.abs() / p.full_credit_delta_mm).min(1.0);

        let (direction, in_screen) = match ctx.screen {
            Some(screen) => {
                let direction = ctx
                    .previous
                    .map(|prev| approach_cosine(position - prev, screen.centroid() - position))
                    .unwrap_or(1.0);
                let in_screen = if screen.contains(position) {
                    1.0
                } else {
                    p.outside_screen_factor
                };
                (direction, in_screen)
            }
            None => (1.0, 1.0),
        };
        (magnitude * direction * in_screen).clamp(0.0, 1.0)
    }
}

/// Cosine between the displacement and the direction to the screen, clamped
/// to `[0, 1]`. Degenerate vectors give full credit.
fn approach_cosine(displacement: Vector2<f32>, to_screen: Vector2<f32>) -> f32 {
    let (a, b) = (displacement.norm(), to_screen.norm());
    if a < 1e-6 || b < 1e-6 {
        return 1.0;
    }
    (displacement.dot(&to_screen) / (a * b)).clamp(0.0, 1.0)
}

/// Motion detector with the cross-frame memory it needs: the previous depth
/// frame and the last position of the target.
#[derive(Clone, Debug, Default)]
pub struct MotionTracker {
    detector: MotionDetector,
    previous: Option<DepthFrame>,
    last_position: Option<Point2<f32>>,
}

impl MotionTracker {
    pub fn new(params: MotionDetectorParams) -> Self {
        Self {
            detector: MotionDetector::new(params),
            previous: None,
            last_position: None,
        }
    }

    pub fn params(&self) -> &MotionDetectorParams {
        self.detector.params()
    }

    pub fn set_depth_change_threshold(&mut self, mm: f32) {
        self.detector.params_mut().depth_change_threshold_mm = mm;
    }

    pub fn set_min_motion_area(&mut self, px: usize) {
        self.detector.params_mut().min_area = px;
    }

    pub fn set_approach_confidence_threshold(&mut self, score: f32) {
        self.detector.params_mut().approach_confidence_threshold = score;
    }

    pub fn last_position(&self) -> Option<Point2<f32>> {
        self.last_position
    }

    pub fn has_history(&self) -> bool {
        self.previous.is_some()
    }

    /// Forget the previous frame and position.
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_position = None;
    }

    /// Feed the next depth frame. Returns the best candidate if it clears the
    /// approach confidence threshold. The first frame only primes the history.
    pub fn update(
        &mut self,
        depth: &DepthFrameView<'_>,
        scaler: &CoordinateScaler,
        screen: Option<&ScreenPolygon>,
    ) -> Option<DetectionCandidate> {
        let best = self.previous.as_ref().and_then(|prev| {
            let ctx = MotionContext {
                scaler,
                screen,
                previous: self.last_position,
            };
            self.detector.detect(depth, &prev.view(), &ctx).into_iter().next()
        });
        self.previous = Some(depth.to_owned_frame());
        self.last_position = best.map(|c| c.position);

        let threshold = self.detector.params().approach_confidence_threshold;
        match best {
            Some(c) if c.confidence >= threshold => Some(c),
            Some(c) => {
                debug!("best motion candidate below approach threshold ({:.2} < {threshold:.2})", c.confidence);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use screenhit_depth::FrameSize;

    const BACK: u16 = 2500;

    fn pair(block: (usize, usize, usize, usize), delta: i32) -> (DepthFrame, DepthFrame) {
        let prev = DepthFrame::filled(200, 200, BACK);
        let mut curr = prev.clone();
        let (x0, y0, x1, y1) = block;
        curr.fill_rect(x0, y0, x1, y1, (BACK as i32 + delta) as u16);
        (curr, prev)
    }

    fn identity_scaler() -> CoordinateScaler {
        let mut s = CoordinateScaler::new();
        s.observe(FrameSize::new(200, 200), FrameSize::new(200, 200));
        s
    }

    #[test]
    fn approaching_block_with_known_direction() {
        let (curr, prev) = pair((80, 80, 120, 120), -80);
        let scaler = identity_scaler();
        // centroid (120, 99.5): straight to the right of the block centre
        let screen = ScreenPolygon::from_corners((50, 50), (190, 149));
        let pos = Point2::new(99.5f32, 99.5);
        let step = Vector2::new(0.9f32, 0.19f32.sqrt()) * 10.0;
        let ctx = MotionContext {
            scaler: &scaler,
            screen: Some(&screen),
            previous: Some(pos - step),
        };

        let found = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx);
        assert_eq!(found.len(), 1);
        let c = found[0];
        assert_relative_eq!(c.position.x, 99.5, epsilon = 1e-3);
        assert_relative_eq!(c.position.y, 99.5, epsilon = 1e-3);
        assert_relative_eq!(c.depth_delta_mm.unwrap(), -80.0);
        assert_relative_eq!(c.confidence, 0.4 * 0.9, epsilon = 1e-4);
    }

    #[test]
    fn outside_screen_halves_confidence() {
        let (curr, prev) = pair((80, 80, 120, 120), -80);
        let scaler = identity_scaler();
        let screen = ScreenPolygon::from_corners((150, 150), (199, 199));
        let ctx = MotionContext {
            scaler: &scaler,
            screen: Some(&screen),
            previous: None,
        };
        let c = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx)[0];
        assert_relative_eq!(c.confidence, 0.4 * 0.5, epsilon = 1e-5);
    }

    #[test]
    fn receding_and_static_regions_are_ignored() {
        let (curr, prev) = pair((80, 80, 120, 120), 150);
        let scaler = identity_scaler();
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        assert!(MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx).is_empty());
        assert!(MotionDetector::default().detect(&prev.view(), &prev.view(), &ctx).is_empty());
    }

    #[test]
    fn area_band_filters_specks_and_sweeps() {
        let scaler = identity_scaler();
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        let det = MotionDetector::default();

        let (curr, prev) = pair((10, 10, 16, 16), -100); // 36px
        assert!(det.detect(&curr.view(), &prev.view(), &ctx).is_empty());

        let (curr, prev) = pair((0, 0, 200, 120), -100); // 24000px
        assert!(det.detect(&curr.view(), &prev.view(), &ctx).is_empty());
    }

    #[test]
    fn sentinel_pixels_never_count_as_motion() {
        let mut prev = DepthFrame::filled(100, 100, BACK);
        prev.fill_rect(20, 20, 60, 60, 0);
        let curr = DepthFrame::filled(100, 100, 1000);
        let mask = MotionDetector::default().motion_mask(&curr.view(), &prev.view());
        assert!(!mask.get(40, 40));
        assert!(mask.get(80, 80));
    }

    #[test]
    fn saturated_pixels_never_count_as_motion() {
        // saturated -> valid would otherwise read as a 64 m approach
        let mut prev = DepthFrame::filled(100, 100, BACK);
        prev.fill_rect(20, 20, 60, 60, u16::MAX);
        let mut curr = DepthFrame::filled(100, 100, 1000);
        curr.fill_rect(70, 70, 90, 90, u16::MAX);
        let mask = MotionDetector::default().motion_mask(&curr.view(), &prev.view());
        assert!(!mask.get(40, 40));
        assert!(!mask.get(80, 80));
        assert!(mask.get(10, 10));

        let scaler = identity_scaler();
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        let found = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx);
        assert!(found.iter().all(|c| c.depth_delta_mm.is_some_and(|d| d > -2000.0)));
    }

    #[test]
    fn inconsistent_region_is_rejected() {
        let (mut curr, prev) = pair((80, 80, 120, 120), -100);
        // half the block jumps far closer than the other
        curr.fill_rect(80, 80, 120, 100, 1900);
        let scaler = identity_scaler();
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        let found = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx);
        assert!(found.is_empty(), "{found:?}");
    }

    #[test]
    fn ranking_prefers_confidence_then_area() {
        let prev = DepthFrame::filled(200, 200, BACK);
        let mut curr = prev.clone();
        curr.fill_rect(10, 10, 30, 30, BACK - 100); // weaker approach
        curr.fill_rect(100, 100, 120, 120, BACK - 300); // full credit, 400px
        curr.fill_rect(140, 140, 170, 170, BACK - 300); // full credit, 900px
        let scaler = identity_scaler();
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        let found = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx);
        assert_eq!(found.len(), 3);
        assert!(found[0].area > found[1].area);
        assert_relative_eq!(found[0].confidence, 1.0);
        assert_relative_eq!(found[2].confidence, 0.5);
    }

    #[test]
    fn centroids_are_reported_in_color_coordinates() {
        let (curr, prev) = pair((80, 80, 120, 120), -120);
        let mut scaler = CoordinateScaler::new();
        scaler.observe(FrameSize::new(400, 400), FrameSize::new(200, 200));
        let ctx = MotionContext { scaler: &scaler, screen: None, previous: None };
        let c = MotionDetector::default().detect(&curr.view(), &prev.view(), &ctx)[0];
        assert_relative_eq!(c.position.x, 199.0, epsilon = 1e-3);
    }

    #[test]
    fn tracker_primes_then_detects_and_resets() {
        let scaler = identity_scaler();
        let still = DepthFrame::filled(200, 200, BACK);
        let mut near = still.clone();
        near.fill_rect(80, 80, 120, 120, BACK - 250);

        let mut tracker = MotionTracker::default();
        assert!(tracker.update(&still.view(), &scaler, None).is_none());
        assert!(tracker.has_history());
        let c = tracker.update(&near.view(), &scaler, None).unwrap();
        assert_relative_eq!(c.confidence, 1.0);
        assert_eq!(tracker.last_position(), Some(c.position));

        tracker.reset();
        assert!(!tracker.has_history());
        assert!(tracker.last_position().is_none());
        // a stale frame cannot produce a phantom delta after reset
        assert!(tracker.update(&near.view(), &scaler, None).is_none());
    }

    #[test]
    fn weak_candidates_stay_below_approach_threshold() {
        let scaler = identity_scaler();
        let still = DepthFrame::filled(200, 200, BACK);
        let mut near = still.clone();
        near.fill_rect(80, 80, 120, 120, BACK - 60);

        let mut tracker = MotionTracker::default();
        tracker.update(&still.view(), &scaler, None);
        assert!(tracker.update(&near.view(), &scaler, None).is_none());
        assert!(tracker.last_position().is_some());

        tracker.set_approach_confidence_threshold(0.2);
        tracker.update(&still.view(), &scaler, None);
        assert!(tracker.update(&near.view(), &scaler, None).is_some());
    }
}
