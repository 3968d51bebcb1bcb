//! Mode-switchable front door of the tracker.
//!
//! [`TrackerSelector`] owns both detectors, the depth probe and the hit
//! evaluator and runs them in the order the current [`TrackerMode`] asks for.
//! Callers see the same `check_target_hit` contract in every mode.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use screenhit_core::{ColorFrameView, DepthFrameView};
use screenhit_depth::{DepthMeasurement, DepthProbe, DepthProbeParams, FrameSize, ProbeStatistics};

use crate::calibration::ScreenCalibration;
use crate::candidate::{DetectionCandidate, DetectorKind};
use crate::color::{ColorDetector, HsvRange};
use crate::hit::{HitDecision, HitEvaluator, HitEvent, HitInput, HitState};
use crate::io::TrackerConfig;
use crate::motion::MotionTracker;
use crate::params::TrackerParams;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Which detector(s) run each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMode {
    Color,
    #[default]
    Motion,
    /// Both detectors, arbitrated by confidence.
    Hybrid,
}

impl TrackerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerMode::Color => "color",
            TrackerMode::Motion => "motion",
            TrackerMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for TrackerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown tracker mode {0:?} (expected color, motion or hybrid)")]
pub struct ParseModeError(String);

impl FromStr for TrackerMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "color" => Ok(TrackerMode::Color),
            "motion" => Ok(TrackerMode::Motion),
            "hybrid" => Ok(TrackerMode::Hybrid),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}

/// Pick between the two detectors' results. Motion wins ties.
pub fn arbitrate(
    color: Option<DetectionCandidate>,
    motion: Option<DetectionCandidate>,
) -> Option<DetectionCandidate> {
    match (color, motion) {
        (Some(c), Some(m)) => Some(if m.confidence >= c.confidence { m } else { c }),
        (c, m) => m.or(c),
    }
}

/// Read-only counters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackerStatistics {
    pub mode: TrackerMode,
    pub frames: u64,
    pub color_hits: u64,
    pub motion_hits: u64,
    /// Frames in hybrid mode where the chosen detector differed from the
    /// previous choice.
    pub hybrid_switches: u64,
    pub depth: ProbeStatistics,
}

/// Everything decided about one frame, for overlays and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub mode: TrackerMode,
    pub color: Option<DetectionCandidate>,
    pub motion: Option<DetectionCandidate>,
    pub chosen: Option<DetectionCandidate>,
    pub depth: Option<DepthMeasurement>,
    pub depth_confidence: Option<f32>,
    pub decision: HitDecision,
}

impl FrameReport {
    pub fn hit(&self) -> Option<HitEvent> {
        self.decision.event()
    }
}

#[derive(Clone, Debug)]
pub struct TrackerSelector {
    mode: TrackerMode,
    color: ColorDetector,
    motion: MotionTracker,
    probe: DepthProbe,
    evaluator: HitEvaluator,
    depth_params: DepthProbeParams,
    acquisition_timeout_ms: u64,
    frames: u64,
    color_hits: u64,
    motion_hits: u64,
    hybrid_switches: u64,
    last_choice: Option<DetectorKind>,
    /// Detector behind the most recent hit.
    hit_source: Option<DetectorKind>,
    calibration_warned: bool,
}

impl Default for TrackerSelector {
    fn default() -> Self {
        Self::new(TrackerParams::default())
    }
}

impl TrackerSelector {
    pub fn new(params: TrackerParams) -> Self {
        info!("tracker ready (mode {})", params.mode);
        Self {
            mode: params.mode,
            color: ColorDetector::new(params.color),
            motion: MotionTracker::new(params.motion),
            probe: DepthProbe::new(params.depth),
            evaluator: HitEvaluator::new(params.hit),
            depth_params: params.depth,
            acquisition_timeout_ms: params.acquisition_timeout_ms,
            frames: 0,
            color_hits: 0,
            motion_hits: 0,
            hybrid_switches: 0,
            last_choice: None,
            hit_source: None,
            calibration_warned: false,
        }
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    /// Switch modes between ticks. Motion history is dropped so a frame from
    /// before the switch cannot produce a delta.
    pub fn set_mode(&mut self, mode: TrackerMode) {
        if mode != self.mode {
            info!("tracker mode {} -> {}", self.mode, mode);
            self.motion.reset();
            self.last_choice = None;
        }
        self.mode = mode;
    }

    pub fn set_target_color_range(&mut self, range: HsvRange) {
        info!("target color range {:?}..{:?}", range.lower, range.upper);
        self.color.set_range(range);
    }

    pub fn target_color_range(&self) -> HsvRange {
        self.color.range()
    }

    pub fn set_depth_change_threshold(&mut self, mm: f32) {
        self.motion.set_depth_change_threshold(mm);
    }

    pub fn set_min_motion_area(&mut self, px: usize) {
        self.motion.set_min_motion_area(px);
    }

    pub fn set_approach_confidence_threshold(&mut self, score: f32) {
        self.motion.set_approach_confidence_threshold(score);
    }

    /// Current parameters, including runtime changes.
    pub fn params(&self) -> TrackerParams {
        TrackerParams {
            mode: self.mode,
            color: *self.color.params(),
            motion: *self.motion.params(),
            hit: *self.evaluator.params(),
            depth: self.depth_params,
            acquisition_timeout_ms: self.acquisition_timeout_ms,
        }
    }

    /// Current parameters as a config file, to persist the last-used mode and range.
    pub fn config(&self) -> TrackerConfig {
        TrackerConfig::from_params(&self.params())
    }

    pub fn statistics(&self) -> TrackerStatistics {
        TrackerStatistics {
            mode: self.mode,
            frames: self.frames,
            color_hits: self.color_hits,
            motion_hits: self.motion_hits,
            hybrid_switches: self.hybrid_switches,
            depth: self.probe.statistics(),
        }
    }

    /// The most recent emitted hit.
    pub fn last_reached(&self) -> Option<HitEvent> {
        self.evaluator.last_reached()
    }

    /// Run detection, depth resolution and hit evaluation on one frame pair.
    ///
    /// Never fails: a missing calibration or an unusable depth reading turns
    /// into "no hit this frame".
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all, fields(mode = %self.mode)))]
    pub fn evaluate_frame(
        &mut self,
        color: &ColorFrameView<'_>,
        depth: &DepthFrameView<'_>,
        calibration: Option<&ScreenCalibration>,
    ) -> FrameReport {
        self.frames += 1;
        let color_size = FrameSize::new(color.width, color.height);
        self.probe.observe(color_size, depth);
        if let Some(cal) = calibration {
            if cal.depth_m != self.probe.reference_depth_m() {
                self.probe.set_reference_depth(cal.depth_m);
            }
        }
        let screen = calibration.map(|c| &c.polygon);

        let (color_candidate, motion_candidate) = match self.mode {
            TrackerMode::Color => (self.color.detect(color), None),
            TrackerMode::Motion => (None, self.motion.update(depth, self.probe.scaler(), screen)),
            TrackerMode::Hybrid => (
                self.color.detect(color),
                self.motion.update(depth, self.probe.scaler(), screen),
            ),
        };

        let chosen = match self.mode {
            TrackerMode::Color => color_candidate,
            TrackerMode::Motion => motion_candidate,
            TrackerMode::Hybrid => {
                let chosen = arbitrate(color_candidate, motion_candidate);
                if let Some(c) = chosen {
                    if self.last_choice.is_some_and(|prev| prev != c.source) {
                        self.hybrid_switches += 1;
                        debug!("hybrid switched to {:?}", c.source);
                    }
                    self.last_choice = Some(c.source);
                }
                chosen
            }
        };

        let (measurement, depth_confidence) = match chosen {
            Some(c) => {
                let (x, y) = (c.position.x, c.position.y);
                let m = self.probe.measure(color_size, x, y, depth);
                let conf = self.probe.confidence(color_size, x, y, depth);
                (Some(m), Some(conf))
            }
            None => (None, None),
        };

        let evaluated = match chosen {
            Some(c) => {
                let input = HitInput {
                    position: c.position,
                    depth_m: measurement.and_then(|m| m.measured()),
                    depth_confidence,
                };
                self.evaluator.evaluate(Some(input), calibration)
            }
            None => {
                // a ball resting on the screen stops producing motion; look where it hit
                let contact = match (self.evaluator.state(), self.evaluator.last_reached()) {
                    (HitState::Triggered, Some(last))
                        if self.hit_source == Some(DetectorKind::Motion) =>
                    {
                        self.probe.measure(color_size, last.x, last.y, depth).measured()
                    }
                    _ => None,
                };
                self.evaluator.evaluate_absent(contact, calibration)
            }
        };

        let decision = match evaluated {
            Ok(d) => {
                self.calibration_warned = false;
                d
            }
            Err(e) => {
                if !self.calibration_warned {
                    warn!("{e}: hits are disabled until the screen is calibrated");
                    self.calibration_warned = true;
                }
                HitDecision::Miss
            }
        };

        if let (HitDecision::Hit(_), Some(c)) = (decision, chosen) {
            self.hit_source = Some(c.source);
            match c.source {
                DetectorKind::Color => self.color_hits += 1,
                DetectorKind::Motion => self.motion_hits += 1,
            }
        }

        FrameReport {
            mode: self.mode,
            color: color_candidate,
            motion: motion_candidate,
            chosen,
            depth: measurement,
            depth_confidence,
            decision,
        }
    }

    /// `(x, y, depth_m)` of a new hit in this frame, if any.
    pub fn check_target_hit(
        &mut self,
        color: &ColorFrameView<'_>,
        depth: &DepthFrameView<'_>,
        calibration: Option<&ScreenCalibration>,
    ) -> Option<HitEvent> {
        self.evaluate_frame(color, depth, calibration).hit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use screenhit_core::{ColorFrame, DepthFrame, ScreenPolygon};

    const BACKDROP: [u8; 3] = [40, 120, 40];
    const RED: [u8; 3] = [220, 20, 20];

    fn candidate(source: DetectorKind, confidence: f32) -> DetectionCandidate {
        DetectionCandidate {
            position: Point2::new(10.0, 10.0),
            area: 100,
            confidence,
            depth_delta_mm: None,
            source,
        }
    }

    fn calibration() -> ScreenCalibration {
        let polygon =
            ScreenPolygon::from_pixels(&[(0, 0), (1279, 0), (1279, 799), (0, 799)]).unwrap();
        ScreenCalibration::new(polygon, 1.9, "test", 1.0).unwrap()
    }

    fn backdrop() -> ColorFrame {
        ColorFrame::filled(1280, 800, BACKDROP)
    }

    #[test]
    fn tie_goes_to_motion() {
        let c = candidate(DetectorKind::Color, 0.4);
        let m = candidate(DetectorKind::Motion, 0.4);
        assert_eq!(arbitrate(Some(c), Some(m)).unwrap().source, DetectorKind::Motion);
        let strong = candidate(DetectorKind::Color, 0.7);
        assert_eq!(arbitrate(Some(strong), Some(m)).unwrap().source, DetectorKind::Color);
        assert_eq!(arbitrate(Some(c), None).unwrap().source, DetectorKind::Color);
        assert_eq!(arbitrate(None, Some(m)).unwrap().source, DetectorKind::Motion);
        assert!(arbitrate(None, None).is_none());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("Hybrid".parse::<TrackerMode>(), Ok(TrackerMode::Hybrid));
        assert!("laser".parse::<TrackerMode>().is_err());
        assert_eq!(TrackerMode::default().to_string(), "motion");
    }

    #[test]
    fn color_mode_hit() {
        let cal = calibration();
        let mut frame = backdrop();
        frame.fill_disk(640.0, 400.0, 15.0, RED);
        let depth = DepthFrame::filled(640, 360, 1650);

        let mut sel = TrackerSelector::default();
        sel.set_mode(TrackerMode::Color);
        let hit = sel.check_target_hit(&frame.view(), &depth.view(), Some(&cal)).unwrap();
        assert_relative_eq!(hit.x, 640.0, epsilon = 0.5);
        assert_relative_eq!(hit.y, 400.0, epsilon = 0.5);
        assert_relative_eq!(hit.depth_m, 1.65);

        // same frame again: still on the screen, debounced
        assert!(sel.check_target_hit(&frame.view(), &depth.view(), Some(&cal)).is_none());
        let stats = sel.statistics();
        assert_eq!(stats.color_hits, 1);
        assert_eq!(stats.frames, 2);
        assert_eq!(sel.last_reached(), Some(hit));
    }

    #[test]
    fn motion_mode_hit_then_rearm() {
        let cal = calibration();
        let color = backdrop();
        let still = DepthFrame::filled(640, 360, 2500);
        let mut near = still.clone();
        near.fill_rect(300, 160, 340, 200, 1700);

        let mut sel = TrackerSelector::default();
        assert_eq!(sel.mode(), TrackerMode::Motion);
        assert!(sel.check_target_hit(&color.view(), &still.view(), Some(&cal)).is_none());

        let report = sel.evaluate_frame(&color.view(), &near.view(), Some(&cal));
        let hit = report.hit().expect("approach should hit");
        assert_relative_eq!(hit.x, 639.0, epsilon = 1e-3);
        assert_relative_eq!(hit.depth_m, 1.7);
        assert_eq!(report.depth, Some(DepthMeasurement::Measured(1.7)));
        assert_eq!(sel.statistics().motion_hits, 1);

        // nothing moves any more, but the hit point still reads close
        let report = sel.evaluate_frame(&color.view(), &near.view(), Some(&cal));
        assert!(report.chosen.is_none());
        assert_eq!(report.decision, HitDecision::Holding);

        // gone: the hit point reads background again
        let report = sel.evaluate_frame(&color.view(), &still.view(), Some(&cal));
        assert!(report.chosen.is_none());
        assert_eq!(report.decision, HitDecision::Miss);
        assert!(sel.check_target_hit(&color.view(), &near.view(), Some(&cal)).is_some());
        assert_eq!(sel.statistics().motion_hits, 2);
    }

    #[test]
    fn ball_resting_on_screen_hits_once() {
        let polygon =
            ScreenPolygon::from_pixels(&[(0, 0), (1279, 0), (1279, 799), (0, 799)]).unwrap();
        let cal = ScreenCalibration::new(polygon, 1.9, "test", 1.0).unwrap();
        let mut params = TrackerParams::default();
        params.hit.collision_depth_threshold_m = 1.75;

        let color = backdrop();
        let still = DepthFrame::filled(640, 360, 2500);
        let mut near = still.clone();
        near.fill_rect(300, 160, 340, 200, 1700);
        let mut nearer = still.clone();
        nearer.fill_rect(300, 160, 340, 200, 1600);

        let mut sel = TrackerSelector::new(params);
        let hits = [&still, &near, &near, &nearer]
            .into_iter()
            .filter_map(|depth| sel.check_target_hit(&color.view(), &depth.view(), Some(&cal)))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(sel.statistics().motion_hits, 1);
    }

    #[test]
    fn lost_color_target_rearms() {
        let cal = calibration();
        let mut ball = backdrop();
        ball.fill_disk(640.0, 400.0, 15.0, RED);
        let empty = backdrop();
        // the screen itself reads within the collision threshold
        let depth = DepthFrame::filled(640, 360, 1650);

        let mut sel = TrackerSelector::default();
        sel.set_mode(TrackerMode::Color);
        assert!(sel.check_target_hit(&ball.view(), &depth.view(), Some(&cal)).is_some());
        assert!(sel.check_target_hit(&empty.view(), &depth.view(), Some(&cal)).is_none());
        assert!(sel.check_target_hit(&ball.view(), &depth.view(), Some(&cal)).is_some());
        assert_eq!(sel.statistics().color_hits, 2);
    }

    #[test]
    fn hybrid_counts_switches() {
        let cal = calibration();
        let mut color = backdrop();
        color.fill_disk(640.0, 400.0, 15.0, RED);
        let still = DepthFrame::filled(640, 360, 2500);
        let mut near = still.clone();
        near.fill_rect(300, 160, 340, 200, 1700);

        let mut sel = TrackerSelector::default();
        sel.set_mode(TrackerMode::Hybrid);

        // first frame primes motion history, so only color answers
        let first = sel.evaluate_frame(&color.view(), &still.view(), Some(&cal));
        assert_eq!(first.chosen.unwrap().source, DetectorKind::Color);

        let second = sel.evaluate_frame(&color.view(), &near.view(), Some(&cal));
        assert_eq!(second.chosen.unwrap().source, DetectorKind::Motion);
        assert_eq!(sel.statistics().hybrid_switches, 1);
    }

    #[test]
    fn mode_change_clears_motion_history() {
        let cal = calibration();
        let color = backdrop();
        let still = DepthFrame::filled(640, 360, 2500);
        let mut near = still.clone();
        near.fill_rect(300, 160, 340, 200, 1700);

        let mut sel = TrackerSelector::default();
        sel.evaluate_frame(&color.view(), &still.view(), Some(&cal));
        sel.set_mode(TrackerMode::Hybrid);
        let report = sel.evaluate_frame(&color.view(), &near.view(), Some(&cal));
        assert!(report.motion.is_none());
    }

    #[test]
    fn missing_calibration_is_a_quiet_miss() {
        let mut frame = backdrop();
        frame.fill_disk(640.0, 400.0, 15.0, RED);
        let depth = DepthFrame::filled(640, 360, 1650);
        let mut sel = TrackerSelector::default();
        sel.set_mode(TrackerMode::Color);
        let report = sel.evaluate_frame(&frame.view(), &depth.view(), None);
        assert!(report.chosen.is_some());
        assert_eq!(report.decision, HitDecision::Miss);
        assert_eq!(sel.statistics().color_hits, 0);
    }

    #[test]
    fn runtime_setters_show_up_in_config() {
        let mut sel = TrackerSelector::default();
        sel.set_target_color_range(HsvRange::PINK);
        sel.set_depth_change_threshold(-30.0);
        sel.set_min_motion_area(75);
        sel.set_approach_confidence_threshold(0.3);
        sel.set_mode(TrackerMode::Hybrid);

        let params = sel.config().build_params();
        assert_eq!(params.mode, TrackerMode::Hybrid);
        assert_eq!(params.color.range, HsvRange::PINK);
        assert_eq!(params.motion.depth_change_threshold_mm, -30.0);
        assert_eq!(params.motion.min_area, 75);
        assert_eq!(params.motion.approach_confidence_threshold, 0.3);
    }
}
