//! Debounced screen hit evaluation.
//!
//! [`HitEvaluator`] is a two-state machine. While `Armed`, the first frame in
//! which the target is on the screen (inside the polygon, or caught by the
//! optional trajectory heuristic) at a depth within the collision threshold
//! emits one [`HitEvent`] and moves to `Triggered`. It re-arms only after a
//! frame where that condition no longer holds, so one physical approach
//! produces one event.
//!
//! A depth that is missing, zero or negative is a failed measurement: it never
//! counts as a hit and leaves the state untouched.

use log::{debug, info};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use screenhit_core::ScreenPolygon;

use crate::calibration::ScreenCalibration;
use crate::error::HitError;

/// Angle-change heuristic for balls that graze the screen edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryParams {
    pub enabled: bool,
    /// Minimum direction change between the last two steps, in degrees.
    pub angle_threshold_deg: f32,
    /// Maximum distance from the polygon boundary, in color pixels.
    pub edge_tolerance_px: f32,
}

impl Default for TrajectoryParams {
    fn default() -> Self {
        Self {
            enabled: false,
            angle_threshold_deg: 45.0,
            edge_tolerance_px: 5.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitParams {
    /// Maximum depth (m) at which the target counts as having reached the screen.
    pub collision_depth_threshold_m: f32,
    pub trajectory: TrajectoryParams,
    /// Depth readings scored below this are treated as failed measurements.
    pub min_depth_confidence: f32,
}

impl Default for HitParams {
    fn default() -> Self {
        Self {
            collision_depth_threshold_m: 2.0,
            trajectory: TrajectoryParams::default(),
            min_depth_confidence: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitState {
    #[default]
    Armed,
    Triggered,
}

/// Where and how far away the target was when it hit the screen.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    pub x: f32,
    pub y: f32,
    pub depth_m: f32,
}

/// Per-frame input: the chosen candidate position and its depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitInput {
    pub position: Point2<f32>,
    /// `None` when no depth could be measured this frame.
    pub depth_m: Option<f32>,
    pub depth_confidence: Option<f32>,
}

/// Outcome of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitDecision {
    /// A new hit; the evaluator is now `Triggered`.
    Hit(HitEvent),
    /// Still on the screen after an earlier hit; nothing emitted.
    Holding,
    Miss,
}

impl HitDecision {
    pub fn event(&self) -> Option<HitEvent> {
        match *self {
            HitDecision::Hit(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HitEvaluator {
    params: HitParams,
    state: HitState,
    last_reached: Option<HitEvent>,
    last_center: Option<Point2<f32>>,
    prev_center: Option<Point2<f32>>,
}

impl HitEvaluator {
    pub fn new(params: HitParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn params(&self) -> &HitParams {
        &self.params
    }

    pub fn set_params(&mut self, params: HitParams) {
        self.params = params;
    }

    pub fn state(&self) -> HitState {
        self.state
    }

    /// The most recent emitted hit.
    pub fn last_reached(&self) -> Option<HitEvent> {
        self.last_reached
    }

    /// Back to `Armed` with no trajectory history. `last_reached` is kept.
    pub fn reset(&mut self) {
        self.state = HitState::Armed;
        self.last_center = None;
        self.prev_center = None;
    }

    /// Evaluate one frame.
    ///
    /// `input` is `None` when no candidate was detected; that re-arms the
    /// evaluator. Without a calibration nothing can trigger and
    /// [`HitError::CalibrationMissing`] is returned with the state untouched.
    pub fn evaluate(
        &mut self,
        input: Option<HitInput>,
        calibration: Option<&ScreenCalibration>,
    ) -> Result<HitDecision, HitError> {
        let calibration = calibration.ok_or(HitError::CalibrationMissing)?;

        let Some(input) = input else {
            return Ok(self.absent(None, calibration));
        };

        let depth_m = match input.depth_m {
            Some(d) if d.is_finite() && d > 0.0 => d,
            other => {
                debug!("failed depth measurement {other:?}, no hit");
                return Ok(HitDecision::Miss);
            }
        };
        if let Some(conf) = input.depth_confidence {
            if conf < self.params.min_depth_confidence {
                debug!("depth confidence {conf:.2} below minimum, no hit");
                return Ok(HitDecision::Miss);
            }
        }

        let polygon = &calibration.polygon;
        let on_screen = polygon.contains(input.position) || self.trajectory_hit(input.position, polygon);
        self.push_center(Some(input.position));

        let close_enough = depth_m <= self.params.collision_depth_threshold_m;
        if !(on_screen && close_enough) {
            debug!(
                "no hit at ({:.1}, {:.1}) depth {depth_m:.3}m (on screen: {on_screen})",
                input.position.x, input.position.y
            );
            self.rearm();
            return Ok(HitDecision::Miss);
        }

        match self.state {
            HitState::Armed => {
                let event = HitEvent {
                    x: input.position.x,
                    y: input.position.y,
                    depth_m,
                };
                self.state = HitState::Triggered;
                self.last_reached = Some(event);
                info!("hit at ({:.1}, {:.1}) depth {:.3}m", event.x, event.y, event.depth_m);
                Ok(HitDecision::Hit(event))
            }
            HitState::Triggered => Ok(HitDecision::Holding),
        }
    }

    /// Evaluate a frame with no candidate.
    ///
    /// A target resting against the screen stops producing motion, so while
    /// `Triggered` the caller passes `contact_depth_m`, the depth read this
    /// frame at [`last_reached`](Self::last_reached). The evaluator stays
    /// triggered while that reading is within the collision threshold and
    /// re-arms when it is missing or farther.
    pub fn evaluate_absent(
        &mut self,
        contact_depth_m: Option<f32>,
        calibration: Option<&ScreenCalibration>,
    ) -> Result<HitDecision, HitError> {
        let calibration = calibration.ok_or(HitError::CalibrationMissing)?;
        Ok(self.absent(contact_depth_m, calibration))
    }

    fn absent(&mut self, contact_depth_m: Option<f32>, calibration: &ScreenCalibration) -> HitDecision {
        self.push_center(None);
        let resting = self.state == HitState::Triggered
            && match (self.last_reached, contact_depth_m) {
                (Some(last), Some(d)) => {
                    d.is_finite()
                        && d > 0.0
                        && d <= self.params.collision_depth_threshold_m
                        && calibration.polygon.contains(Point2::new(last.x, last.y))
                }
                _ => false,
            };
        if resting {
            debug!("no candidate, contact point still at {contact_depth_m:?}m");
            return HitDecision::Holding;
        }
        self.rearm();
        HitDecision::Miss
    }

    fn rearm(&mut self) {
        if self.state == HitState::Triggered {
            debug!("target left the screen, re-armed");
        }
        self.state = HitState::Armed;
    }

    fn push_center(&mut self, center: Option<Point2<f32>>) {
        self.prev_center = self.last_center;
        self.last_center = center;
    }

    /// Sharp turn close to the polygon edge, judged from the last two steps.
    fn trajectory_hit(&self, p: Point2<f32>, polygon: &ScreenPolygon) -> bool {
        let t = &self.params.trajectory;
        if !t.enabled {
            return false;
        }
        let (Some(last), Some(prev)) = (self.last_center, self.prev_center) else {
            return false;
        };
        let v_prev: Vector2<f32> = last - prev;
        let v_curr: Vector2<f32> = p - last;
        let (a, b) = (v_prev.norm(), v_curr.norm());
        if a <= 0.0 || b <= 0.0 {
            return false;
        }
        let cos = (v_prev.dot(&v_curr) / (a * b)).clamp(-1.0, 1.0);
        let angle = cos.acos().to_degrees();
        angle > t.angle_threshold_deg && polygon.distance_to_boundary(p) <= t.edge_tolerance_px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> ScreenCalibration {
        let polygon =
            ScreenPolygon::from_pixels(&[(0, 0), (1279, 0), (1279, 799), (0, 799)]).unwrap();
        ScreenCalibration::new(polygon, 1.9, "test", 1.0).unwrap()
    }

    fn evaluator() -> HitEvaluator {
        HitEvaluator::new(HitParams {
            collision_depth_threshold_m: 1.75,
            ..HitParams::default()
        })
    }

    fn at(x: f32, y: f32, depth_m: f32) -> Option<HitInput> {
        Some(HitInput {
            position: Point2::new(x, y),
            depth_m: Some(depth_m),
            depth_confidence: None,
        })
    }

    #[test]
    fn inside_and_close_triggers() {
        let cal = calibration();
        let mut ev = evaluator();
        let d = ev.evaluate(at(640.0, 400.0, 1.65), Some(&cal)).unwrap();
        assert_eq!(
            d,
            HitDecision::Hit(HitEvent {
                x: 640.0,
                y: 400.0,
                depth_m: 1.65
            })
        );
        assert_eq!(ev.state(), HitState::Triggered);
        assert_eq!(ev.last_reached(), d.event());
    }

    #[test]
    fn too_far_does_not_trigger() {
        let cal = calibration();
        let mut ev = evaluator();
        assert_eq!(ev.evaluate(at(640.0, 400.0, 2.0), Some(&cal)), Ok(HitDecision::Miss));
        assert_eq!(ev.state(), HitState::Armed);
    }

    #[test]
    fn zero_or_negative_depth_never_triggers() {
        let cal = calibration();
        let mut ev = evaluator();
        for depth in [0.0, -0.5, f32::NAN] {
            assert_eq!(ev.evaluate(at(640.0, 400.0, depth), Some(&cal)), Ok(HitDecision::Miss));
            assert_eq!(ev.state(), HitState::Armed);
        }
        let missing = Some(HitInput {
            position: Point2::new(640.0, 400.0),
            depth_m: None,
            depth_confidence: None,
        });
        assert_eq!(ev.evaluate(missing, Some(&cal)), Ok(HitDecision::Miss));
    }

    #[test]
    fn failed_measurement_does_not_rearm() {
        let cal = calibration();
        let mut ev = evaluator();
        assert!(ev.evaluate(at(640.0, 400.0, 1.6), Some(&cal)).unwrap().event().is_some());
        ev.evaluate(at(640.0, 400.0, 0.0), Some(&cal)).unwrap();
        assert_eq!(ev.state(), HitState::Triggered);
        assert_eq!(ev.evaluate(at(641.0, 400.0, 1.6), Some(&cal)), Ok(HitDecision::Holding));
    }

    #[test]
    fn one_event_per_approach() {
        let cal = calibration();
        let mut ev = evaluator();
        let hits = (0..30)
            .filter_map(|i| {
                ev.evaluate(at(600.0 + i as f32, 400.0, 1.6), Some(&cal))
                    .unwrap()
                    .event()
            })
            .count();
        assert_eq!(hits, 1);

        // leave, come back: a second approach
        ev.evaluate(None, Some(&cal)).unwrap();
        assert_eq!(ev.state(), HitState::Armed);
        assert!(ev.evaluate(at(640.0, 400.0, 1.6), Some(&cal)).unwrap().event().is_some());
    }

    #[test]
    fn resting_contact_keeps_trigger() {
        let cal = calibration();
        let mut ev = evaluator();
        assert!(ev.evaluate(at(640.0, 400.0, 1.7), Some(&cal)).unwrap().event().is_some());

        // no candidate, but the contact point still reads close
        assert_eq!(ev.evaluate_absent(Some(1.7), Some(&cal)), Ok(HitDecision::Holding));
        assert_eq!(ev.state(), HitState::Triggered);
        assert_eq!(ev.evaluate(at(640.0, 400.0, 1.6), Some(&cal)), Ok(HitDecision::Holding));

        // contact point back at background depth
        assert_eq!(ev.evaluate_absent(Some(2.5), Some(&cal)), Ok(HitDecision::Miss));
        assert_eq!(ev.state(), HitState::Armed);
    }

    #[test]
    fn absent_contact_reading_rearms() {
        let cal = calibration();
        let mut ev = evaluator();
        ev.evaluate(at(640.0, 400.0, 1.6), Some(&cal)).unwrap();
        assert_eq!(ev.evaluate_absent(None, Some(&cal)), Ok(HitDecision::Miss));
        assert_eq!(ev.state(), HitState::Armed);

        // armed evaluators never hold, whatever the reading
        assert_eq!(ev.evaluate_absent(Some(1.6), Some(&cal)), Ok(HitDecision::Miss));
        assert_eq!(ev.evaluate_absent(Some(1.6), None), Err(HitError::CalibrationMissing));
    }

    #[test]
    fn moving_away_rearms() {
        let cal = calibration();
        let mut ev = evaluator();
        ev.evaluate(at(640.0, 400.0, 1.6), Some(&cal)).unwrap();
        ev.evaluate(at(640.0, 400.0, 2.4), Some(&cal)).unwrap();
        assert_eq!(ev.state(), HitState::Armed);
    }

    #[test]
    fn outside_polygon_is_a_miss() {
        let cal = calibration();
        let mut ev = evaluator();
        assert_eq!(ev.evaluate(at(1300.0, 400.0, 1.5), Some(&cal)), Ok(HitDecision::Miss));
    }

    #[test]
    fn missing_calibration_refuses_to_trigger() {
        let mut ev = evaluator();
        assert_eq!(ev.evaluate(at(640.0, 400.0, 1.5), None), Err(HitError::CalibrationMissing));
        assert_eq!(ev.state(), HitState::Armed);
    }

    #[test]
    fn low_depth_confidence_is_rejected() {
        let cal = calibration();
        let mut ev = HitEvaluator::new(HitParams {
            min_depth_confidence: 0.6,
            ..HitParams::default()
        });
        let input = Some(HitInput {
            position: Point2::new(640.0, 400.0),
            depth_m: Some(1.5),
            depth_confidence: Some(0.3),
        });
        assert_eq!(ev.evaluate(input, Some(&cal)), Ok(HitDecision::Miss));
    }

    #[test]
    fn sharp_turn_at_the_edge_counts_when_enabled() {
        let polygon = ScreenPolygon::from_corners((100, 100), (500, 400));
        let cal = ScreenCalibration::new(polygon, 1.9, "test", 1.0).unwrap();
        let path = [(80.0, 250.0), (90.0, 250.0), (97.0, 240.0)];

        let mut plain = evaluator();
        let mut heuristic = HitEvaluator::new(HitParams {
            collision_depth_threshold_m: 1.75,
            trajectory: TrajectoryParams {
                enabled: true,
                ..TrajectoryParams::default()
            },
            ..HitParams::default()
        });

        let mut plain_hits = 0;
        let mut heuristic_hits = 0;
        for (x, y) in path {
            plain_hits += plain.evaluate(at(x, y, 1.6), Some(&cal)).unwrap().event().is_some() as u32;
            heuristic_hits += heuristic.evaluate(at(x, y, 1.6), Some(&cal)).unwrap().event().is_some() as u32;
        }
        assert_eq!(plain_hits, 0);
        assert_eq!(heuristic_hits, 1);
    }
}
