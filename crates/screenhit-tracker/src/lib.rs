//! Detection, tracking and hit evaluation.
//!
//! Current focus:
//! - a color blob detector and a depth-motion detector producing
//!   [`DetectionCandidate`]s,
//! - a [`TrackerSelector`] switching between them (or arbitrating both),
//! - a debounced [`HitEvaluator`] that fires once per screen contact,
//! - persisted [`ScreenCalibration`] (polygon + depth) and tracker config.
//!
//! Depth sampling lives in `screenhit-depth`; frames, masks and geometry in
//! `screenhit-core`.

mod calibration;
mod candidate;
mod color;
mod error;
mod hit;
mod io;
mod motion;
mod params;
mod selector;
mod source;

pub use calibration::{CalibrationPaths, CalibrationStore, Readiness, ScreenCalibration};
pub use candidate::{DetectionCandidate, DetectorKind};
pub use color::{ColorDetector, ColorDetectorParams, HsvRange};
pub use error::{CalibrationIoError, HitError};
pub use hit::{
    HitDecision, HitEvaluator, HitEvent, HitInput, HitParams, HitState, TrajectoryParams,
};
pub use io::{DepthCalibrationRecord, ScreenAreaRecord, TrackerConfig};
pub use motion::{MotionContext, MotionDetector, MotionDetectorParams, MotionTracker};
pub use params::TrackerParams;
pub use selector::{
    arbitrate, FrameReport, ParseModeError, TrackerMode, TrackerSelector, TrackerStatistics,
};
pub use source::{run_tick, FrameSource, ReplaySource, SkipReason, TickOutcome};

pub use screenhit_depth::{DepthMeasurement, ProbeStatistics};
