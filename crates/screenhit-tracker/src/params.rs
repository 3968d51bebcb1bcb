use std::time::Duration;

use serde::{Deserialize, Serialize};

use screenhit_depth::DepthProbeParams;

use crate::color::ColorDetectorParams;
use crate::hit::HitParams;
use crate::motion::MotionDetectorParams;
use crate::selector::TrackerMode;

/// Everything needed to build a [`crate::TrackerSelector`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerParams {
    pub mode: TrackerMode,
    pub color: ColorDetectorParams,
    pub motion: MotionDetectorParams,
    pub hit: HitParams,
    pub depth: DepthProbeParams,
    /// Bounded wait for each frame acquisition. Much shorter waits starve the
    /// device queue.
    pub acquisition_timeout_ms: u64,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            mode: TrackerMode::default(),
            color: ColorDetectorParams::default(),
            motion: MotionDetectorParams::default(),
            hit: HitParams::default(),
            depth: DepthProbeParams::default(),
            acquisition_timeout_ms: 100,
        }
    }
}

impl TrackerParams {
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }
}
