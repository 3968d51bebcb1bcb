//! Frame acquisition seam and the per-tick driver.

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;

use screenhit_core::{ColorFrame, DepthFrame};

use crate::calibration::ScreenCalibration;
use crate::selector::{FrameReport, TrackerSelector};

/// Anything that can hand out aligned color and depth frames, e.g. an RGB-D
/// camera driver or a recorded session.
///
/// Each call waits at most `timeout` and returns `None` if no frame arrived.
pub trait FrameSource {
    fn color_frame(&mut self, timeout: Duration) -> Option<ColorFrame>;
    fn depth_frame(&mut self, timeout: Duration) -> Option<DepthFrame>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    ColorUnavailable,
    DepthUnavailable,
}

/// Result of one [`run_tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// A frame was missing; the tick produced no decision.
    Skipped(SkipReason),
    Evaluated(FrameReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            TickOutcome::Evaluated(r) => Some(r),
            TickOutcome::Skipped(_) => None,
        }
    }
}

/// Acquire one frame pair and evaluate it. A missing frame skips the tick
/// without touching tracker state.
pub fn run_tick<S: FrameSource + ?Sized>(
    source: &mut S,
    selector: &mut TrackerSelector,
    calibration: Option<&ScreenCalibration>,
    timeout: Duration,
) -> TickOutcome {
    let Some(color) = source.color_frame(timeout) else {
        debug!("no color frame within {timeout:?}");
        return TickOutcome::Skipped(SkipReason::ColorUnavailable);
    };
    let Some(depth) = source.depth_frame(timeout) else {
        debug!("no depth frame within {timeout:?}");
        return TickOutcome::Skipped(SkipReason::DepthUnavailable);
    };
    TickOutcome::Evaluated(selector.evaluate_frame(&color.view(), &depth.view(), calibration))
}

/// Plays back pre-recorded frames. `None` entries simulate acquisition
/// timeouts.
#[derive(Clone, Debug, Default)]
pub struct ReplaySource {
    color: VecDeque<Option<ColorFrame>>,
    depth: VecDeque<Option<DepthFrame>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, color: Option<ColorFrame>, depth: Option<DepthFrame>) {
        self.color.push_back(color);
        self.depth.push_back(depth);
    }

    pub fn with_frame(mut self, color: ColorFrame, depth: DepthFrame) -> Self {
        self.push(Some(color), Some(depth));
        self
    }

    pub fn remaining(&self) -> usize {
        self.color.len().max(self.depth.len())
    }
}

impl FrameSource for ReplaySource {
    fn color_frame(&mut self, _timeout: Duration) -> Option<ColorFrame> {
        self.color.pop_front().flatten()
    }

    fn depth_frame(&mut self, _timeout: Duration) -> Option<DepthFrame> {
        self.depth.pop_front().flatten()
    }
}
