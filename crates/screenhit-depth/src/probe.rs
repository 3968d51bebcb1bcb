//! Stateful depth measurement in color-frame coordinates.
//!
//! [`DepthProbe`] glues the scaler, the sampler and the confidence estimator
//! together and keeps the only cross-frame memory of the depth stage: the last
//! valid reading, used as an explicitly flagged fallback, and cumulative
//! counters.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use screenhit_core::DepthFrameView;

use crate::confidence::{ConfidenceEstimator, ConfidenceParams};
use crate::sampler::{DepthSampler, DepthSamplerParams};
use crate::scaler::{CoordinateScaler, FrameSize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Configuration for [`DepthProbe`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthProbeParams {
    pub sampler: DepthSamplerParams,
    pub confidence: ConfidenceParams,
    /// Expected distance to the screen, used for confidence and as the
    /// initial fallback value.
    pub reference_depth_m: f32,
}

impl Default for DepthProbeParams {
    fn default() -> Self {
        Self {
            sampler: DepthSamplerParams::default(),
            confidence: ConfidenceParams::default(),
            reference_depth_m: 2.0,
        }
    }
}

/// A depth value together with where it came from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DepthMeasurement {
    /// Read from the current frame.
    Measured(f32),
    /// The current frame gave nothing usable; this is the last valid reading.
    Fallback(f32),
}

impl DepthMeasurement {
    /// The value, regardless of provenance.
    pub fn value(&self) -> f32 {
        match *self {
            DepthMeasurement::Measured(d) | DepthMeasurement::Fallback(d) => d,
        }
    }

    /// The value only if it was measured in the current frame.
    pub fn measured(&self) -> Option<f32> {
        match *self {
            DepthMeasurement::Measured(d) => Some(d),
            DepthMeasurement::Fallback(_) => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, DepthMeasurement::Fallback(_))
    }
}

/// How [`DepthProbe::measure_region`] aggregates its samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStat {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

/// Axis-aligned color-frame rectangle, `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl PixelRect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Square of half-size `r` around `(cx, cy)`.
    pub fn around(cx: i32, cy: i32, r: i32) -> Self {
        Self::new(cx - r, cy - r, cx + r, cy + r)
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

/// Cumulative measurement counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeStatistics {
    pub total_measurements: u64,
    pub cache_hits: u64,
    pub last_valid_depth_m: f32,
}

impl ProbeStatistics {
    /// Fraction of measurements answered from the fallback cache.
    pub fn hit_rate(&self) -> f32 {
        if self.total_measurements == 0 {
            0.0
        } else {
            self.cache_hits as f32 / self.total_measurements as f32
        }
    }
}

/// Depth measurement front-end working in color-frame coordinates.
#[derive(Clone, Debug)]
pub struct DepthProbe {
    scaler: CoordinateScaler,
    sampler: DepthSampler,
    confidence: ConfidenceEstimator,
    reference_depth_m: f32,
    stats: ProbeStatistics,
}

impl Default for DepthProbe {
    fn default() -> Self {
        Self::new(DepthProbeParams::default())
    }
}

impl DepthProbe {
    pub fn new(params: DepthProbeParams) -> Self {
        Self {
            scaler: CoordinateScaler::new(),
            sampler: DepthSampler::new(params.sampler),
            confidence: ConfidenceEstimator::new(params.confidence),
            reference_depth_m: params.reference_depth_m,
            stats: ProbeStatistics {
                last_valid_depth_m: params.reference_depth_m,
                ..ProbeStatistics::default()
            },
        }
    }

    pub fn scaler(&self) -> &CoordinateScaler {
        &self.scaler
    }

    pub fn sampler(&self) -> &DepthSampler {
        &self.sampler
    }

    pub fn reference_depth_m(&self) -> f32 {
        self.reference_depth_m
    }

    /// Replace the reference depth, e.g. after loading a screen calibration.
    pub fn set_reference_depth(&mut self, depth_m: f32) {
        if depth_m.is_finite() && depth_m > 0.0 {
            self.reference_depth_m = depth_m;
        } else {
            warn!("ignoring non-positive reference depth {depth_m}");
        }
    }

    /// Record the sizes of the current frame pair.
    pub fn observe(&mut self, color: FrameSize, depth: &DepthFrameView<'_>) {
        let (w, h) = depth.dimensions();
        self.scaler.observe(color, FrameSize::new(w, h));
    }

    /// Depth at color pixel `(x, y)` of a `color`-sized frame.
    ///
    /// Falls back to the last valid reading when the coordinate maps outside
    /// the depth frame or the sample is INVALID; the result says which.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, depth)))]
    pub fn measure(
        &mut self,
        color: FrameSize,
        x: f32,
        y: f32,
        depth: &DepthFrameView<'_>,
    ) -> DepthMeasurement {
        self.stats.total_measurements += 1;
        self.observe(color, depth);

        let Some((dx, dy)) = self.scaler.to_depth_coords(x, y) else {
            debug!("color ({x:.1}, {y:.1}) outside {}x{} frame", color.width, color.height);
            return self.fallback();
        };

        match self.sampler.sample(depth, dx as i64, dy as i64).depth_m() {
            Some(d) => {
                self.stats.last_valid_depth_m = d;
                DepthMeasurement::Measured(d)
            }
            None => {
                debug!("no valid depth at color ({x:.1}, {y:.1}) -> depth ({dx}, {dy})");
                self.fallback()
            }
        }
    }

    fn fallback(&mut self) -> DepthMeasurement {
        self.stats.cache_hits += 1;
        DepthMeasurement::Fallback(self.stats.last_valid_depth_m)
    }

    /// Aggregate depth over a color-frame rectangle from at most a 5x5 grid
    /// of measured samples. Fallback values are not included.
    pub fn measure_region(
        &mut self,
        color: FrameSize,
        rect: PixelRect,
        stat: RegionStat,
        depth: &DepthFrameView<'_>,
    ) -> Option<f32> {
        if rect.is_empty() || rect.x0 < 0 || rect.y0 < 0 {
            warn!("invalid depth region {rect:?}");
            return None;
        }
        let step_x = ((rect.x1 - rect.x0) / 5).max(1) as usize;
        let step_y = ((rect.y1 - rect.y0) / 5).max(1) as usize;

        let mut values = Vec::with_capacity(25);
        for y in (rect.y0..rect.y1).step_by(step_y) {
            for x in (rect.x0..rect.x1).step_by(step_x) {
                if let Some(d) = self.measure(color, x as f32, y as f32, depth).measured() {
                    values.push(d);
                }
            }
        }
        if values.is_empty() {
            debug!("no valid depth inside {rect:?}");
            return None;
        }

        let result = match stat {
            RegionStat::Mean => values.iter().sum::<f32>() / values.len() as f32,
            RegionStat::Median => {
                values.sort_by(f32::total_cmp);
                values[values.len() / 2]
            }
            RegionStat::Min => values.iter().copied().fold(f32::INFINITY, f32::min),
            RegionStat::Max => values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        };
        debug!("region {rect:?}: {result:.3}m from {} samples ({stat:?})", values.len());
        Some(result)
    }

    /// Confidence in `[0, 1]` of the reading at color pixel `(x, y)`,
    /// scored against the reference depth.
    pub fn confidence(&mut self, color: FrameSize, x: f32, y: f32, depth: &DepthFrameView<'_>) -> f32 {
        self.observe(color, depth);
        let Some((dx, dy)) = self.scaler.to_depth_coords(x, y) else {
            return 0.0;
        };
        self.confidence
            .confidence(&self.sampler, depth, dx as i64, dy as i64, self.reference_depth_m)
    }

    pub fn statistics(&self) -> ProbeStatistics {
        self.stats
    }

    /// Zero the counters. The last valid reading is kept.
    pub fn reset_statistics(&mut self) {
        self.stats = ProbeStatistics {
            last_valid_depth_m: self.stats.last_valid_depth_m,
            ..ProbeStatistics::default()
        };
    }
}
