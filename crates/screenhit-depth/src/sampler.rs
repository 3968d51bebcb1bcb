//! Validated depth reads with neighbourhood recovery.
//!
//! A direct reading is returned as-is when it is a real, plausible distance.
//! Sentinel readings and implausible distances are recovered from the
//! surrounding pixels with an inverse-distance weighted mean, after dropping
//! statistical outliers when the neighbourhood straddles a depth step.

use log::debug;
use serde::{Deserialize, Serialize};

use screenhit_core::{is_sentinel, DepthFrameView};

use crate::neighborhood::{collect_neighbors, depth_range, mean_std, weighted_average, Neighbor};

/// Tuning for [`DepthSampler`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthSamplerParams {
    /// Half-size of the square search window, in depth pixels.
    pub interpolation_radius: usize,
    /// Window multiplier applied when the direct reading was a sentinel.
    pub small_object_radius_mul: usize,
    /// Neighbourhood `max - min` above which outlier rejection kicks in (mm).
    pub depth_step_mm: u16,
    /// Readings further than this many standard deviations from the mean are dropped.
    pub outlier_sigma: f32,
    /// Plausible depth range, in meters.
    pub min_valid_depth_m: f32,
    pub max_valid_depth_m: f32,
}

impl Default for DepthSamplerParams {
    fn default() -> Self {
        Self {
            interpolation_radius: 10,
            small_object_radius_mul: 2,
            depth_step_mm: 300,
            outlier_sigma: 1.5,
            min_valid_depth_m: 0.5,
            max_valid_depth_m: 5.0,
        }
    }
}

/// Outcome of one depth read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DepthSample {
    /// The pixel itself held a valid reading.
    Direct { depth_m: f32 },
    /// Recovered from `neighbors` readings inside a window of `radius`.
    Interpolated {
        depth_m: f32,
        neighbors: usize,
        radius: usize,
    },
    Invalid,
}

impl DepthSample {
    pub fn depth_m(&self) -> Option<f32> {
        match *self {
            DepthSample::Direct { depth_m } | DepthSample::Interpolated { depth_m, .. } => {
                Some(depth_m)
            }
            DepthSample::Invalid => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, DepthSample::Invalid)
    }
}

/// Stateless depth reader. Calling [`DepthSampler::sample`] twice on the same
/// frame and pixel always yields the same result.
#[derive(Clone, Debug, Default)]
pub struct DepthSampler {
    params: DepthSamplerParams,
}

impl DepthSampler {
    pub fn new(params: DepthSamplerParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &DepthSamplerParams {
        &self.params
    }

    /// Whether `depth_m` lies in the configured plausible range.
    pub fn is_valid_depth(&self, depth_m: f32) -> bool {
        depth_m.is_finite()
            && depth_m >= self.params.min_valid_depth_m
            && depth_m <= self.params.max_valid_depth_m
    }

    /// Read depth at depth-plane pixel `(x, y)`.
    ///
    /// Pixels outside the frame are `Invalid`. A sentinel reading searches a
    /// window `small_object_radius_mul` times wider than normal, because a
    /// small ball is likely to have an unmeasured center pixel.
    pub fn sample(&self, frame: &DepthFrameView<'_>, x: i64, y: i64) -> DepthSample {
        let Some(raw) = frame.get(x, y) else {
            debug!("depth sample ({x}, {y}) outside {}x{} frame", frame.width, frame.height);
            return DepthSample::Invalid;
        };

        if is_sentinel(raw) {
            let radius = self.params.interpolation_radius * self.params.small_object_radius_mul.max(1);
            debug!("sentinel {raw} at ({x}, {y}), interpolating with radius {radius}");
            return self.interpolate(frame, x, y, radius);
        }

        let depth_m = raw as f32 / 1000.0;
        if self.is_valid_depth(depth_m) {
            return DepthSample::Direct { depth_m };
        }

        debug!("implausible depth {depth_m:.3}m at ({x}, {y}), interpolating");
        self.interpolate(frame, x, y, self.params.interpolation_radius)
    }

    /// Recover depth at `(x, y)` from the plausible readings within `radius`.
    pub fn interpolate(&self, frame: &DepthFrameView<'_>, x: i64, y: i64, radius: usize) -> DepthSample {
        let mut neighbors = collect_neighbors(frame, x, y, radius);
        neighbors.retain(|n| self.is_valid_depth(n.depth_mm as f32 / 1000.0));
        if neighbors.is_empty() {
            debug!("no valid neighbours around ({x}, {y}) within {radius}px");
            return DepthSample::Invalid;
        }

        let kept = self.reject_outliers(neighbors);
        let Some(mm) = weighted_average(&kept) else {
            return DepthSample::Invalid;
        };
        let depth_m = (mm / 1000.0) as f32;
        if !self.is_valid_depth(depth_m) {
            debug!("interpolated depth {depth_m:.3}m at ({x}, {y}) outside valid range");
            return DepthSample::Invalid;
        }

        DepthSample::Interpolated {
            depth_m,
            neighbors: kept.len(),
            radius,
        }
    }

    /// Drop readings beyond `outlier_sigma` standard deviations from the mean,
    /// but only when the window spans a depth step. Never returns an empty set
    /// when given a non-empty one.
    fn reject_outliers(&self, values: Vec<Neighbor>) -> Vec<Neighbor> {
        if values.len() < 3 || depth_range(&values) <= self.params.depth_step_mm {
            return values;
        }
        let Some((mean, std)) = mean_std(&values) else {
            return values;
        };
        let limit = self.params.outlier_sigma as f64 * std;
        let kept: Vec<Neighbor> = values
            .iter()
            .copied()
            .filter(|v| (v.depth_mm as f64 - mean).abs() <= limit)
            .collect();
        if kept.is_empty() {
            return values;
        }
        debug!(
            "depth step detected: kept {}/{} readings (mean {mean:.0}mm, std {std:.0}mm)",
            kept.len(),
            values.len()
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use screenhit_core::DepthFrame;

    fn sampler() -> DepthSampler {
        DepthSampler::new(DepthSamplerParams::default())
    }

    #[test]
    fn direct_reading_fast_path() {
        let frame = DepthFrame::filled(10, 10, 1750);
        let s = sampler().sample(&frame.view(), 4, 4);
        assert_eq!(s, DepthSample::Direct { depth_m: 1.75 });
    }

    #[test]
    fn sentinel_center_with_valid_ring() {
        let mut frame = DepthFrame::filled(640, 360, 0);
        let (cx, cy) = (320usize, 180usize);
        frame.set(cx + 5, cy, 1800);
        frame.set(cx - 5, cy, 1800);
        frame.set(cx, cy + 5, 1820);
        frame.set(cx, cy - 5, 1820);

        let s = sampler().sample(&frame.view(), cx as i64, cy as i64);
        let depth_mm = s.depth_m().expect("interpolated") * 1000.0;
        assert!((1790.0..=1830.0).contains(&depth_mm), "got {depth_mm}");
        assert!(matches!(s, DepthSample::Interpolated { neighbors: 4, radius: 20, .. }));
    }

    #[test]
    fn saturated_center_is_treated_like_zero() {
        let mut frame = DepthFrame::filled(40, 40, 2000);
        frame.set(20, 20, u16::MAX);
        let s = sampler().sample(&frame.view(), 20, 20);
        assert_relative_eq!(s.depth_m().unwrap(), 2.0);
    }

    #[test]
    fn all_sentinel_neighbourhood_is_invalid() {
        let mut frame = DepthFrame::filled(100, 100, 0);
        frame.set(10, 10, u16::MAX);
        assert_eq!(sampler().sample(&frame.view(), 50, 50), DepthSample::Invalid);
        assert_eq!(sampler().sample(&frame.view(), 10, 10), DepthSample::Invalid);
    }

    #[test]
    fn outside_frame_is_invalid() {
        let frame = DepthFrame::filled(10, 10, 1500);
        assert_eq!(sampler().sample(&frame.view(), 10, 0), DepthSample::Invalid);
        assert_eq!(sampler().sample(&frame.view(), -1, 0), DepthSample::Invalid);
    }

    #[test]
    fn small_object_window_reaches_further() {
        let mut frame = DepthFrame::filled(100, 100, 0);
        frame.set(65, 50, 3000); // 15px away: beyond 10, within 20
        let s = sampler().sample(&frame.view(), 50, 50);
        assert_relative_eq!(s.depth_m().unwrap(), 3.0);

        let normal = sampler().interpolate(&frame.view(), 50, 50, 10);
        assert_eq!(normal, DepthSample::Invalid);
    }

    #[test]
    fn implausible_direct_reading_uses_normal_radius() {
        let mut frame = DepthFrame::filled(60, 60, 0);
        frame.set(30, 30, 200); // 0.2m, below the valid range
        frame.set(32, 30, 1500);
        let s = sampler().sample(&frame.view(), 30, 30);
        assert!(matches!(s, DepthSample::Interpolated { radius: 10, .. }));
        assert_relative_eq!(s.depth_m().unwrap(), 1.5);
    }

    #[test]
    fn isolated_background_pixels_are_rejected_across_a_step() {
        let mut frame = DepthFrame::filled(41, 41, 0);
        frame.fill_rect(10, 10, 31, 31, 1200);
        // a handful of far readings along one edge of the window
        for x in 10..30 {
            frame.set(x, 10, 1700);
        }
        frame.set(20, 20, 0);

        let s = sampler().sample(&frame.view(), 20, 20);
        assert_relative_eq!(s.depth_m().unwrap(), 1.2, epsilon = 1e-4);
    }

    #[test]
    fn small_step_keeps_every_reading() {
        let mut frame = DepthFrame::filled(30, 30, 0);
        frame.fill_rect(10, 10, 20, 20, 1500);
        frame.fill_rect(10, 10, 20, 12, 1600);
        frame.set(15, 15, 0);
        let s = sampler().sample(&frame.view(), 15, 15);
        let d = s.depth_m().unwrap();
        assert!(d > 1.5 && d < 1.6, "got {d}");
    }

    #[test]
    fn repeated_sampling_is_idempotent() {
        let mut frame = DepthFrame::filled(64, 48, 0);
        frame.fill_rect(20, 20, 30, 30, 1432);
        frame.set(25, 25, 0);
        let s = sampler();
        assert_eq!(s.sample(&frame.view(), 25, 25), s.sample(&frame.view(), 25, 25));
    }

    #[test]
    fn interpolated_value_outside_range_is_invalid() {
        let mut frame = DepthFrame::filled(20, 20, 0);
        frame.set(11, 10, 6000);
        assert_eq!(sampler().sample(&frame.view(), 10, 10), DepthSample::Invalid);
    }
}
