use serde::{Deserialize, Serialize};

use screenhit_core::DepthFrameView;

use crate::neighborhood::{collect_neighbors, mean_std};
use crate::sampler::DepthSampler;

/// Weights and scales for [`ConfidenceEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceParams {
    /// Half-size of the window whose spread is scored, in depth pixels.
    pub radius: usize,
    pub deviation_weight: f32,
    pub variance_weight: f32,
    /// Relative deviation from the reference at which the deviation term halves.
    pub deviation_scale: f32,
    /// Neighbourhood standard deviation (mm) at which the variance term halves.
    pub variance_scale_mm: f32,
}

impl Default for ConfidenceParams {
    fn default() -> Self {
        Self {
            radius: 10,
            deviation_weight: 0.5,
            variance_weight: 0.5,
            deviation_scale: 0.2,
            variance_scale_mm: 100.0,
        }
    }
}

/// Scores how far a depth reading can be trusted.
///
/// Both terms are of the form `1 / (1 + error / scale)`, so the score falls
/// strictly as either the deviation from the reference or the neighbourhood
/// spread grows while the other is held fixed.
#[derive(Clone, Debug, Default)]
pub struct ConfidenceEstimator {
    params: ConfidenceParams,
}

impl ConfidenceEstimator {
    pub fn new(params: ConfidenceParams) -> Self {
        Self { params }
    }

    #[inline]
    pub fn params(&self) -> &ConfidenceParams {
        &self.params
    }

    /// Confidence in `[0, 1]` for the reading at depth pixel `(x, y)`.
    ///
    /// An INVALID sample scores 0. A non-positive `reference_m` contributes a
    /// neutral 0.5 deviation term. A window with fewer than two plausible
    /// readings contributes nothing for spread.
    pub fn confidence(
        &self,
        sampler: &DepthSampler,
        frame: &DepthFrameView<'_>,
        x: i64,
        y: i64,
        reference_m: f32,
    ) -> f32 {
        let Some(depth_m) = sampler.sample(frame, x, y).depth_m() else {
            return 0.0;
        };
        let mut window = collect_neighbors(frame, x, y, self.params.radius);
        window.retain(|n| sampler.is_valid_depth(n.depth_mm as f32 / 1000.0));
        let std_mm = if window.len() >= 2 {
            mean_std(&window).map(|(_, std)| std as f32)
        } else {
            None
        };
        self.score(depth_m, reference_m, std_mm)
    }

    /// Combine a reading, its reference and its neighbourhood spread.
    pub fn score(&self, depth_m: f32, reference_m: f32, std_mm: Option<f32>) -> f32 {
        let p = &self.params;
        let deviation_term = if reference_m > 0.0 {
            let rel = (depth_m - reference_m).abs() / reference_m;
            1.0 / (1.0 + rel / p.deviation_scale)
        } else {
            0.5
        };
        let variance_term = match std_mm {
            Some(std) => 1.0 / (1.0 + std.max(0.0) / p.variance_scale_mm),
            None => 0.0,
        };
        (p.deviation_weight * deviation_term + p.variance_weight * variance_term).clamp(0.0, 1.0)
    }
}
