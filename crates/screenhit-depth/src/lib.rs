//! Depth stage of the screen hit pipeline.
//!
//! - [`CoordinateScaler`] maps color-frame pixels onto the (usually smaller)
//!   depth frame, tracking the most recently observed resolutions.
//! - [`DepthSampler`] returns a validated depth for a depth pixel, recovering
//!   unmeasured pixels from their neighbourhood.
//! - [`ConfidenceEstimator`] scores a reading against a reference depth and
//!   its local spread.
//! - [`DepthProbe`] combines the three in color-frame coordinates and keeps a
//!   flagged last-valid fallback plus counters.
//!
//! ```
//! use screenhit_core::DepthFrame;
//! use screenhit_depth::{DepthSample, DepthSampler};
//!
//! let mut frame = DepthFrame::filled(64, 48, 0);
//! frame.set(34, 24, 1800);
//! let sample = DepthSampler::default().sample(&frame.view(), 32, 24);
//! assert!(matches!(sample, DepthSample::Interpolated { .. }));
//! ```

mod confidence;
mod neighborhood;
mod probe;
mod sampler;
mod scaler;

pub use confidence::{ConfidenceEstimator, ConfidenceParams};
pub use neighborhood::{collect_neighbors, Neighbor};
pub use probe::{
    DepthMeasurement, DepthProbe, DepthProbeParams, PixelRect, ProbeStatistics, RegionStat,
};
pub use sampler::{DepthSample, DepthSampler, DepthSamplerParams};
pub use scaler::{CoordinateScaler, FrameSize};
