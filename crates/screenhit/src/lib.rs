//! High-level facade crate for the `screenhit-*` workspace.
//!
//! This crate provides:
//! - stable, convenient re-exports of the pipeline crates
//! - (feature-gated) adapters from `image` buffers to frame views, and a
//!   [`FrameSource`](tracker::FrameSource) that replays recorded PNG pairs.
//!
//! ## Quickstart
//!
//! ```no_run
//! use screenhit::tracker::{CalibrationPaths, CalibrationStore, TrackerSelector};
//! use screenhit::frames;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! screenhit::core::init_with_level(log::LevelFilter::Info)?;
//! let store = CalibrationStore::open(CalibrationPaths::under("."))?;
//! let color = frames::load_color("color_0001.png")?;
//! let depth = frames::load_depth("depth_0001.png")?;
//!
//! let mut tracker = TrackerSelector::default();
//! let calibration = store.current();
//! if let Some(hit) = tracker.check_target_hit(&color.view(), &depth.view(), calibration.as_deref()) {
//!     println!("hit at ({:.0}, {:.0}), {:.2} m", hit.x, hit.y, hit.depth_m);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `screenhit::core`: frames, masks, regions, screen polygon, logger.
//! - `screenhit::depth`: coordinate scaling, depth sampling and confidence.
//! - `screenhit::tracker`: detectors, tracker selection, hit evaluation, calibration.
//! - `screenhit::frames` (feature `image`): `image` adapters and PNG replay.

pub use screenhit_core as core;
pub use screenhit_depth as depth;
pub use screenhit_tracker as tracker;

pub use screenhit_tracker::{
    CalibrationStore, FrameReport, HitEvent, ScreenCalibration, TrackerMode, TrackerParams,
    TrackerSelector,
};

#[cfg(feature = "image")]
pub mod frames;
