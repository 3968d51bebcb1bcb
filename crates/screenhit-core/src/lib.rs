//! Core types for depth-based screen hit detection.
//!
//! This crate holds the pieces every stage of the pipeline shares: frame
//! containers with the depth sentinel rules, binary masks with morphological
//! opening, connected-region labelling, HSV conversion and the screen polygon.
//! It knows nothing about cameras, detectors or hit state.

mod error;
mod frame;
mod hsv;
mod logger;
mod mask;
mod polygon;
mod regions;

pub use error::{FrameError, PolygonError};
pub use frame::{
    is_sentinel, ColorFrame, ColorFrameView, DepthFrame, DepthFrameView, DEPTH_NO_MEASUREMENT,
    DEPTH_SATURATED,
};
pub use hsv::{rgb_to_hsv, Hsv};
pub use mask::{Mask, StructuringElement};
pub use polygon::ScreenPolygon;
pub use regions::{label_regions, Region};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
