//! Bridges between `image` buffers and the pipeline's frame types.
//!
//! Color frames are 8-bit RGB; depth frames are 16-bit single-channel images
//! holding millimeters, which is how RGB-D recorders usually dump them to PNG.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::{ImageBuffer, ImageReader, Luma, RgbImage};
use log::warn;

use crate::core::{ColorFrame, ColorFrameView, DepthFrame, DepthFrameView, FrameError};
use crate::tracker::FrameSource;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// 16-bit depth image in millimeters.
pub type DepthImage = ImageBuffer<Luma<u16>, Vec<u16>>;

#[derive(thiserror::Error, Debug)]
pub enum FrameLoadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Borrow an `image::RgbImage` as a color frame view.
pub fn color_view(img: &RgbImage) -> ColorFrameView<'_> {
    ColorFrameView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Borrow a 16-bit depth image as a depth frame view.
pub fn depth_view(img: &DepthImage) -> DepthFrameView<'_> {
    DepthFrameView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn color_frame(img: RgbImage) -> Result<ColorFrame, FrameError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    ColorFrame::new(w, h, img.into_raw())
}

pub fn depth_frame(img: DepthImage) -> Result<DepthFrame, FrameError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    DepthFrame::new(w, h, img.into_raw())
}

/// Decode any supported image file as RGB.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))
)]
pub fn load_color(path: impl AsRef<Path>) -> Result<ColorFrame, FrameLoadError> {
    let img = ImageReader::open(path)?.decode()?.to_rgb8();
    Ok(color_frame(img)?)
}

/// Decode a 16-bit image file as millimeter depth.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))
)]
pub fn load_depth(path: impl AsRef<Path>) -> Result<DepthFrame, FrameLoadError> {
    let img = ImageReader::open(path)?.decode()?.to_luma16();
    Ok(depth_frame(img)?)
}

/// Replays `(color, depth)` PNG pairs from disk, one pair per tick.
///
/// A file that fails to load is reported and treated like an acquisition
/// timeout.
#[derive(Clone, Debug, Default)]
pub struct ImageSequenceSource {
    pairs: Vec<(PathBuf, PathBuf)>,
    next_color: usize,
    next_depth: usize,
}

impl ImageSequenceSource {
    pub fn new(pairs: Vec<(PathBuf, PathBuf)>) -> Self {
        Self {
            pairs,
            next_color: 0,
            next_depth: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_color >= self.pairs.len() && self.next_depth >= self.pairs.len()
    }
}

impl FrameSource for ImageSequenceSource {
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(index = self.next_color)))]
    fn color_frame(&mut self, _timeout: Duration) -> Option<ColorFrame> {
        let (path, _) = self.pairs.get(self.next_color)?;
        self.next_color += 1;
        // keep both cursors on the same pair even when depth is never asked for
        self.next_depth = self.next_depth.max(self.next_color - 1);
        load_color(path)
            .map_err(|e| warn!("skipping color frame {}: {e}", path.display()))
            .ok()
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self), fields(index = self.next_depth)))]
    fn depth_frame(&mut self, _timeout: Duration) -> Option<DepthFrame> {
        let (_, path) = self.pairs.get(self.next_depth)?;
        self.next_depth += 1;
        load_depth(path)
            .map_err(|e| warn!("skipping depth frame {}: {e}", path.display()))
            .ok()
    }
}
