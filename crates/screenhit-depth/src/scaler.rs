use log::info;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Pixel dimensions of one sensor plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: usize,
    pub height: usize,
}

impl FrameSize {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32
    }
}

/// Maps color-plane pixels onto the depth plane.
///
/// Scale factors come from the most recently observed pair of frame sizes and
/// are recomputed only when either size changes.
#[derive(Clone, Debug, Default)]
pub struct CoordinateScaler {
    color: Option<FrameSize>,
    depth: Option<FrameSize>,
    scale: Option<(f64, f64)>,
}

impl CoordinateScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current frame sizes. Returns `true` when the scale changed.
    pub fn observe(&mut self, color: FrameSize, depth: FrameSize) -> bool {
        if self.color == Some(color) && self.depth == Some(depth) {
            return false;
        }
        if color.width == 0 || color.height == 0 || depth.width == 0 || depth.height == 0 {
            self.color = None;
            self.depth = None;
            self.scale = None;
            return true;
        }
        let sx = depth.width as f64 / color.width as f64;
        let sy = depth.height as f64 / color.height as f64;
        info!(
            "frame geometry changed: color {}x{} -> depth {}x{} (scale {:.3}, {:.3})",
            color.width, color.height, depth.width, depth.height, sx, sy
        );
        self.color = Some(color);
        self.depth = Some(depth);
        self.scale = Some((sx, sy));
        true
    }

    /// `(depth_width / color_width, depth_height / color_height)`, once sizes are known.
    pub fn scale(&self) -> Option<(f64, f64)> {
        self.scale
    }

    pub fn color_size(&self) -> Option<FrameSize> {
        self.color
    }

    pub fn depth_size(&self) -> Option<FrameSize> {
        self.depth
    }

    /// Color pixel -> depth pixel, floored to integer indices.
    ///
    /// Returns `None` for coordinates outside `[0, color_width) x [0, color_height)`
    /// or before any frame sizes were observed.
    pub fn to_depth_coords(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (color, depth, (sx, sy)) = (self.color?, self.depth?, self.scale?);
        if !x.is_finite() || !y.is_finite() || !color.contains(x, y) {
            return None;
        }
        let dx = ((x as f64) * sx).floor() as usize;
        let dy = ((y as f64) * sy).floor() as usize;
        Some((dx.min(depth.width - 1), dy.min(depth.height - 1)))
    }

    /// Depth pixel -> color pixel (continuous, no flooring).
    pub fn to_color_coords(&self, x: f32, y: f32) -> Option<Point2<f32>> {
        let (depth, (sx, sy)) = (self.depth?, self.scale?);
        if !x.is_finite() || !y.is_finite() || !depth.contains(x, y) {
            return None;
        }
        Some(Point2::new(
            ((x as f64) / sx) as f32,
            ((y as f64) / sy) as f32,
        ))
    }
}
