//! Depth and color frame containers.
//!
//! Each frame comes as a borrowed view (what detectors consume) and an owned
//! buffer (what frame sources produce and trackers keep across ticks). Both
//! are row-major with the origin at the top-left pixel.

use crate::FrameError;

/// Raw depth code meaning "no measurement".
pub const DEPTH_NO_MEASUREMENT: u16 = 0;
/// Raw depth code meaning "saturated / out of sensor range".
pub const DEPTH_SATURATED: u16 = u16::MAX;

/// True when `raw_mm` is one of the reserved invalid codes rather than a distance.
#[inline]
pub fn is_sentinel(raw_mm: u16) -> bool {
    raw_mm == DEPTH_NO_MEASUREMENT || raw_mm >= DEPTH_SATURATED
}

fn check_len(width: usize, height: usize, got: usize, channels: usize) -> Result<(), FrameError> {
    if width == 0 || height == 0 {
        return Err(FrameError::ZeroDimension { width, height });
    }
    let expected = width * height * channels;
    if got != expected {
        return Err(FrameError::BufferLength { expected, got });
    }
    Ok(())
}

/// Borrowed depth frame in millimeters.
#[derive(Clone, Copy, Debug)]
pub struct DepthFrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u16], // row-major, len = w*h
}

impl<'a> DepthFrameView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u16]) -> Result<Self, FrameError> {
        check_len(width, height, data.len(), 1)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Raw reading at `(x, y)`, `None` outside the frame.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<u16> {
        if !self.contains(x, y) {
            return None;
        }
        self.data.get(y as usize * self.width + x as usize).copied()
    }

    /// Raw reading at `(x, y)` when it is a real distance.
    #[inline]
    pub fn valid(&self, x: i64, y: i64) -> Option<u16> {
        self.get(x, y).filter(|&v| !is_sentinel(v))
    }

    pub fn to_owned_frame(&self) -> DepthFrame {
        DepthFrame {
            width: self.width,
            height: self.height,
            data: self.data.to_vec(),
        }
    }
}

/// Owned depth frame in millimeters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u16>,
}

impl DepthFrame {
    pub fn new(width: usize, height: usize, data: Vec<u16>) -> Result<Self, FrameError> {
        check_len(width, height, data.len(), 1)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame with every pixel set to `raw_mm`.
    pub fn filled(width: usize, height: usize, raw_mm: u16) -> Self {
        Self {
            width,
            height,
            data: vec![raw_mm; width * height],
        }
    }

    pub fn view(&self) -> DepthFrameView<'_> {
        DepthFrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: i64, y: i64) -> Option<u16> {
        self.view().get(x, y)
    }

    /// Overwrite one pixel; out-of-frame writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, raw_mm: u16) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = raw_mm;
        }
    }

    /// Fill the axis-aligned rectangle `[x0, x1) x [y0, y1)`, clipped to the frame.
    pub fn fill_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, raw_mm: u16) {
        for y in y0..y1.min(self.height) {
            for x in x0..x1.min(self.width) {
                self.data[y * self.width + x] = raw_mm;
            }
        }
    }
}

/// Borrowed 8-bit RGB frame.
#[derive(Clone, Copy, Debug)]
pub struct ColorFrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major RGB, len = w*h*3
}

impl<'a> ColorFrameView<'a> {
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self, FrameError> {
        check_len(width, height, data.len(), 3)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        let px = self.data.get(i..i + 3)?;
        Some([px[0], px[1], px[2]])
    }
}

/// Owned 8-bit RGB frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ColorFrame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, FrameError> {
        check_len(width, height, data.len(), 3)?;
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn view(&self) -> ColorFrameView<'_> {
        ColorFrameView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// Paint a filled disk, clipped to the frame.
    pub fn fill_disk(&mut self, cx: f32, cy: f32, radius: f32, rgb: [u8; 3]) {
        let r2 = radius * radius;
        let y0 = (cy - radius).floor().max(0.0) as usize;
        let x0 = (cx - radius).floor().max(0.0) as usize;
        let y1 = ((cy + radius).ceil() as usize + 1).min(self.height);
        let x1 = ((cx + radius).ceil() as usize + 1).min(self.width);
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r2 {
                    let i = (y * self.width + x) * 3;
                    self.data[i..i + 3].copy_from_slice(&rgb);
                }
            }
        }
    }
}
