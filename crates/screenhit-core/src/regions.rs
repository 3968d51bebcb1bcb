//! 8-connected region labelling on binary masks.
//!
//! A region is the set of foreground pixels reachable from each other through
//! horizontal, vertical or diagonal steps: the pixel-level equivalent of an
//! external contour and its filled interior. Area is the pixel count.

use nalgebra::Point2;

use crate::Mask;

/// Connected foreground blob.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    /// Row-major pixel indices belonging to the region.
    pub pixels: Vec<usize>,
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    sum_x: f64,
    sum_y: f64,
}

impl Region {
    pub fn area(&self) -> usize {
        self.pixels.len()
    }

    /// Mean pixel position (first-order moments over zeroth).
    pub fn centroid(&self) -> Point2<f32> {
        let n = self.pixels.len().max(1) as f64;
        Point2::new((self.sum_x / n) as f32, (self.sum_y / n) as f32)
    }

    pub fn bbox_width(&self) -> usize {
        self.max_x - self.min_x + 1
    }

    pub fn bbox_height(&self) -> usize {
        self.max_y - self.min_y + 1
    }

    /// Share of the bounding box covered by the region, in `(0, 1]`.
    pub fn fill_ratio(&self) -> f32 {
        self.area() as f32 / (self.bbox_width() * self.bbox_height()) as f32
    }
}

/// Label every 8-connected foreground region of `mask`, in scan order.
pub fn label_regions(mask: &Mask) -> Vec<Region> {
    let (w, h) = (mask.width, mask.height);
    let mut visited = vec![false; w * h];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..w * h {
        if !mask.data[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let mut region = Region {
            pixels: Vec::new(),
            min_x: usize::MAX,
            min_y: usize::MAX,
            max_x: 0,
            max_y: 0,
            sum_x: 0.0,
            sum_y: 0.0,
        };

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            region.pixels.push(idx);
            region.min_x = region.min_x.min(x);
            region.min_y = region.min_y.min(y);
            region.max_x = region.max_x.max(x);
            region.max_y = region.max_y.max(y);
            region.sum_x += x as f64;
            region.sum_y += y as f64;

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if !mask.get(nx, ny) {
                        continue;
                    }
                    let n = ny as usize * w + nx as usize;
                    if !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        regions.push(region);
    }

    regions
}
