//! Binary masks and morphological filtering.
//!
//! Out-of-frame pixels never influence erosion or dilation, so a blob
//! touching the border is not eaten away by the frame edge.

/// Structuring element as a list of `(dx, dy)` offsets around the anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    offsets: Vec<(i32, i32)>,
}

impl StructuringElement {
    /// Filled ellipse inscribed in a `size x size` box.
    ///
    /// Rows follow the classic rasterisation `dx = round(c * sqrt(1 - dy^2 / r^2))`,
    /// so a 5x5 element is a plus-shaped disk with single-pixel tips.
    pub fn ellipse(size: usize) -> Self {
        let size = size.max(1);
        let r = (size / 2) as i32;
        let c = (size / 2) as i32;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
        let mut offsets = Vec::new();
        for i in 0..size as i32 {
            let dy = i - r;
            let half = if r == 0 {
                c
            } else {
                (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as i32
            };
            let j0 = (c - half).max(0);
            let j1 = (c + half + 1).min(size as i32);
            for j in j0..j1 {
                offsets.push((j - c, dy));
            }
        }
        Self { offsets }
    }

    /// Full `size x size` square.
    pub fn square(size: usize) -> Self {
        let size = size.max(1) as i32;
        let c = size / 2;
        let offsets = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x - c, y - c)))
            .collect();
        Self { offsets }
    }

    pub fn offsets(&self) -> &[(i32, i32)] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Row-major binary mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    pub width: usize,
    pub height: usize,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![false; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.data[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    pub fn erode(&self, se: &StructuringElement) -> Mask {
        self.morph(se, true)
    }

    pub fn dilate(&self, se: &StructuringElement) -> Mask {
        self.morph(se, false)
    }

    /// Erosion followed by dilation: removes specks smaller than `se`.
    pub fn open(&self, se: &StructuringElement) -> Mask {
        self.erode(se).dilate(se)
    }

    fn morph(&self, se: &StructuringElement, erode: bool) -> Mask {
        let mut out = Mask::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let mut hit = erode;
                for &(dx, dy) in se.offsets() {
                    // dilation uses the reflected element
                    let (dx, dy) = if erode { (dx, dy) } else { (-dx, -dy) };
                    let nx = x as i64 + dx as i64;
                    let ny = y as i64 + dy as i64;
                    if nx < 0 || ny < 0 || nx as usize >= self.width || ny as usize >= self.height {
                        continue;
                    }
                    let v = self.data[ny as usize * self.width + nx as usize];
                    if erode && !v {
                        hit = false;
                        break;
                    }
                    if !erode && v {
                        hit = true;
                        break;
                    }
                }
                out.data[idx] = hit;
            }
        }
        out
    }
}
