use screenhit_core::DepthFrameView;

/// One valid reading near a query pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub depth_mm: u16,
    /// Euclidean pixel distance to the query pixel.
    pub distance: f32,
}

/// Collect every non-sentinel reading in the square of half-size `radius`
/// centred on `(x, y)`, clipped to the frame.
pub fn collect_neighbors(frame: &DepthFrameView<'_>, x: i64, y: i64, radius: usize) -> Vec<Neighbor> {
    let r = radius as i64;
    let mut out = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
    for dy in -r..=r {
        for dx in -r..=r {
            if let Some(depth_mm) = frame.valid(x + dx, y + dy) {
                out.push(Neighbor {
                    depth_mm,
                    distance: ((dx * dx + dy * dy) as f32).sqrt(),
                });
            }
        }
    }
    out
}

/// Population mean and standard deviation of the readings, in millimeters.
pub fn mean_std(values: &[Neighbor]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|v| v.depth_mm as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|v| {
            let d = v.depth_mm as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some((mean, var.sqrt()))
}

/// `max - min` over the readings, in millimeters.
pub fn depth_range(values: &[Neighbor]) -> u16 {
    let (lo, hi) = values
        .iter()
        .fold((u16::MAX, 0u16), |(lo, hi), v| (lo.min(v.depth_mm), hi.max(v.depth_mm)));
    hi.saturating_sub(lo)
}

/// Inverse-distance weighted mean with weight `1 / (distance + 1)`.
pub fn weighted_average(values: &[Neighbor]) -> Option<f64> {
    let mut total_weight = 0.0f64;
    let mut weighted_sum = 0.0f64;
    for v in values {
        let w = 1.0 / (v.distance as f64 + 1.0);
        weighted_sum += v.depth_mm as f64 * w;
        total_weight += w;
    }
    (total_weight > 0.0).then(|| weighted_sum / total_weight)
}
