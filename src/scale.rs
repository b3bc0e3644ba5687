use anyhow::{Result, anyhow};

/// ColorBrewer Greens, 8 classes. Fixed palette for the attainment scale.
pub const GREENS_8: [&str; 8] = [
    "#f7fcf5", "#e5f5e0", "#c7e9c0", "#a1d99b", "#74c476", "#41ab5d", "#238b45", "#005a32",
];

/// Min/max of a value sequence. Errors on an empty or all-NaN input.
pub fn extent(values: impl IntoIterator<Item = f64>) -> Result<(f64, f64)> {
    let mut bounds: Option<(f64, f64)> = None;
    for v in values {
        if v.is_nan() {
            continue;
        }
        bounds = Some(match bounds {
            None => (v, v),
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
        });
    }
    bounds.ok_or_else(|| anyhow!("Cannot compute extent of an empty dataset"))
}

/// Quantized scale: a continuous [min, max] domain split evenly into one
/// contiguous interval per palette color. The domain is computed once from
/// the full dataset so every shape shares the same scale.
#[derive(Debug, Clone)]
pub struct QuantizeScale {
    min: f64,
    max: f64,
    palette: &'static [&'static str],
}

impl QuantizeScale {
    pub fn new(min: f64, max: f64, palette: &'static [&'static str]) -> Self {
        Self { min, max, palette }
    }

    /// Palette color for a value. Values at or beyond the domain edges
    /// clamp to the first/last bucket.
    pub fn color(&self, value: f64) -> &'static str {
        let n = self.palette.len();
        let span = self.max - self.min;
        if span <= 0.0 {
            return self.palette[0];
        }
        let bucket = ((value - self.min) / span * n as f64).floor() as isize;
        let bucket = bucket.clamp(0, n as isize - 1) as usize;
        self.palette[bucket]
    }

    /// The internal bucket boundaries, ordered ascending. One fewer than
    /// the bucket count.
    pub fn thresholds(&self) -> Vec<f64> {
        let n = self.palette.len();
        let span = self.max - self.min;
        (1..n)
            .map(|i| self.min + span * i as f64 / n as f64)
            .collect()
    }

    /// Legend tick values: domain min, every threshold, domain max.
    pub fn legend_points(&self) -> Vec<f64> {
        let mut points = Vec::with_capacity(self.palette.len() + 1);
        points.push(self.min);
        points.extend(self.thresholds());
        points.push(self.max);
        points
    }

    pub fn bucket_count(&self) -> usize {
        self.palette.len()
    }
}

/// Uniformly spaced positions over a pixel range with padding expressed in
/// steps at each end, matching d3's point scale.
#[derive(Debug, Clone)]
pub struct PointScale {
    start: f64,
    len: usize,
    padding: f64,
    step: f64,
}

impl PointScale {
    pub fn new(len: usize, range: (f64, f64), padding: f64) -> Self {
        let divisor = (len.saturating_sub(1)) as f64 + 2.0 * padding;
        let step = if divisor > 0.0 {
            (range.1 - range.0) / divisor
        } else {
            0.0
        };
        Self {
            start: range.0,
            len,
            padding,
            step,
        }
    }

    pub fn position(&self, index: usize) -> f64 {
        debug_assert!(index < self.len);
        self.start + self.step * (self.padding + index as f64)
    }

    pub fn step(&self) -> f64 {
        self.step
    }
}
