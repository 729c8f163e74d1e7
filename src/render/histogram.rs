//! Prediction-sample histogram.

use serde::Serialize;

pub const MAX_BINS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub label: String,
    pub count: usize,
    /// Height relative to the tallest bin, 0..=100.
    pub height_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub bin_width: f64,
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}

/// `min(20, ceil(sqrt(n)))`, at least one.
pub fn bin_count(samples: usize) -> usize {
    ((samples as f64).sqrt().ceil() as usize).clamp(1, MAX_BINS)
}

/// Bins `samples` into equal-width buckets over `[min, max]`.
///
/// The maximum lands in the last bin. With constant input the width is
/// zero and every sample lands in bin 0. Returns `None` for no samples.
pub fn build(samples: &[f64]) -> Option<Histogram> {
    if samples.is_empty() {
        return None;
    }
    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let n_bins = bin_count(samples.len());
    let width = (max - min) / n_bins as f64;

    let mut counts = vec![0usize; n_bins];
    for v in samples {
        let idx = if width > 0.0 {
            // saturating cast: NaN and negatives go to 0
            (((v - min) / width).floor() as usize).min(n_bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    let tallest = counts.iter().copied().max().unwrap_or(0).max(1);
    let bins = counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| {
            let lower = min + i as f64 * width;
            HistogramBin {
                lower,
                label: format!("{:.3}", lower),
                count,
                height_pct: count as f64 / tallest as f64 * 100.0,
            }
        })
        .collect();

    Some(Histogram { min, max, bin_width: width, bins })
}
