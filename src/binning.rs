//! Fixed-width half-open interval partitions.

use tracing::warn;

/// Sort keys at or below zero carry no data (the source tables use -99999).
pub const NO_DATA: f64 = -99999.0;

/// Largest partition [`make_bins`] will build.
pub const MAX_BINS: usize = 1_000_000;

/// Half-open interval `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub low: f64,
    pub high: f64,
}

impl Bin {
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value < self.high
    }

    pub fn center(&self) -> f64 {
        self.low + (self.high - self.low) / 2.0
    }
}

/// Ascending contiguous bins of width `step` covering `[lower, upper)`,
/// plus the center point of each bin.
///
/// Bin `i` starts at `lower + i * step`; the last bin may extend past
/// `upper` when the range is not a multiple of `step`. A non-positive or
/// non-finite step, non-finite bounds, or a range needing more than
/// [`MAX_BINS`] bins yields no bins.
pub fn make_bins(lower: f64, upper: f64, step: f64) -> (Vec<Bin>, Vec<f64>) {
    if !(step > 0.0) || !step.is_finite() || !lower.is_finite() || !upper.is_finite() {
        return (Vec::new(), Vec::new());
    }
    if !(upper > lower) {
        return (Vec::new(), Vec::new());
    }
    let count = ((upper - lower) / step).ceil();
    if !(count <= MAX_BINS as f64) {
        warn!(lower, upper, step, "bin range too fine; no bins built");
        return (Vec::new(), Vec::new());
    }
    let count = count as usize;
    let bins: Vec<Bin> = (0..count)
        .map(|i| {
            let low = lower + i as f64 * step;
            Bin {
                low,
                high: low + step,
            }
        })
        .collect();
    let centers = bins.iter().map(Bin::center).collect();
    (bins, centers)
}

/// Smallest index `i` with `bins[i].low <= value < bins[i].high`.
///
/// `None` when no bin holds the value, including NaN.
pub fn bin_index(value: f64, bins: &[Bin]) -> Option<usize> {
    bins.iter().position(|b| b.contains(value))
}

/// Sum `values` into one accumulator per bin, keyed by `sort_keys`.
///
/// Pairs whose key is not positive are skipped as no-data, as are keys that
/// fall outside every bin. Extra entries in the longer slice are ignored.
pub fn place_into_bins(sort_keys: &[f64], values: &[f64], bins: &[Bin]) -> Vec<f64> {
    let mut binned = vec![0.0; bins.len()];
    for (key, value) in sort_keys.iter().zip(values) {
        if !(*key > 0.0) {
            continue;
        }
        match bin_index(*key, bins) {
            Some(idx) => binned[idx] += value,
            None => warn!(key = *key, "sort key outside every bin; skipped"),
        }
    }
    binned
}

/// Saturating clamp of `n` into `[min, max]`.
pub fn clamp<T: PartialOrd>(n: T, min: T, max: T) -> T {
    if n < min {
        min
    } else if n > max {
        max
    } else {
        n
    }
}
