//! Posterior sample summaries.
//!
//! Quantiles use linear interpolation between order statistics
//! (Hyndman & Fan type 7), the usual empirical quantile:
//!
//! ```text
//! h = (n - 1) * p
//! q = x[floor(h)] + (h - floor(h)) * (x[ceil(h)] - x[floor(h)])
//! ```

/// Arithmetic mean. `NaN` for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Quantile of an already sorted, non-empty slice. `p` is clamped to [0, 1].
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Quantile of an unsorted slice; sorts a copy.
pub fn quantile(xs: &[f64], p: f64) -> f64 {
    let mut sorted = xs.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// Mean and `(low, high)` quantiles, sorting `samples` in place once.
pub fn mean_and_interval(samples: &mut [f64], low: f64, high: f64) -> (f64, f64, f64) {
    let m = mean(samples);
    samples.sort_unstable_by(f64::total_cmp);
    (m, quantile_sorted(samples, low), quantile_sorted(samples, high))
}
