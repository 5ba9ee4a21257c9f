//! Small numerical helpers shared by the estimator and the preprocessing code.

use statrs::function::gamma::digamma as statrs_digamma;

/// Small epsilon for numerical comparisons (e.g., avoiding division by zero).
pub const NUMERICAL_EPS: f64 = 1e-10;

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
///
/// Returns 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let ss: f64 = values.iter().map(|&v| (v - mu).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Largest absolute value, 0 for an empty slice.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()))
}

/// Rescale a series to zero mean and unit variance.
///
/// A constant series is only centred.
pub fn standardise(values: &[f64]) -> Vec<f64> {
    let mu = mean(values);
    let sd = sample_std(values);
    if sd < NUMERICAL_EPS {
        return values.iter().map(|&v| v - mu).collect();
    }
    values.iter().map(|&v| (v - mu) / sd).collect()
}

/// Digamma function ψ(x) for positive arguments.
#[inline]
pub fn digamma(x: f64) -> f64 {
    statrs_digamma(x)
}
