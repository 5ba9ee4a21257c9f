//! Surrogate null distributions.

use crate::helpers::{mean, sample_std};
use serde::{Deserialize, Serialize};

/// Empirical distribution of an estimate under the null hypothesis of no
/// source-destination relationship, built from surrogate data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullDistribution {
    /// Estimate on the original (unshuffled) data.
    pub actual: f64,
    /// Estimates on each surrogate.
    pub surrogates: Vec<f64>,
    /// Mean of `surrogates`.
    pub mean: f64,
    /// Sample standard deviation of `surrogates`.
    pub std: f64,
    /// Fraction of surrogates at least as large as `actual`.
    pub p_value: f64,
}

impl NullDistribution {
    pub fn new(actual: f64, surrogates: Vec<f64>) -> Self {
        let mean = mean(&surrogates);
        let std = sample_std(&surrogates);
        let p_value = if surrogates.is_empty() {
            1.0
        } else {
            surrogates.iter().filter(|&&s| s >= actual).count() as f64 / surrogates.len() as f64
        };
        Self {
            actual,
            surrogates,
            mean,
            std,
            p_value,
        }
    }

    pub fn len(&self) -> usize {
        self.surrogates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surrogates.is_empty()
    }

    /// Standardised distance of the actual value from the null mean.
    ///
    /// Infinite when the null distribution has zero spread.
    pub fn z_score(&self) -> f64 {
        (self.actual - self.mean) / self.std
    }

    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}
