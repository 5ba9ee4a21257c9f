//! Delay embeddings for transfer entropy and the Ragwitz embedding search.
//!
//! For a destination sample at time `t` the estimator conditions on
//! - the destination past `y[t-1], y[t-1-k_tau], ..., y[t-1-(k-1)*k_tau]`
//! - the source past `x[t-delay], x[t-delay-l_tau], ..., x[t-delay-(l-1)*l_tau]`
//!
//! so the first usable `t` is `max((k-1)*k_tau + 1, (l-1)*l_tau + delay)`.

use crate::error::{Error, Result};
use crate::iter_maybe_parallel;
use crate::knn::{NeighbourIndex, Points};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Embedding search method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoEmbedMethod {
    /// Use the fixed history lengths and delays given at initialisation.
    #[default]
    None,
    /// Ragwitz search for both the destination and the source embedding.
    Ragwitz,
    /// Ragwitz search for the destination; the source keeps its fixed embedding.
    RagwitzDestOnly,
}

impl AutoEmbedMethod {
    /// Property value as accepted by `AUTO_EMBED_METHOD`.
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoEmbedMethod::None => "NONE",
            AutoEmbedMethod::Ragwitz => "RAGWITZ",
            AutoEmbedMethod::RagwitzDestOnly => "RAGWITZ_DEST_ONLY",
        }
    }

    /// Parse a property value (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "NONE" => Some(AutoEmbedMethod::None),
            "RAGWITZ" => Some(AutoEmbedMethod::Ragwitz),
            "RAGWITZ_DEST_ONLY" => Some(AutoEmbedMethod::RagwitzDestOnly),
            _ => None,
        }
    }
}

/// History lengths and delays of a transfer entropy embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingParams {
    /// Destination history length.
    pub k: usize,
    /// Destination embedding delay.
    pub k_tau: usize,
    /// Source history length.
    pub l: usize,
    /// Source embedding delay.
    pub l_tau: usize,
    /// Source-destination delay.
    pub delay: usize,
}

impl EmbeddingParams {
    /// Validated embedding; every field must be at least 1.
    pub fn new(k: usize, k_tau: usize, l: usize, l_tau: usize, delay: usize) -> Result<Self> {
        let params = Self {
            k,
            k_tau,
            l,
            l_tau,
            delay,
        };
        params.validate()?;
        Ok(params)
    }

    /// Unit delays with the given history lengths.
    pub fn with_histories(k: usize, l: usize) -> Result<Self> {
        Self::new(k, 1, l, 1, 1)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("k_HISTORY", self.k),
            ("k_TAU", self.k_tau),
            ("l_HISTORY", self.l),
            ("l_TAU", self.l_tau),
            ("DELAY", self.delay),
        ] {
            if value == 0 {
                return Err(Error::invalid(name, "must be at least 1"));
            }
        }
        Ok(())
    }

    /// First destination index with a complete embedding.
    ///
    /// Fails with [`Error::InvalidParameter`] when a history span does not
    /// fit in `usize`.
    pub fn first_index(&self) -> Result<usize> {
        let dest = self
            .k
            .saturating_sub(1)
            .checked_mul(self.k_tau)
            .and_then(|span| span.checked_add(1))
            .ok_or_else(|| Error::invalid("k_HISTORY", "destination history span overflows"))?;
        let source = self
            .l
            .saturating_sub(1)
            .checked_mul(self.l_tau)
            .and_then(|span| span.checked_add(self.delay))
            .ok_or_else(|| Error::invalid("l_HISTORY", "source history span overflows"))?;
        Ok(dest.max(source))
    }

    /// Number of embedded observations available from series of length `n`.
    pub fn num_observations(&self, n: usize) -> usize {
        self.first_index().map_or(0, |start| n.saturating_sub(start))
    }
}

/// Source past, destination next and destination past for every usable time step.
#[derive(Debug, Clone)]
pub struct EmbeddedObservations {
    pub source_past: Points,
    pub dest_next: Points,
    pub dest_past: Points,
}

impl EmbeddedObservations {
    pub fn len(&self) -> usize {
        self.dest_next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dest_next.is_empty()
    }
}

/// Build the embedded observations for `source -> destination`.
///
/// Series must have equal length; returns `None` when no observation fits.
pub fn embed(
    source: &[f64],
    destination: &[f64],
    params: &EmbeddingParams,
) -> Option<EmbeddedObservations> {
    let n = destination.len();
    if source.len() != n {
        return None;
    }
    let start = params.first_index().ok()?;
    if start >= n {
        return None;
    }
    let count = n - start;
    let mut source_past = Vec::with_capacity(count * params.l);
    let mut dest_past = Vec::with_capacity(count * params.k);
    let mut dest_next = Vec::with_capacity(count);
    for t in start..n {
        for i in 0..params.l {
            source_past.push(source[t - params.delay - i * params.l_tau]);
        }
        for i in 0..params.k {
            dest_past.push(destination[t - 1 - i * params.k_tau]);
        }
        dest_next.push(destination[t]);
    }
    Some(EmbeddedObservations {
        source_past: Points::new(source_past, params.l),
        dest_next: Points::new(dest_next, 1),
        dest_past: Points::new(dest_past, params.k),
    })
}

/// Mean squared error of Ragwitz local-average prediction for one embedding.
///
/// Each embedded vector ending at `t` predicts `series[t + 1]` as the mean
/// successor of its `num_nns` nearest embedded neighbours. Returns `None`
/// when there are not enough vectors for `num_nns` neighbours.
pub fn ragwitz_prediction_error(
    series: &[f64],
    k: usize,
    tau: usize,
    num_nns: usize,
    window: usize,
) -> Option<f64> {
    if k == 0 || tau == 0 || num_nns == 0 {
        return None;
    }
    let start = (k - 1).checked_mul(tau)?;
    if series.len() < start.checked_add(2)? {
        return None;
    }
    // vectors ending at t = start..n-1 (exclusive), each with a successor
    let count = series.len() - 1 - start;
    if count <= num_nns {
        return None;
    }
    let mut data = Vec::with_capacity(count * k);
    for t in start..start + count {
        for i in 0..k {
            data.push(series[t - i * tau]);
        }
    }
    let index = NeighbourIndex::new(Points::new(data, k));

    let errors: Vec<Option<f64>> = iter_maybe_parallel!(0..count)
        .map(|i| {
            let nn = index.nearest(i, num_nns, window)?;
            let prediction =
                nn.iter().map(|&(_, j)| series[start + j + 1]).sum::<f64>() / nn.len() as f64;
            Some((prediction - series[start + i + 1]).powi(2))
        })
        .collect();

    let mut total = 0.0;
    for e in errors {
        total += e?;
    }
    Some(total / count as f64)
}

/// Search history length `1..=k_max` and delay `1..=tau_max` for the
/// embedding with the lowest Ragwitz prediction error.
///
/// A history length of 1 is only tried with delay 1. Ties keep the smaller
/// history length, then the smaller delay.
pub fn ragwitz_search(
    series: &[f64],
    k_max: usize,
    tau_max: usize,
    num_nns: usize,
    window: usize,
) -> Result<(usize, usize)> {
    let mut best: Option<(usize, usize, f64)> = None;
    // longer histories or delays than the series allows yield no vectors
    for k in 1..=k_max.max(1).min(series.len()) {
        let taus = if k == 1 { 1 } else { tau_max.max(1).min(series.len()) };
        for tau in 1..=taus {
            let Some(error) = ragwitz_prediction_error(series, k, tau, num_nns, window) else {
                continue;
            };
            debug!(k, tau, error, "ragwitz candidate");
            if best.map_or(true, |(_, _, e)| error < e) {
                best = Some((k, tau, error));
            }
        }
    }
    match best {
        Some((k, tau, _)) => Ok((k, tau)),
        None => Err(Error::InsufficientData {
            required: num_nns.saturating_add(2),
            available: series.len(),
        }),
    }
}
