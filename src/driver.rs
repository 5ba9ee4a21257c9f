//! Bidirectional transfer entropy over a set of neighbour counts.
//!
//! For every neighbour count the driver estimates TE(X -> Y) and then
//! TE(Y -> X) with the same estimator configuration, optionally searching the
//! embedding automatically and optionally building a surrogate null
//! distribution for each direction.

use crate::embedding::EmbeddingParams;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::estimator::{
    ContinuousTransferEntropyEstimator, Embedding, K_PROP_NAME, K_TAU_PROP_NAME, L_PROP_NAME,
    L_TAU_PROP_NAME, PROP_AUTO_EMBED_METHOD, PROP_K, PROP_K_SEARCH_MAX, PROP_TAU_SEARCH_MAX,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ceiling for both the history length and the delay in the auto-embedding search.
pub const AUTO_EMBED_SEARCH_MAX: usize = 10;

/// Options for [`compute_te`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeOptions {
    /// Destination history length; ignored when `auto_embed` is set.
    pub k_history: usize,
    /// Source history length; ignored when `auto_embed` is set.
    pub l_history: usize,
    /// Neighbour counts, one result pair per entry.
    pub knns: Vec<usize>,
    /// Surrogates per direction; 0 disables significance testing.
    pub num_surrogates: usize,
    /// Search history lengths and delays with the Ragwitz criterion.
    pub auto_embed: bool,
    /// Print a status line per direction and neighbour count.
    pub status: bool,
}

impl Default for TeOptions {
    fn default() -> Self {
        Self {
            k_history: 3,
            l_history: 3,
            knns: vec![8],
            num_surrogates: 0,
            auto_embed: true,
            status: true,
        }
    }
}

/// Null distribution summaries, parallel to the neighbour counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignificanceSummary {
    pub x_to_y_mean: Vec<f64>,
    pub x_to_y_std: Vec<f64>,
    pub x_to_y_p_value: Vec<f64>,
    pub y_to_x_mean: Vec<f64>,
    pub y_to_x_std: Vec<f64>,
    pub y_to_x_p_value: Vec<f64>,
}

/// Results of [`compute_te`], parallel to the neighbour counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeResults {
    pub knns: Vec<usize>,
    pub x_to_y: Vec<f64>,
    pub y_to_x: Vec<f64>,
    /// Present iff surrogates were requested.
    pub significance: Option<SignificanceSummary>,
    /// Embeddings found by the search as `(X -> Y, Y -> X)` pairs; present iff
    /// auto-embedding was enabled.
    pub embeddings: Option<Vec<(EmbeddingParams, EmbeddingParams)>>,
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    XToY,
    YToX,
}

impl Direction {
    fn arrow(self) -> &'static str {
        match self {
            Direction::XToY => "X->Y",
            Direction::YToX => "Y->X",
        }
    }

    /// (destination, source) names.
    fn roles(self) -> (&'static str, &'static str) {
        match self {
            Direction::XToY => ("Y", "X"),
            Direction::YToX => ("X", "Y"),
        }
    }
}

struct DirectionOutcome {
    te: f64,
    null: Option<(f64, f64, f64)>,
    embedding: Option<EmbeddingParams>,
}

/// `X->Y TE with 8 NNs: 0.1235`, followed by the null mean and spread when
/// surrogates were drawn.
fn te_status(direction: Direction, knn: usize, te: f64, null: Option<(f64, f64)>) -> String {
    match null {
        Some((mean, std)) => format!(
            "{} TE with {} NNs: {:.4}, with null = {:.3} +/- {:.3}",
            direction.arrow(),
            knn,
            te,
            mean,
            std
        ),
        None => format!("{} TE with {} NNs: {:.4}", direction.arrow(), knn, te),
    }
}

fn embedding_status(direction: Direction, params: &EmbeddingParams) -> String {
    let (dest, src) = direction.roles();
    format!(
        "{} embedding/delay: k={}, k_tau={}, {} embedding/delay: l={}, l_tau={}",
        dest, params.k, params.k_tau, src, params.l, params.l_tau
    )
}

fn validate(x: &[f64], y: &[f64], options: &TeOptions) -> Result<()> {
    if options.knns.is_empty() {
        return Err(Error::invalid("knns", "at least one neighbour count is required"));
    }
    if options.knns.contains(&0) {
        return Err(Error::invalid("knns", "neighbour counts must be positive"));
    }
    if !options.auto_embed {
        EmbeddingParams::with_histories(options.k_history, options.l_history)?;
    }
    if x.len() != y.len() {
        return Err(Error::LengthMismatch {
            source_len: x.len(),
            destination_len: y.len(),
        });
    }
    Ok(())
}

fn run_direction<E: ContinuousTransferEntropyEstimator>(
    estimator: &mut E,
    source: &[f64],
    destination: &[f64],
    knn: usize,
    direction: Direction,
    options: &TeOptions,
) -> Result<DirectionOutcome> {
    if options.auto_embed {
        let search_max = AUTO_EMBED_SEARCH_MAX.to_string();
        estimator.configure(&[
            (PROP_AUTO_EMBED_METHOD, "RAGWITZ"),
            (PROP_K_SEARCH_MAX, &search_max),
            (PROP_TAU_SEARCH_MAX, &search_max),
        ])?;
        estimator.initialise(Embedding::Auto)?;
    } else {
        let params = EmbeddingParams::with_histories(options.k_history, options.l_history)?;
        estimator.initialise(Embedding::Fixed(params))?;
    }
    estimator.set_property(PROP_K, &knn.to_string())?;
    estimator.set_observations(source, destination)?;
    let te = estimator.compute_average_local_of_observations()?;
    debug!(direction = direction.arrow(), knn, te, "transfer entropy");

    let null = if options.num_surrogates > 0 {
        let dist = estimator.compute_significance(options.num_surrogates)?;
        Some((dist.mean, dist.std, dist.p_value))
    } else {
        None
    };
    if options.status {
        println!("{}", te_status(direction, knn, te, null.map(|(m, s, _)| (m, s))));
    }

    let embedding = if options.auto_embed {
        let params = EmbeddingParams {
            k: estimator.discovered_parameter(K_PROP_NAME)?,
            k_tau: estimator.discovered_parameter(K_TAU_PROP_NAME)?,
            l: estimator.discovered_parameter(L_PROP_NAME)?,
            l_tau: estimator.discovered_parameter(L_TAU_PROP_NAME)?,
            delay: 1,
        };
        if options.status {
            println!("{}", embedding_status(direction, &params));
        }
        Some(params)
    } else {
        None
    };

    Ok(DirectionOutcome {
        te,
        null,
        embedding,
    })
}

/// Estimate TE in both directions with any estimator implementation.
///
/// `x` and `y` must have equal length. The estimator is re-initialised for
/// every direction and neighbour count.
pub fn compute_te_with<E: ContinuousTransferEntropyEstimator>(
    estimator: &mut E,
    x: &[f64],
    y: &[f64],
    options: &TeOptions,
) -> Result<TeResults> {
    validate(x, y, options)?;

    let n = options.knns.len();
    let mut results = TeResults {
        knns: options.knns.clone(),
        x_to_y: Vec::with_capacity(n),
        y_to_x: Vec::with_capacity(n),
        significance: (options.num_surrogates > 0).then(SignificanceSummary::default),
        embeddings: options.auto_embed.then(|| Vec::with_capacity(n)),
    };

    for &knn in &options.knns {
        let forward = run_direction(estimator, x, y, knn, Direction::XToY, options)?;
        let backward = run_direction(estimator, y, x, knn, Direction::YToX, options)?;

        results.x_to_y.push(forward.te);
        results.y_to_x.push(backward.te);
        if let (Some(summary), Some(fwd), Some(bwd)) =
            (results.significance.as_mut(), forward.null, backward.null)
        {
            summary.x_to_y_mean.push(fwd.0);
            summary.x_to_y_std.push(fwd.1);
            summary.x_to_y_p_value.push(fwd.2);
            summary.y_to_x_mean.push(bwd.0);
            summary.y_to_x_std.push(bwd.1);
            summary.y_to_x_p_value.push(bwd.2);
        }
        if let (Some(embeddings), Some(fwd), Some(bwd)) =
            (results.embeddings.as_mut(), forward.embedding, backward.embedding)
        {
            embeddings.push((fwd, bwd));
        }
    }
    Ok(results)
}

/// Estimate TE in both directions with the engine's KSG estimator.
///
/// Neighbour searches run on the engine's workers; the call blocks until all
/// neighbour counts are done.
pub fn compute_te(engine: &Engine, x: &[f64], y: &[f64], options: &TeOptions) -> Result<TeResults> {
    let mut estimator = engine.new_estimator();
    engine.install(|| compute_te_with(&mut estimator, x, y, options))
}
