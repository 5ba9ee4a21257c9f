//! Transfer entropy estimator capability and its native KSG implementation.
//!
//! Transfer entropy from a source `X` to a destination `Y` is the conditional
//! mutual information between the next destination value and the source past,
//! given the destination past:
//!
//! ```text
//! TE(X -> Y) = I(Y_t ; X_past | Y_past)
//! ```
//!
//! [`KraskovTransferEntropy`] estimates it with the Kraskov-Grassberger-Stögbauer
//! algorithm 1 in its conditional (Frenzel-Pompe) form. With ε_i the max-norm
//! distance from sample `i` to its k-th nearest neighbour in the joint space,
//!
//! ```text
//! TE = ψ(k) - < ψ(n_xz + 1) + ψ(n_yz + 1) - ψ(n_z + 1) >
//! ```
//!
//! where the counts are points strictly closer than ε_i in the marginal
//! subspaces (source past + destination past, destination next + destination
//! past, destination past). Values are in nats.
//!
//! Estimators are configured through string properties so that callers can
//! drive any implementation of [`ContinuousTransferEntropyEstimator`] the same
//! way.

use crate::config::KraskovSettings;
use crate::embedding::{embed, ragwitz_search, AutoEmbedMethod, EmbeddedObservations, EmbeddingParams};
use crate::error::{Error, Result};
use crate::helpers::{digamma, mean, standardise};
use crate::iter_maybe_parallel;
use crate::knn::ConditionalSpaces;
use crate::significance::NullDistribution;
use rand::prelude::*;
use rand_distr::Normal;
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use tracing::debug;

/// Number of nearest neighbours in the joint space.
pub const PROP_K: &str = "k";
/// Standardise series before embedding (`true`/`false`).
pub const PROP_NORMALISE: &str = "NORMALISE";
/// Standard deviation of noise added after normalisation.
pub const PROP_NOISE_LEVEL: &str = "NOISE_LEVEL_TO_ADD";
/// Dynamic correlation exclusion (Theiler) window.
pub const PROP_DYN_CORR_EXCL: &str = "DYN_CORR_EXCL";
/// Embedding search method: `NONE`, `RAGWITZ` or `RAGWITZ_DEST_ONLY`.
pub const PROP_AUTO_EMBED_METHOD: &str = "AUTO_EMBED_METHOD";
/// Largest history length tried by the embedding search.
pub const PROP_K_SEARCH_MAX: &str = "AUTO_EMBED_K_SEARCH_MAX";
/// Largest embedding delay tried by the embedding search.
pub const PROP_TAU_SEARCH_MAX: &str = "AUTO_EMBED_TAU_SEARCH_MAX";
/// Neighbours used by the Ragwitz predictor.
pub const PROP_RAGWITZ_NUM_NNS: &str = "AUTO_EMBED_RAGWITZ_NUM_NNS";
/// Seed for added noise and surrogates.
pub const PROP_SEED: &str = "SEED";
/// Destination history length.
pub const K_PROP_NAME: &str = "k_HISTORY";
/// Destination embedding delay.
pub const K_TAU_PROP_NAME: &str = "k_TAU";
/// Source history length.
pub const L_PROP_NAME: &str = "l_HISTORY";
/// Source embedding delay.
pub const L_TAU_PROP_NAME: &str = "l_TAU";
/// Source-destination delay.
pub const DELAY_PROP_NAME: &str = "DELAY";

/// Ragwitz searches remembered by one estimator.
const SEARCH_CACHE_CAPACITY: usize = 8;

/// How the embedding is chosen at initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Embedding {
    /// Use these history lengths and delays as given.
    Fixed(EmbeddingParams),
    /// Search the embedding with the configured `AUTO_EMBED_METHOD` when
    /// observations are supplied.
    Auto,
}

/// A continuous-valued transfer entropy estimator.
///
/// Call order: properties, [`initialise`](Self::initialise),
/// [`set_observations`](Self::set_observations), then any of the compute
/// methods. Re-initialising discards the observations.
pub trait ContinuousTransferEntropyEstimator {
    /// Set one string-keyed property.
    fn set_property(&mut self, name: &str, value: &str) -> Result<()>;

    /// Current value of a property, including discovered embedding parameters.
    fn property(&self, name: &str) -> Result<String>;

    /// Set several properties in order.
    fn configure(&mut self, properties: &[(&str, &str)]) -> Result<()> {
        for (name, value) in properties {
            self.set_property(name, value)?;
        }
        Ok(())
    }

    /// Prepare for a new calculation.
    fn initialise(&mut self, embedding: Embedding) -> Result<()>;

    /// Supply equal-length source and destination series.
    fn set_observations(&mut self, source: &[f64], destination: &[f64]) -> Result<()>;

    /// Average transfer entropy over all supplied observations.
    fn compute_average_local_of_observations(&mut self) -> Result<f64>;

    /// Null distribution from `num_surrogates` source-shuffled surrogates.
    fn compute_significance(&mut self, num_surrogates: usize) -> Result<NullDistribution>;

    /// Integer-valued property, typically a discovered embedding parameter
    /// (`k_HISTORY`, `k_TAU`, `l_HISTORY`, `l_TAU`).
    fn discovered_parameter(&self, name: &str) -> Result<usize> {
        let value = self.property(name)?;
        value.parse().map_err(|_| {
            Error::invalid(name, format!("value `{}` is not a non-negative integer", value))
        })
    }
}

/// Everything a Ragwitz search result depends on.
#[derive(Debug, Clone, PartialEq)]
struct SearchKey {
    series: Vec<u64>,
    k_max: usize,
    tau_max: usize,
    num_nns: usize,
    window: usize,
    normalise: bool,
    noise_level: u64,
    seed: u64,
}

impl SearchKey {
    fn new(series: &[f64], settings: &KraskovSettings) -> Self {
        Self {
            series: series.iter().map(|v| v.to_bits()).collect(),
            k_max: settings.k_search_max,
            tau_max: settings.tau_search_max,
            num_nns: settings.ragwitz_neighbours(),
            window: settings.theiler_window,
            normalise: settings.normalise,
            noise_level: settings.noise_level.to_bits(),
            seed: settings.seed,
        }
    }
}

/// Native KSG transfer entropy estimator.
///
/// Ragwitz search results are kept per series, so re-initialising and
/// swapping source and destination does not repeat a search.
#[derive(Debug, Clone)]
pub struct KraskovTransferEntropy {
    settings: KraskovSettings,
    params: EmbeddingParams,
    auto: bool,
    initialised: bool,
    observations: Option<EmbeddedObservations>,
    searches: Vec<(SearchKey, (usize, usize))>,
}

impl Default for KraskovTransferEntropy {
    fn default() -> Self {
        Self::with_settings(KraskovSettings::default())
    }
}

impl KraskovTransferEntropy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimator preloaded with the given property values.
    pub fn with_settings(settings: KraskovSettings) -> Self {
        Self {
            settings,
            params: EmbeddingParams {
                k: 1,
                k_tau: 1,
                l: 1,
                l_tau: 1,
                delay: 1,
            },
            auto: false,
            initialised: false,
            observations: None,
            searches: Vec::new(),
        }
    }

    /// Embedding in use: the fixed one, or the one found by the search once
    /// observations were supplied.
    pub fn embedding(&self) -> EmbeddingParams {
        self.params
    }

    /// Number of embedded observations, 0 before `set_observations`.
    pub fn num_observations(&self) -> usize {
        self.observations.as_ref().map_or(0, |o| o.len())
    }

    /// Local (per-sample) transfer entropy values.
    pub fn compute_local_of_observations(&self) -> Result<Vec<f64>> {
        let obs = self
            .observations
            .as_ref()
            .ok_or(Error::NotReady("set_observations"))?;
        let spaces = ConditionalSpaces::new(&obs.source_past, &obs.dest_next, &obs.dest_past);
        local_values(&spaces, self.settings.k, self.settings.theiler_window)
    }

    fn prepare(&self, series: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let mut prepared = if self.settings.normalise {
            standardise(series)
        } else {
            series.to_vec()
        };
        if self.settings.noise_level > 0.0 {
            // noise_level is validated finite and non-negative
            if let Ok(noise) = Normal::new(0.0, self.settings.noise_level) {
                for v in prepared.iter_mut() {
                    *v += noise.sample(rng);
                }
            }
        }
        prepared
    }

    fn search_embedding(&mut self, source: &[f64], destination: &[f64]) -> Result<()> {
        let method = self.settings.auto_embed;
        if method == AutoEmbedMethod::None {
            return Err(Error::invalid(
                PROP_AUTO_EMBED_METHOD,
                "auto embedding requested but the method is NONE",
            ));
        }
        let (k, k_tau) = self.searched_embedding(destination)?;
        self.params.k = k;
        self.params.k_tau = k_tau;
        if method == AutoEmbedMethod::Ragwitz {
            let (l, l_tau) = self.searched_embedding(source)?;
            self.params.l = l;
            self.params.l_tau = l_tau;
        }
        debug!(
            k = self.params.k,
            k_tau = self.params.k_tau,
            l = self.params.l,
            l_tau = self.params.l_tau,
            "auto embedding selected"
        );
        Ok(())
    }

    /// Ragwitz `(history, delay)` for a raw series.
    fn searched_embedding(&mut self, series: &[f64]) -> Result<(usize, usize)> {
        let key = SearchKey::new(series, &self.settings);
        if let Some(&(_, found)) = self.searches.iter().find(|entry| entry.0 == key) {
            debug!(history = found.0, delay = found.1, "ragwitz search reused");
            return Ok(found);
        }
        // own noise stream, so the result is the same in either role
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let prepared = self.prepare(series, &mut rng);
        let found = ragwitz_search(
            &prepared,
            self.settings.k_search_max,
            self.settings.tau_search_max,
            self.settings.ragwitz_neighbours(),
            self.settings.theiler_window,
        )?;
        if self.searches.len() == SEARCH_CACHE_CAPACITY {
            self.searches.remove(0);
        }
        self.searches.push((key, found));
        Ok(found)
    }

    fn set_embedding_field(&mut self, name: &str, value: usize) -> Result<()> {
        if value == 0 {
            return Err(Error::invalid(name, "must be at least 1"));
        }
        match name {
            K_PROP_NAME => self.params.k = value,
            K_TAU_PROP_NAME => self.params.k_tau = value,
            L_PROP_NAME => self.params.l = value,
            L_TAU_PROP_NAME => self.params.l_tau = value,
            _ => self.params.delay = value,
        }
        self.observations = None;
        Ok(())
    }
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(name, format!("expected a non-negative integer, got `{}`", value)))
}

fn parse_f64(name: &str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(name, format!("expected a number, got `{}`", value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::invalid(name, format!("expected true or false, got `{}`", value))),
    }
}

/// Every query needs `k` neighbours outside its `2 * window + 1` excluded rows.
fn insufficient_neighbours(k: usize, window: usize, available: usize) -> Error {
    let required = window
        .checked_mul(2)
        .and_then(|w| w.checked_add(k))
        .and_then(|r| r.checked_add(1));
    match required {
        Some(required) => Error::InsufficientData { required, available },
        None => Error::invalid(
            PROP_DYN_CORR_EXCL,
            format!("window {} with {} neighbours exceeds any series length", window, k),
        ),
    }
}

/// Local KSG values for every observation in `spaces` (source past,
/// destination next, destination past).
fn local_values(spaces: &ConditionalSpaces, k: usize, window: usize) -> Result<Vec<f64>> {
    let n = spaces.len();
    let counts: Vec<Option<_>> = iter_maybe_parallel!(0..n)
        .map(|i| spaces.counts(i, k, window))
        .collect();

    let psi_k = digamma(k as f64);
    let mut locals = Vec::with_capacity(n);
    for c in counts {
        let c = c.ok_or_else(|| insufficient_neighbours(k, window, n))?;
        locals.push(
            psi_k - digamma(c.n_xz as f64 + 1.0) - digamma(c.n_yz as f64 + 1.0)
                + digamma(c.n_z as f64 + 1.0),
        );
    }
    Ok(locals)
}

impl ContinuousTransferEntropyEstimator for KraskovTransferEntropy {
    fn set_property(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            PROP_K => {
                let k = parse_usize(name, value)?;
                if k == 0 {
                    return Err(Error::invalid(name, "must be at least 1"));
                }
                self.settings.k = k;
            }
            PROP_NORMALISE => {
                self.settings.normalise = parse_bool(name, value)?;
                self.observations = None;
            }
            PROP_NOISE_LEVEL => {
                let level = parse_f64(name, value)?;
                if !level.is_finite() || level < 0.0 {
                    return Err(Error::invalid(name, "must be a finite non-negative number"));
                }
                self.settings.noise_level = level;
                self.observations = None;
            }
            PROP_DYN_CORR_EXCL => self.settings.theiler_window = parse_usize(name, value)?,
            PROP_AUTO_EMBED_METHOD => {
                self.settings.auto_embed = AutoEmbedMethod::parse(value).ok_or_else(|| {
                    Error::invalid(name, format!("unknown auto embedding method `{}`", value))
                })?;
            }
            PROP_K_SEARCH_MAX | PROP_TAU_SEARCH_MAX => {
                let max = parse_usize(name, value)?;
                if max == 0 {
                    return Err(Error::invalid(name, "must be at least 1"));
                }
                if name == PROP_K_SEARCH_MAX {
                    self.settings.k_search_max = max;
                } else {
                    self.settings.tau_search_max = max;
                }
            }
            PROP_RAGWITZ_NUM_NNS => {
                let nns = parse_usize(name, value)?;
                if nns == 0 {
                    return Err(Error::invalid(name, "must be at least 1"));
                }
                self.settings.ragwitz_num_nns = Some(nns);
            }
            PROP_SEED => {
                self.settings.seed = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid(name, format!("expected an integer, got `{}`", value)))?;
                self.observations = None;
            }
            K_PROP_NAME | K_TAU_PROP_NAME | L_PROP_NAME | L_TAU_PROP_NAME | DELAY_PROP_NAME => {
                let v = parse_usize(name, value)?;
                self.set_embedding_field(name, v)?;
            }
            _ => return Err(Error::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    fn property(&self, name: &str) -> Result<String> {
        let value = match name {
            PROP_K => self.settings.k.to_string(),
            PROP_NORMALISE => self.settings.normalise.to_string(),
            PROP_NOISE_LEVEL => self.settings.noise_level.to_string(),
            PROP_DYN_CORR_EXCL => self.settings.theiler_window.to_string(),
            PROP_AUTO_EMBED_METHOD => self.settings.auto_embed.as_str().to_string(),
            PROP_K_SEARCH_MAX => self.settings.k_search_max.to_string(),
            PROP_TAU_SEARCH_MAX => self.settings.tau_search_max.to_string(),
            PROP_RAGWITZ_NUM_NNS => self.settings.ragwitz_neighbours().to_string(),
            PROP_SEED => self.settings.seed.to_string(),
            K_PROP_NAME => self.params.k.to_string(),
            K_TAU_PROP_NAME => self.params.k_tau.to_string(),
            L_PROP_NAME => self.params.l.to_string(),
            L_TAU_PROP_NAME => self.params.l_tau.to_string(),
            DELAY_PROP_NAME => self.params.delay.to_string(),
            _ => return Err(Error::UnknownProperty(name.to_string())),
        };
        Ok(value)
    }

    fn initialise(&mut self, embedding: Embedding) -> Result<()> {
        match embedding {
            Embedding::Fixed(params) => {
                params.validate()?;
                self.params = params;
                self.auto = false;
            }
            Embedding::Auto => self.auto = true,
        }
        self.initialised = true;
        self.observations = None;
        Ok(())
    }

    fn set_observations(&mut self, source: &[f64], destination: &[f64]) -> Result<()> {
        if !self.initialised {
            return Err(Error::NotReady("initialise"));
        }
        if source.len() != destination.len() {
            return Err(Error::LengthMismatch {
                source_len: source.len(),
                destination_len: destination.len(),
            });
        }
        if self.auto {
            self.search_embedding(source, destination)?;
        }

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let source = self.prepare(source, &mut rng);
        let destination = self.prepare(destination, &mut rng);

        let first = self.params.first_index()?;
        let required = first
            .checked_add(self.settings.k)
            .and_then(|r| r.checked_add(1))
            .ok_or_else(|| {
                Error::invalid(
                    PROP_K,
                    format!("{} neighbours after index {} exceed any series length", self.settings.k, first),
                )
            })?;
        let obs = embed(&source, &destination, &self.params)
            .filter(|o| o.len() > self.settings.k)
            .ok_or(Error::InsufficientData {
                required,
                available: destination.len(),
            })?;
        debug!(
            observations = obs.len(),
            k = self.params.k,
            l = self.params.l,
            "observations embedded"
        );
        self.observations = Some(obs);
        Ok(())
    }

    fn compute_average_local_of_observations(&mut self) -> Result<f64> {
        let locals = self.compute_local_of_observations()?;
        Ok(mean(&locals))
    }

    fn compute_significance(&mut self, num_surrogates: usize) -> Result<NullDistribution> {
        let obs = self
            .observations
            .as_ref()
            .ok_or(Error::NotReady("set_observations"))?;
        let n = obs.len();
        let k = self.settings.k;
        let window = self.settings.theiler_window;

        let spaces = ConditionalSpaces::new(&obs.source_past, &obs.dest_next, &obs.dest_past);
        let actual = mean(&local_values(&spaces, k, window)?);
        let mut rng = StdRng::seed_from_u64(self.settings.seed.wrapping_add(1));
        let mut surrogates = Vec::with_capacity(num_surrogates);
        for _ in 0..num_surrogates {
            let mut order: Vec<usize> = (0..n).collect();
            order.shuffle(&mut rng);
            let shuffled = spaces.with_first(&obs.source_past.reordered(&order));
            surrogates.push(mean(&local_values(&shuffled, k, window)?));
        }
        debug!(num_surrogates, actual, "null distribution computed");
        Ok(NullDistribution::new(actual, surrogates))
    }
}
