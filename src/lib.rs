//! # infoflow
//!
//! Directed information flow between time series.
//!
//! This crate provides pure Rust implementations of:
//! - Transfer entropy estimation with the Kraskov-Grassberger-Stögbauer (KSG)
//!   nearest-neighbour estimator, in both directions, for several neighbour counts
//! - Automatic embedding search (Ragwitz criterion) for history length and delay
//! - Surrogate-based null distributions for significance testing
//! - Zero-phase Butterworth band-pass filtering, decimation and per-band extraction
//! - Directed TE graphs rendered as Graphviz DOT
//!
//! ## Workflow
//!
//! ```no_run
//! use infoflow::{compute_te, extract_freqs, Band, Engine, EngineConfig, ExtractOptions, TeOptions};
//!
//! # fn main() -> infoflow::Result<()> {
//! let engine = Engine::start(EngineConfig::default())?;
//! let raw: Vec<f64> = (0..2000).map(|i| (i as f64 * 0.05).sin()).collect();
//! let bands = [Band::new(1.0, 4.0), Band::new(8.0, 12.0)];
//! let extracted = extract_freqs(&raw, &bands, 100.0, &ExtractOptions::default())?;
//! let te = compute_te(
//!     &engine,
//!     &extracted.signals[0],
//!     &extracted.signals[1],
//!     &TeOptions::default(),
//! )?;
//! println!("{:?}", te.x_to_y);
//! # Ok(())
//! # }
//! ```

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod config;
pub mod driver;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod estimator;
pub mod filtfilt;
pub mod graph;
pub mod helpers;
pub mod iir;
pub mod knn;
pub mod preprocess;
pub mod significance;
pub mod simulation;

pub use config::{EngineConfig, KraskovSettings, ENGINE_PATH_ENV, ENGINE_SETTINGS_FILE};
pub use driver::{compute_te, compute_te_with, SignificanceSummary, TeOptions, TeResults};
pub use embedding::{AutoEmbedMethod, EmbeddingParams};
pub use engine::Engine;
pub use error::{Error, Result};
pub use estimator::{ContinuousTransferEntropyEstimator, Embedding, KraskovTransferEntropy};
pub use graph::{build_te_graph, graph_te, TeEdge, TeGraph};
pub use helpers::NUMERICAL_EPS;
pub use preprocess::{decimate, extract_freqs, filt, Band, BandExtraction, ExtractOptions};
pub use significance::NullDistribution;
