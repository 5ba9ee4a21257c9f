//! Engine and estimator configuration.
//!
//! Settings are plain serde structs so they can be built in code or loaded
//! from a JSON settings file. The file is located either explicitly or via the
//! [`ENGINE_PATH_ENV`] environment variable, which names the directory holding
//! [`ENGINE_SETTINGS_FILE`].

use crate::embedding::AutoEmbedMethod;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable consulted when no engine location is passed.
pub const ENGINE_PATH_ENV: &str = "JIDT_PATH";

/// Settings file name looked up inside the [`ENGINE_PATH_ENV`] directory.
pub const ENGINE_SETTINGS_FILE: &str = "infodynamics.json";

/// Defaults applied to every KSG estimator created by an engine.
///
/// Field names mirror the string properties accepted by
/// [`crate::estimator::ContinuousTransferEntropyEstimator::set_property`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KraskovSettings {
    /// Number of nearest neighbours in the joint space (`k`).
    #[serde(default = "KraskovSettings::default_k")]
    pub k: usize,
    /// Standardise each series before embedding (`NORMALISE`).
    #[serde(default = "KraskovSettings::default_normalise")]
    pub normalise: bool,
    /// Standard deviation of Gaussian noise added after normalisation (`NOISE_LEVEL_TO_ADD`).
    #[serde(default = "KraskovSettings::default_noise_level")]
    pub noise_level: f64,
    /// Dynamic correlation exclusion window in samples (`DYN_CORR_EXCL`).
    #[serde(default)]
    pub theiler_window: usize,
    /// Embedding search method (`AUTO_EMBED_METHOD`).
    #[serde(default)]
    pub auto_embed: AutoEmbedMethod,
    /// Largest history length tried by the search (`AUTO_EMBED_K_SEARCH_MAX`).
    #[serde(default = "KraskovSettings::default_search_max")]
    pub k_search_max: usize,
    /// Largest embedding delay tried by the search (`AUTO_EMBED_TAU_SEARCH_MAX`).
    #[serde(default = "KraskovSettings::default_search_max")]
    pub tau_search_max: usize,
    /// Neighbours used by the Ragwitz predictor; `None` reuses `k`.
    #[serde(default)]
    pub ragwitz_num_nns: Option<usize>,
    /// Seed for noise and surrogate generation (`SEED`).
    #[serde(default = "KraskovSettings::default_seed")]
    pub seed: u64,
}

impl KraskovSettings {
    fn default_k() -> usize {
        4
    }
    fn default_normalise() -> bool {
        true
    }
    fn default_noise_level() -> f64 {
        1e-8
    }
    fn default_search_max() -> usize {
        1
    }
    fn default_seed() -> u64 {
        42
    }

    /// Neighbour count used for Ragwitz prediction.
    pub fn ragwitz_neighbours(&self) -> usize {
        self.ragwitz_num_nns.unwrap_or(self.k)
    }

    /// Check ranges that the serde layer cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::invalid("k", "must be at least 1"));
        }
        if !self.noise_level.is_finite() || self.noise_level < 0.0 {
            return Err(Error::invalid(
                "NOISE_LEVEL_TO_ADD",
                format!("must be a finite non-negative number, got {}", self.noise_level),
            ));
        }
        if self.k_search_max == 0 {
            return Err(Error::invalid("AUTO_EMBED_K_SEARCH_MAX", "must be at least 1"));
        }
        if self.tau_search_max == 0 {
            return Err(Error::invalid("AUTO_EMBED_TAU_SEARCH_MAX", "must be at least 1"));
        }
        if self.ragwitz_num_nns == Some(0) {
            return Err(Error::invalid("AUTO_EMBED_RAGWITZ_NUM_NNS", "must be at least 1"));
        }
        Ok(())
    }
}

impl Default for KraskovSettings {
    fn default() -> Self {
        Self {
            k: Self::default_k(),
            normalise: Self::default_normalise(),
            noise_level: Self::default_noise_level(),
            theiler_window: 0,
            auto_embed: AutoEmbedMethod::default(),
            k_search_max: Self::default_search_max(),
            tau_search_max: Self::default_search_max(),
            ragwitz_num_nns: None,
            seed: Self::default_seed(),
        }
    }
}

/// Settings for [`crate::engine::Engine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker threads for neighbour searches; 0 lets rayon decide.
    #[serde(default)]
    pub threads: usize,
    /// Upper bound on engine startup.
    #[serde(default = "EngineConfig::default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
    /// Defaults for estimators created by the engine.
    #[serde(default)]
    pub estimator: KraskovSettings,
}

impl EngineConfig {
    fn default_startup_timeout_ms() -> u64 {
        10_000
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.startup_timeout_ms == 0 {
            return Err(Error::Config(
                "startup_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.estimator.validate()
    }

    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read engine settings {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&text)
    }

    /// Resolve the settings file location.
    ///
    /// An explicit location wins; otherwise `$JIDT_PATH/infodynamics.json`.
    /// Fails with [`Error::Config`] if neither is available.
    pub fn resolve_location(explicit: Option<&Path>) -> Result<PathBuf> {
        resolve_location_from(explicit, std::env::var_os(ENGINE_PATH_ENV))
    }

    /// Resolve the location and load the settings found there.
    ///
    /// A resolved path that is not a file is an [`Error::Config`].
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_location(explicit)?;
        if !path.is_file() {
            return Err(Error::Config(format!(
                "engine settings not found at {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "loading engine settings");
        Self::from_file(&path)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            startup_timeout_ms: Self::default_startup_timeout_ms(),
            estimator: KraskovSettings::default(),
        }
    }
}

fn resolve_location_from(explicit: Option<&Path>, env_dir: Option<OsString>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    match env_dir {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir).join(ENGINE_SETTINGS_FILE)),
        _ => Err(Error::Config(format!(
            "must either pass an engine location or set the {} environment variable \
             to the directory containing {}",
            ENGINE_PATH_ENV, ENGINE_SETTINGS_FILE
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.estimator.k, 4);
        assert_eq!(config.estimator.ragwitz_neighbours(), 4);
        assert_eq!(config.startup_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "threads": 2, "estimator": { "k": 6, "auto_embed": "RAGWITZ" } }"#,
        )
        .unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.estimator.k, 6);
        assert_eq!(config.estimator.auto_embed, AutoEmbedMethod::Ragwitz);
        assert!(config.estimator.normalise);
        assert_eq!(config.startup_timeout_ms, 10_000);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_json(r#"{ "jar": "infodynamics.jar" }"#).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "startup_timeout_ms": 0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "estimator": { "k": 0 } }"#),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_explicit_location_wins() {
        let path = resolve_location_from(
            Some(Path::new("/opt/engine.json")),
            Some(OsString::from("/ignored")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/opt/engine.json"));
    }

    #[test]
    fn test_location_from_environment() {
        let path = resolve_location_from(None, Some(OsString::from("/opt/jidt"))).unwrap();
        assert_eq!(path, PathBuf::from("/opt/jidt").join(ENGINE_SETTINGS_FILE));
    }

    #[test]
    fn test_missing_location_is_config_error() {
        assert!(matches!(
            resolve_location_from(None, None),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            resolve_location_from(None, Some(OsString::new())),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("infoflow-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(ENGINE_SETTINGS_FILE);
        fs::write(&path, r#"{ "estimator": { "theiler_window": 3 } }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.estimator.theiler_window, 3);

        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_locate_loads_file_or_reports_missing() {
        let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(ENGINE_SETTINGS_FILE);
        let config = EngineConfig::locate(Some(&fixture)).unwrap();
        assert_eq!(config.threads, 2);
        assert_eq!(config.estimator.seed, 7);

        // a directory resolves but is not a settings file
        let dir = fixture.parent().unwrap();
        let err = EngineConfig::locate(Some(dir)).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("not found")));
    }
}
