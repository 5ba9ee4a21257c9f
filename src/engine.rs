//! Estimation engine handle.
//!
//! An [`Engine`] is created once and passed to every estimation call. It owns
//! the worker pool used for neighbour searches (with the `parallel` feature)
//! and the estimator defaults. Startup is a single blocking call bounded by
//! [`EngineConfig::startup_timeout`].

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::estimator::KraskovTransferEntropy;
use std::path::Path;
use tracing::debug;

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl Engine {
    /// Start an engine and wait until its workers are ready.
    ///
    /// Fails with [`Error::EngineStartup`] if the pool cannot be built or does
    /// not report ready within the configured timeout.
    pub fn start(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        {
            use std::sync::mpsc;

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .thread_name(|i| format!("infoflow-worker-{}", i))
                .build()
                .map_err(|e| Error::EngineStartup(e.to_string()))?;

            let (ready_tx, ready_rx) = mpsc::channel();
            pool.spawn(move || {
                let _ = ready_tx.send(rayon::current_num_threads());
            });
            let workers = ready_rx
                .recv_timeout(config.startup_timeout())
                .map_err(|_| {
                    Error::EngineStartup(format!(
                        "workers not ready after {} ms",
                        config.startup_timeout_ms
                    ))
                })?;
            debug!(workers, "engine started");
            Ok(Self { config, pool })
        }

        #[cfg(not(feature = "parallel"))]
        {
            debug!("engine started (sequential)");
            Ok(Self { config })
        }
    }

    /// Resolve the settings file (explicit path, else `$JIDT_PATH`), load it
    /// and start the engine.
    pub fn locate(location: Option<&Path>) -> Result<Self> {
        Self::start(EngineConfig::locate(location)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Worker threads available to estimations.
    pub fn workers(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            self.pool.current_num_threads()
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }

    /// Fresh KSG estimator carrying the engine's defaults.
    pub fn new_estimator(&self) -> KraskovTransferEntropy {
        KraskovTransferEntropy::with_settings(self.config.estimator.clone())
    }

    /// Run `f` with the engine's workers; parallel iteration inside `f` uses
    /// this pool. Blocks until `f` returns.
    pub fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        #[cfg(feature = "parallel")]
        {
            self.pool.install(f)
        }
        #[cfg(not(feature = "parallel"))]
        {
            f()
        }
    }
}
