//! Tuner configuration
//!
//! Provides process-wide tuning defaults loaded from a TOML file, the same
//! loading order the teacher's `WellConfig` uses:
//!
//! 1. `TUNER_CONFIG` environment variable (path to TOML file)
//! 2. `tuner_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ```ignore
//! config::init(TunerConfig::load());
//! let w = config::get().default_weights.clone();
//! ```
//!
//! The config is held behind an `ArcSwap` so it can be hot-reloaded (e.g. by
//! a file watcher) without callers re-reading a lock on every access.

pub mod defaults;

use std::sync::OnceLock;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::types::objective::Weights;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    pub default_iterations: u32,
    pub default_interval: String,
    pub default_settle_time: String,
    pub replay_complete_timeout_secs: u64,
    pub label_poll_secs: u64,
    pub min_label_threshold: f64,
    pub default_weights: Weights,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            default_iterations: defaults::DEFAULT_ITERATIONS,
            default_interval: "1s".to_string(),
            default_settle_time: "2s".to_string(),
            replay_complete_timeout_secs: defaults::REPLAY_COMPLETE_TIMEOUT_SECS,
            label_poll_secs: defaults::DEFAULT_LABEL_POLL_SECS,
            min_label_threshold: defaults::DEFAULT_MIN_LABEL_THRESHOLD,
            default_weights: Weights::default(),
        }
    }
}

impl TunerConfig {
    /// Load per the documented precedence, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = std::env::var("TUNER_CONFIG").unwrap_or_else(|_| "tuner_config.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to parse tuner config, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

static TUNER_CONFIG: OnceLock<ArcSwap<TunerConfig>> = OnceLock::new();

/// Initialize the global tuner configuration. Safe to call more than once;
/// subsequent calls replace the current config (used for hot reload).
pub fn init(config: TunerConfig) {
    match TUNER_CONFIG.get() {
        Some(slot) => slot.store(std::sync::Arc::new(config)),
        None => {
            let _ = TUNER_CONFIG.set(ArcSwap::from_pointee(config));
        }
    }
}

/// Get a snapshot of the current tuner configuration.
///
/// Falls back to `TunerConfig::default()` if `init()` was never called —
/// unlike the teacher's `WellConfig::get()`, a missing tuner config is not a
/// fatal startup error since every field has a sane built-in value.
pub fn get() -> std::sync::Arc<TunerConfig> {
    match TUNER_CONFIG.get() {
        Some(slot) => slot.load_full(),
        None => std::sync::Arc::new(TunerConfig::default()),
    }
}

pub fn is_initialized() -> bool {
    TUNER_CONFIG.get().is_some()
}
