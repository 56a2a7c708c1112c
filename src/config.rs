// src/config.rs
//! Environment-driven settings.
//!
//! - `TAXONOMY_CONFIG_PATH`: TOML taxonomy overriding the built-in table
//! - `CLASSIFIER_DEV_LOG=1`: anonymized per-request logs (dev env only)
//! - `METRICS_ENABLED=1`: mount `/metrics`
//!
//! Binaries call `dotenvy::dotenv()` first so a local `.env` can set these.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use crate::taxonomy::Taxonomy;

pub const ENV_TAXONOMY_CONFIG_PATH: &str = "TAXONOMY_CONFIG_PATH";
pub const ENV_DEV_LOG: &str = "CLASSIFIER_DEV_LOG";
pub const ENV_METRICS_ENABLED: &str = "METRICS_ENABLED";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub taxonomy_path: Option<PathBuf>,
    pub dev_log: bool,
    pub metrics_enabled: bool,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            taxonomy_path: std::env::var(ENV_TAXONOMY_CONFIG_PATH)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            dev_log: dev_logging_enabled(),
            metrics_enabled: env_flag(ENV_METRICS_ENABLED),
        }
    }

    /// Taxonomy from `taxonomy_path`, or the built-in table when unset.
    /// A configured path that is missing or invalid is an error, never a
    /// silent fallback.
    pub fn taxonomy(&self) -> Result<Taxonomy> {
        match &self.taxonomy_path {
            Some(p) if !p.exists() => Err(anyhow!(
                "{ENV_TAXONOMY_CONFIG_PATH} points to non-existent path {}",
                p.display()
            )),
            Some(p) => Taxonomy::from_path(p),
            None => Taxonomy::builtin(),
        }
    }
}

/// Shorthand for `Settings::from_env().taxonomy()`.
pub fn load_taxonomy() -> Result<Taxonomy> {
    Settings::from_env().taxonomy()
}

fn env_flag(name: &str) -> bool {
    matches!(
        std::env::var(name)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Dev logging gate: CLASSIFIER_DEV_LOG=1 AND dev env
/// (debug build or SHUTTLE_ENV in {local, development, dev}).
pub fn dev_logging_enabled() -> bool {
    if std::env::var(ENV_DEV_LOG).ok().as_deref() != Some("1") {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}
