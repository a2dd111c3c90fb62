// src/config.rs
//! Startup configuration: defaults, then an optional TOML file, then env vars.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::cache::DEFAULT_TTL_SECS;
use crate::sources::document_store::DEFAULT_EXCLUDED_DATABASES;

// --- env names ---
pub const ENV_SQLITE_SERVICE: &str = "SQLITE_SERVICE";
pub const ENV_MONGODB_URI: &str = "MONGODB_URI";
pub const ENV_MONGODB_DB: &str = "MONGODB_DB";
pub const ENV_CACHE_TTL_SECS: &str = "STATS_CACHE_TTL_SECS";
pub const ENV_MONGODB_CONNECT_TIMEOUT_MS: &str = "MONGODB_CONNECT_TIMEOUT_MS";
pub const ENV_SQLITE_TIMEOUT_MS: &str = "SQLITE_SERVICE_TIMEOUT_MS";
pub const ENV_MONGODB_EXCLUDED_DBS: &str = "MONGODB_EXCLUDED_DBS";
pub const ENV_CONFIG_PATH: &str = "STATS_CONFIG_PATH";

// --- defaults ---
pub const DEFAULT_SQLITE_SERVICE: &str = "http://sqlite-service:8080";
pub const DEFAULT_MONGODB_URI: &str = "mongodb://mongodb-service:27017/";
pub const DEFAULT_MONGODB_DB: &str = "admin";
pub const DEFAULT_MONGODB_CONNECT_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_SQLITE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub sqlite_service: String,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub cache_ttl_secs: u64,
    pub mongodb_connect_timeout_ms: u64,
    pub sqlite_timeout_ms: u64,
    pub mongodb_excluded_dbs: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            sqlite_service: DEFAULT_SQLITE_SERVICE.to_string(),
            mongodb_uri: DEFAULT_MONGODB_URI.to_string(),
            mongodb_db: DEFAULT_MONGODB_DB.to_string(),
            cache_ttl_secs: DEFAULT_TTL_SECS,
            mongodb_connect_timeout_ms: DEFAULT_MONGODB_CONNECT_TIMEOUT_MS,
            sqlite_timeout_ms: DEFAULT_SQLITE_TIMEOUT_MS,
            mongodb_excluded_dbs: DEFAULT_EXCLUDED_DATABASES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AggregatorConfig {
    /// Defaults, overlaid by `$STATS_CONFIG_PATH` (if set), overlaid by env vars.
    pub fn load() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::from_toml_file(Path::new(&p))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading stats config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing stats config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_string(ENV_SQLITE_SERVICE) {
            self.sqlite_service = v;
        }
        if let Some(v) = env_string(ENV_MONGODB_URI) {
            self.mongodb_uri = v;
        }
        if let Some(v) = env_string(ENV_MONGODB_DB) {
            self.mongodb_db = v;
        }
        if let Some(v) = env_u64(ENV_CACHE_TTL_SECS) {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_u64(ENV_MONGODB_CONNECT_TIMEOUT_MS) {
            self.mongodb_connect_timeout_ms = v;
        }
        if let Some(v) = env_u64(ENV_SQLITE_TIMEOUT_MS) {
            self.sqlite_timeout_ms = v;
        }
        if let Some(v) = env_string(ENV_MONGODB_EXCLUDED_DBS) {
            self.mongodb_excluded_dbs = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn mongodb_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.mongodb_connect_timeout_ms)
    }

    pub fn sqlite_timeout(&self) -> Duration {
        Duration::from_millis(self.sqlite_timeout_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Unparsable numbers keep the previous value.
fn env_u64(name: &str) -> Option<u64> {
    let raw = env_string(name)?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(var = name, value = %raw, error = %e, "ignoring invalid numeric env value");
            None
        }
    }
}
