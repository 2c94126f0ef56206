//! Daemon settings
//!
//! Optional TOML file layered under `FIELDOPS_*` environment variables.
//! Nested keys use `__`, e.g. `FIELDOPS_ENGINE__SCORING__RATING_WEIGHT=0.2`.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use fieldops_core::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "FIELDOPS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.fieldops/dispatch.toml";
const DEFAULT_DB_PATH: &str = "~/.fieldops/dispatch.db";
const ENV_PREFIX: &str = "FIELDOPS";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub rpc_host: String,
    pub rpc_port: u16,

    /// Distance-matrix endpoint; without it every distance is a fallback estimate
    pub mapping_base_url: Option<String>,
    pub mapping_api_key: Option<String>,

    /// Lifecycle events are POSTed here; logged only when unset
    pub webhook_url: Option<String>,
    pub webhook_timeout_ms: u64,

    pub cache_purge_interval_secs: u64,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,

    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 9650,
            mapping_base_url: None,
            mapping_api_key: None,
            webhook_url: None,
            webhook_timeout_ms: 3000,
            cache_purge_interval_secs: 3600,
            rate_limit_burst: 200,
            rate_limit_per_sec: 100,
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    /// Load from `$FIELDOPS_CONFIG` (or the default path) plus the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&shellexpand::tilde(&path))
    }

    /// A missing file is fine; a malformed one is not.
    pub fn load_from(path: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(PathBuf::from(path)).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings
            .engine
            .validate()
            .context("Invalid engine configuration")?;
        Ok(settings)
    }

    pub fn database_url(&self) -> String {
        if self.db_path.contains(":memory:") {
            return "sqlite::memory:".to_string();
        }
        format!("sqlite://{}", shellexpand::tilde(&self.db_path))
    }

    /// Directory that must exist before SQLite can create the file
    pub fn database_dir(&self) -> Option<PathBuf> {
        if self.db_path.contains(":memory:") {
            return None;
        }
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
    }

    pub fn cache_purge_interval(&self) -> Duration {
        Duration::from_secs(self.cache_purge_interval_secs.max(1))
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }
}
