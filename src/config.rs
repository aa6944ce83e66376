//! Store configuration

use crate::error::{Error, Result};
use crate::storage::kv::TrickleConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "STATSTORE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Environment directory holding every table
    pub db_path: PathBuf,
    /// Dataset name, used for log file names
    pub db_name: String,
    /// Ids reserved per sequence round trip
    pub seq_cache_size: u32,
    /// Run the background dirty-page writer
    pub trickle: bool,
    /// Share of dirty pages written per trickle pass, in percent
    pub trickle_rate: u32,
    pub trickle_busy_wait_ms: u64,
    pub trickle_idle_wait_ms: u64,
    pub readonly: bool,
    /// fsync table logs after every trickle pass that wrote pages
    pub sync_on_write: bool,
    /// Cache byte budget; 0 means unlimited
    pub swap_budget: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./statstore_data"),
            db_name: "webalizer".to_string(),
            seq_cache_size: 100,
            trickle: true,
            trickle_rate: 10,
            trickle_busy_wait_ms: 1000,
            trickle_idle_wait_ms: 5000,
            readonly: false,
            sync_on_write: false,
            swap_budget: 0,
        }
    }
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    /// Load a TOML file (optional) with `STATSTORE_*` variables on top
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let store: StoreConfig = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;
        store.validate()?;
        info!(path = ?path, db_path = ?store.db_path, "Loaded store configuration");
        Ok(store)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let store: StoreConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        store.validate()?;
        Ok(store)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(Error::Config("db_path must not be empty".into()));
        }
        if self.trickle_rate == 0 || self.trickle_rate > 100 {
            return Err(Error::Config(format!(
                "trickle_rate must be within 1..=100, got {}",
                self.trickle_rate
            )));
        }
        if self.seq_cache_size == 0 {
            return Err(Error::Config("seq_cache_size must be positive".into()));
        }
        Ok(())
    }

    pub fn trickle_config(&self) -> TrickleConfig {
        TrickleConfig {
            rate: self.trickle_rate,
            busy_wait: Duration::from_millis(self.trickle_busy_wait_ms),
            idle_wait: Duration::from_millis(self.trickle_idle_wait_ms),
            sync: self.sync_on_write,
        }
    }

    /// Byte budget for cache eviction, if any
    pub fn swap_budget(&self) -> Option<u64> {
        (self.swap_budget > 0).then_some(self.swap_budget)
    }
}
