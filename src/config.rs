//! Cache settings.
//!
//! Settings are loaded from TOML with the following resolution order:
//! 1. explicit path (e.g. `--config <path>`)
//! 2. `~/.repocache/config.toml` (user)
//! 3. `/etc/repocache/config.toml` (system)
//!
//! An explicit path that does not exist is an error; when no file is found
//! in the default locations the built-in defaults apply.
//!
//! ```toml
//! [caches.item_info]
//! idle_time_secs = 600
//! max_size = 50000
//!
//! [caches.locks]
//! ownership = "strong"
//!
//! [sweeper]
//! enabled = true
//! interval_secs = 30
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheDefinition, CacheKind, CacheTunables};
use crate::{RepoCacheError, Result};

/// Process-wide cache settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Per-kind overrides of the built-in definitions.
    #[serde(default)]
    pub caches: BTreeMap<CacheKind, CacheTunables>,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

/// Background sweep of reclaimed entries.
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Whether the background sweeper runs (default: false).
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between sweeps (default: 60).
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl CacheSettings {
    /// Load settings from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RepoCacheError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(RepoCacheError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".repocache").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/repocache/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Definition for `kind`: the built-in default with this file's
    /// override applied.
    pub fn definition_for(&self, kind: CacheKind) -> CacheDefinition {
        let base = kind.default_definition();
        match self.caches.get(&kind) {
            Some(tunables) => tunables.apply(base),
            None => base,
        }
    }

    pub fn with_override(mut self, kind: CacheKind, tunables: CacheTunables) -> Self {
        self.caches.insert(kind, tunables);
        self
    }
}
