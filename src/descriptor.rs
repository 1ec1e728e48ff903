//! Repository descriptors consumed by the cache registry.
//!
//! The registry only needs to know which repositories exist and, for remote
//! repositories, how their caches are tuned. Descriptors are plain serde
//! types so they can be read from TOML or JSON:
//!
//! ```toml
//! local_repositories = ["libs-release", "libs-snapshot"]
//! virtual_repositories = ["all"]
//!
//! [[remote_repositories]]
//! key = "central"
//! retrieval_cache_period_secs = 43200
//! missed_retrieval_cache_period_secs = 600
//!
//! [remote_repositories.caches.folder_listings]
//! idle_time_secs = 60
//! max_size = 5000
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheKind, CacheTunables};
use crate::{RepoCacheError, Result};

/// Key of the synthetic virtual repository that aggregates every repository.
pub const GLOBAL_VIRTUAL_REPO_KEY: &str = "repo";

/// Suffix appended to a remote repository key to name its local cache.
pub const LOCAL_CACHE_SUFFIX: &str = "-cache";

/// Key of the local cache partition of remote repository `remote_key`.
pub fn local_cache_key(remote_key: &str) -> String {
    format!("{remote_key}{LOCAL_CACHE_SUFFIX}")
}

/// The set of configured repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoriesDescriptor {
    #[serde(default)]
    pub local_repositories: Vec<String>,
    #[serde(default)]
    pub remote_repositories: Vec<RemoteRepoDescriptor>,
    #[serde(default)]
    pub virtual_repositories: Vec<String>,
}

impl RepositoriesDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(mut self, key: impl Into<String>) -> Self {
        self.local_repositories.push(key.into());
        self
    }

    pub fn remote(mut self, remote: RemoteRepoDescriptor) -> Self {
        self.remote_repositories.push(remote);
        self
    }

    pub fn virtual_repo(mut self, key: impl Into<String>) -> Self {
        self.virtual_repositories.push(key.into());
        self
    }

    /// Number of configured repositories (not counting the global virtual
    /// repository).
    pub fn len(&self) -> usize {
        self.local_repositories.len()
            + self.remote_repositories.len()
            + self.virtual_repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remote_by_key(&self, key: &str) -> Option<&RemoteRepoDescriptor> {
        self.remote_repositories.iter().find(|r| r.key == key)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RepoCacheError::Configuration(format!("invalid descriptor: {e}")))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a descriptor file; `.json` files are parsed as JSON, anything
    /// else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to read descriptor {path:?}: {e}"))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }
}

/// A remote (proxying) repository and the tunables of its caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepoDescriptor {
    pub key: String,
    /// Freshness window of locally cached artifacts.
    #[serde(default = "default_retrieval_cache_period")]
    pub retrieval_cache_period_secs: u64,
    /// How long a "not found" answer from the remote is remembered.
    #[serde(default = "default_missed_retrieval_cache_period")]
    pub missed_retrieval_cache_period_secs: u64,
    /// How long a failed retrieval is remembered.
    #[serde(default = "default_failed_retrieval_cache_period")]
    pub failed_retrieval_cache_period_secs: u64,
    /// Max entries for each remote cache. Zero means unbounded.
    #[serde(default)]
    pub max_cached_entries: u64,
    /// Explicit per-kind overrides; these win over the fields above.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub caches: BTreeMap<CacheKind, CacheTunables>,
}

fn default_retrieval_cache_period() -> u64 {
    7200
}

fn default_missed_retrieval_cache_period() -> u64 {
    7200
}

fn default_failed_retrieval_cache_period() -> u64 {
    30
}

impl RemoteRepoDescriptor {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            retrieval_cache_period_secs: default_retrieval_cache_period(),
            missed_retrieval_cache_period_secs: default_missed_retrieval_cache_period(),
            failed_retrieval_cache_period_secs: default_failed_retrieval_cache_period(),
            max_cached_entries: 0,
            caches: BTreeMap::new(),
        }
    }

    pub fn retrieval_cache_period(&self) -> Duration {
        Duration::from_secs(self.retrieval_cache_period_secs)
    }

    pub fn with_retrieval_cache_period(mut self, period: Duration) -> Self {
        self.retrieval_cache_period_secs = period.as_secs();
        self
    }

    pub fn with_missed_retrieval_cache_period(mut self, period: Duration) -> Self {
        self.missed_retrieval_cache_period_secs = period.as_secs();
        self
    }

    pub fn with_max_cached_entries(mut self, max: u64) -> Self {
        self.max_cached_entries = max;
        self
    }

    pub fn with_cache(mut self, kind: CacheKind, tunables: CacheTunables) -> Self {
        self.caches.insert(kind, tunables);
        self
    }

    /// Tunables this repository imposes on `kind`: idle time from the
    /// matching retrieval period and max size from `max_cached_entries`,
    /// then any explicit override from `caches`.
    pub fn tunables(&self, kind: CacheKind) -> CacheTunables {
        let idle_time_secs = match kind {
            CacheKind::MissedRetrievals => Some(self.missed_retrieval_cache_period_secs),
            CacheKind::FailedRetrievals => Some(self.failed_retrieval_cache_period_secs),
            CacheKind::FolderListings => Some(self.retrieval_cache_period_secs),
            _ => None,
        };
        let derived = CacheTunables {
            idle_time_secs,
            max_size: Some(self.max_cached_entries),
            ..Default::default()
        };
        match self.caches.get(&kind) {
            Some(explicit) => CacheTunables {
                idle_time_secs: explicit.idle_time_secs.or(derived.idle_time_secs),
                max_size: explicit.max_size.or(derived.max_size),
                ..explicit.clone()
            },
            None => derived,
        }
    }
}

/// Source of the current repository configuration.
pub trait DescriptorProvider: Send + Sync {
    fn repositories(&self) -> RepositoriesDescriptor;
}

impl DescriptorProvider for RepositoriesDescriptor {
    fn repositories(&self) -> RepositoriesDescriptor {
        self.clone()
    }
}

/// A mutable descriptor, for configurations that change at runtime.
impl DescriptorProvider for RwLock<RepositoriesDescriptor> {
    fn repositories(&self) -> RepositoriesDescriptor {
        self.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_kinds_take_idle_time_from_periods() {
        let remote = RemoteRepoDescriptor::new("central")
            .with_missed_retrieval_cache_period(Duration::from_secs(60))
            .with_max_cached_entries(10);

        let missed = remote.tunables(CacheKind::MissedRetrievals);
        assert_eq!(missed.idle_time_secs, Some(60));
        assert_eq!(missed.max_size, Some(10));

        let failed = remote.tunables(CacheKind::FailedRetrievals);
        assert_eq!(failed.idle_time_secs, Some(30));
    }

    #[test]
    fn explicit_cache_override_wins() {
        let remote = RemoteRepoDescriptor::new("central").with_cache(
            CacheKind::FolderListings,
            CacheTunables {
                idle_time_secs: Some(5),
                ..Default::default()
            },
        );
        let tunables = remote.tunables(CacheKind::FolderListings);
        assert_eq!(tunables.idle_time_secs, Some(5));
        assert_eq!(tunables.max_size, Some(0));
    }

    #[test]
    fn local_cache_key_appends_suffix() {
        assert_eq!(local_cache_key("central"), "central-cache");
    }
}
