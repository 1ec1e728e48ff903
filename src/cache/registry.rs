//! Global caches plus per-repository cache partitions.
//!
//! The registry reads the repository set from a [`DescriptorProvider`] and
//! builds:
//!
//! - one cache per [`CacheScope::Global`] kind;
//! - for each local repository, a partition of [`CacheScope::StoringRepo`]
//!   kinds;
//! - for each remote repository, a storing partition under
//!   `<key>-cache` (its local disk cache) and a partition under the bare key
//!   holding the [`CacheScope::RemoteRepo`] kinds, tuned by that remote's
//!   descriptor. The bare-key partition also exposes the storing kinds of
//!   the `-cache` partition, so `("central", ItemInfo)` and
//!   `("central-cache", ItemInfo)` resolve to the same cache;
//! - for each virtual repository and for [`GLOBAL_VIRTUAL_REPO_KEY`], a
//!   storing partition.
//!
//! The structure is immutable once built and published behind an
//! `RwLock<Arc<_>>`: lookups see either the old or the new structure, never a
//! half-built one. [`reload`](CacheRegistry::reload) always clears and
//! rebuilds every partition.

use std::collections::{HashMap, hash_map};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::definition::{CacheKind, CacheScope};
use super::keyed::{AnyValue, KeyedCache};
use crate::config::CacheSettings;
use crate::descriptor::{
    DescriptorProvider, GLOBAL_VIRTUAL_REPO_KEY, RemoteRepoDescriptor, RepositoriesDescriptor,
    local_cache_key,
};
use crate::{RepoCacheError, Result, telemetry};

/// Cache type held by the registry.
pub type RegistryCache = KeyedCache<String, AnyValue>;

type Partition = HashMap<CacheKind, Arc<RegistryCache>>;

#[derive(Default)]
struct Partitions {
    globals: Partition,
    repos: HashMap<String, Partition>,
}

impl Partitions {
    fn all_caches(&self) -> impl Iterator<Item = &Arc<RegistryCache>> {
        self.globals
            .values()
            .chain(self.repos.values().flat_map(|p| p.values()))
    }
}

/// Owner of every cache in the process.
///
/// Construct once at startup, call [`init`](Self::init), and share by
/// `Arc`.
pub struct CacheRegistry {
    provider: Arc<dyn DescriptorProvider>,
    settings: CacheSettings,
    partitions: RwLock<Arc<Partitions>>,
    build_lock: Mutex<()>,
}

impl CacheRegistry {
    /// Create a registry with default settings. No caches exist until
    /// [`init`](Self::init) is called.
    pub fn new(provider: Arc<dyn DescriptorProvider>) -> Self {
        Self::with_settings(provider, CacheSettings::default())
    }

    pub fn with_settings(provider: Arc<dyn DescriptorProvider>, settings: CacheSettings) -> Self {
        Self {
            provider,
            settings,
            partitions: RwLock::new(Arc::new(Partitions::default())),
            build_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    fn current(&self) -> Result<Arc<Partitions>> {
        let partitions = self.partitions.read().map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(Arc::clone(&partitions))
    }

    fn publish(&self, partitions: Partitions) -> Result<()> {
        let mut current = self.partitions.write().map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to acquire write lock: {}", e))
        })?;
        *current = Arc::new(partitions);
        Ok(())
    }

    /// Build caches from the provider's current descriptor.
    ///
    /// Global caches that already exist are kept as they are; every
    /// repository partition is created anew. Two repositories resolving to
    /// the same key fail with [`RepoCacheError::Configuration`] and leave the
    /// current partitions in place.
    #[instrument(skip(self))]
    pub fn init(&self) -> Result<()> {
        let _guard = self.build_lock.lock().map_err(|e| {
            RepoCacheError::Configuration(format!("Failed to acquire build lock: {}", e))
        })?;
        let descriptor = self.provider.repositories();
        let current = self.current()?;

        let mut globals = Partition::new();
        for kind in CacheKind::in_scope(CacheScope::Global) {
            let cache = match current.globals.get(&kind) {
                Some(existing) => Arc::clone(existing),
                None => Arc::new(RegistryCache::new(
                    kind.name(),
                    self.settings.definition_for(kind),
                )),
            };
            globals.insert(kind, cache);
        }

        let repos = self.build_repo_partitions(&descriptor)?;
        let partition_count = repos.len();
        self.publish(Partitions { globals, repos })?;

        metrics::gauge!(telemetry::REGISTRY_PARTITIONS).set(partition_count as f64);
        info!(
            version = %crate::version_string(),
            repositories = descriptor.len(),
            partitions = partition_count,
            "cache registry initialised"
        );
        Ok(())
    }

    /// One partition per repository key. Fails when two repositories claim
    /// the same key, including a local `<key>-cache` next to remote `<key>`.
    fn build_repo_partitions(
        &self,
        descriptor: &RepositoriesDescriptor,
    ) -> Result<HashMap<String, Partition>> {
        let mut repos = HashMap::new();
        for key in &descriptor.local_repositories {
            add_partition(&mut repos, key.clone(), self.storing_partition(key))?;
        }
        for remote in &descriptor.remote_repositories {
            let cache_key = local_cache_key(&remote.key);
            let storing = self.storing_partition(&cache_key);
            let mut remote_partition = self.remote_partition(remote);
            for (kind, cache) in &storing {
                remote_partition.insert(*kind, Arc::clone(cache));
            }
            add_partition(&mut repos, cache_key, storing)?;
            add_partition(&mut repos, remote.key.clone(), remote_partition)?;
        }
        for key in descriptor
            .virtual_repositories
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(GLOBAL_VIRTUAL_REPO_KEY))
        {
            add_partition(&mut repos, key.to_string(), self.storing_partition(key))?;
        }
        Ok(repos)
    }

    fn storing_partition(&self, repo_key: &str) -> Partition {
        CacheKind::in_scope(CacheScope::StoringRepo)
            .map(|kind| {
                let cache = RegistryCache::new(
                    format!("{repo_key}/{kind}"),
                    self.settings.definition_for(kind),
                );
                (kind, Arc::new(cache))
            })
            .collect()
    }

    fn remote_partition(&self, remote: &RemoteRepoDescriptor) -> Partition {
        CacheKind::in_scope(CacheScope::RemoteRepo)
            .map(|kind| {
                let definition = remote
                    .tunables(kind)
                    .apply(self.settings.definition_for(kind));
                let cache = RegistryCache::new(format!("{}/{kind}", remote.key), definition);
                (kind, Arc::new(cache))
            })
            .collect()
    }

    /// Clear everything, then rebuild from the provider's current
    /// descriptor. `old` is the configuration being replaced.
    #[instrument(skip(self, old), fields(previous_repositories = old.len()))]
    pub fn reload(&self, old: &RepositoriesDescriptor) -> Result<()> {
        self.destroy()?;
        self.init()?;
        metrics::counter!(telemetry::REGISTRY_RELOADS_TOTAL).increment(1);
        Ok(())
    }

    /// Clear every global and repository cache. The caches stay usable.
    #[instrument(skip(self))]
    pub fn destroy(&self) -> Result<()> {
        let current = self.current()?;
        for cache in current.all_caches() {
            cache.clear();
        }
        debug!("cleared all caches");
        Ok(())
    }

    /// Look up a global cache.
    pub fn get_cache(&self, kind: CacheKind) -> Result<Arc<RegistryCache>> {
        self.current()?
            .globals
            .get(&kind)
            .cloned()
            .ok_or(RepoCacheError::CacheKindNotFound { kind })
    }

    /// Look up a cache in a repository partition.
    pub fn get_repository_cache(
        &self,
        repo_key: &str,
        kind: CacheKind,
    ) -> Result<Arc<RegistryCache>> {
        let current = self.current()?;
        let partition =
            current
                .repos
                .get(repo_key)
                .ok_or_else(|| RepoCacheError::RepositoryNotFound {
                    repo_key: repo_key.to_string(),
                })?;
        partition
            .get(&kind)
            .cloned()
            .ok_or_else(|| RepoCacheError::CacheKindNotInRepository {
                repo_key: repo_key.to_string(),
                kind,
            })
    }

    /// Keys of every repository partition, sorted.
    pub fn repo_keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.current()?.repos.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Cache kinds available for `repo_key`, sorted.
    pub fn repository_kinds(&self, repo_key: &str) -> Result<Vec<CacheKind>> {
        let current = self.current()?;
        let partition =
            current
                .repos
                .get(repo_key)
                .ok_or_else(|| RepoCacheError::RepositoryNotFound {
                    repo_key: repo_key.to_string(),
                })?;
        let mut kinds: Vec<CacheKind> = partition.keys().copied().collect();
        kinds.sort();
        Ok(kinds)
    }

    /// Clear every cache of one repository partition.
    pub fn invalidate_repository(&self, repo_key: &str) -> Result<()> {
        let current = self.current()?;
        let partition =
            current
                .repos
                .get(repo_key)
                .ok_or_else(|| RepoCacheError::RepositoryNotFound {
                    repo_key: repo_key.to_string(),
                })?;
        for cache in partition.values() {
            cache.clear();
        }
        debug!(repo = %repo_key, "invalidated repository caches");
        Ok(())
    }

    /// Sweep reclaimed entries out of every cache. Returns the number of
    /// entries removed.
    pub fn sweep_all(&self) -> Result<usize> {
        let current = self.current()?;
        Ok(current.all_caches().map(|cache| cache.sweep()).sum())
    }

    /// Run [`sweep_all`](Self::sweep_all) every `interval` until `cancel`
    /// fires. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => match registry.sweep_all() {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "swept reclaimed cache entries"),
                        Err(e) => warn!(error = %e, "cache sweep failed"),
                    },
                }
            }
            debug!("cache sweeper stopped");
        })
    }

    /// Start the sweeper with the configured interval if the settings
    /// enable it.
    pub fn start_configured_sweeper(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let sweeper = &self.settings.sweeper;
        sweeper
            .enabled
            .then(|| self.spawn_sweeper(sweeper.interval(), cancel))
    }
}

fn add_partition(
    repos: &mut HashMap<String, Partition>,
    key: String,
    partition: Partition,
) -> Result<()> {
    match repos.entry(key) {
        hash_map::Entry::Occupied(occupied) => Err(RepoCacheError::Configuration(format!(
            "duplicate repository key '{}'",
            occupied.key()
        ))),
        hash_map::Entry::Vacant(vacant) => {
            debug!(repo = %vacant.key(), caches = partition.len(), "built cache partition");
            vacant.insert(partition);
            Ok(())
        }
    }
}
