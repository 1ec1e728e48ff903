//! Cache kinds and the tunables each kind is built with.
//!
//! [`CacheKind`] is the closed catalogue of named caches. Every kind belongs
//! to exactly one [`CacheScope`], which decides where the registry creates
//! it: once per process, once per storing repository, or once per remote
//! repository. The per-kind defaults returned by
//! [`CacheKind::default_definition`] can be overridden by
//! [`CacheSettings`](crate::config::CacheSettings) and, for remote kinds, by
//! the remote repository's own descriptor.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{RepoCacheError, Result};

/// Where the registry instantiates a cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// One instance for the whole process.
    Global,
    /// One instance per repository that stores content: local repositories,
    /// the local cache of every remote repository, and virtual repositories.
    StoringRepo,
    /// One instance per remote repository, tuned by its descriptor.
    RemoteRepo,
}

/// How [`KeyedCache::put`](super::KeyedCache::put) treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Replace unconditionally.
    #[default]
    Overwrite,
    /// Keep the first live value; a reclaimed value is replaced in place.
    PutIfAbsentMerge,
}

/// How strongly a cache holds on to its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    /// Held until removed, cleared or idle-expired.
    #[default]
    Strong,
    /// Kept alive by a bounded retention pool with a long idle window.
    SoftReclaimable,
    /// Kept alive by a small retention pool with a short idle window, or for
    /// as long as a caller still holds the value.
    WeakReclaimable,
}

impl Ownership {
    pub fn is_reclaimable(self) -> bool {
        !matches!(self, Ownership::Strong)
    }

    /// Retention pool used for this strength when a definition does not set
    /// one explicitly. `None` for strong ownership.
    pub fn default_retention(self) -> Option<Retention> {
        match self {
            Ownership::Strong => None,
            Ownership::SoftReclaimable => Some(Retention {
                capacity: 10_000,
                idle: Duration::from_secs(30 * 60),
            }),
            Ownership::WeakReclaimable => Some(Retention {
                capacity: 1_000,
                idle: Duration::from_secs(10),
            }),
        }
    }
}

/// Budget of the pool that keeps reclaimable values alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    /// Maximum number of values held by the pool.
    pub capacity: u64,
    /// Values not read or written for this long are released.
    pub idle: Duration,
}

/// Tunables of a single cache instance.
///
/// ```rust
/// # use repocache::cache::{CacheDefinition, Ownership, WritePolicy};
/// # use std::time::Duration;
/// let definition = CacheDefinition::new()
///     .idle_time(Duration::from_secs(300))
///     .max_size(1_000)
///     .write_policy(WritePolicy::PutIfAbsentMerge)
///     .ownership(Ownership::SoftReclaimable);
/// assert!(definition.expires());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CacheDefinition {
    /// Entries unused for this long read as misses. Zero disables expiry.
    pub idle_time: Duration,
    /// Maximum number of entries. Zero means unbounded.
    pub max_size: u64,
    pub write_policy: WritePolicy,
    pub ownership: Ownership,
    /// Measure idle time from the last read instead of the last write.
    pub reset_idle_on_read: bool,
    /// Explicit retention budget for reclaimable ownership.
    pub retention: Option<Retention>,
}

impl CacheDefinition {
    /// Strong, unbounded, never-expiring overwrite cache.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_time(mut self, idle_time: Duration) -> Self {
        self.idle_time = idle_time;
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn reset_idle_on_read(mut self, reset: bool) -> Self {
        self.reset_idle_on_read = reset;
        self
    }

    pub fn retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Whether entries can expire by idle time.
    pub fn expires(&self) -> bool {
        !self.idle_time.is_zero()
    }

    /// Retention budget in force, or `None` when values are held strongly.
    pub fn effective_retention(&self) -> Option<Retention> {
        if !self.ownership.is_reclaimable() {
            return None;
        }
        self.retention.or_else(|| self.ownership.default_retention())
    }
}

/// Partial overrides for a [`CacheDefinition`], as found in configuration
/// files and remote repository descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTunables {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_policy: Option<WritePolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_idle_on_read: Option<bool>,
    /// Retention pool capacity; ignored for strong ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_capacity: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_idle_secs: Option<u64>,
}

impl CacheTunables {
    /// Overlay the fields that are set onto `base`.
    pub fn apply(&self, mut base: CacheDefinition) -> CacheDefinition {
        if let Some(secs) = self.idle_time_secs {
            base.idle_time = Duration::from_secs(secs);
        }
        if let Some(max) = self.max_size {
            base.max_size = max;
        }
        if let Some(policy) = self.write_policy {
            base.write_policy = policy;
        }
        if let Some(ownership) = self.ownership {
            base.ownership = ownership;
        }
        if let Some(reset) = self.reset_idle_on_read {
            base.reset_idle_on_read = reset;
        }
        if self.retention_capacity.is_some() || self.retention_idle_secs.is_some() {
            if let Some(mut retention) = base.effective_retention() {
                if let Some(capacity) = self.retention_capacity {
                    retention.capacity = capacity;
                }
                if let Some(secs) = self.retention_idle_secs {
                    retention.idle = Duration::from_secs(secs);
                }
                base.retention = Some(retention);
            }
        }
        base
    }
}

/// The closed set of named caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Resolved authentications, keyed by user name.
    Authentication,
    /// Compiled access control lists.
    Acl,
    /// Latest-version lookups against the update server.
    VersioningInfo,
    /// File and folder stat information.
    ItemInfo,
    /// Per-path locks; an entry lives as long as some holder uses it.
    Locks,
    /// Calculated maven-metadata documents.
    MavenMetadata,
    /// Paths the remote answered "not found" for.
    MissedRetrievals,
    /// Paths whose retrieval failed.
    FailedRetrievals,
    /// Remote folder listings.
    FolderListings,
}

impl CacheKind {
    pub const ALL: [CacheKind; 9] = [
        CacheKind::Authentication,
        CacheKind::Acl,
        CacheKind::VersioningInfo,
        CacheKind::ItemInfo,
        CacheKind::Locks,
        CacheKind::MavenMetadata,
        CacheKind::MissedRetrievals,
        CacheKind::FailedRetrievals,
        CacheKind::FolderListings,
    ];

    pub const fn scope(self) -> CacheScope {
        match self {
            CacheKind::Authentication | CacheKind::Acl | CacheKind::VersioningInfo => {
                CacheScope::Global
            }
            CacheKind::ItemInfo | CacheKind::Locks | CacheKind::MavenMetadata => {
                CacheScope::StoringRepo
            }
            CacheKind::MissedRetrievals
            | CacheKind::FailedRetrievals
            | CacheKind::FolderListings => CacheScope::RemoteRepo,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CacheKind::Authentication => "authentication",
            CacheKind::Acl => "acl",
            CacheKind::VersioningInfo => "versioning_info",
            CacheKind::ItemInfo => "item_info",
            CacheKind::Locks => "locks",
            CacheKind::MavenMetadata => "maven_metadata",
            CacheKind::MissedRetrievals => "missed_retrievals",
            CacheKind::FailedRetrievals => "failed_retrievals",
            CacheKind::FolderListings => "folder_listings",
        }
    }

    /// Built-in tunables. Remote kinds get their idle time from the remote
    /// descriptor at registry build time; the values here apply only when a
    /// descriptor is silent.
    pub fn default_definition(self) -> CacheDefinition {
        match self {
            CacheKind::Authentication => CacheDefinition::new()
                .idle_time(Duration::from_secs(5 * 60))
                .reset_idle_on_read(true),
            CacheKind::Acl => CacheDefinition::new(),
            CacheKind::VersioningInfo => {
                CacheDefinition::new().idle_time(Duration::from_secs(12 * 3600))
            }
            CacheKind::ItemInfo => CacheDefinition::new()
                .idle_time(Duration::from_secs(15 * 60))
                .write_policy(WritePolicy::PutIfAbsentMerge)
                .ownership(Ownership::SoftReclaimable)
                .reset_idle_on_read(true),
            CacheKind::Locks => CacheDefinition::new()
                .write_policy(WritePolicy::PutIfAbsentMerge)
                .ownership(Ownership::WeakReclaimable),
            CacheKind::MavenMetadata => {
                CacheDefinition::new().ownership(Ownership::SoftReclaimable)
            }
            CacheKind::MissedRetrievals | CacheKind::FailedRetrievals => {
                CacheDefinition::new().idle_time(Duration::from_secs(7200))
            }
            CacheKind::FolderListings => CacheDefinition::new()
                .idle_time(Duration::from_secs(7200))
                .ownership(Ownership::SoftReclaimable),
        }
    }

    pub fn in_scope(scope: CacheScope) -> impl Iterator<Item = CacheKind> {
        Self::ALL.into_iter().filter(move |k| k.scope() == scope)
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CacheKind {
    type Err = RepoCacheError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| RepoCacheError::Configuration(format!("unknown cache kind '{s}'")))
    }
}
