//! Telemetry metric name constants.
//!
//! Centralised metric names for repocache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `repocache_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `cache`: cache name, `<kind>` for global caches and
//!   `<repo key>/<kind>` for repository partitions

/// Total cache lookups that returned a value.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "repocache_cache_hits_total";

/// Total cache lookups that returned nothing (absent, idle-expired or
/// reclaimed).
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "repocache_cache_misses_total";

/// Total entries evicted to honour a cache's max size.
///
/// Labels: `cache`.
pub const CACHE_EVICTIONS_TOTAL: &str = "repocache_cache_evictions_total";

/// Total entries dropped by a sweep because their value was reclaimed.
///
/// Labels: `cache`.
pub const CACHE_RECLAIMED_TOTAL: &str = "repocache_cache_reclaimed_total";

/// Total storage nodes back-dated by zap walks.
pub const ZAPPED_NODES_TOTAL: &str = "repocache_zapped_nodes_total";

/// Total registry reloads.
pub const REGISTRY_RELOADS_TOTAL: &str = "repocache_registry_reloads_total";

/// Number of repository partitions in the current registry structure.
pub const REGISTRY_PARTITIONS: &str = "repocache_registry_partitions";
