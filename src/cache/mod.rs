//! Caching subsystem.
//!
//! - [`KeyedCache`]: a named concurrent cache with idle-time expiry,
//!   optional max size, a [`WritePolicy`] and an [`Ownership`] strength.
//!
//! - [`CacheRegistry`]: the process-wide set of caches: one per global
//!   [`CacheKind`] plus a partition per repository, rebuilt on reload.
//!
//! - [`CacheKind`] / [`CacheDefinition`]: the catalogue of named caches and
//!   the tunables each instance is built with.

pub mod definition;
pub mod entry;
pub mod keyed;
pub mod registry;

pub use definition::{
    CacheDefinition, CacheKind, CacheScope, CacheTunables, Ownership, Retention, WritePolicy,
};
pub use entry::CacheEntry;
pub use keyed::{AnyValue, KeyedCache};
pub use registry::{CacheRegistry, RegistryCache};
