//! repocache - caches and path addressing for an artifact repository manager
//!
//! This crate provides the in-memory caching core of a binaries repository:
//! named caches partitioned per repository, a resolver between repository
//! coordinates and storage paths, and the expiry machinery remote
//! repositories use to invalidate cached content without deleting it.
//!
//! # Registry Example
//!
//! ```rust
//! use std::sync::Arc;
//! use repocache::cache::{CacheKind, CacheRegistry};
//! use repocache::descriptor::{RemoteRepoDescriptor, RepositoriesDescriptor};
//!
//! # fn main() -> repocache::Result<()> {
//! let descriptor = RepositoriesDescriptor::new()
//!     .local("libs-release")
//!     .remote(RemoteRepoDescriptor::new("central"))
//!     .virtual_repo("all");
//!
//! let registry = CacheRegistry::new(Arc::new(descriptor));
//! registry.init()?;
//!
//! let missed = registry.get_repository_cache("central", CacheKind::MissedRetrievals)?;
//! missed.put("org/acme/1.0/acme-1.0.pom".to_string(), Arc::new(true));
//! assert_eq!(
//!     missed.get_as::<bool, _>("org/acme/1.0/acme-1.0.pom").as_deref(),
//!     Some(&true)
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Path Example
//!
//! ```rust
//! use repocache::path::{RepoPath, RepoPathResolver};
//!
//! let resolver = RepoPathResolver::new();
//! let path = RepoPath::new("libs-release", "org/acme:core/1.0");
//! let storage = resolver.to_storage_path(&path);
//! assert_eq!(storage, "/repositories/libs-release/org/acme%3Acore/1.0");
//! assert_eq!(resolver.from_storage_path(&storage), Some(path));
//! ```

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod expiry;
pub mod path;
pub mod telemetry;
mod version;

// Re-export main types at crate root
pub use cache::{CacheKind, CacheRegistry, KeyedCache};
pub use config::CacheSettings;
pub use descriptor::{DescriptorProvider, RemoteRepoDescriptor, RepositoriesDescriptor};
pub use error::{RepoCacheError, Result};
pub use expiry::{CacheExpiryPolicy, ExpirableRule, StorageNode, Zapper};
pub use path::{RepoPath, RepoPathResolver};
pub use version::{GIT_BRANCH, GIT_SHA, PKG_VERSION, git_dirty, version_string};
