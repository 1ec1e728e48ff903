//! Repository path addressing.
//!
//! [`RepoPathResolver`] maps a [`RepoPath`] (repository key + relative path)
//! to the absolute path the storage engine uses, and back. Composition of
//! storage paths goes through [`StoragePathBuilder`] so escaping lives in one
//! place.

pub mod builder;
pub mod escape;
pub mod maven;
pub mod resolver;

pub use builder::StoragePathBuilder;
pub use escape::{escape_element, unescape_element};
pub use resolver::{
    BUILDS_ROOT, CONFIGURATION_ROOT, LOGS_ROOT, REPOSITORIES_ROOT, RepoPath, RepoPathResolver,
    TRASH_ROOT,
};
