//! Translation between repository coordinates and storage paths.
//!
//! Every repository lives under `/repositories/<repo key>`; configuration,
//! trash, logs and builds each have their own root. Path elements are escaped
//! individually on the way into storage and unescaped on the way out.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::builder::StoragePathBuilder;
use super::escape::unescape_element;

pub const REPOSITORIES_ROOT: &str = "repositories";
pub const CONFIGURATION_ROOT: &str = "configuration";
pub const TRASH_ROOT: &str = "trash";
pub const LOGS_ROOT: &str = "logs";
pub const BUILDS_ROOT: &str = "builds";

/// A logical coordinate: repository key plus a relative path.
///
/// The path uses `/` separators with no leading or trailing slash; `""` is
/// the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoPath {
    repo_key: String,
    path: String,
}

impl RepoPath {
    /// Create a coordinate, normalising `path` (empty segments dropped).
    pub fn new(repo_key: impl Into<String>, path: &str) -> Self {
        Self {
            repo_key: repo_key.into(),
            path: normalize(path),
        }
    }

    pub fn root(repo_key: impl Into<String>) -> Self {
        Self::new(repo_key, "")
    }

    pub fn repo_key(&self) -> &str {
        &self.repo_key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Last path element, or `""` for the root.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// The enclosing folder, or `None` for the root.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.is_root() {
            return None;
        }
        let parent = match self.path.rfind('/') {
            Some(idx) => &self.path[..idx],
            None => "",
        };
        Some(Self::new(self.repo_key.clone(), parent))
    }

    pub fn child(&self, name: &str) -> RepoPath {
        Self::new(self.repo_key.clone(), &format!("{}/{name}", self.path))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repo_key, self.path)
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Stateless translator between [`RepoPath`]s and storage paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepoPathResolver;

impl RepoPathResolver {
    pub fn new() -> Self {
        Self
    }

    /// `/repositories`
    pub fn repositories_root(&self) -> String {
        StoragePathBuilder::new().segment(REPOSITORIES_ROOT).build()
    }

    /// `/repositories/<key>`
    pub fn repo_root_path(&self, repo_key: &str) -> String {
        rooted(REPOSITORIES_ROOT, repo_key)
    }

    /// `/configuration/<key>`
    pub fn config_path(&self, key: &str) -> String {
        rooted(CONFIGURATION_ROOT, key)
    }

    /// `/logs/<key>`
    pub fn log_path(&self, key: &str) -> String {
        rooted(LOGS_ROOT, key)
    }

    /// `/builds/<key>`
    pub fn builds_path(&self, key: &str) -> String {
        rooted(BUILDS_ROOT, key)
    }

    /// `/trash/<key>`
    pub fn trash_path(&self, key: &str) -> String {
        rooted(TRASH_ROOT, key)
    }

    /// Absolute storage path of `repo_path`, each element escaped.
    pub fn to_storage_path(&self, repo_path: &RepoPath) -> String {
        StoragePathBuilder::new()
            .segment(REPOSITORIES_ROOT)
            .element(repo_path.repo_key())
            .relative(repo_path.path())
            .build()
    }

    /// Coordinate of a storage path, or `None` if the path is not under the
    /// repositories root (trashed or foreign content).
    ///
    /// `/repositories` itself yields an empty repo key and path.
    pub fn from_storage_path(&self, path: &str) -> Option<RepoPath> {
        let rest = path.strip_prefix('/')?.strip_prefix(REPOSITORIES_ROOT)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        let mut elements = rest
            .split('/')
            .filter(|s| !s.is_empty())
            .map(unescape_element);
        let repo_key = elements.next().map(|k| k.into_owned()).unwrap_or_default();
        let relative = elements.collect::<Vec<_>>().join("/");
        Some(RepoPath {
            repo_key,
            path: relative,
        })
    }
}

fn rooted(root: &str, key: &str) -> String {
    StoragePathBuilder::new().segment(root).element(key).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_path_normalises_slashes() {
        let path = RepoPath::new("libs", "/org//acme/");
        assert_eq!(path.path(), "org/acme");
        assert_eq!(path.name(), "acme");
    }

    #[test]
    fn parent_walks_to_root() {
        let path = RepoPath::new("libs", "a/b");
        let parent = path.parent().unwrap();
        assert_eq!(parent.path(), "a");
        let root = parent.parent().unwrap();
        assert!(root.is_root());
        assert!(root.parent().is_none());
    }

    #[test]
    fn child_appends_element() {
        assert_eq!(RepoPath::root("libs").child("a").path(), "a");
        assert_eq!(RepoPath::new("libs", "a").child("b").path(), "a/b");
    }

    #[test]
    fn similar_root_prefix_is_rejected() {
        let resolver = RepoPathResolver::new();
        assert!(resolver.from_storage_path("/repositoriesX/libs").is_none());
        assert!(resolver.from_storage_path("repositories/libs").is_none());
    }
}
