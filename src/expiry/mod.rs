//! Cache expiry: which cached paths may be invalidated, and the walk that
//! invalidates them.
//!
//! [`CacheExpiryPolicy`] answers "is this path in this cache repository
//! expirable" as the OR of its [`ExpirableRule`]s. [`Zapper`] walks a cached
//! subtree and back-dates the last-updated time of every expirable file and
//! every folder by the retrieval cache period, so the next freshness check
//! ([`is_stale`]) treats them as stale while the cached bytes stay in place.

pub mod zap;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

pub use zap::{StorageNode, Zapper};

use crate::path::maven;

type Predicate = dyn Fn(&str, &str) -> bool + Send + Sync;

/// One reason a cached path may be expired.
#[derive(Clone)]
pub enum ExpirableRule {
    /// Everything except files named with a deployment timestamp, which
    /// never change once deployed.
    NotUniqueSnapshot,
    /// `maven-metadata.xml` and its checksums.
    MavenMetadata,
    /// Contents of the `.index` folder.
    MavenIndex,
    /// Every path.
    Always,
    /// Caller-supplied predicate over `(repo key, path)`.
    Custom(Arc<Predicate>),
}

impl ExpirableRule {
    pub fn custom(predicate: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        ExpirableRule::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, repo_key: &str, path: &str) -> bool {
        match self {
            ExpirableRule::NotUniqueSnapshot => !maven::is_unique_snapshot(path),
            ExpirableRule::MavenMetadata => maven::is_metadata(path),
            ExpirableRule::MavenIndex => maven::is_index(path),
            ExpirableRule::Always => true,
            ExpirableRule::Custom(predicate) => predicate(repo_key, path),
        }
    }
}

impl fmt::Debug for ExpirableRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirableRule::NotUniqueSnapshot => f.write_str("NotUniqueSnapshot"),
            ExpirableRule::MavenMetadata => f.write_str("MavenMetadata"),
            ExpirableRule::MavenIndex => f.write_str("MavenIndex"),
            ExpirableRule::Always => f.write_str("Always"),
            ExpirableRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The set of registered expirability rules.
#[derive(Debug, Clone, Default)]
pub struct CacheExpiryPolicy {
    rules: Vec<ExpirableRule>,
}

impl CacheExpiryPolicy {
    /// A policy with no rules: nothing is expirable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for maven remote repository caches.
    pub fn maven() -> Self {
        Self::new()
            .with_rule(ExpirableRule::NotUniqueSnapshot)
            .with_rule(ExpirableRule::MavenMetadata)
            .with_rule(ExpirableRule::MavenIndex)
    }

    pub fn with_rule(mut self, rule: ExpirableRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[ExpirableRule] {
        &self.rules
    }

    /// Whether any rule considers `path` in cache repository `repo_key`
    /// expirable.
    pub fn is_expirable(&self, repo_key: &str, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(repo_key, path))
    }
}

/// Whether something last updated at `last_updated` is stale at `now`
/// under a freshness window of `period`. Timestamps in the future are
/// fresh.
pub fn is_stale(last_updated: SystemTime, period: Duration, now: SystemTime) -> bool {
    match now.duration_since(last_updated) {
        Ok(age) => age >= period,
        Err(_) => false,
    }
}
