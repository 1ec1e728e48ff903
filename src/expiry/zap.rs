//! Depth-first invalidation of a cached subtree.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::CacheExpiryPolicy;
use crate::path::RepoPath;
use crate::{RepoCacheError, Result, telemetry};

/// A file or folder in a repository's cached storage.
#[async_trait]
pub trait StorageNode: Send + Sync {
    fn repo_path(&self) -> &RepoPath;

    fn is_file(&self) -> bool;

    fn last_updated(&self) -> SystemTime;

    fn set_last_updated(&self, at: SystemTime) -> Result<()>;

    /// Direct children; empty for files.
    async fn children(&self) -> Result<Vec<Arc<dyn StorageNode>>>;
}

/// Walks cached subtrees and marks them stale.
#[derive(Debug, Clone)]
pub struct Zapper {
    policy: Arc<CacheExpiryPolicy>,
}

impl Zapper {
    pub fn new(policy: Arc<CacheExpiryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CacheExpiryPolicy {
        &self.policy
    }

    /// Back-date `root` and everything expirable below it to
    /// `now - retrieval_cache_period`. Folders are always back-dated; files
    /// only when the policy says they are expirable. A node is updated
    /// before its children are visited.
    ///
    /// Returns the number of nodes touched. If the walk fails or `cancel`
    /// fires, the error is [`RepoCacheError::ZapAborted`] carrying the count
    /// touched so far; those nodes stay back-dated.
    #[instrument(skip(self, root, cancel), fields(path = %root.repo_path()))]
    pub async fn zap(
        &self,
        root: Arc<dyn StorageNode>,
        retrieval_cache_period: Duration,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let at = SystemTime::now()
            .checked_sub(retrieval_cache_period)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut touched = 0;
        let outcome = self.walk(root, at, cancel, &mut touched).await;
        metrics::counter!(telemetry::ZAPPED_NODES_TOTAL).increment(touched as u64);
        match outcome {
            Ok(()) => {
                info!(touched, "zapped cached subtree");
                Ok(touched)
            }
            Err(e) => {
                warn!(touched, error = %e, "zap aborted");
                Err(RepoCacheError::ZapAborted {
                    touched,
                    source: Box::new(e),
                })
            }
        }
    }

    fn walk<'a>(
        &'a self,
        node: Arc<dyn StorageNode>,
        at: SystemTime,
        cancel: &'a CancellationToken,
        touched: &'a mut usize,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if cancel.is_cancelled() {
                return Err(RepoCacheError::Cancelled);
            }
            if node.is_file() {
                let path = node.repo_path();
                if self.policy.is_expirable(path.repo_key(), path.path()) {
                    node.set_last_updated(at)?;
                    *touched += 1;
                }
                return Ok(());
            }

            node.set_last_updated(at)?;
            *touched += 1;
            for child in node.children().await? {
                self.walk(child, at, cancel, touched).await?;
            }
            Ok(())
        })
    }
}
