//! repocache error types

use crate::cache::CacheKind;

/// repocache error types
#[derive(Debug, thiserror::Error)]
pub enum RepoCacheError {
    // Registry lookup errors
    #[error("cache kind '{kind}' is not a global cache")]
    CacheKindNotFound { kind: CacheKind },

    #[error("no cache partition for repository '{repo_key}'")]
    RepositoryNotFound { repo_key: String },

    #[error("cache kind '{kind}' is not defined for repository '{repo_key}'")]
    CacheKindNotInRepository { repo_key: String, kind: CacheKind },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Storage walk errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,

    /// A zap walk stopped partway. Nodes touched before the failure keep
    /// their back-dated timestamps.
    #[error("zap aborted after {touched} node(s): {source}")]
    ZapAborted {
        touched: usize,
        source: Box<RepoCacheError>,
    },
}

impl RepoCacheError {
    /// Whether this error comes from looking up something the current
    /// configuration does not define. These are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RepoCacheError::CacheKindNotFound { .. }
                | RepoCacheError::RepositoryNotFound { .. }
                | RepoCacheError::CacheKindNotInRepository { .. }
                | RepoCacheError::Configuration(_)
        )
    }

    /// Number of nodes a failed zap walk touched before it stopped.
    pub fn touched(&self) -> Option<usize> {
        match self {
            RepoCacheError::ZapAborted { touched, .. } => Some(*touched),
            _ => None,
        }
    }
}

/// Result type alias for repocache operations
pub type Result<T> = std::result::Result<T, RepoCacheError>;
