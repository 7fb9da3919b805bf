//! Domain errors for the on-disk collector.
//!
//! Only structural failures (§7 "Structural") become a [`GcError`]. Parse
//! failures and per-item IO failures during delete are logged and absorbed
//! by the caller instead of propagated — see `fs_adapter` and `collector`.

/// Result alias for collector operations.
pub type GcResult<T> = Result<T, GcError>;

#[derive(Debug, thiserror::Error)]
pub enum GcError {
    #[error("registry data directory not found: {0}")]
    DataDirNotFound(String),

    #[error("no repository '{0}' found in repositories directory")]
    RepositoryNotFound(String),

    #[error("no repository '{repo}' tag '{tag}' found in repositories directory")]
    TagNotFound { repo: String, tag: String },

    #[error("invalid image reference '{0}'")]
    InvalidImageRef(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
