use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while building, persisting or querying an index.
#[derive(Error, Debug)]
pub enum QuireError {
    #[error("Please provide at least one word in the query")]
    MissingQuery,

    #[error("shard '{shard}' is listed in the manifest but {path} is missing")]
    ShardNotFound { shard: char, path: PathBuf },

    #[error("no index found at {0}")]
    IndexNotFound(PathBuf),

    #[error("malformed index file {path}: {reason}")]
    MalformedIndexFile { path: PathBuf, reason: String },

    #[error("document '{doc_id}' could not be read: {source}")]
    DocumentUnreadable {
        doc_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("document '{doc_id}' rejected: {reason}")]
    DocumentBuildFailure { doc_id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QuireError>;

impl QuireError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        QuireError::MalformedIndexFile { path: path.into(), reason: reason.to_string() }
    }

    /// True when the on-disk index is missing or inconsistent and should be rebuilt.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            QuireError::ShardNotFound { .. } | QuireError::IndexNotFound(_) | QuireError::MalformedIndexFile { .. }
        )
    }
}
