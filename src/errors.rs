// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the semantic store.
//!
//! Threshold-gated lookups that find nothing are not errors; they return `None`.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad chunking or provider parameters. Raised before any I/O happens.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding service failed or returned an unusable vector.
    #[error("embedding failed: {0:#}")]
    EmbeddingFailure(#[source] anyhow::Error),

    /// Reading or writing the snapshot file failed.
    #[error("persistence failed for {}: {source}", path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The snapshot exists but cannot be trusted.
    #[error("corrupt snapshot {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        StoreError::InvalidConfiguration(message.into())
    }

    pub(crate) fn embedding(err: impl Into<anyhow::Error>) -> Self {
        StoreError::EmbeddingFailure(err.into())
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StoreError::CorruptSnapshot {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
