//! Error types raised by the review pipeline itself.
//!
//! Collaborators (classifiers, validators, project checks) report failures
//! through `anyhow`; the orchestrator converts those into the variants below
//! at the point where it decides whether a failure is fatal or isolated.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    /// The review root could not be walked. Always fatal.
    #[error("failed to collect files under {}: {source}", root.display())]
    TreeCollection {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The layer classifier failed; fatal in directory mode.
    #[error("layer classification failed: {0}")]
    Classification(String),

    /// A finding-type key that the taxonomy does not know.
    #[error("unregistered finding type `{0}`")]
    UnknownCategory(String),

    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("validator `{validator}` failed: {message}")]
    Validator { validator: String, message: String },

    #[error("{check} failed: {message}")]
    ProjectCheck { check: String, message: String },

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ReviewError {
    /// Whether this error is allowed to abort a whole directory review.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReviewError::TreeCollection { .. } | ReviewError::Classification(_) | ReviewError::WorkerPool(_)
        )
    }
}
