//! Error types for the workspace-fleet operator
//!
//! Per-instance and per-kind failures stay inside a [`crate::fleet::FleetReport`].
//! Only failures that stop a whole reconcile surface as [`Error`].

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for workspace-fleet operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Validation error for WorkspaceTemplate resources
    #[error("validation error: {0}")]
    Validation(String),

    /// The resource store could not inventory any managed kind
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Check if this error is retryable
    ///
    /// Validation errors need a change to the template; retrying them only
    /// repeats the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Validation(_) => false,
            Error::Store(source) => source.is_retryable(),
        }
    }
}
