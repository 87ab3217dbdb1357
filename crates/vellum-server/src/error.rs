// File: src/error.rs
// Purpose: Discriminated failure kinds for the dispatch pipeline

use thiserror::Error;

/// Failure kinds the dispatcher distinguishes.
///
/// Collaborators signal "not found" as a distinct condition from generic
/// failure so the orchestrator can choose 404 vs 500 without inspecting
/// message text.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Missing build artifact, missing static file, or blocked pathname.
    /// Mapped to the 404 protocol, never logged as an error.
    #[error("not found")]
    NotFound,

    /// Malformed percent-encoding in the request path. Mapped to 400.
    #[error("malformed percent-encoding in request path")]
    DecodeFailed,

    /// Anything else. Mapped to 500 and logged.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        DispatchError::Internal(err.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound)
    }
}

impl From<vellum_router::DecodeError> for DispatchError {
    fn from(_: vellum_router::DecodeError) -> Self {
        DispatchError::DecodeFailed
    }
}
