//! Error types for word stores and review sessions.
//!
//! `StoreError` is defined here rather than in `lexicard-store` so the
//! session controller can classify collaborator failures without string
//! matching.

use thiserror::Error;

use crate::model::TrackingId;

/// Errors that can occur when talking to a word store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store rejected our credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The referenced tracking record does not exist (or belongs to another user).
    #[error("tracked word not found: {0}")]
    NotFound(TrackingId),

    /// The word is already in the user's collection.
    #[error("word already saved: {0}")]
    Conflict(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Network(_) | StoreError::Backend(_) => true,
            StoreError::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Errors surfaced by the review session and wordbook operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// No active user context.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Loading the due words failed.
    #[error("failed to load review words: {0}")]
    FetchFailure(#[source] StoreError),

    /// Persisting a review outcome failed. The session did not advance.
    #[error("failed to update progress for {tracking_id}: {source}")]
    UpdateFailure {
        tracking_id: TrackingId,
        #[source]
        source: StoreError,
    },

    /// The action is not accepted in the session's current state.
    #[error("cannot {action} while session is {state}")]
    InvalidAction {
        action: &'static str,
        state: &'static str,
    },
}

impl ReviewError {
    /// Returns `true` if the user can retry the same action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ReviewError::FetchFailure(_) | ReviewError::UpdateFailure { .. }
        )
    }
}

/// Errors surfaced by wordbook management operations.
#[derive(Debug, Error)]
pub enum WordbookError {
    /// No active user context.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Store(#[from] StoreError),
}
