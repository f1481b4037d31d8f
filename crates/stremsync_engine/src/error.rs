//! Error types for the sync engine.

use stremsync_model::UserId;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while reconciling or authenticating.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// A referenced group, user or addon does not exist. Caller bug, never
    /// retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure, remote 5xx or timeout. Retried with backoff.
    #[error("transient remote error: {message}")]
    TransientRemote {
        /// What went wrong.
        message: String,
    },

    /// The remote rejected one addon's manifest. Not retried; the offending
    /// manifest URL is carried so the caller can exclude it and retry.
    #[error("remote rejected addon {addon}: {message}")]
    Validation {
        /// Manifest URL of the rejected addon.
        addon: String,
        /// Remote error message.
        message: String,
    },

    /// The device code expired or the presented credential is invalid.
    #[error("authorization expired: {0}")]
    AuthExpired(String),

    /// A sync for this user is already in flight.
    #[error("sync already in progress for user {user_id}")]
    AlreadySyncing {
        /// The contended user.
        user_id: UserId,
    },

    /// A destructive plan was handed to plain execution without explicit
    /// confirmation.
    #[error("destructive plan requires explicit confirmation")]
    DestructiveNotConfirmed,

    /// The remote answered with something we cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    /// Creates a transient remote error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientRemote {
            message: message.into(),
        }
    }

    /// Returns true if the operation may be retried with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransientRemote { .. })
    }
}
