//! Contract error types for the publish module
//!
//! These errors are transport-agnostic and bubble synchronously to whoever
//! drove the edit transaction.

/// Publish path errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// Edit rejected before touching the store
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Only `general` content is publishable today
    #[error("Unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// Edit row or artifact not found
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type (configuration, artifact)
        resource: String,
        /// Resource identifier
        id: String,
    },

    /// Duplicate edit identity
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    /// Payload could not be encoded
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// The guarded artifact update lost every attempt; the caller must
    /// re-drive the whole edit
    #[error("maximum retry exceeded while applying configuration change ({attempts} attempts)")]
    RetryExhausted { attempts: usize },

    /// Store connectivity or statement failure; never retried
    #[error("Store error: {0}")]
    Store(String),
}

impl PublishError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Map a repository failure onto the store variant
pub(crate) fn store_error(err: impl std::fmt::Display) -> PublishError {
    PublishError::Store(err.to_string())
}
