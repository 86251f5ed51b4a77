//! Platform-wide error type shared by collaborator implementations.
//!
//! # Example
//!
//! ```
//! use kr_common::PlatformError;
//!
//! let err = PlatformError::unavailable("key repository offline");
//! assert!(err.is_retryable());
//! ```

use thiserror::Error;

/// Errors that can cross a collaborator boundary (e.g. a `KeyManager` implementation
/// talking to a repository).
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing or deserializing a persisted record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The collaborator is temporarily unavailable.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation exceeded its allotted time budget.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// An error that does not fit any of the above categories.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Whether retrying the operation that produced this error is likely to help.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }

    /// Construct an [`PlatformError::Unavailable`].
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Construct a [`PlatformError::NotFound`].
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Construct an [`PlatformError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Construct a [`PlatformError::Timeout`].
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Construct a [`PlatformError::Internal`].
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
