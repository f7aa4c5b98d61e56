//! Unified error types for revisit

use thiserror::Error;

/// Unified error type for all revisit operations
#[derive(Error, Debug)]
pub enum RevisitError {
    // Interaction errors
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Interaction failed: {0}")]
    Interaction(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Browsing session lost: {0}")]
    SessionLost(String),

    // Storage errors
    #[error("Store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    // Assistant errors
    #[error("Assistant error: {0}")]
    Assistant(String),

    #[error("API limit: {0}")]
    ApiLimit(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl RevisitError {
    /// Errors that must halt the whole run instead of failing one item.
    ///
    /// Losing the browsing session leaves nothing to drive; every other
    /// error degrades to a per-item failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RevisitError::SessionLost(_))
    }
}

/// Result type alias using RevisitError
pub type Result<T> = std::result::Result<T, RevisitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_loss_is_fatal() {
        assert!(RevisitError::SessionLost("tab closed".into()).is_fatal());
        assert!(!RevisitError::ElementNotFound(".like".into()).is_fatal());
        assert!(!RevisitError::Navigation("timeout".into()).is_fatal());
        assert!(!RevisitError::Store("locked".into()).is_fatal());
    }
}
