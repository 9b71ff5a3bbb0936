//! Error types for image storage backends.

/// Result type for storage backend operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors reported by an [`ImageStore`](super::ImageStore).
///
/// `NotFound` is kept distinct from every other failure: during cleanup the
/// desired end state ("object does not exist") already holds, so callers
/// treat it as success.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The object (or the container it lives in) does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Object key failed validation (empty, absolute or containing `..`).
    #[error("invalid object path: {0}")]
    InvalidPath(String),

    /// The backend answered with a non-success status.
    #[error("storage backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced a usable response.
    #[error("storage transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a body we could not interpret.
    #[error("unexpected storage response: {0}")]
    Protocol(String),

    /// Provider credentials or settings are missing.
    #[error("storage backend misconfigured: {0}")]
    Misconfigured(String),
}

impl StorageError {
    /// Create a rejected-request error.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// True when the failure means the object is already absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Rejected { status, .. } => *status == 404,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(StorageError::NotFound("p/a.jpg".into()).is_not_found());
        assert!(StorageError::rejected(404, "Object not found").is_not_found());
        assert!(!StorageError::rejected(500, "boom").is_not_found());
        assert!(!StorageError::InvalidPath("../x".into()).is_not_found());
    }
}
