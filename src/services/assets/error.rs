//! Error types for the asset lifecycle.

use crate::services::catalog::{CatalogError, FieldErrors};
use crate::services::storage::StorageError;

/// Result type for asset operations.
pub type AssetResult<T> = std::result::Result<T, AssetError>;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// The upload or identifier broke a named constraint.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Writing to the storage backend failed. Cleanup failures never surface here.
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Catalog(CatalogError),
}

impl AssetError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Field-level view for the HTTP layer.
    #[must_use]
    pub fn field_errors(&self) -> Option<FieldErrors> {
        match self {
            Self::Validation { field, message } => {
                let mut fields = FieldErrors::new();
                fields.insert(*field, message.clone());
                Some(fields)
            },
            Self::Catalog(CatalogError::Validation(fields)) => Some(fields.clone()),
            _ => None,
        }
    }
}

impl From<CatalogError> for AssetError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(what) => Self::NotFound(what),
            other => Self::Catalog(other),
        }
    }
}
