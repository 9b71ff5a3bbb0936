//! Error types for the catalog store.

use std::collections::BTreeMap;

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Field name to message, in field order.
pub type FieldErrors = BTreeMap<&'static str, String>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The addressed row does not exist (or does not belong to the stated owner).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Input failed field-level validation.
    #[error("invalid {}", .0.keys().copied().collect::<Vec<_>>().join(", "))]
    Validation(FieldErrors),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The blocking task running the query panicked or was cancelled.
    #[error("catalog task failed: {0}")]
    Task(String),
}

impl CatalogError {
    /// Validation error for a single field.
    pub fn field(name: &'static str, message: impl Into<String>) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(name, message.into());
        Self::Validation(fields)
    }
}

/// Maps unique-constraint failures on `column` to a field-level error.
pub(crate) fn map_unique(err: rusqlite::Error, column: &'static str) -> CatalogError {
    match &err {
        rusqlite::Error::SqliteFailure(code, Some(message))
            if code.code == rusqlite::ErrorCode::ConstraintViolation
                && message.contains(column) =>
        {
            CatalogError::field(column, format!("{column} is already in use"))
        },
        _ => CatalogError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("slug", "bad".to_string());
        fields.insert("name", "short".to_string());
        assert_eq!(CatalogError::Validation(fields).to_string(), "invalid name, slug");
    }
}
