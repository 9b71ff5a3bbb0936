//! Object key validation for the storage backends.
//!
//! Keys are built from request data (product ids, file extensions), so every
//! backend normalizes them before use and rejects anything that could
//! address outside the product namespace.

use super::error::{StorageError, StorageResult};
use std::path::{Component, Path};

/// Validates and normalizes an object key.
///
/// # Security
/// Rejects keys that:
/// - Are empty
/// - Are absolute (start with `/` or drive letter)
/// - Contain `..` components
/// - Contain null bytes
///
/// # Examples
/// ```ignore
/// validate_object_path("p1/cover.png")     // Ok("p1/cover.png")
/// validate_object_path("./p1/cover.png")   // Ok("p1/cover.png")
/// validate_object_path("../etc/passwd")    // Err(InvalidPath)
/// ```
pub(crate) fn validate_object_path(path: &str) -> StorageResult<String> {
    if path.trim().is_empty() {
        return Err(StorageError::InvalidPath("object path cannot be empty".into()));
    }
    if path.contains('\0') {
        return Err(StorageError::InvalidPath("object path contains null bytes".into()));
    }

    let as_path = Path::new(path);
    if as_path.is_absolute() || path.starts_with('/') {
        return Err(StorageError::InvalidPath(format!(
            "object path cannot be absolute: {path}"
        )));
    }

    let mut segments = Vec::new();
    for component in as_path.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {},
            Component::ParentDir => {
                return Err(StorageError::InvalidPath(format!(
                    "object path cannot contain '..': {path}"
                )));
            },
            Component::RootDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath(format!(
                    "object path cannot contain root or prefix: {path}"
                )));
            },
        }
    }

    if segments.is_empty() {
        return Err(StorageError::InvalidPath(
            "object path normalized to empty path".into(),
        ));
    }

    Ok(segments.join("/"))
}
