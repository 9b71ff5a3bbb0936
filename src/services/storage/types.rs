//! Types shared by the storage backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which backend holds product images. Chosen once per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageProvider {
    /// Generic bucket-based object storage.
    ObjectStore,
    /// Managed image CDN addressed by public ids.
    ImageCdn,
    /// Process-local store for development and tests.
    #[default]
    Memory,
}

impl StorageProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectStore => "object_store",
            Self::ImageCdn => "image_cdn",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Public retrieval URL.
    pub url: String,
    /// Backend-specific key (object path or public id) used for deletion.
    pub storage_path: String,
}

/// One entry of a namespace listing. `name` is relative to the listed prefix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListedObject {
    #[serde(default)]
    pub name: Option<String>,
}

impl ListedObject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Page request for [`ImageStore::list`](super::ImageStore::list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub limit: usize,
    /// Opaque continuation returned by the previous page. `None` starts over.
    pub cursor: Option<String>,
}

impl ListPage {
    pub fn first(limit: usize) -> Self {
        Self {
            limit,
            cursor: None,
        }
    }
}

/// One page of a namespace listing.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub objects: Vec<ListedObject>,
    /// Set when another page may follow. Offset-paged backends stop on a short page.
    pub next_cursor: Option<String>,
}

impl Listing {
    /// Build a page for an offset-paged backend: a full page implies more may follow.
    pub fn offset_page(objects: Vec<ListedObject>, page: &ListPage) -> Self {
        let offset = page
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let next_cursor = if page.limit > 0 && objects.len() >= page.limit {
            Some((offset + objects.len()).to_string())
        } else {
            None
        };
        Self {
            objects,
            next_cursor,
        }
    }
}
