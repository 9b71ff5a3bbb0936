//! Image storage with pluggable backends.
//!
//! Product images live in exactly one backend per deployment, chosen by
//! `storage.provider` in the configuration:
//!
//! - [`ObjectBucketStore`] - bucket-based object storage over HTTP
//! - [`ImageCdnStore`] - managed image CDN addressed by public ids
//! - [`MemoryImageStore`] - process-local store for development and tests
//!
//! Callers depend only on the [`ImageStore`] trait.
//!
//! # Example
//!
//! ```ignore
//! use storefront::services::storage::{build_store, ListPage};
//!
//! let store = build_store(&config.storage)?;
//! let stored = store.upload("p1/cover.png", bytes, "image/png").await?;
//! let listing = store.list(&store.namespace("p1"), ListPage::first(100)).await?;
//! ```

mod backend;
mod error;
mod image_cdn;
mod memory;
mod object_bucket;
mod types;
mod validation;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::StorageConfig;

// Re-export the public API
pub use backend::ImageStore;
pub use error::{StorageError, StorageResult};
pub use image_cdn::ImageCdnStore;
pub use memory::{InjectedFailure, MemoryImageStore};
pub use object_bucket::ObjectBucketStore;
pub use types::{ListPage, ListedObject, Listing, StorageProvider, StoredObject};

const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the backend selected by `config.provider`.
///
/// # Errors
///
/// Returns an error if the provider's settings table is missing, its
/// credentials are incomplete, or the HTTP client cannot be built.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ImageStore>> {
    match config.provider {
        StorageProvider::Memory => Ok(Arc::new(MemoryImageStore::new())),
        StorageProvider::ObjectStore => {
            let settings = config
                .object_store
                .as_ref()
                .context("storage.object_store settings are missing")?;
            let store = ObjectBucketStore::from_config(settings, http_client()?)?;
            Ok(Arc::new(store))
        },
        StorageProvider::ImageCdn => {
            let settings = config
                .image_cdn
                .as_ref()
                .context("storage.image_cdn settings are missing")?;
            let store = ImageCdnStore::from_config(settings, http_client()?)?;
            Ok(Arc::new(store))
        },
    }
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(BACKEND_TIMEOUT)
        .user_agent(concat!("storefront/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build storage HTTP client")
}
