//! Backend trait for image storage.
//!
//! Defines the capability interface every image backend implements so the
//! asset lifecycle never depends on a concrete provider.

use super::error::StorageResult;
use super::types::{ListPage, Listing, StorageProvider, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;

/// Backend trait for product image storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
///
/// # Example
///
/// ```ignore
/// use storefront::services::storage::{ImageStore, MemoryImageStore};
///
/// let store = MemoryImageStore::new();
/// let key = format!("{}/cover.png", store.namespace("prod-123"));
/// let stored = store.upload(&key, image_bytes, "image/png").await?;
/// store.remove(&[stored.storage_path]).await?;
/// ```
#[async_trait]
pub trait ImageStore: Send + Sync + 'static {
    /// The provider this backend talks to.
    fn provider(&self) -> StorageProvider;

    /// Object prefix under which every image of `product_id` is stored.
    fn namespace(&self, product_id: &str) -> String;

    /// Stores an object under `path` (a key inside [`namespace`](Self::namespace)).
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the backend refuses the write.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str)
    -> StorageResult<StoredObject>;

    /// Removes a batch of objects.
    ///
    /// Paths that do not exist are not an error for batch calls; a single
    /// missing path may surface as [`StorageError::NotFound`](super::StorageError::NotFound).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend call fails.
    async fn remove(&self, paths: &[String]) -> StorageResult<()>;

    /// Lists one page of objects stored under `prefix`.
    ///
    /// Returned names are relative to `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing call fails.
    async fn list(&self, prefix: &str, page: ListPage) -> StorageResult<Listing>;

    /// Recovers the storage key from a public URL issued by this backend.
    ///
    /// Returns `None` for URLs that do not belong to this backend.
    fn path_from_url(&self, url: &str) -> Option<String>;
}
