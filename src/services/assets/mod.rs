//! Product image lifecycle across the catalog and the storage backend.
//!
//! [`AssetManager`] keeps image rows and stored objects consistent through
//! upload, primary reassignment and deletion. It depends only on the
//! [`ImageStore`] trait; which backend is active is a deployment setting.
//!
//! Storage failures during cleanup are logged and reported as warnings.
//! They never abort a relational delete.

mod cleanup;
mod error;
mod property_tests;

use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::constants::{ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES, STORAGE_BATCH_SIZE};
use crate::services::catalog::{CatalogStore, ProductImage};
use crate::services::storage::{ImageStore, StorageProvider};

pub use cleanup::{chunk_paths, collect_candidate_paths, map_listed_objects, normalize_paths};
pub use error::{AssetError, AssetResult};

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    /// Declared MIME type. Empty or `application/octet-stream` falls back to
    /// a guess from the file name.
    pub content_type: String,
    pub bytes: Bytes,
}

/// Outcome of [`AssetManager::delete_product`].
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeletion {
    /// Object keys confirmed absent after cleanup.
    pub removed: Vec<String>,
    /// Object keys whose removal failed and need manual follow-up.
    pub failed_paths: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of [`AssetManager::delete_image`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDeletion {
    pub deleted: ProductImage,
    /// The image promoted to primary, if the deleted one was primary.
    pub promoted: Option<ProductImage>,
}

/// Coordinates image rows and backend objects.
#[derive(Clone)]
pub struct AssetManager {
    store: Arc<dyn ImageStore>,
    catalog: CatalogStore,
    batch_size: usize,
}

impl AssetManager {
    pub fn new(store: Arc<dyn ImageStore>, catalog: CatalogStore) -> Self {
        Self {
            store,
            catalog,
            batch_size: STORAGE_BATCH_SIZE,
        }
    }

    /// Overrides the removal batch and listing page size.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch size must be greater than 0");
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn provider(&self) -> StorageProvider {
        self.store.provider()
    }

    /// Stores an image for `product_id` and records it. The product's first
    /// image becomes primary.
    ///
    /// # Errors
    ///
    /// - `Validation` naming the MIME type or size constraint that failed
    /// - `NotFound` if the product does not exist
    /// - `Storage` if the backend write fails
    pub async fn upload(&self, product_id: &str, file: UploadedFile) -> AssetResult<ProductImage> {
        let content_type = validate_upload(&file)?;

        if self.catalog.get_product(product_id).await?.is_none() {
            return Err(AssetError::NotFound("product"));
        }

        let key = object_key(&self.store.namespace(product_id), &file.file_name, content_type);
        let stored = self.store.upload(&key, file.bytes, content_type).await?;

        match self
            .catalog
            .insert_image(product_id, &stored.url, &stored.storage_path)
            .await
        {
            Ok(image) => {
                counter!("storefront_uploads_total", "provider" => self.store.provider().as_str())
                    .increment(1);
                info!(
                    product_id,
                    image_id = %image.id,
                    storage_path = %image.storage_path,
                    is_primary = image.is_primary,
                    "Image uploaded"
                );
                Ok(image)
            },
            Err(e) => {
                // Row was not written; the object would be an orphan.
                if let Err(cleanup) = self
                    .store
                    .remove(std::slice::from_ref(&stored.storage_path))
                    .await
                {
                    warn!(
                        storage_path = %stored.storage_path,
                        error = %cleanup,
                        "Failed to remove object after catalog insert failed"
                    );
                }
                Err(e.into())
            },
        }
    }

    /// Makes `image_id` the product's only primary image. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image does not belong to the product.
    pub async fn set_primary(&self, image_id: &str, product_id: &str) -> AssetResult<ProductImage> {
        Ok(self.catalog.set_primary(image_id, product_id).await?)
    }

    /// Removes the stored object, then the row, promoting another image if
    /// the deleted one was primary.
    ///
    /// A backend "not found" counts as success; any other backend failure is
    /// logged and the row is deleted anyway.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image does not belong to the product.
    pub async fn delete_image(&self, image_id: &str, product_id: &str) -> AssetResult<ImageDeletion> {
        let image = self
            .catalog
            .find_image(image_id, product_id)
            .await?
            .ok_or(AssetError::NotFound("image"))?;

        let paths = collect_candidate_paths(std::slice::from_ref(&image), self.store.as_ref());
        if paths.is_empty() {
            warn!(image_id, product_id, url = %image.url, "Image has no resolvable storage key");
        } else {
            match self.store.remove(&paths).await {
                Ok(()) => {},
                Err(e) if e.is_not_found() => {},
                Err(e) => {
                    counter!("storefront_cleanup_failures_total").increment(1);
                    warn!(
                        image_id,
                        product_id,
                        storage_path = %paths[0],
                        error = %e,
                        "Failed to remove stored image, deleting row anyway"
                    );
                },
            }
        }

        let promoted = self
            .catalog
            .delete_image_and_promote(image_id, product_id)
            .await?;
        info!(
            image_id,
            product_id,
            promoted = promoted.as_ref().map(|i| i.id.as_str()),
            "Image deleted"
        );

        Ok(ImageDeletion {
            deleted: image,
            promoted,
        })
    }

    /// Removes every stored object of a product, then the product itself.
    ///
    /// Cleanup reconciles the image rows with a listing of the product's
    /// namespace. Cleanup problems end up in `warnings` and `failed_paths`.
    ///
    /// # Errors
    ///
    /// Only relational failures: `NotFound` for an unknown product, or a
    /// catalog error from the delete itself.
    pub async fn delete_product(&self, product_id: &str) -> AssetResult<ProductDeletion> {
        let detail = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or(AssetError::NotFound("product"))?;

        let deletion = self.cleanup_product_storage(product_id, &detail.images).await;

        self.catalog.delete_product(product_id).await?;

        if deletion.warnings.is_empty() {
            info!(
                product_id,
                removed = deletion.removed.len(),
                "Product deleted"
            );
        } else {
            warn!(
                product_id,
                removed = deletion.removed.len(),
                failed = deletion.failed_paths.len(),
                warnings = ?deletion.warnings,
                "Product deleted with storage cleanup problems"
            );
        }
        Ok(deletion)
    }

    async fn cleanup_product_storage(
        &self,
        product_id: &str,
        images: &[ProductImage],
    ) -> ProductDeletion {
        let store = self.store.as_ref();
        let mut deletion = ProductDeletion::default();

        let tracked = collect_candidate_paths(images, store);
        let namespace = store.namespace(product_id);
        let listed = match cleanup::list_namespace(store, &namespace, self.batch_size).await {
            Ok(listed) => listed,
            Err(e) => {
                counter!("storefront_cleanup_failures_total").increment(1);
                warn!(product_id, %namespace, error = %e, "Listing product namespace failed");
                deletion
                    .warnings
                    .push(format!("could not list '{namespace}': {e}"));
                Vec::new()
            },
        };

        let candidates = normalize_paths(tracked.iter().chain(listed.iter()));
        let report = cleanup::remove_in_batches(store, &candidates, self.batch_size).await;

        if !report.failed.is_empty() {
            deletion.warnings.push(format!(
                "{} stored object(s) could not be removed",
                report.failed.len()
            ));
        }
        deletion.removed = report.removed;
        deletion.failed_paths = report.failed;
        deletion
    }
}

/// Returns the effective content type.
fn validate_upload(file: &UploadedFile) -> AssetResult<&'static str> {
    let declared = file.content_type.trim();
    let candidate = if declared.is_empty() || declared == "application/octet-stream" {
        mime_guess::from_path(&file.file_name)
            .iter_raw()
            .find(|guess| ALLOWED_IMAGE_TYPES.contains(guess))
            .unwrap_or(declared)
    } else {
        declared
    };

    // Return the allow-list entry so the result does not borrow `file`.
    let Some(content_type) = ALLOWED_IMAGE_TYPES
        .iter()
        .copied()
        .find(|allowed| *allowed == candidate)
    else {
        return Err(AssetError::validation(
            "file",
            format!(
                "content type '{candidate}' is not allowed (allowed: {})",
                ALLOWED_IMAGE_TYPES.join(", ")
            ),
        ));
    };
    if file.bytes.is_empty() {
        return Err(AssetError::validation("file", "file is empty"));
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AssetError::validation(
            "file",
            format!(
                "file is {} bytes, larger than the {} MiB limit",
                file.bytes.len(),
                MAX_UPLOAD_BYTES / (1024 * 1024)
            ),
        ));
    }
    Ok(content_type)
}

/// `{namespace}/{unix_ms}-{random}.{ext}`, unique per upload.
fn object_key(namespace: &str, file_name: &str, content_type: &str) -> String {
    let ext = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.bytes().all(|b| b.is_ascii_alphanumeric()))
        .unwrap_or_else(|| extension_for(content_type).to_string());

    format!(
        "{}/{}-{}.{}",
        namespace.trim_end_matches('/'),
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        ext
    )
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}
