//! In-memory image storage backend.
//!
//! Provides a fast, non-persistent object store using DashMap for
//! concurrent access. Used for local development and as the backend of the
//! test suite, where it can also inject removal and listing failures.

use super::backend::ImageStore;
use super::error::{StorageError, StorageResult};
use super::types::{ListPage, ListedObject, Listing, StorageProvider, StoredObject};
use super::validation::validate_object_path;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

const URL_SCHEME: &str = "memory://";

/// Entry stored in the memory backend.
#[derive(Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    stored_at: DateTime<Utc>,
}

/// Failure injected into removals of a specific path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Report the object as already absent.
    NotFound,
    /// Report a backend outage.
    Unavailable,
}

/// In-memory image backend using DashMap.
///
/// All data is lost when the process exits. Every removal call is recorded
/// so tests can assert on exactly which paths cleanup attempted.
///
/// # Example
///
/// ```ignore
/// use storefront::services::storage::MemoryImageStore;
///
/// let store = MemoryImageStore::new();
/// store.upload("p1/cover.png", image_bytes, "image/png").await?;
/// assert!(store.contains("p1/cover.png"));
/// ```
#[derive(Default)]
pub struct MemoryImageStore {
    objects: DashMap<String, MemoryObject>,
    removal_calls: Mutex<Vec<Vec<String>>>,
    failing_paths: DashMap<String, InjectedFailure>,
    fail_batches: AtomicBool,
    fail_listing: AtomicBool,
}

impl MemoryImageStore {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of objects in the store.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns true if an object exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// Content type recorded for `path`.
    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.get(path).map(|o| o.content_type.clone())
    }

    /// Object bytes and the time they were stored.
    pub fn get(&self, path: &str) -> Option<(Bytes, DateTime<Utc>)> {
        self.objects.get(path).map(|o| (o.data.clone(), o.stored_at))
    }

    /// Stores an object directly, bypassing the catalog (simulates untracked objects).
    pub fn seed(&self, path: &str, data: &[u8]) {
        self.objects.insert(
            path.to_string(),
            MemoryObject {
                data: Bytes::copy_from_slice(data),
                content_type: "application/octet-stream".to_string(),
                stored_at: Utc::now(),
            },
        );
    }

    /// Makes every removal touching `path` fail with `failure`.
    pub fn fail_removal_of(&self, path: &str, failure: InjectedFailure) {
        self.failing_paths.insert(path.to_string(), failure);
    }

    /// Makes every removal call with more than one path fail.
    pub fn fail_batch_removals(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    /// Makes listing fail.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    /// Paths passed to each removal call, in call order.
    pub fn removal_calls(&self) -> Vec<Vec<String>> {
        self.removal_calls.lock().clone()
    }

    /// Distinct paths any removal call was issued for, in first-seen order.
    pub fn attempted_paths(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for path in self.removal_calls.lock().iter().flatten() {
            if !seen.contains(path) {
                seen.push(path.clone());
            }
        }
        seen
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::Memory
    }

    fn namespace(&self, product_id: &str) -> String {
        product_id.to_string()
    }

    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let normalized = validate_object_path(path)?;
        if self.objects.contains_key(&normalized) {
            return Err(StorageError::rejected(409, "The resource already exists"));
        }

        self.objects.insert(
            normalized.clone(),
            MemoryObject {
                data,
                content_type: content_type.to_string(),
                stored_at: Utc::now(),
            },
        );

        Ok(StoredObject {
            url: format!("{URL_SCHEME}{normalized}"),
            storage_path: normalized,
        })
    }

    async fn remove(&self, paths: &[String]) -> StorageResult<()> {
        self.removal_calls.lock().push(paths.to_vec());

        if paths.len() > 1 && self.fail_batches.load(Ordering::SeqCst) {
            return Err(StorageError::rejected(503, "batch removal unavailable"));
        }

        for path in paths {
            match self.failing_paths.get(path).map(|f| *f) {
                Some(InjectedFailure::Unavailable) => {
                    return Err(StorageError::rejected(503, format!("cannot remove {path}")));
                },
                Some(InjectedFailure::NotFound) if paths.len() == 1 => {
                    return Err(StorageError::NotFound(path.clone()));
                },
                _ => {},
            }
        }

        for path in paths {
            self.objects.remove(path);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str, page: ListPage) -> StorageResult<Listing> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::rejected(503, "listing unavailable"));
        }

        let scope = format!("{}/", prefix.trim_end_matches('/'));
        let mut names: Vec<String> = self
            .objects
            .iter()
            .filter_map(|entry| entry.key().strip_prefix(&scope).map(str::to_string))
            .collect();

        // Sort by name for stable pagination
        names.sort();

        let offset = page
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);
        let objects = names
            .into_iter()
            .skip(offset)
            .take(page.limit)
            .map(ListedObject::named)
            .collect();

        Ok(Listing::offset_page(objects, &page))
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        url.trim()
            .strip_prefix(URL_SCHEME)
            .and_then(|path| validate_object_path(path).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_contains() {
        let store = MemoryImageStore::new();

        let stored = store
            .upload("p1/cover.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();

        assert_eq!(stored.storage_path, "p1/cover.png");
        assert_eq!(stored.url, "memory://p1/cover.png");
        assert!(store.contains("p1/cover.png"));
        assert_eq!(store.content_type("p1/cover.png").as_deref(), Some("image/png"));
        let (data, _) = store.get("p1/cover.png").unwrap();
        assert_eq!(&data[..], b"png");
    }

    #[tokio::test]
    async fn test_upload_does_not_overwrite() {
        let store = MemoryImageStore::new();
        store
            .upload("p1/a.png", Bytes::from_static(b"1"), "image/png")
            .await
            .unwrap();
        let err = store
            .upload("p1/a.png", Bytes::from_static(b"2"), "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Rejected { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_path_traversal_prevention() {
        let store = MemoryImageStore::new();

        for path in ["../etc/passwd", "../../etc/passwd", "/etc/passwd"] {
            let result = store.upload(path, Bytes::from_static(b"x"), "image/png").await;
            assert!(result.is_err(), "Path traversal not prevented for: {path}");
        }
    }

    #[tokio::test]
    async fn test_remove_missing_paths_is_ok() {
        let store = MemoryImageStore::new();
        store.seed("p1/a.jpg", b"a");

        store
            .remove(&["p1/a.jpg".to_string(), "p1/missing.jpg".to_string()])
            .await
            .unwrap();

        assert!(store.is_empty());
        assert_eq!(store.removal_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_list_pages_within_namespace() {
        let store = MemoryImageStore::new();
        store.seed("p1/a.jpg", b"a");
        store.seed("p1/b.jpg", b"b");
        store.seed("p1/c.jpg", b"c");
        store.seed("p10/z.jpg", b"z");

        let first = store.list("p1", ListPage::first(2)).await.unwrap();
        let names: Vec<_> = first.objects.iter().filter_map(|o| o.name.clone()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg"]);

        let second = store
            .list(
                "p1",
                ListPage {
                    limit: 2,
                    cursor: first.next_cursor,
                },
            )
            .await
            .unwrap();
        assert_eq!(second.objects, vec![ListedObject::named("c.jpg")]);
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryImageStore::new();
        store.seed("p1/a.jpg", b"a");
        store.seed("p1/b.jpg", b"b");
        store.fail_removal_of("p1/gone.jpg", InjectedFailure::NotFound);
        store.fail_batch_removals(true);

        let batch = vec!["p1/a.jpg".to_string(), "p1/b.jpg".to_string()];
        assert!(store.remove(&batch).await.is_err());
        assert_eq!(store.len(), 2);

        let err = store.remove(&["p1/gone.jpg".to_string()]).await.unwrap_err();
        assert!(err.is_not_found());

        store.remove(&["p1/a.jpg".to_string()]).await.unwrap();
        assert!(!store.contains("p1/a.jpg"));
        assert_eq!(
            store.attempted_paths(),
            ["p1/a.jpg", "p1/b.jpg", "p1/gone.jpg"]
        );
    }

    #[test]
    fn test_path_from_url() {
        let store = MemoryImageStore::new();
        assert_eq!(
            store.path_from_url("memory://p1/a.jpg").as_deref(),
            Some("p1/a.jpg")
        );
        assert!(store.path_from_url("https://cdn.example.com/a.jpg").is_none());
        assert!(store.path_from_url("memory://../x").is_none());
    }
}
