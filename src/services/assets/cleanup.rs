//! Storage cleanup for deleted products.
//!
//! Candidate keys come from two sources: the catalog's image rows (a hint
//! that may be stale) and a full listing of the product's namespace in the
//! backend (authoritative). Their union is removed in batches; a failed
//! batch falls back to one call per key so a single bad key cannot block
//! the rest.

use metrics::counter;
use tracing::{debug, warn};

use crate::services::catalog::ProductImage;
use crate::services::storage::{ImageStore, ListPage, ListedObject, StorageResult};

/// Splits `paths` into consecutive groups of at most `size`.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn chunk_paths(paths: &[String], size: usize) -> Vec<&[String]> {
    assert!(size > 0, "chunk size must be greater than 0");
    paths.chunks(size).collect()
}

/// Trims every path, drops empty ones and removes duplicates, keeping the
/// first occurrence.
pub fn normalize_paths<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    paths
        .into_iter()
        .filter_map(|p| {
            let trimmed = p.as_ref().trim();
            (!trimmed.is_empty() && seen.insert(trimmed.to_string())).then(|| trimmed.to_string())
        })
        .collect()
}

/// Backend keys recorded on image rows. Rows with an empty key fall back to
/// the key parsed out of their public URL.
pub fn collect_candidate_paths(images: &[ProductImage], store: &dyn ImageStore) -> Vec<String> {
    normalize_paths(images.iter().filter_map(|image| {
        let recorded = image.storage_path.trim();
        if recorded.is_empty() {
            store.path_from_url(&image.url)
        } else {
            Some(recorded.to_string())
        }
    }))
}

/// Joins listed names onto the namespace they were listed under.
pub fn map_listed_objects(namespace: &str, objects: &[ListedObject]) -> Vec<String> {
    let namespace = namespace.trim_end_matches('/');
    normalize_paths(objects.iter().filter_map(|object| {
        let name = object.name.as_deref()?.trim();
        (!name.is_empty()).then(|| format!("{namespace}/{name}"))
    }))
}

/// Every object key under `namespace`, fetched page by page.
pub(crate) async fn list_namespace(
    store: &dyn ImageStore,
    namespace: &str,
    page_size: usize,
) -> StorageResult<Vec<String>> {
    let mut paths = Vec::new();
    let mut page = ListPage::first(page_size);

    loop {
        let listing = store.list(namespace, page.clone()).await?;
        paths.extend(map_listed_objects(namespace, &listing.objects));

        match listing.next_cursor {
            Some(cursor) if !listing.objects.is_empty() => page.cursor = Some(cursor),
            _ => break,
        }
    }

    Ok(normalize_paths(paths))
}

/// Outcome of removing a set of keys.
#[derive(Debug, Default)]
pub(crate) struct RemovalReport {
    /// Keys that are gone, including ones that were already absent.
    pub removed: Vec<String>,
    /// Keys whose removal failed for any other reason.
    pub failed: Vec<String>,
}

/// Removes `paths` in batches of `batch_size`, retrying a failed batch one
/// key at a time. Never returns an error; failures land in the report.
pub(crate) async fn remove_in_batches(
    store: &dyn ImageStore,
    paths: &[String],
    batch_size: usize,
) -> RemovalReport {
    let mut report = RemovalReport::default();

    for batch in chunk_paths(paths, batch_size) {
        match store.remove(batch).await {
            Ok(()) => report.removed.extend_from_slice(batch),
            Err(e) => {
                warn!(
                    provider = %store.provider(),
                    batch_len = batch.len(),
                    error = %e,
                    "Batch removal failed, retrying individually"
                );
                for path in batch {
                    match store.remove(std::slice::from_ref(path)).await {
                        Ok(()) => report.removed.push(path.clone()),
                        Err(e) if e.is_not_found() => {
                            debug!(%path, "Object already absent");
                            report.removed.push(path.clone());
                        },
                        Err(e) => {
                            warn!(
                                provider = %store.provider(),
                                %path,
                                error = %e,
                                "Object removal failed"
                            );
                            counter!("storefront_cleanup_failures_total").increment(1);
                            report.failed.push(path.clone());
                        },
                    }
                }
            },
        }
    }

    report
}
