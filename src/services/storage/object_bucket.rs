//! Bucket-based object storage backend over HTTP.
//!
//! Talks to a storage API exposing the common bucket endpoints:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | upload    | `POST   {base}/storage/v1/object/{bucket}/{path}` |
//! | remove    | `DELETE {base}/storage/v1/object/{bucket}` with `{"prefixes": [...]}` |
//! | list      | `POST   {base}/storage/v1/object/list/{bucket}` with `{"prefix", "limit", "offset"}` |
//!
//! Objects are publicly readable at
//! `{base}/storage/v1/object/public/{bucket}/{path}`.

use super::backend::ImageStore;
use super::error::{StorageError, StorageResult};
use super::types::{ListPage, ListedObject, Listing, StorageProvider, StoredObject};
use super::validation::validate_object_path;
use crate::config::ObjectStoreConfig;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use tracing::debug;

/// Characters escaped inside an object path. Separators stay intact.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HTTP client for a bucket-based object storage API.
#[derive(Clone)]
pub struct ObjectBucketStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

#[derive(Serialize)]
struct RemoveBody<'a> {
    prefixes: &'a [String],
}

#[derive(Serialize)]
struct ListBody<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    #[serde(rename = "sortBy")]
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

impl ObjectBucketStore {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Misconfigured` if the service key is missing or the base URL
    /// is not an http(s) URL.
    pub fn from_config(config: &ObjectStoreConfig, client: reqwest::Client) -> StorageResult<Self> {
        let service_key = config
            .service_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StorageError::Misconfigured("object store service key is missing".into()))?;

        let parsed = url::Url::parse(config.url.trim()).map_err(|e| {
            StorageError::Misconfigured(format!("object store URL is invalid: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StorageError::Misconfigured(
                "object store URL must use http or https".into(),
            ));
        }

        Ok(Self {
            client,
            base_url: config.url.trim().trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: service_key.to_string(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            utf8_percent_encode(path, PATH_SEGMENT)
        )
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            utf8_percent_encode(path, PATH_SEGMENT)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

/// Turns a non-success response into a [`StorageError`].
async fn error_from_response(response: reqwest::Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or(body);

    if status == 404 || message.to_ascii_lowercase().contains("not found") {
        StorageError::NotFound(message)
    } else {
        StorageError::rejected(status, message)
    }
}

#[async_trait]
impl ImageStore for ObjectBucketStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::ObjectStore
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
        let path = validate_object_path(path)?;
        let response = self
            .authorized(self.client.post(self.object_url(&path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        debug!(bucket = %self.bucket, %path, "Object uploaded");
        Ok(StoredObject {
            url: self.public_url(&path),
            storage_path: path,
        })
    }

    async fn remove(&self, paths: &[String]) -> StorageResult<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/storage/v1/object/{}", self.base_url, self.bucket)),
            )
            .json(&RemoveBody { prefixes: paths })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str, page: ListPage) -> StorageResult<Listing> {
        let offset = page
            .cursor
            .as_deref()
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);

        let response = self
            .authorized(self.client.post(format!(
                "{}/storage/v1/object/list/{}",
                self.base_url, self.bucket
            )))
            .json(&ListBody {
                prefix,
                limit: page.limit,
                offset,
                sort_by: SortBy {
                    column: "name",
                    order: "asc",
                },
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let objects: Vec<ListedObject> = response
            .json()
            .await
            .map_err(|e| StorageError::Protocol(format!("invalid listing body: {e}")))?;

        Ok(Listing::offset_page(objects, &page))
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        extract_path_from_public_url(url, &self.bucket)
    }
}

/// Parses the object path out of a public object URL for `bucket`.
pub(crate) fn extract_path_from_public_url(url: &str, bucket: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = url::Url::parse(trimmed).ok()?;
    let prefix = format!("/storage/v1/object/public/{bucket}/");
    let encoded = parsed.path().strip_prefix(&prefix)?;
    let decoded = percent_decode_str(encoded).decode_utf8().ok()?;
    let decoded = decoded.trim();
    if decoded.is_empty() {
        return None;
    }
    validate_object_path(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObjectBucketStore {
        ObjectBucketStore::from_config(
            &ObjectStoreConfig {
                url: "https://project.storage.example.co/".to_string(),
                service_key: Some("service-key".to_string()),
                bucket: "product-images".to_string(),
            },
            reqwest::Client::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_public_object_path() {
        let url = "https://example.storage.co/storage/v1/object/public/product-images/abc123/image-1.jpg";
        assert_eq!(
            extract_path_from_public_url(url, "product-images").as_deref(),
            Some("abc123/image-1.jpg")
        );
    }

    #[test]
    fn test_extract_decodes_percent_escapes() {
        let url = "https://example.storage.co/storage/v1/object/public/product-images/p1/my%20photo.jpg";
        assert_eq!(
            extract_path_from_public_url(url, "product-images").as_deref(),
            Some("p1/my photo.jpg")
        );
    }

    #[test]
    fn test_extract_rejects_unrelated_urls() {
        assert!(extract_path_from_public_url("https://example.com/photo.jpg", "product-images").is_none());
        assert!(extract_path_from_public_url("", "product-images").is_none());
        assert!(extract_path_from_public_url("not a url", "product-images").is_none());
        let other_bucket = "https://example.storage.co/storage/v1/object/public/other/p1/a.jpg";
        assert!(extract_path_from_public_url(other_bucket, "product-images").is_none());
    }

    #[test]
    fn test_public_url_round_trips_through_path_from_url() {
        let store = store();
        let url = store.public_url("p1/1700000000000-abc.png");
        assert_eq!(
            url,
            "https://project.storage.example.co/storage/v1/object/public/product-images/p1/1700000000000-abc.png"
        );
        assert_eq!(
            store.path_from_url(&url).as_deref(),
            Some("p1/1700000000000-abc.png")
        );
    }

    #[test]
    fn test_missing_key_is_misconfiguration() {
        let result = ObjectBucketStore::from_config(
            &ObjectStoreConfig {
                url: "https://storage.example.co".to_string(),
                service_key: None,
                bucket: "product-images".to_string(),
            },
            reqwest::Client::new(),
        );
        assert!(matches!(result, Err(StorageError::Misconfigured(_))));
    }
}
