//! Managed image CDN backend.
//!
//! Uploads are signed form posts to `/v1_1/{cloud}/image/upload`; deletions
//! are one signed `/image/destroy` call per public id; listing goes through
//! the admin resources endpoint with basic auth. A request signature is the
//! SHA-1 of the sorted `key=value&...` parameters followed by the API secret.

use super::backend::ImageStore;
use super::error::{StorageError, StorageResult};
use super::types::{ListPage, ListedObject, Listing, StorageProvider, StoredObject};
use super::validation::validate_object_path;
use crate::config::ImageCdnConfig;
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// HTTP client for the image CDN upload and admin APIs.
#[derive(Clone)]
pub struct ImageCdnStore {
    client: reqwest::Client,
    api_base: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: Option<String>,
}

#[derive(Deserialize)]
struct ResourcesResponse {
    #[serde(default)]
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Resource {
    public_id: String,
}

impl ImageCdnStore {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Misconfigured` if the cloud name, API key or secret is missing.
    pub fn from_config(config: &ImageCdnConfig, client: reqwest::Client) -> StorageResult<Self> {
        if config.cloud_name.trim().is_empty() {
            return Err(StorageError::Misconfigured("CDN cloud name is missing".into()));
        }
        if config.api_key.trim().is_empty() {
            return Err(StorageError::Misconfigured("CDN API key is missing".into()));
        }
        let api_secret = config
            .api_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StorageError::Misconfigured("CDN API secret is missing".into()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.trim().to_string(),
            api_key: config.api_key.trim().to_string(),
            api_secret: api_secret.to_string(),
            folder: config.folder.trim().trim_matches('/').to_string(),
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/v1_1/{}/{}", self.api_base, self.cloud_name, suffix)
    }

    async fn destroy(&self, public_id: &str) -> StorageResult<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", timestamp.clone());
        let signature = sign(&params, &self.api_secret);

        let response = self
            .client
            .post(self.endpoint("image/destroy"))
            .form(&[
                ("api_key", self.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("public_id", public_id),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StorageError::rejected(status.as_u16(), body));
        }

        let parsed: DestroyResponse = serde_json::from_str(&body)
            .map_err(|e| StorageError::Protocol(format!("invalid destroy body: {e}")))?;
        match parsed.result.as_deref() {
            Some("ok") => Ok(()),
            Some("not found") => Err(StorageError::NotFound(public_id.to_string())),
            other => Err(StorageError::Protocol(format!(
                "unexpected destroy result for {public_id}: {other:?}"
            ))),
        }
    }
}

/// Signs request parameters: SHA-1 over `k=v&...` (sorted by key) + secret.
pub(crate) fn sign(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let serialized = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(serialized.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl ImageStore for ImageCdnStore {
    fn provider(&self) -> StorageProvider {
        StorageProvider::ImageCdn
    }

    fn namespace(&self, product_id: &str) -> String {
        let joined = format!("{}/{}", self.folder, product_id);
        let mut collapsed = String::with_capacity(joined.len());
        for c in joined.chars() {
            if c == '/' && collapsed.ends_with('/') {
                continue;
            }
            collapsed.push(c);
        }
        collapsed.trim_matches('/').to_string()
    }

    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let public_id = validate_object_path(path)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.clone());
        params.insert("timestamp", timestamp.clone());
        let signature = sign(&params, &self.api_secret);

        let file_name = public_id.rsplit('/').next().unwrap_or("upload").to_string();
        let part = reqwest::multipart::Part::stream(data)
            .file_name(file_name)
            .mime_str(content_type)?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("public_id", public_id.clone())
            .text("signature", signature);

        let response = self
            .client
            .post(self.endpoint("image/upload"))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let payload: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Protocol(format!("invalid upload body: {e}")))?;

        match (status.is_success(), payload.secure_url, payload.public_id) {
            (true, Some(url), Some(public_id)) => {
                debug!(%public_id, "Image uploaded to CDN");
                Ok(StoredObject {
                    url,
                    storage_path: public_id,
                })
            },
            _ => {
                let message = payload
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "CDN upload failed".to_string());
                Err(StorageError::rejected(status.as_u16(), message))
            },
        }
    }

    async fn remove(&self, paths: &[String]) -> StorageResult<()> {
        // The destroy endpoint takes one public id per call.
        if let [single] = paths {
            return self.destroy(single).await;
        }

        let mut first_error = None;
        for public_id in paths {
            match self.destroy(public_id).await {
                Ok(()) => {},
                Err(e) if e.is_not_found() => {
                    debug!(%public_id, "CDN asset already absent");
                },
                Err(e) => {
                    warn!(%public_id, error = %e, "CDN asset removal failed");
                    first_error.get_or_insert(e);
                },
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn list(&self, prefix: &str, page: ListPage) -> StorageResult<Listing> {
        let scope = format!("{}/", prefix.trim_end_matches('/'));
        let max_results = page.limit.to_string();
        let mut query = vec![
            ("prefix", scope.clone()),
            ("max_results", max_results),
            ("type", "upload".to_string()),
        ];
        if let Some(cursor) = page.cursor {
            query.push(("next_cursor", cursor));
        }

        let response = self
            .client
            .get(self.endpoint("resources/image/upload"))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(Listing::default());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::rejected(status.as_u16(), body));
        }

        let parsed: ResourcesResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Protocol(format!("invalid resources body: {e}")))?;

        let objects = parsed
            .resources
            .into_iter()
            .filter_map(|r| r.public_id.strip_prefix(&scope).map(ListedObject::named))
            .collect();

        Ok(Listing {
            objects,
            next_cursor: parsed.next_cursor.filter(|c| !c.is_empty()),
        })
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        extract_public_id_from_url(url, &self.cloud_name)
    }
}

/// Recovers a public id from a delivery URL such as
/// `https://res.cloudinary.com/{cloud}/image/upload/v1700000000/{public_id}.{format}`.
///
/// The delivery URL is the public id followed by `.{format}`, so exactly one
/// trailing extension is stripped: `p1/1700-abc.jpg.jpg` gives `p1/1700-abc.jpg`
/// (ids issued by this store keep the file extension) and `p1/legacy.png`
/// gives `p1/legacy`.
pub(crate) fn extract_public_id_from_url(url: &str, cloud_name: &str) -> Option<String> {
    let parsed = url::Url::parse(url.trim()).ok()?;
    let marker = format!("/{cloud_name}/image/upload/");
    let rest = parsed.path().split_once(&marker)?.1;

    let rest = match rest.split_once('/') {
        Some((version, tail))
            if version.len() > 1
                && version.starts_with('v')
                && version[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            tail
        },
        _ => rest,
    };

    let decoded = percent_decode_str(rest).decode_utf8().ok()?;
    let (dir, file) = match decoded.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, decoded.as_ref()),
    };
    let file = match file.rsplit_once('.') {
        Some((stem, format)) if !stem.is_empty() && !format.is_empty() => stem,
        _ => file,
    };

    let public_id = match dir {
        Some(dir) => format!("{dir}/{file}"),
        None => file.to_string(),
    };
    validate_object_path(&public_id).ok()
}
