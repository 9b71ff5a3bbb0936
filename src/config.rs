//! Configuration types for the storefront service.
//!
//! This module provides configuration structs for loading and validating
//! service settings from a TOML file (`storefront.toml` by default). It
//! includes:
//!
//! - [`Config`] - Root configuration struct
//! - [`ServerConfig`] - HTTP listener and request handling
//! - [`RateLimitConfig`] - Fixed-window policies for API routes
//! - [`AuthConfig`] - Session signing and configured accounts
//! - [`StorageConfig`] - Image storage provider selection
//!
//! Every section has defaults suitable for local development. Secrets can
//! be supplied through environment variables, which take precedence over
//! the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::constants;
use crate::services::storage::StorageProvider;

/// Environment variable overriding `auth.session_secret`.
pub const ENV_SESSION_SECRET: &str = "STOREFRONT_SESSION_SECRET";
/// Environment variable overriding `storage.object_store.service_key`.
pub const ENV_OBJECT_STORE_KEY: &str = "STOREFRONT_OBJECT_STORE_KEY";
/// Environment variable overriding `storage.image_cdn.api_secret`.
pub const ENV_CDN_API_SECRET: &str = "STOREFRONT_CDN_API_SECRET";

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// storefront.toml configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub request_timeout_secs: u64,
    /// Trust `X-Forwarded-For` / `X-Real-IP` when deriving the client address.
    pub trust_forwarded_headers: bool,
    /// Same-origin check on mutating admin API requests.
    pub csrf_protection: bool,
    /// Allowed CORS origins. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: constants::DEFAULT_BIND.to_string(),
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT_SECS,
            trust_forwarded_headers: true,
            csrf_protection: true,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests per window on `/api/auth*`.
    pub credentials_max: u32,
    /// Requests per window on every other `/api*` route.
    pub api_max: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            credentials_max: constants::CREDENTIALS_RATE_LIMIT_MAX,
            api_max: constants::API_RATE_LIMIT_MAX,
            window_secs: constants::RATE_LIMIT_WINDOW.as_secs(),
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Key material for session tokens. Without it every admin route is denied.
    pub session_secret: Option<String>,
    pub session_ttl_secs: u64,
    /// Mark the session cookie `Secure`.
    pub secure_cookie: bool,
    pub accounts: Vec<AccountConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_secs: constants::DEFAULT_SESSION_TTL_SECS,
            secure_cookie: false,
            accounts: Vec::new(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// A back-office account. The digest is produced by `storefront hash-password`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub email: String,
    #[serde(default = "default_role")]
    pub role: String,
    pub password_digest: String,
}

fn default_role() -> String {
    constants::ADMIN_ROLE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "storefront.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    pub object_store: Option<ObjectStoreConfig>,
    pub image_cdn: Option<ImageCdnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL of the storage API (e.g. `https://project.example.co`).
    pub url: String,
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_bucket() -> String {
    constants::DEFAULT_BUCKET.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageCdnConfig {
    pub cloud_name: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_cdn_folder")]
    pub folder: String,
    #[serde(default = "default_cdn_api_base")]
    pub api_base: String,
}

fn default_cdn_folder() -> String {
    constants::DEFAULT_CDN_FOLDER.to_string()
}

fn default_cdn_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl Config {
    /// Load configuration from storefront.toml in the current directory.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Path::new("storefront.toml");
        if !path.exists() {
            let mut config = Self::default();
            config.apply_env_overrides();
            return Ok(config);
        }
        Self::load_from(path)
    }

    /// Load configuration from the specified path, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Replace secrets with values from the environment when present.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secret) = non_empty_env(ENV_SESSION_SECRET) {
            self.auth.session_secret = Some(secret);
        }
        if let Some(key) = non_empty_env(ENV_OBJECT_STORE_KEY)
            && let Some(store) = self.storage.object_store.as_mut()
        {
            store.service_key = Some(key);
        }
        if let Some(secret) = non_empty_env(ENV_CDN_API_SECRET)
            && let Some(cdn) = self.storage.image_cdn.as_mut()
        {
            cdn.api_secret = Some(secret);
        }
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every problem found:
    /// - Unparseable bind address
    /// - Zero rate-limit quotas or window
    /// - Selected storage provider without its settings or credentials
    /// - Malformed account password digests
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Server
        if self.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.bind is not a socket address (got: '{}')",
                self.server.bind
            ));
        }
        if self.server.request_timeout_secs == 0 {
            errors.push("server.request_timeout_secs cannot be 0".to_string());
        }

        // 2. Rate limiting
        if self.rate_limit.enabled {
            if self.rate_limit.credentials_max == 0 || self.rate_limit.api_max == 0 {
                errors.push(
                    "rate_limit quotas must be positive (set enabled = false to disable)"
                        .to_string(),
                );
            }
            if self.rate_limit.window_secs == 0 {
                errors.push("rate_limit.window_secs cannot be 0".to_string());
            }
        }

        // 3. Sessions and accounts
        match self.auth.session_secret.as_deref() {
            None | Some("") => warnings.push(format!(
                "auth.session_secret is not set; every admin route will be denied\n  \
                 Set it in the config file or via {ENV_SESSION_SECRET}"
            )),
            Some(secret) if secret.len() < constants::MIN_SESSION_SECRET_LEN => {
                warnings.push(format!(
                    "auth.session_secret is shorter than {} characters",
                    constants::MIN_SESSION_SECRET_LEN
                ));
            },
            Some(_) => {},
        }
        if self.auth.accounts.is_empty() {
            warnings.push("auth.accounts is empty; nobody can sign in".to_string());
        }
        for account in &self.auth.accounts {
            if !account.email.contains('@') {
                errors.push(format!("account email is invalid: '{}'", account.email));
            }
            if !crate::gate::is_bcrypt_digest(account.password_digest.trim()) {
                errors.push(format!(
                    "password_digest for '{}' must be a bcrypt digest\n  \
                     Generate one with: storefront hash-password <PASSWORD>",
                    account.email
                ));
            }
        }

        // 4. Storage provider
        match self.storage.provider {
            StorageProvider::ObjectStore => match &self.storage.object_store {
                None => errors.push(
                    "storage.provider = \"object_store\" requires a [storage.object_store] table"
                        .to_string(),
                ),
                Some(store) => {
                    match url::Url::parse(&store.url) {
                        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {},
                        Ok(_) => errors.push(format!(
                            "storage.object_store.url must start with http or https (got: '{}')",
                            store.url
                        )),
                        Err(e) => errors.push(format!(
                            "storage.object_store.url is invalid: '{}' ({e})",
                            store.url
                        )),
                    }
                    if store.service_key.as_deref().is_none_or(str::is_empty) {
                        errors.push(format!(
                            "storage.object_store.service_key is missing (or set {ENV_OBJECT_STORE_KEY})"
                        ));
                    }
                    if store.bucket.trim().is_empty() {
                        errors.push("storage.object_store.bucket cannot be empty".to_string());
                    }
                },
            },
            StorageProvider::ImageCdn => match &self.storage.image_cdn {
                None => errors.push(
                    "storage.provider = \"image_cdn\" requires a [storage.image_cdn] table"
                        .to_string(),
                ),
                Some(cdn) => {
                    if cdn.cloud_name.trim().is_empty() {
                        errors.push("storage.image_cdn.cloud_name cannot be empty".to_string());
                    }
                    if cdn.api_key.trim().is_empty() {
                        errors.push("storage.image_cdn.api_key cannot be empty".to_string());
                    }
                    if cdn.api_secret.as_deref().is_none_or(str::is_empty) {
                        errors.push(format!(
                            "storage.image_cdn.api_secret is missing (or set {ENV_CDN_API_SECRET})"
                        ));
                    }
                },
            },
            StorageProvider::Memory => warnings.push(
                "storage.provider = \"memory\" keeps images in process memory only".to_string(),
            ),
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-formed bcrypt digest; only its shape is checked here.
    const DIGEST: &str = "$2b$04$EGdrhbkWSbG1hQ1h4ODY7OS3ZbaDL1KxWbkbaeN4QkNyB5ggl3Ztq";

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.session_secret = Some("a-long-enough-session-secret".to_string());
        config.auth.accounts.push(AccountConfig {
            email: "admin@example.com".to_string(),
            role: "ADMIN".to_string(),
            password_digest: DIGEST.to_string(),
        });
        config
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, constants::DEFAULT_BIND);
        assert_eq!(config.rate_limit.credentials_max, 20);
        assert_eq!(config.rate_limit.api_max, 60);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.storage.provider, StorageProvider::Memory);
        assert!(config.server.trust_forwarded_headers);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = format!(
            r#"
[server]
bind = "0.0.0.0:8080"
csrf_protection = false

[rate_limit]
api_max = 120

[auth]
session_secret = "0123456789abcdef0123"

[[auth.accounts]]
email = "ops@example.com"
password_digest = "{DIGEST}"

[database]
path = ":memory:"

[storage]
provider = "image_cdn"

[storage.image_cdn]
cloud_name = "demo"
api_key = "key"
api_secret = "secret"
"#
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(!config.server.csrf_protection);
        assert_eq!(config.rate_limit.api_max, 120);
        assert_eq!(config.rate_limit.credentials_max, 20);
        assert_eq!(config.auth.accounts[0].role, "ADMIN");
        assert_eq!(config.storage.provider, StorageProvider::ImageCdn);
        let cdn = config.storage.image_cdn.as_ref().unwrap();
        assert_eq!(cdn.folder, constants::DEFAULT_CDN_FOLDER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_valid_config() {
        let result = valid_config().validate().unwrap();
        // memory provider warning only
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_missing_secret_is_warning_not_error() {
        let mut config = valid_config();
        config.auth.session_secret = None;
        let result = config.validate().unwrap();
        assert!(result.has_warnings());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.contains("session_secret"))
        );
    }

    #[test]
    fn test_validate_bad_bind() {
        let mut config = valid_config();
        config.server.bind = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_quota() {
        let mut config = valid_config();
        config.rate_limit.api_max = 0;
        assert!(config.validate().is_err());

        config.rate_limit.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_digest() {
        let mut config = valid_config();
        config.auth.accounts[0].password_digest = "plaintext".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("hash-password"));

        // Plain hex digests are not bcrypt.
        config.auth.accounts[0].password_digest = "0".repeat(64);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_object_store_requires_credentials() {
        let mut config = valid_config();
        config.storage.provider = StorageProvider::ObjectStore;
        assert!(config.validate().is_err());

        config.storage.object_store = Some(ObjectStoreConfig {
            url: "ftp://storage.example.com".to_string(),
            service_key: Some("key".to_string()),
            bucket: "product-images".to_string(),
        });
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http or https"));

        config.storage.object_store.as_mut().unwrap().url =
            "https://storage.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_image_cdn_requires_secret() {
        let mut config = valid_config();
        config.storage.provider = StorageProvider::ImageCdn;
        config.storage.image_cdn = Some(ImageCdnConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: None,
            folder: default_cdn_folder(),
            api_base: default_cdn_api_base(),
        });
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("storefront.toml");
        fs::write(&path, "[database]\npath = \"catalog.db\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.database.path, "catalog.db");
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("storefront.toml");
        fs::write(&path, "[server\nbind = ").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
