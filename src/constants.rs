//! Shared constants for the storefront service.
//!
//! Limits and defaults used across the gate, the asset lifecycle and the
//! configuration layer live here so they stay in one place.

use std::time::Duration;

/// Default bind address for `storefront serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Default request timeout for the HTTP layer (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Rate limiting
// =============================================================================

/// Requests allowed per window on credential-submission endpoints.
pub const CREDENTIALS_RATE_LIMIT_MAX: u32 = 20;

/// Requests allowed per window on general API endpoints.
pub const API_RATE_LIMIT_MAX: u32 = 60;

/// Fixed window length shared by both default policies.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

// =============================================================================
// Sessions
// =============================================================================

/// Role claim that grants access to the back-office.
pub const ADMIN_ROLE: &str = "ADMIN";

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Default session lifetime (seconds).
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60 * 8;

/// Minimum accepted length of the session signing secret.
pub const MIN_SESSION_SECRET_LEN: usize = 16;

// =============================================================================
// Image assets
// =============================================================================

/// Upper bound on an uploaded image (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// MIME types accepted for product images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Paths per backend removal call and per listing page.
pub const STORAGE_BATCH_SIZE: usize = 100;

/// Default bucket for the object storage backend.
pub const DEFAULT_BUCKET: &str = "product-images";

/// Default folder for the image CDN backend.
pub const DEFAULT_CDN_FOLDER: &str = "storefront/products";

// =============================================================================
// Catalog
// =============================================================================

/// Search terms are truncated to this many characters.
pub const MAX_SEARCH_LEN: usize = 100;

/// Stock at or below this level counts as "low stock" on the dashboard.
pub const LOW_STOCK_THRESHOLD: i64 = 5;
