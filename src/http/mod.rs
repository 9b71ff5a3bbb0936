//! HTTP surface: public catalog, sign-in and the admin back-office.
//!
//! Middleware order (outermost first): trace id, CORS, timeout, edge gate.
//! Unknown paths go to a fallback handler, so the gate sees them too and
//! unknown admin paths are denied rather than answered with 404.

pub mod error;
mod handlers;
pub mod metrics;
pub mod trace;

pub use error::{AppError, ErrorResponse};
pub use trace::TraceId;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::MAX_UPLOAD_BYTES;
use crate::gate::{ConfiguredAccounts, CredentialVerifier, Gate, edge_gate};
use crate::services::assets::AssetManager;
use crate::services::catalog::CatalogStore;
use crate::services::storage::build_store;

/// Oversized files must still reach upload validation to get a field error.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * 2;

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogStore,
    pub assets: AssetManager,
    pub gate: Gate,
    pub credentials: Arc<dyn CredentialVerifier>,
    /// Adds `Secure` to the session cookie.
    pub secure_cookie: bool,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Opens the catalog, the configured storage backend and the gate.
    ///
    /// # Errors
    ///
    /// Fails if the database cannot be opened or the storage backend is
    /// misconfigured.
    pub fn from_config(config: &Config, metrics: Option<PrometheusHandle>) -> Result<Self> {
        let catalog = CatalogStore::open(&config.database.path)
            .with_context(|| format!("Failed to open catalog at {}", config.database.path))?;
        let store = build_store(&config.storage)?;
        let assets = AssetManager::new(store, catalog.clone());

        let gate = Gate::from_config(config);
        if gate.sessions().is_none() {
            warn!("No session secret configured; admin routes will be refused");
        }

        let accounts = ConfiguredAccounts::from_config(&config.auth.accounts);
        info!(
            accounts = accounts.len(),
            provider = %assets.provider(),
            database = %config.database.path,
            "Application state ready"
        );

        Ok(Self {
            catalog,
            assets,
            gate,
            credentials: Arc::new(accounts),
            secure_cookie: config.auth.secure_cookie,
            metrics,
        })
    }
}

/// Builds the router with every route and middleware layer.
pub fn router(state: AppState, config: &Config) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/login", get(handlers::login_page))
        .route("/unauthorized", get(handlers::unauthorized_page))
        .route("/api/products", get(handlers::list_products))
        .route("/api/products/{slug}", get(handlers::get_published_product))
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout));

    let admin = Router::new()
        .route("/admin", get(handlers::admin_home))
        .route("/admin/dashboard", get(handlers::admin_home))
        .route(
            "/api/upload",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/api/admin/dashboard", get(handlers::dashboard))
        .route(
            "/api/admin/products",
            get(handlers::admin_list_products).post(handlers::create_product),
        )
        .route(
            "/api/admin/products/{id}",
            get(handlers::admin_get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/api/admin/products/{id}/featured",
            post(handlers::toggle_featured),
        )
        .route("/api/admin/products/{id}/status", post(handlers::toggle_status))
        .route(
            "/api/admin/products/{id}/images/{image_id}/primary",
            post(handlers::set_primary_image),
        )
        .route(
            "/api/admin/products/{id}/images/{image_id}",
            axum::routing::delete(handlers::delete_image),
        );

    let mut router = Router::new()
        .merge(public)
        .merge(admin)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.gate.clone(), edge_gate))
        .layer(timeout_layer(config.server.request_timeout()));

    if let Some(cors) = cors_layer(&config.server.cors_origins) {
        router = router.layer(cors);
    }

    router
        .layer(middleware::from_fn(trace::trace_id_middleware))
        .with_state(state)
}

/// Requests still running after `timeout` are answered with 408.
fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// CORS for the configured origins. `None` when no origin is configured or
/// none of them is a valid header value.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::header::AUTHORIZATION,
            ])
            .allow_credentials(true),
    )
}
