//! Shared harness for the HTTP integration tests.
//!
//! Builds the full router over an in-memory SQLite catalog and the
//! in-memory image backend, and drives it with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, ORIGIN};
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use storefront::config::{AccountConfig, Config};
use storefront::gate::{ConfiguredAccounts, Gate, SessionSigner, hash_password_with_cost};
use storefront::http::{AppState, router};
use storefront::services::assets::AssetManager;
use storefront::services::catalog::{CatalogStore, ProductInput};
use storefront::services::storage::MemoryImageStore;

pub const HOST_NAME: &str = "shop.test";
pub const SAME_ORIGIN: &str = "http://shop.test";
pub const ADMIN_EMAIL: &str = "admin@shop.test";
pub const ADMIN_PASSWORD: &str = "correct-horse";
pub const STAFF_EMAIL: &str = "staff@shop.test";
pub const STAFF_PASSWORD: &str = "staff-pass";
const SECRET: &str = "integration-test-session-secret";

/// Minimum bcrypt cost keeps the suite fast.
fn digest(password: &str) -> String {
    hash_password_with_cost(password, 4).expect("digest")
}

/// Configuration with a session secret and two accounts.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.database.path = ":memory:".to_string();
    config.auth.session_secret = Some(SECRET.to_string());
    config.auth.accounts = vec![
        AccountConfig {
            email: ADMIN_EMAIL.to_string(),
            role: "ADMIN".to_string(),
            password_digest: digest(ADMIN_PASSWORD),
        },
        AccountConfig {
            email: STAFF_EMAIL.to_string(),
            role: "STAFF".to_string(),
            password_digest: digest(STAFF_PASSWORD),
        },
    ];
    config
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryImageStore>,
    pub catalog: CatalogStore,
    pub config: Config,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryImageStore::new());
        let catalog = CatalogStore::memory().expect("in-memory catalog");
        let state = AppState {
            catalog: catalog.clone(),
            assets: AssetManager::new(store.clone(), catalog.clone()),
            gate: Gate::from_config(&config),
            credentials: Arc::new(ConfiguredAccounts::from_config(&config.auth.accounts)),
            secure_cookie: config.auth.secure_cookie,
            metrics: None,
        };
        Self {
            router: router(state, &config),
            store,
            catalog,
            config,
        }
    }

    fn signer(&self) -> SessionSigner {
        SessionSigner::new(
            self.config.auth.session_secret.as_deref().expect("secret"),
            self.config.auth.session_ttl(),
        )
        .expect("signer")
    }

    /// Session token for a principal with `role`.
    pub fn token(&self, role: &str) -> String {
        let signer = self.signer();
        signer
            .issue(&signer.claims_for("user-1", "someone@shop.test", role))
            .expect("token")
    }

    pub fn admin_token(&self) -> String {
        self.token("ADMIN")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Same-origin request carrying the admin token.
    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let token = self.admin_token();
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, HOST_NAME)
            .header(ORIGIN, SAME_ORIGIN)
            .header(AUTHORIZATION, format!("Bearer {token}"));
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            },
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Multipart upload of one file through `/api/upload`.
    pub async fn upload(
        &self,
        product_id: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Response<Body> {
        let boundary = "storefront-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"productId\"\r\n\r\n{product_id}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(HOST, HOST_NAME)
            .header(ORIGIN, SAME_ORIGIN)
            .header(AUTHORIZATION, format!("Bearer {}", self.admin_token()))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Creates the `furniture` category and a product in it.
    pub async fn seed_product(&self, slug: &str, status: &str) -> String {
        self.catalog
            .upsert_category("Furniture", "furniture")
            .await
            .expect("category");
        self.catalog
            .create_product(ProductInput {
                name: format!("Product {slug}"),
                slug: slug.to_string(),
                description: "Solid wood".to_string(),
                price_cents: 12_900,
                stock: 3,
                status: Some(status.to_string()),
                category: "furniture".to_string(),
            })
            .await
            .expect("product")
            .id
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(HOST, HOST_NAME)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}
