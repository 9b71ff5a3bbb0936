//! Edge gate behavior through the full router: rate limiting, admin access
//! control and the same-origin check.

mod common;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, HOST, LOCATION, ORIGIN, RETRY_AFTER};
use axum::http::{Method, Request, StatusCode};
use serde_json::json;

use common::{HOST_NAME, TestApp, body_json, get, test_config};

fn from_ip(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(HOST, HOST_NAME)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

fn login_attempt(ip: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(HOST, HOST_NAME)
        .header("x-forwarded-for", ip)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "email": "admin@shop.test", "password": "wrong-password" }).to_string(),
        ))
        .unwrap()
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_api_quota_rejects_the_61st_request() {
    let app = TestApp::new();

    for i in 1..=60 {
        let response = app.send(from_ip("/api/products", "203.0.113.9")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {i}");
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            (60 - i).to_string().as_str()
        );
    }

    let response = app.send(from_ip("/api/products", "203.0.113.9")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(response.headers()["x-ratelimit-limit"], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let body = body_json(response).await;
    assert!(body["error"].is_string());

    // Other clients and other paths have their own buckets.
    let other_client = app.send(from_ip("/api/products", "198.51.100.1")).await;
    assert_eq!(other_client.status(), StatusCode::OK);
    let other_path = app.send(from_ip("/api/categories", "203.0.113.9")).await;
    assert_eq!(other_path.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_credential_quota_is_stricter() {
    let app = TestApp::new();

    for _ in 0..20 {
        let response = app.send(login_attempt("203.0.113.20")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.send(login_attempt("203.0.113.20")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-limit"], "20");
}

#[tokio::test]
async fn test_non_api_paths_are_not_limited() {
    let app = TestApp::new();
    for _ in 0..100 {
        let response = app.send(from_ip("/health", "203.0.113.30")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_rate_limit_runs_before_authorization() {
    let mut config = test_config();
    config.rate_limit.api_max = 2;
    let app = TestApp::with_config(config);

    for _ in 0..2 {
        let response = app.send(from_ip("/api/admin/products", "203.0.113.40")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let response = app.send(from_ip("/api/admin/products", "203.0.113.40")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_disabled_rate_limiting() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    config.rate_limit.api_max = 1;
    let app = TestApp::with_config(config);

    for _ in 0..5 {
        let response = app.send(from_ip("/api/products", "203.0.113.50")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

// =============================================================================
// Admin access
// =============================================================================

#[tokio::test]
async fn test_admin_page_without_session_redirects_to_login() {
    let app = TestApp::new();
    let response = app.send(get("/admin")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/login");

    let nested = app.send(get("/admin/settings/unknown")).await;
    assert_eq!(nested.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_admin_api_without_session_is_401() {
    let app = TestApp::new();
    for (method, uri) in [
        (Method::GET, "/api/admin/products"),
        (Method::GET, "/api/admin/dashboard"),
        (Method::POST, "/api/upload"),
        (Method::DELETE, "/api/admin/products/0123456789abcdef"),
    ] {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(HOST, HOST_NAME)
            .body(Body::empty())
            .unwrap();
        let response = app.send(request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn test_tampered_token_counts_as_no_session() {
    let app = TestApp::new();
    let token = format!("{}00", app.admin_token());
    let request = Request::builder()
        .uri("/api/admin/products")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_role_is_forbidden() {
    let app = TestApp::new();
    let token = app.token("STAFF");

    let page = Request::builder()
        .uri("/admin")
        .header(COOKIE, format!("session={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(page).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/unauthorized");

    let api = Request::builder()
        .uri("/api/admin/products")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.send(api).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "Forbidden");
}

#[tokio::test]
async fn test_admin_session_is_allowed() {
    let app = TestApp::new();
    let response = app.admin(Method::GET, "/api/admin/products", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));

    let page = Request::builder()
        .uri("/admin")
        .header(COOKIE, format!("theme=dark; session={}", app.admin_token()))
        .body(Body::empty())
        .unwrap();
    let response = app.send(page).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["signedInAs"], "someone@shop.test");
    assert_eq!(body["stats"]["totalProducts"], 0);
}

#[tokio::test]
async fn test_missing_secret_fails_closed() {
    let mut config = test_config();
    config.auth.session_secret = None;
    let app = TestApp::with_config(config);

    let response = app.send(get("/api/admin/products")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"].is_string());

    let response = app.send(get("/admin")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/login");

    // Public routes are unaffected.
    assert_eq!(app.send(get("/api/products")).await.status(), StatusCode::OK);
}

// =============================================================================
// Same-origin check
// =============================================================================

#[tokio::test]
async fn test_cross_origin_mutation_is_rejected() {
    let app = TestApp::new();
    let body = json!({ "name": "Desk", "slug": "desk", "category": "furniture" }).to_string();

    let cross = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/products")
        .header(HOST, HOST_NAME)
        .header(ORIGIN, "https://evil.example")
        .header(AUTHORIZATION, format!("Bearer {}", app.admin_token()))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.clone()))
        .unwrap();
    let response = app.send(cross).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "origin mismatch");

    let missing = Request::builder()
        .method(Method::POST)
        .uri("/api/admin/products")
        .header(HOST, HOST_NAME)
        .header(AUTHORIZATION, format!("Bearer {}", app.admin_token()))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap();
    assert_eq!(app.send(missing).await.status(), StatusCode::FORBIDDEN);

    // Reads are not checked.
    let read = Request::builder()
        .uri("/api/admin/products")
        .header(AUTHORIZATION, format!("Bearer {}", app.admin_token()))
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(read).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_same_origin_mutation_passes() {
    let app = TestApp::new();
    app.catalog
        .upsert_category("Furniture", "furniture")
        .await
        .unwrap();
    let response = app
        .admin(
            Method::POST,
            "/api/admin/products",
            Some(json!({
                "name": "Desk",
                "slug": "desk",
                "priceCents": 25000,
                "stock": 2,
                "category": "furniture"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["status"], "DRAFT");
}

// =============================================================================
// Trace ids
// =============================================================================

#[tokio::test]
async fn test_trace_id_is_echoed_or_generated() {
    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.headers()["x-trace-id"], "abc-123");

    let response = app.send(get("/health")).await;
    assert_eq!(response.headers()["x-trace-id"].len(), 36);
}
