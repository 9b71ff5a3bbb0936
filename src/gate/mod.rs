//! Edge gate: rate limiting and back-office access control.
//!
//! Every request passes through [`edge_gate`] before routing:
//!
//! 1. API paths are counted against their rate-limit policy; over-quota
//!    requests are answered with 429 and never reach authorization.
//! 2. The path is classified. Admin routes need a valid session with the
//!    admin role; denials are JSON for the API and redirects for pages.
//! 3. Mutating admin API requests must be same-origin.
//! 4. The verified [`SessionClaims`] and the [`ClientIp`] are handed to
//!    handlers through request extensions.

pub mod access;
pub mod audit;
pub mod client_ip;
pub mod credentials;
pub mod csrf;
pub mod rate_limit;
pub mod session;

pub use access::{Denial, RouteClass, authorize};
pub use audit::{AuditEvent, log_audit_event};
pub use client_ip::{ClientIp, client_ip};
pub use credentials::{
    ConfiguredAccounts, CredentialVerifier, LoginRequest, Principal, hash_password,
    hash_password_with_cost, is_bcrypt_digest,
};
pub use rate_limit::{RateLimitDecision, RateLimitPolicies, RateLimitPolicy, RateLimiter, rate_limit_key};
pub use session::{SessionClaims, SessionSigner, token_from_headers};

use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Shared gate state. Cheap to clone.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    limiter: RateLimiter,
    /// `None` when rate limiting is disabled.
    policies: Option<RateLimitPolicies>,
    /// `None` when no session secret is configured; admin routes then fail closed.
    sessions: Option<SessionSigner>,
    trust_forwarded: bool,
    csrf: bool,
}

impl Gate {
    pub fn new(
        policies: Option<RateLimitPolicies>,
        sessions: Option<SessionSigner>,
        trust_forwarded: bool,
        csrf: bool,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                limiter: RateLimiter::new(),
                policies,
                sessions,
                trust_forwarded,
                csrf,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let policies = config
            .rate_limit
            .enabled
            .then(|| RateLimitPolicies::from_config(&config.rate_limit));
        let sessions = config
            .auth
            .session_secret
            .as_deref()
            .and_then(|secret| SessionSigner::new(secret, config.auth.session_ttl()));
        Self::new(
            policies,
            sessions,
            config.server.trust_forwarded_headers,
            config.server.csrf_protection,
        )
    }

    #[must_use]
    pub fn sessions(&self) -> Option<&SessionSigner> {
        self.inner.sessions.as_ref()
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Client address as the gate sees it.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_ip(headers, peer, self.inner.trust_forwarded)
    }
}

/// Axum middleware applying the gate to every request.
pub async fn edge_gate(State(gate): State<Gate>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = gate.client_ip(req.headers(), peer);

    let policy = gate
        .inner
        .policies
        .as_ref()
        .and_then(|policies| policies.for_path(&path));
    let decision = match policy {
        Some(policy) => {
            let now = Instant::now();
            let decision = gate
                .inner
                .limiter
                .consume_at(&rate_limit_key(&client, &path), policy, now);
            if !decision.allowed {
                let retry_after_secs = decision.retry_after_secs(now);
                counter!("storefront_rate_limited_total").increment(1);
                log_audit_event(AuditEvent::RateLimited {
                    client,
                    path,
                    retry_after_secs,
                });
                return rate_limited(&decision, retry_after_secs);
            }
            Some(decision)
        },
        None => None,
    };

    let class = RouteClass::classify(&path);
    let token = token_from_headers(req.headers());
    let mut response = match authorize(class, gate.sessions(), token.as_deref()) {
        Ok(claims) => {
            let csrf_failure = (gate.inner.csrf
                && class == RouteClass::AdminApi
                && csrf::is_mutating(req.method()))
            .then(|| csrf::verify_same_origin(req.headers()).err())
            .flatten();

            if let Some(reason) = csrf_failure {
                log_audit_event(AuditEvent::CsrfRejected { path, reason });
                (StatusCode::FORBIDDEN, Json(json!({ "error": reason }))).into_response()
            } else {
                if let Some(claims) = claims {
                    req.extensions_mut().insert(claims);
                }
                req.extensions_mut().insert(ClientIp(client));
                next.run(req).await
            }
        },
        Err(denial) => {
            audit_denial(&denial, client, path);
            denial.into_response(class)
        },
    };

    if let Some(decision) = decision {
        set_rate_headers(response.headers_mut(), &decision);
    }
    response
}

fn audit_denial(denial: &Denial, client: String, path: String) {
    match denial {
        Denial::Misconfigured => log_audit_event(AuditEvent::Misconfigured { path }),
        Denial::Unauthenticated => {
            counter!("storefront_auth_failures_total", "reason" => "unauthenticated").increment(1);
            log_audit_event(AuditEvent::Unauthenticated { client, path });
        },
        Denial::Forbidden(claims) => {
            counter!("storefront_auth_failures_total", "reason" => "forbidden").increment(1);
            log_audit_event(AuditEvent::Forbidden {
                path,
                email: claims.email.clone(),
                role: claims.role.clone(),
            });
        },
    }
}

fn rate_limited(decision: &RateLimitDecision, retry_after_secs: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "Too many requests. Please try again later." })),
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::RETRY_AFTER,
        HeaderValue::from(retry_after_secs),
    );
    set_rate_headers(headers, decision);
    response
}

fn set_rate_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
}
