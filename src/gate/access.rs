//! Route classification and the admin access decision.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use serde_json::json;

use super::rate_limit::has_segment_prefix;
use super::session::{SessionClaims, SessionSigner};

/// Where unauthenticated page requests are sent.
pub const LOGIN_PATH: &str = "/login";
/// Where signed-in non-admins are sent.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// How a path is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    /// Back-office pages: denials redirect.
    AdminPage,
    /// Back-office API: denials are JSON.
    AdminApi,
}

impl RouteClass {
    #[must_use]
    pub fn classify(path: &str) -> Self {
        if has_segment_prefix(path, "/api/admin") || has_segment_prefix(path, "/api/upload") {
            Self::AdminApi
        } else if has_segment_prefix(path, "/admin") {
            Self::AdminPage
        } else {
            Self::Public
        }
    }

    #[must_use]
    pub fn is_protected(self) -> bool {
        !matches!(self, Self::Public)
    }
}

/// Why an admin route was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// No session secret is configured, so no session can be trusted.
    Misconfigured,
    /// Missing, malformed or expired session.
    Unauthenticated,
    /// Valid session without the admin role.
    Forbidden(SessionClaims),
}

impl Denial {
    /// Response for a denied request on a route of `class`.
    #[must_use]
    pub fn into_response(self, class: RouteClass) -> Response {
        match (class, self) {
            (RouteClass::AdminApi, Self::Misconfigured) => json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Authentication is not configured",
            ),
            (RouteClass::AdminApi, Self::Unauthenticated) => {
                json_error(StatusCode::UNAUTHORIZED, "Unauthorized")
            },
            (RouteClass::AdminApi, Self::Forbidden(_)) => {
                json_error(StatusCode::FORBIDDEN, "Forbidden")
            },
            (_, Self::Forbidden(_)) => Redirect::to(UNAUTHORIZED_PATH).into_response(),
            (_, Self::Misconfigured | Self::Unauthenticated) => {
                Redirect::to(LOGIN_PATH).into_response()
            },
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Decides access to a route.
///
/// Public routes pass with no claims. Protected routes need a signer, a
/// token it accepts and the admin role; the verified claims are returned.
///
/// # Errors
///
/// Returns the [`Denial`] describing why access was refused.
pub fn authorize(
    class: RouteClass,
    signer: Option<&SessionSigner>,
    token: Option<&str>,
) -> Result<Option<SessionClaims>, Denial> {
    if !class.is_protected() {
        return Ok(None);
    }
    let signer = signer.ok_or(Denial::Misconfigured)?;
    let claims = token
        .and_then(|token| signer.verify(token))
        .ok_or(Denial::Unauthenticated)?;
    if claims.is_admin() {
        Ok(Some(claims))
    } else {
        Err(Denial::Forbidden(claims))
    }
}
