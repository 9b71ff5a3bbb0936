//! Sign-in and sign-out.
//!
//! A successful login issues a signed session token, returned in the body
//! and set as the `session` cookie. Logout only clears the cookie; tokens
//! are self-contained and expire on their own.

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use super::super::{AppError, AppState, metrics};
use crate::constants::SESSION_COOKIE;
use crate::gate::{AuditEvent, ClientIp, LoginRequest, log_audit_event};

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    token: String,
    role: String,
}

/// POST /api/auth/login - Verify credentials and open a session.
pub(crate) async fn login(
    State(state): State<AppState>,
    Extension(ClientIp(client)): Extension<ClientIp>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let email = req.email.trim().to_ascii_lowercase();

    let Some(signer) = state.gate.sessions() else {
        metrics::record_login("unavailable");
        return Err(AppError::ServiceUnavailable(
            "Authentication is not configured".to_string(),
        ));
    };

    let principal = if req.is_well_formed() {
        state
            .credentials
            .verify(&email, &req.password)
            .await
            .map_err(|e| AppError::Internal(format!("credential check failed: {e:#}")))?
    } else {
        None
    };

    let Some(principal) = principal else {
        metrics::record_login("invalid_credentials");
        log_audit_event(AuditEvent::LoginFailed { client, email });
        return Err(AppError::Unauthorized("Invalid email or password".to_string()));
    };

    let claims = signer.claims_for(&principal.user_id, &principal.email, &principal.role);
    let token = signer
        .issue(&claims)
        .map_err(|e| AppError::Internal(format!("session token encoding failed: {e}")))?;
    let cookie = session_cookie(&token, signer.ttl().as_secs(), state.secure_cookie);

    metrics::record_login("success");
    log_audit_event(AuditEvent::LoginSucceeded {
        client,
        email: principal.email,
    });

    Ok((
        [(SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            role: principal.role,
        }),
    )
        .into_response())
}

/// POST /api/auth/logout - Clear the session cookie.
pub(crate) async fn logout(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        [(SET_COOKIE, session_cookie("", 0, state.secure_cookie))],
        Json(json!({ "success": true })),
    )
        .into_response()
}

fn session_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
