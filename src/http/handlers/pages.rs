//! Health, page surfaces and the fallback.

use axum::{Extension, Json, extract::State, http::Uri};
use serde::Serialize;

use super::super::{AppError, AppState};
use crate::gate::SessionClaims;
use crate::services::catalog::DashboardStats;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    storage_provider: &'static str,
}

/// GET /health
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        storage_provider: state.assets.provider().as_str(),
    })
}

/// GET /login - Placeholder surface for the sign-in page.
pub(crate) async fn login_page() -> &'static str {
    "Sign in with POST /api/auth/login"
}

/// GET /unauthorized
pub(crate) async fn unauthorized_page() -> &'static str {
    "You do not have access to the back-office"
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdminHome {
    signed_in_as: String,
    stats: DashboardStats,
}

/// GET /admin, /admin/dashboard - The data the dashboard page shows.
pub(crate) async fn admin_home(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<AdminHome>, AppError> {
    let stats = state.catalog.dashboard_stats().await?;
    Ok(Json(AdminHome {
        signed_in_as: claims.email,
        stats,
    }))
}

pub(crate) async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
