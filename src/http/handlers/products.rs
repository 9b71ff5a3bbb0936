//! Back-office product handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::info;

use super::super::{AppError, AppState, metrics};
use super::entity_id;
use crate::services::assets::ProductDeletion;
use crate::services::catalog::{DashboardStats, Product, ProductCard, ProductDetail, ProductInput};

/// GET /api/admin/products - Every product, drafts included.
pub(crate) async fn admin_list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductCard>>, AppError> {
    metrics::record_admin_operation("list");
    Ok(Json(state.catalog.list_all().await?))
}

/// GET /api/admin/products/{id}
pub(crate) async fn admin_get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDetail>, AppError> {
    metrics::record_admin_operation("get");
    let id = entity_id(&id, "Product")?;
    state
        .catalog
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// POST /api/admin/products
pub(crate) async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    metrics::record_admin_operation("create");
    let product = state.catalog.create_product(input).await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/{id}
pub(crate) async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    metrics::record_admin_operation("update");
    let id = entity_id(&id, "Product")?;
    Ok(Json(state.catalog.update_product(id, input).await?))
}

/// DELETE /api/admin/products/{id} - Deletes the product and cleans up its
/// stored images. Cleanup problems are reported, not raised.
pub(crate) async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductDeletion>, AppError> {
    metrics::record_admin_operation("delete");
    let id = entity_id(&id, "Product")?;
    Ok(Json(state.assets.delete_product(id).await?))
}

/// POST /api/admin/products/{id}/featured
pub(crate) async fn toggle_featured(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    metrics::record_admin_operation("toggle_featured");
    let id = entity_id(&id, "Product")?;
    Ok(Json(state.catalog.toggle_featured(id).await?))
}

/// POST /api/admin/products/{id}/status
pub(crate) async fn toggle_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    metrics::record_admin_operation("toggle_status");
    let id = entity_id(&id, "Product")?;
    Ok(Json(state.catalog.toggle_status(id).await?))
}

/// GET /api/admin/dashboard
pub(crate) async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    metrics::record_admin_operation("dashboard");
    Ok(Json(state.catalog.dashboard_stats().await?))
}
