//! Public catalog handlers.

use axum::Json;
use axum::extract::{Path, Query, State};

use super::super::{AppError, AppState, metrics};
use crate::services::catalog::{Category, ProductCard, ProductDetail, ProductFilter};

/// GET /api/products - Published products with their primary image.
pub(crate) async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<ProductCard>>, AppError> {
    metrics::record_catalog_request("list");
    let products = state.catalog.list_published(filter).await?;
    Ok(Json(products))
}

/// GET /api/products/{slug} - A published product with all images.
pub(crate) async fn get_published_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductDetail>, AppError> {
    metrics::record_catalog_request("get");
    state
        .catalog
        .published_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// GET /api/categories - All categories by name.
pub(crate) async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    metrics::record_catalog_request("categories");
    Ok(Json(state.catalog.categories().await?))
}
