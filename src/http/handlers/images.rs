//! Product image handlers.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use tracing::info;

use super::super::{AppError, AppState, metrics};
use super::entity_id;
use crate::services::assets::{ImageDeletion, UploadedFile};
use crate::services::catalog::ProductImage;

/// POST /api/upload - Multipart `file` plus `productId`.
pub(crate) async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ProductImage>), AppError> {
    metrics::record_admin_operation("upload");

    let mut product_id = None;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("productId") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid productId field: {e}")))?;
                product_id = Some(value);
            },
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid file field: {e}")))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            },
            _ => {},
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let product_id = product_id
        .ok_or_else(|| AppError::BadRequest("Product ID is required".to_string()))?;
    let product_id = entity_id(&product_id, "Product")?;

    let image = state.assets.upload(product_id, file).await?;
    info!(
        product_id = %image.product_id,
        image_id = %image.id,
        primary = image.is_primary,
        "Product image uploaded"
    );
    Ok((StatusCode::CREATED, Json(image)))
}

/// POST /api/admin/products/{id}/images/{image_id}/primary
pub(crate) async fn set_primary_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<ProductImage>, AppError> {
    metrics::record_admin_operation("set_primary");
    let product_id = entity_id(&id, "Product")?;
    let image_id = entity_id(&image_id, "Image")?;
    let image = state.assets.set_primary(image_id, product_id).await?;
    Ok(Json(image))
}

/// DELETE /api/admin/products/{id}/images/{image_id}
pub(crate) async fn delete_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(String, String)>,
) -> Result<Json<ImageDeletion>, AppError> {
    metrics::record_admin_operation("delete_image");
    let product_id = entity_id(&id, "Product")?;
    let image_id = entity_id(&image_id, "Image")?;
    let deletion = state.assets.delete_image(image_id, product_id).await?;
    Ok(Json(deletion))
}
