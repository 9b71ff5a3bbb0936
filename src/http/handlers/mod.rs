//! HTTP handlers organized by surface.

pub mod auth;
pub mod images;
pub mod pages;
pub mod products;
pub mod public;

// Re-export all handlers for use in routing
pub(crate) use auth::{login, logout};
pub(crate) use images::{delete_image, set_primary_image, upload_image};
pub(crate) use pages::{admin_home, health, login_page, not_found, unauthorized_page};
pub(crate) use products::{
    admin_get_product, admin_list_products, create_product, dashboard, delete_product,
    toggle_featured, toggle_status, update_product,
};
pub(crate) use public::{get_published_product, list_categories, list_products};

use super::AppError;
use crate::services::catalog::sanitize_entity_id;

/// Rejects malformed ids before they reach the store. A malformed id cannot
/// name an existing row, so it is reported as not found.
fn entity_id<'a>(raw: &'a str, what: &str) -> Result<&'a str, AppError> {
    sanitize_entity_id(raw).ok_or_else(|| AppError::NotFound(format!("{what} not found")))
}
