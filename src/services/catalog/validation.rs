//! Input validation for catalog writes and identifiers from the wire.

use super::error::{CatalogError, CatalogResult, FieldErrors};
use super::types::{ProductInput, ProductStatus};
use crate::constants::MAX_SEARCH_LEN;

const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=120;
const SLUG_LEN: std::ops::RangeInclusive<usize> = 2..=120;
const MAX_DESCRIPTION_LEN: usize = 5000;
const ENTITY_ID_LEN: std::ops::RangeInclusive<usize> = 8..=64;

/// A product payload that passed validation.
#[derive(Debug, Clone)]
pub(crate) struct ValidProduct {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub stock: i64,
    pub status: ProductStatus,
    pub category: String,
}

/// Checks every field and reports all failures at once.
pub(crate) fn validate_product(input: &ProductInput) -> CatalogResult<ValidProduct> {
    let mut errors = FieldErrors::new();

    let name = input.name.trim();
    if !NAME_LEN.contains(&name.chars().count()) {
        errors.insert("name", "name must be between 2 and 120 characters".into());
    }

    let slug = input.slug.trim();
    if !SLUG_LEN.contains(&slug.len()) {
        errors.insert("slug", "slug must be between 2 and 120 characters".into());
    } else if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        errors.insert(
            "slug",
            "slug may only contain lowercase letters, digits and hyphens".into(),
        );
    }

    let description = input.description.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.insert("description", "description must be at most 5000 characters".into());
    }

    if input.price_cents < 0 {
        errors.insert("price", "price cannot be negative".into());
    }
    if input.stock < 0 {
        errors.insert("stock", "stock cannot be negative".into());
    }

    let status = match input.status.as_deref() {
        None => ProductStatus::Draft,
        Some(raw) => raw.trim().parse().unwrap_or_else(|msg: String| {
            errors.insert("status", msg);
            ProductStatus::Draft
        }),
    };

    let category = input.category.trim();
    if category.is_empty() {
        errors.insert("category", "category is required".into());
    }

    if !errors.is_empty() {
        return Err(CatalogError::Validation(errors));
    }

    Ok(ValidProduct {
        name: name.to_string(),
        slug: slug.to_string(),
        description: description.to_string(),
        price_cents: input.price_cents,
        stock: input.stock,
        status,
        category: category.to_string(),
    })
}

/// Accepts identifiers of 8 to 64 characters from `[A-Za-z0-9_-]`.
///
/// Applied to every id taken from a path, query or form before it reaches
/// the store.
#[must_use]
pub fn sanitize_entity_id(raw: &str) -> Option<&str> {
    let id = raw.trim();
    let valid = ENTITY_ID_LEN.contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    valid.then_some(id)
}

/// Trims a search term, drops it when empty and caps it at 100 characters.
#[must_use]
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    let value = search?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.chars().take(MAX_SEARCH_LEN).collect())
}
