//! Products, categories and dashboard aggregates.

use rusqlite::{Connection, OptionalExtension, params};

use super::CatalogStore;
use super::error::{CatalogError, CatalogResult, map_unique};
use super::images::images_in;
use super::schema::{PRODUCT_COLUMNS, image_at, now_millis, product_from_row};
use super::types::{
    Category, CategoryStats, DashboardStats, Product, ProductCard, ProductDetail, ProductFilter,
    ProductInput, ProductStatus,
};
use super::validation::{ValidProduct, normalize_search, validate_product};
use crate::constants::LOW_STOCK_THRESHOLD;

const CARD_QUERY: &str = "FROM products p
     LEFT JOIN categories c ON c.id = p.category_id
     LEFT JOIN product_images i ON i.product_id = p.id AND i.is_primary = 1";

impl CatalogStore {
    // =========================================================================
    // Public reads
    // =========================================================================

    /// Published products, newest first, with their primary image.
    ///
    /// `search` matches name or description case-insensitively; `category`
    /// is a category slug.
    pub async fn list_published(&self, filter: ProductFilter) -> CatalogResult<Vec<ProductCard>> {
        let search = normalize_search(filter.search.as_deref()).map(|s| like_pattern(&s));
        let category = filter
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        self.run(move |conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS}, i.id, i.product_id, i.url, i.storage_path, i.is_primary
                 {CARD_QUERY}
                 WHERE p.status = 'PUBLISHED'
                   AND (?1 IS NULL OR p.name LIKE ?1 ESCAPE '\\' OR p.description LIKE ?1 ESCAPE '\\')
                   AND (?2 IS NULL OR c.slug = ?2)
                 ORDER BY p.created_at DESC, p.id"
            );
            cards(conn, &sql, params![search, category])
        })
        .await
    }

    /// A published product with all of its images.
    pub async fn published_by_slug(&self, slug: &str) -> CatalogResult<Option<ProductDetail>> {
        let slug = slug.to_string();
        self.run(move |conn| {
            let product = conn
                .query_row(
                    &format!(
                        "SELECT {PRODUCT_COLUMNS} FROM products p
                         LEFT JOIN categories c ON c.id = p.category_id
                         WHERE p.slug = ?1 AND p.status = 'PUBLISHED'"
                    ),
                    params![slug],
                    product_from_row,
                )
                .optional()?;
            product.map(|p| detail(conn, p)).transpose()
        })
        .await
    }

    /// Categories ordered by name.
    pub async fn categories(&self) -> CatalogResult<Vec<Category>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, slug FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    // =========================================================================
    // Back-office
    // =========================================================================

    /// Every product regardless of status, newest first.
    pub async fn list_all(&self) -> CatalogResult<Vec<ProductCard>> {
        self.run(|conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS}, i.id, i.product_id, i.url, i.storage_path, i.is_primary
                 {CARD_QUERY}
                 ORDER BY p.created_at DESC, p.id"
            );
            cards(conn, &sql, [])
        })
        .await
    }

    /// A product of any status with all of its images.
    pub async fn get_product(&self, id: &str) -> CatalogResult<Option<ProductDetail>> {
        let id = id.to_string();
        self.run(move |conn| {
            product_in(conn, &id)?
                .map(|p| detail(conn, p))
                .transpose()
        })
        .await
    }

    /// Creates a product after validating every field.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for invalid fields, an unknown category or a
    /// slug already in use.
    pub async fn create_product(&self, input: ProductInput) -> CatalogResult<Product> {
        let valid = validate_product(&input)?;
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let category_id = category_id_for(&tx, &valid.category)?;
            let id = uuid::Uuid::new_v4().to_string();
            let now = now_millis();
            tx.execute(
                "INSERT INTO products
                     (id, name, slug, description, price_cents, stock, status, is_featured,
                      category_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?9, ?9)",
                params![
                    id,
                    valid.name,
                    valid.slug,
                    valid.description,
                    valid.price_cents,
                    valid.stock,
                    valid.status.as_str(),
                    category_id,
                    now
                ],
            )
            .map_err(|e| map_unique(e, "slug"))?;
            let product = product_in(&tx, &id)?.ok_or(CatalogError::NotFound("product"))?;
            tx.commit()?;
            Ok(product)
        })
        .await
    }

    /// Replaces a product's editable fields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Validation` as for
    /// [`create_product`](Self::create_product).
    pub async fn update_product(&self, id: &str, input: ProductInput) -> CatalogResult<Product> {
        let valid = validate_product(&input)?;
        let id = id.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let category_id = category_id_for(&tx, &valid.category)?;
            let ValidProduct {
                name,
                slug,
                description,
                price_cents,
                stock,
                status,
                ..
            } = valid;
            let updated = tx
                .execute(
                    "UPDATE products SET name = ?2, slug = ?3, description = ?4, price_cents = ?5,
                         stock = ?6, status = ?7, category_id = ?8, updated_at = ?9
                     WHERE id = ?1",
                    params![
                        id,
                        name,
                        slug,
                        description,
                        price_cents,
                        stock,
                        status.as_str(),
                        category_id,
                        now_millis()
                    ],
                )
                .map_err(|e| map_unique(e, "slug"))?;
            if updated == 0 {
                return Err(CatalogError::NotFound("product"));
            }
            let product = product_in(&tx, &id)?.ok_or(CatalogError::NotFound("product"))?;
            tx.commit()?;
            Ok(product)
        })
        .await
    }

    /// Deletes a product row; its image rows go with it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no product has this id.
    pub async fn delete_product(&self, id: &str) -> CatalogResult<()> {
        let id = id.to_string();
        self.run(move |conn| {
            let deleted = conn.execute("DELETE FROM products WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(CatalogError::NotFound("product"));
            }
            Ok(())
        })
        .await
    }

    /// Flips the featured flag and returns the updated product.
    pub async fn toggle_featured(&self, id: &str) -> CatalogResult<Product> {
        let id = id.to_string();
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE products SET is_featured = 1 - is_featured, updated_at = ?2 WHERE id = ?1",
                params![id, now_millis()],
            )?;
            if updated == 0 {
                return Err(CatalogError::NotFound("product"));
            }
            product_in(conn, &id)?.ok_or(CatalogError::NotFound("product"))
        })
        .await
    }

    /// Switches between DRAFT and PUBLISHED and returns the updated product.
    pub async fn toggle_status(&self, id: &str) -> CatalogResult<Product> {
        let id = id.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let current = product_in(&tx, &id)?.ok_or(CatalogError::NotFound("product"))?;
            let next: ProductStatus = current.status.toggled();
            tx.execute(
                "UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, next.as_str(), now_millis()],
            )?;
            let product = product_in(&tx, &id)?.ok_or(CatalogError::NotFound("product"))?;
            tx.commit()?;
            Ok(product)
        })
        .await
    }

    /// Creates a category or renames the one with this slug.
    pub async fn upsert_category(&self, name: &str, slug: &str) -> CatalogResult<Category> {
        let name = name.trim().to_string();
        let slug = slug.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::field("name", "category name is required"));
        }
        if slug.is_empty() {
            return Err(CatalogError::field("slug", "category slug is required"));
        }

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO categories (id, name, slug) VALUES (?1, ?2, ?3)
                 ON CONFLICT(slug) DO UPDATE SET name = excluded.name",
                params![uuid::Uuid::new_v4().to_string(), name, slug],
            )?;
            let category = conn.query_row(
                "SELECT id, name, slug FROM categories WHERE slug = ?1",
                params![slug],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                    })
                },
            )?;
            Ok(category)
        })
        .await
    }

    /// Counts and stock totals for the dashboard.
    pub async fn dashboard_stats(&self) -> CatalogResult<DashboardStats> {
        self.run(|conn| {
            let mut stats = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'PUBLISHED'), 0),
                        COALESCE(SUM(status = 'DRAFT'), 0),
                        COALESCE(SUM(is_featured), 0),
                        COALESCE(SUM(stock), 0),
                        COALESCE(SUM(stock > 0 AND stock <= ?1), 0),
                        COALESCE(SUM(stock = 0), 0)
                 FROM products",
                params![LOW_STOCK_THRESHOLD],
                |row| {
                    Ok(DashboardStats {
                        total_products: row.get(0)?,
                        published_products: row.get(1)?,
                        draft_products: row.get(2)?,
                        featured_products: row.get(3)?,
                        total_stock: row.get(4)?,
                        low_stock_products: row.get(5)?,
                        out_of_stock_products: row.get(6)?,
                        categories: Vec::new(),
                    })
                },
            )?;

            let mut stmt = conn.prepare(
                "SELECT c.slug, c.name, COUNT(p.id), COALESCE(SUM(p.stock), 0)
                 FROM categories c
                 LEFT JOIN products p ON p.category_id = c.id
                 GROUP BY c.id
                 ORDER BY c.name",
            )?;
            stats.categories = stmt
                .query_map([], |row| {
                    Ok(CategoryStats {
                        slug: row.get(0)?,
                        name: row.get(1)?,
                        products: row.get(2)?,
                        stock: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(stats)
        })
        .await
    }
}

fn product_in(conn: &Connection, id: &str) -> CatalogResult<Option<Product>> {
    let product = conn
        .query_row(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p
                 LEFT JOIN categories c ON c.id = p.category_id
                 WHERE p.id = ?1"
            ),
            params![id],
            product_from_row,
        )
        .optional()?;
    Ok(product)
}

fn detail(conn: &Connection, product: Product) -> CatalogResult<ProductDetail> {
    let images = images_in(conn, &product.id)?;
    Ok(ProductDetail { product, images })
}

fn cards(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> CatalogResult<Vec<ProductCard>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            let product = product_from_row(row)?;
            let image_id: Option<String> = row.get(11)?;
            let primary_image = match image_id {
                Some(_) => Some(image_at(row, 11)?),
                None => None,
            };
            Ok(ProductCard {
                product,
                primary_image,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn category_id_for(conn: &Connection, slug: &str) -> CatalogResult<String> {
    conn.query_row(
        "SELECT id FROM categories WHERE slug = ?1",
        params![slug],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| CatalogError::field("category", "category not found"))
}

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
