//! Schema and row mapping for the catalog database.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use super::types::{Product, ProductImage};

/// Created on open. `seq` gives images a stable insertion order for promotion;
/// the partial unique index rejects a second primary image per product.
pub(crate) const SCHEMA: &str = r"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS categories (
    id   TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
    stock       INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    status      TEXT NOT NULL DEFAULT 'DRAFT' CHECK (status IN ('DRAFT', 'PUBLISHED')),
    is_featured INTEGER NOT NULL DEFAULT 0,
    category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_products_status ON products(status, created_at);

CREATE TABLE IF NOT EXISTS product_images (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    id           TEXT NOT NULL UNIQUE,
    product_id   TEXT NOT NULL REFERENCES products(id) ON DELETE CASCADE,
    url          TEXT NOT NULL,
    storage_path TEXT NOT NULL DEFAULT '',
    is_primary   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_product_images_product ON product_images(product_id, seq);
CREATE UNIQUE INDEX IF NOT EXISTS idx_product_images_one_primary
    ON product_images(product_id) WHERE is_primary = 1;
";

/// Column list matching [`product_from_row`].
pub(crate) const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price_cents, \
     p.stock, p.status, p.is_featured, c.slug, p.created_at, p.updated_at";

/// Column list matching [`image_from_row`].
pub(crate) const IMAGE_COLUMNS: &str = "id, product_id, url, storage_path, is_primary";

pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

pub(crate) fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let status: String = row.get(6)?;
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        price_cents: row.get(4)?,
        stock: row.get(5)?,
        status: status
            .parse()
            .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, e.into()))?,
        is_featured: row.get(7)?,
        category: row.get(8)?,
        created_at: from_millis(row.get(9)?),
        updated_at: from_millis(row.get(10)?),
    })
}

/// Maps an image starting at column `offset`.
pub(crate) fn image_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<ProductImage> {
    Ok(ProductImage {
        id: row.get(offset)?,
        product_id: row.get(offset + 1)?,
        url: row.get(offset + 2)?,
        storage_path: row.get(offset + 3)?,
        is_primary: row.get(offset + 4)?,
    })
}

pub(crate) fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ProductImage> {
    image_at(row, 0)
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
