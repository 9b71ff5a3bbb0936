//! Product image rows and the primary-image invariant.
//!
//! For any product with at least one image, exactly one image is primary.
//! Each mutation below keeps that true inside its own transaction.

use rusqlite::{OptionalExtension, params};
use tracing::debug;

use super::CatalogStore;
use super::error::{CatalogError, CatalogResult};
use super::schema::{IMAGE_COLUMNS, image_from_row};
use super::types::ProductImage;

impl CatalogStore {
    /// Records an uploaded image. The first image of a product becomes primary.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist.
    pub async fn insert_image(
        &self,
        product_id: &str,
        url: &str,
        storage_path: &str,
    ) -> CatalogResult<ProductImage> {
        let product_id = product_id.to_string();
        let url = url.to_string();
        let storage_path = storage_path.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM products WHERE id = ?1)",
                params![product_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(CatalogError::NotFound("product"));
            }

            let existing: i64 = tx.query_row(
                "SELECT COUNT(*) FROM product_images WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )?;

            let image = ProductImage {
                id: uuid::Uuid::new_v4().to_string(),
                product_id,
                url,
                storage_path,
                is_primary: existing == 0,
            };
            tx.execute(
                "INSERT INTO product_images (id, product_id, url, storage_path, is_primary)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    image.id,
                    image.product_id,
                    image.url,
                    image.storage_path,
                    image.is_primary
                ],
            )?;
            tx.commit()?;

            Ok(image)
        })
        .await
    }

    /// Makes `image_id` the only primary image of `product_id`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image does not belong to the product.
    pub async fn set_primary(&self, image_id: &str, product_id: &str) -> CatalogResult<ProductImage> {
        let image_id = image_id.to_string();
        let product_id = product_id.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let mut image = find_image_in(&tx, &image_id, &product_id)?
                .ok_or(CatalogError::NotFound("image"))?;

            tx.execute(
                "UPDATE product_images SET is_primary = 0 WHERE product_id = ?1",
                params![product_id],
            )?;
            tx.execute(
                "UPDATE product_images SET is_primary = 1 WHERE id = ?1",
                params![image_id],
            )?;
            tx.commit()?;

            image.is_primary = true;
            Ok(image)
        })
        .await
    }

    /// Deletes an image row. If that leaves images but no primary, the
    /// oldest remaining image is promoted and returned.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image does not belong to the product.
    pub async fn delete_image_and_promote(
        &self,
        image_id: &str,
        product_id: &str,
    ) -> CatalogResult<Option<ProductImage>> {
        let image_id = image_id.to_string();
        let product_id = product_id.to_string();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let deleted = tx.execute(
                "DELETE FROM product_images WHERE id = ?1 AND product_id = ?2",
                params![image_id, product_id],
            )?;
            if deleted == 0 {
                return Err(CatalogError::NotFound("image"));
            }

            let primaries: i64 = tx.query_row(
                "SELECT COUNT(*) FROM product_images WHERE product_id = ?1 AND is_primary = 1",
                params![product_id],
                |row| row.get(0),
            )?;

            let promoted = if primaries == 0 {
                let next = tx
                    .query_row(
                        &format!(
                            "SELECT {IMAGE_COLUMNS} FROM product_images
                             WHERE product_id = ?1 ORDER BY seq LIMIT 1"
                        ),
                        params![product_id],
                        image_from_row,
                    )
                    .optional()?;
                if let Some(image) = &next {
                    tx.execute(
                        "UPDATE product_images SET is_primary = 1 WHERE id = ?1",
                        params![image.id],
                    )?;
                    debug!(product_id = %product_id, image_id = %image.id, "Promoted image to primary");
                }
                next.map(|mut image| {
                    image.is_primary = true;
                    image
                })
            } else {
                None
            };

            tx.commit()?;
            Ok(promoted)
        })
        .await
    }

    /// All images of a product in upload order.
    pub async fn images_for_product(&self, product_id: &str) -> CatalogResult<Vec<ProductImage>> {
        let product_id = product_id.to_string();
        self.run(move |conn| images_in(conn, &product_id)).await
    }

    /// The image, if it belongs to `product_id`.
    pub async fn find_image(
        &self,
        image_id: &str,
        product_id: &str,
    ) -> CatalogResult<Option<ProductImage>> {
        let image_id = image_id.to_string();
        let product_id = product_id.to_string();
        self.run(move |conn| find_image_in(conn, &image_id, &product_id))
            .await
    }
}

pub(crate) fn images_in(
    conn: &rusqlite::Connection,
    product_id: &str,
) -> CatalogResult<Vec<ProductImage>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id = ?1 ORDER BY seq"
    ))?;
    let images = stmt
        .query_map(params![product_id], image_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(images)
}

fn find_image_in(
    conn: &rusqlite::Connection,
    image_id: &str,
    product_id: &str,
) -> CatalogResult<Option<ProductImage>> {
    let image = conn
        .query_row(
            &format!(
                "SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = ?1 AND product_id = ?2"
            ),
            params![image_id, product_id],
            image_from_row,
        )
        .optional()?;
    Ok(image)
}
