//! Relational catalog store backed by SQLite.
//!
//! Holds products, categories and product images. Multi-statement image
//! operations run inside a single transaction so readers never observe a
//! product with zero or several primary images.
//!
//! # Async Usage
//!
//! rusqlite is blocking. Every public method runs its statements through
//! `spawn_blocking` on a connection shared behind a mutex.
//!
//! # Example
//!
//! ```ignore
//! use storefront::services::catalog::CatalogStore;
//!
//! let catalog = CatalogStore::memory()?;
//! let image = catalog.insert_image(&product_id, url, storage_path).await?;
//! assert!(image.is_primary); // first image of the product
//! ```

mod error;
mod images;
mod products;
mod schema;
mod types;
mod validation;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

pub use error::{CatalogError, CatalogResult, FieldErrors};
pub use types::{
    Category, CategoryStats, DashboardStats, Product, ProductCard, ProductDetail, ProductFilter,
    ProductImage, ProductInput, ProductStatus,
};
pub use validation::{normalize_search, sanitize_entity_id};

/// SQLite-backed catalog.
///
/// # Thread Safety
///
/// `CatalogStore` is `Clone`; clones share one connection.
#[derive(Clone)]
pub struct CatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    /// Opens (or creates) the database at `path`. `:memory:` opens a
    /// private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    pub fn open<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database. All data is lost on drop.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn memory() -> CatalogResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CatalogResult<Self> {
        schema::init(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `op` on the connection in a blocking task.
    async fn run<T, F>(&self, op: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> CatalogResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut guard)
        })
        .await
        .map_err(|e| CatalogError::Task(e.to_string()))?
    }
}
