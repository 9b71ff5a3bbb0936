//! storefront: product catalog service with an admin back-office.
//!
//! - [`gate`] - rate limiting and back-office access control in front of
//!   every request
//! - [`services::assets`] - product image lifecycle across the catalog and
//!   the storage backend
//! - [`services::catalog`] - SQLite-backed products, categories and images
//! - [`services::storage`] - object storage, image CDN and in-memory backends
//! - [`http`] - axum router and handlers

pub mod commands;
pub mod config;
pub mod constants;
pub mod gate;
pub mod http;
pub mod services;
