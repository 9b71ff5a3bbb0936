//! CLI command implementations for storefront.
//!
//! - [`serve`] - Run the HTTP service
//! - [`check_config`] - Load and validate a configuration file
//! - [`hash_password`] - Produce an account password digest

pub mod check_config;
pub mod serve;

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;

/// Loads `path` when given, else `storefront.toml` in the current directory.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Prints the bcrypt digest to put in `[[auth.accounts]] password_digest`.
pub fn hash_password(password: &str) -> Result<()> {
    let digest = crate::gate::hash_password(password).context("Failed to hash password")?;
    println!("{digest}");
    Ok(())
}
