//! `storefront check-config`: validate without starting anything.

use anyhow::Result;
use std::path::Path;

use super::load_config;

pub fn execute(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;
    let result = config.validate()?;

    for warning in &result.warnings {
        println!("warning: {warning}");
    }
    println!(
        "Configuration OK (storage: {}, accounts: {}, rate limiting: {})",
        config.storage.provider,
        config.auth.accounts.len(),
        if config.rate_limit.enabled { "on" } else { "off" }
    );
    Ok(())
}
