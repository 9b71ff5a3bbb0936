//! Credential verification for back-office sign-in.
//!
//! The gate never looks at passwords. Sign-in goes through a
//! [`CredentialVerifier`], which either returns the principal to put in a
//! session or `None`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bcrypt::{BcryptResult, DEFAULT_COST};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

use crate::config::AccountConfig;

const MIN_PASSWORD_LEN: usize = 6;

/// A verified identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: String,
}

/// Sign-in payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Shape check: a plausible e-mail address and a password of at least 6
    /// characters. Failing payloads are rejected as bad credentials.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        looks_like_email(self.email.trim()) && self.password.chars().count() >= MIN_PASSWORD_LEN
    }
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Checks credentials and resolves the principal.
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    /// `Ok(None)` means the credentials are wrong. `Err` is reserved for the
    /// verifier itself failing.
    async fn verify(&self, email: &str, password: &str) -> Result<Option<Principal>>;
}

/// Bcrypt digest stored in configuration for `password`.
///
/// # Errors
///
/// Returns an error if the system random source fails.
pub fn hash_password(password: &str) -> BcryptResult<String> {
    hash_password_with_cost(password, DEFAULT_COST)
}

/// [`hash_password`] with an explicit work factor (4..=31).
///
/// # Errors
///
/// Returns an error for an out-of-range cost or a failing random source.
pub fn hash_password_with_cost(password: &str, cost: u32) -> BcryptResult<String> {
    bcrypt::hash(password, cost)
}

/// Shape check for a modular-crypt bcrypt digest (`$2b$12$...`, 60 chars).
#[must_use]
pub fn is_bcrypt_digest(digest: &str) -> bool {
    let mut parts = digest.split('$');
    let (Some(""), Some(version), Some(cost), Some(rest), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    digest.len() == 60
        && matches!(version, "2a" | "2b" | "2x" | "2y")
        && cost.len() == 2
        && cost.parse::<u32>().is_ok_and(|c| (4..=31).contains(&c))
        && rest.len() == 53
}

struct Account {
    principal: Principal,
    digest: String,
}

/// Accounts listed in the configuration file.
pub struct ConfiguredAccounts {
    accounts: Arc<Vec<Account>>,
}

impl ConfiguredAccounts {
    /// Builds the account table. Entries with a malformed digest are skipped
    /// with a warning.
    pub fn from_config(accounts: &[AccountConfig]) -> Self {
        let accounts = accounts
            .iter()
            .filter_map(|account| {
                let email = account.email.trim().to_ascii_lowercase();
                let digest = account.password_digest.trim();
                if !is_bcrypt_digest(digest) {
                    warn!(%email, "Skipping account with malformed password digest");
                    return None;
                }
                Some(Account {
                    principal: Principal {
                        user_id: user_id_for(&email),
                        email,
                        role: account.role.trim().to_string(),
                    },
                    digest: digest.to_string(),
                })
            })
            .collect();
        Self {
            accounts: Arc::new(accounts),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

/// Stable id derived from the e-mail address.
fn user_id_for(email: &str) -> String {
    blake3::hash(email.as_bytes()).to_hex()[..32].to_string()
}

#[async_trait]
impl CredentialVerifier for ConfiguredAccounts {
    async fn verify(&self, email: &str, password: &str) -> Result<Option<Principal>> {
        let email = email.trim().to_ascii_lowercase();
        let accounts = Arc::clone(&self.accounts);
        let password = password.to_string();

        // bcrypt is CPU-bound.
        tokio::task::spawn_blocking(move || -> Result<Option<Principal>> {
            let Some(account) = accounts.iter().find(|a| a.principal.email == email) else {
                return Ok(None);
            };
            let matched = bcrypt::verify(&password, &account.digest)
                .with_context(|| format!("verifying password digest for {email}"))?;
            Ok(matched.then(|| account.principal.clone()))
        })
        .await
        .context("credential check task failed")?
    }
}
