//! Signed session tokens.
//!
//! Sessions are HS256 JSON Web Tokens signed with the configured secret.
//! Nothing is stored server-side. A token that fails to decode, carries a
//! bad signature or has expired is treated as no session at all.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::constants::{ADMIN_ROLE, SESSION_COOKIE};

/// Decoded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl SessionClaims {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    /// Returns `None` for a missing or blank secret.
    #[must_use]
    pub fn new(secret: &str, ttl: Duration) -> Option<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return None;
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Some(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Claims for a fresh session starting now.
    #[must_use]
    pub fn claims_for(&self, user_id: &str, email: &str, role: &str) -> SessionClaims {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }

    /// Encodes and signs `claims`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be encoded.
    pub fn issue(&self, claims: &SessionClaims) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    /// Decodes `token` if its signature is valid and it has not expired.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token.trim(), &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(error = %e, "Rejected session token");
                None
            },
        }
    }
}

/// Session token from the `session` cookie, else from `Authorization: Bearer`.
#[must_use]
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());
    if from_cookie.is_some() {
        return from_cookie;
    }

    // RFC 6750: the scheme is case-insensitive
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() > 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim().to_string())
            } else {
                None
            }
        })
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn signer() -> SessionSigner {
        SessionSigner::new("test-secret-with-some-length", Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let signer = signer();
        let claims = signer.claims_for("u1", "admin@example.com", "ADMIN");
        let token = signer.issue(&claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = signer.verify(&token).unwrap();
        assert_eq!(verified, claims);
        assert!(verified.is_admin());
        assert_eq!(verified.exp - verified.iat, 3600);
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let signer = signer();
        let claims = signer.claims_for("u1", "editor@example.com", "EDITOR");
        let token = signer.issue(&claims).unwrap();

        // Re-sign an elevated role under another key and splice in the
        // original signature.
        let forged = SessionClaims {
            role: "ADMIN".to_string(),
            ..claims
        };
        let other = SessionSigner::new("attacker-chosen-secret", Duration::from_secs(60)).unwrap();
        let forged_token = other.issue(&forged).unwrap();
        let (forged_body, _) = forged_token.rsplit_once('.').unwrap();
        let (_, signature) = token.rsplit_once('.').unwrap();
        assert!(signer.verify(&format!("{forged_body}.{signature}")).is_none());

        assert!(signer.verify("not-a-token").is_none());
        assert!(signer.verify("zz.zz.zz").is_none());
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = signer()
            .issue(&signer().claims_for("u1", "a@example.com", "ADMIN"))
            .unwrap();
        let other = SessionSigner::new("a-different-secret-value", Duration::from_secs(60)).unwrap();
        assert!(other.verify(&token).is_none());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer();
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "u1".to_string(),
            email: "a@example.com".to_string(),
            role: "ADMIN".to_string(),
            iat: now - 7200,
            exp: now - 60,
        };
        let token = signer.issue(&claims).unwrap();
        assert!(signer.verify(&token).is_none());
    }

    #[test]
    fn test_blank_secret_yields_no_signer() {
        assert!(SessionSigner::new("   ", Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));

        headers.remove(COOKIE);
        assert_eq!(token_from_headers(&headers).as_deref(), Some("other"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert!(token_from_headers(&headers).is_none());
    }
}
