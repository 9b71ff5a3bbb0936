//! Same-origin check for mutating requests.

use axum::http::header::{HOST, ORIGIN};
use axum::http::{HeaderMap, Method};

/// Safe methods are never checked.
#[must_use]
pub fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Requires `Origin` to equal `{X-Forwarded-Proto|http}://{X-Forwarded-Host|Host}`.
///
/// # Errors
///
/// Returns the reason the request was refused.
pub fn verify_same_origin(headers: &HeaderMap) -> Result<(), &'static str> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let host = header("x-forwarded-host").or_else(|| header(HOST.as_str()));
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let (Some(origin), Some(host)) = (header(ORIGIN.as_str()), host) else {
        return Err("origin missing");
    };

    let parsed = url::Url::parse(origin).map_err(|_| "origin invalid")?;
    let expected = format!("{proto}://{host}");
    if parsed.origin().ascii_serialization() == expected {
        Ok(())
    } else {
        Err("origin mismatch")
    }
}
