//! Security audit logging for gate decisions.
//!
//! Events go to the `audit` tracing target so they can be routed or
//! filtered separately (`RUST_LOG=audit=info`).

use tracing::{error, info, warn};

/// Security-relevant gate events.
#[derive(Debug, Clone)]
pub enum AuditEvent {
    /// Admin route requested without a valid session.
    Unauthenticated { client: String, path: String },
    /// Valid session without the admin role.
    Forbidden {
        path: String,
        email: String,
        role: String,
    },
    /// Admin route requested while no session secret is configured.
    Misconfigured { path: String },
    /// Request refused by the rate limiter.
    RateLimited {
        client: String,
        path: String,
        retry_after_secs: u64,
    },
    /// Mutating admin request failed the same-origin check.
    CsrfRejected { path: String, reason: &'static str },
    /// Sign-in with bad or malformed credentials.
    LoginFailed { client: String, email: String },
    /// Successful sign-in (for correlation).
    LoginSucceeded { client: String, email: String },
}

/// Log a security audit event with structured fields.
pub fn log_audit_event(event: AuditEvent) {
    match event {
        AuditEvent::Unauthenticated { client, path } => {
            warn!(
                target: "audit",
                event_type = "unauthenticated",
                %client,
                %path,
                "Admin route requested without session"
            );
        },
        AuditEvent::Forbidden { path, email, role } => {
            warn!(
                target: "audit",
                event_type = "forbidden",
                %path,
                %email,
                %role,
                "Admin route requested without admin role"
            );
        },
        AuditEvent::Misconfigured { path } => {
            error!(
                target: "audit",
                event_type = "gate_misconfigured",
                %path,
                "Session secret is not configured; denying admin route"
            );
        },
        AuditEvent::RateLimited {
            client,
            path,
            retry_after_secs,
        } => {
            warn!(
                target: "audit",
                event_type = "rate_limited",
                %client,
                %path,
                retry_after_secs,
                "Rate limit exceeded"
            );
        },
        AuditEvent::CsrfRejected { path, reason } => {
            warn!(
                target: "audit",
                event_type = "csrf_rejected",
                %path,
                reason,
                "Cross-origin mutating request blocked"
            );
        },
        AuditEvent::LoginFailed { client, email } => {
            warn!(
                target: "audit",
                event_type = "login_failure",
                %client,
                %email,
                "Sign-in failed"
            );
        },
        AuditEvent::LoginSucceeded { client, email } => {
            info!(
                target: "audit",
                event_type = "login_success",
                %client,
                %email,
                "Sign-in succeeded"
            );
        },
    }
}
