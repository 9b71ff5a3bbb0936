//! Fixed-window request counter.
//!
//! One bucket per `"{client_ip}:{path}"` key. The first request of a key
//! opens a window of `policy.window`; every request inside the window
//! increments the count and is allowed while `count <= policy.max`. Expired
//! buckets are swept on every call, so memory stays bounded without a
//! background task.
//!
//! State is process-local and lost on restart. Replicas do not share counts.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::constants;

/// Quota for one class of routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window: Duration,
}

/// The two conventional policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicies {
    /// Credential submission (`/api/auth*`).
    pub credentials: RateLimitPolicy,
    /// Every other API route.
    pub api: RateLimitPolicy,
}

impl Default for RateLimitPolicies {
    fn default() -> Self {
        Self {
            credentials: RateLimitPolicy {
                max: constants::CREDENTIALS_RATE_LIMIT_MAX,
                window: constants::RATE_LIMIT_WINDOW,
            },
            api: RateLimitPolicy {
                max: constants::API_RATE_LIMIT_MAX,
                window: constants::RATE_LIMIT_WINDOW,
            },
        }
    }
}

impl RateLimitPolicies {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        let window = config.window();
        Self {
            credentials: RateLimitPolicy {
                max: config.credentials_max,
                window,
            },
            api: RateLimitPolicy {
                max: config.api_max,
                window,
            },
        }
    }

    /// Selects the policy from the path prefix alone. Non-API paths are not limited.
    #[must_use]
    pub fn for_path(&self, path: &str) -> Option<RateLimitPolicy> {
        if has_segment_prefix(path, "/api/auth") {
            Some(self.credentials)
        } else if has_segment_prefix(path, "/api") {
            Some(self.api)
        } else {
            None
        }
    }
}

/// `path` is `prefix` or continues it with a new segment.
pub(crate) fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Bucket key for a client and path.
#[must_use]
pub fn rate_limit_key(client_ip: &str, path: &str) -> String {
    format!("{client_ip}:{path}")
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

/// Outcome of one [`RateLimiter::consume`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: Instant,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let millis = self.reset_at.saturating_duration_since(now).as_millis();
        u64::try_from(millis.div_ceil(1000)).unwrap_or(u64::MAX)
    }
}

/// Process-wide bucket table.
///
/// Sweep and update happen under one lock, so concurrent requests for the
/// same key never interleave mid-update.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request for `key` against `policy`.
    pub fn consume(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        self.consume_at(key, policy, Instant::now())
    }

    /// [`consume`](Self::consume) with an explicit clock.
    pub fn consume_at(&self, key: &str, policy: RateLimitPolicy, now: Instant) -> RateLimitDecision {
        let mut buckets = self.buckets.lock();
        buckets.retain(|_, bucket| bucket.reset_at > now);

        match buckets.get_mut(key) {
            Some(bucket) => {
                bucket.count = bucket.count.saturating_add(1);
                RateLimitDecision {
                    allowed: bucket.count <= policy.max,
                    limit: policy.max,
                    remaining: policy.max.saturating_sub(bucket.count),
                    reset_at: bucket.reset_at,
                }
            },
            None => {
                let reset_at = now + policy.window;
                buckets.insert(key.to_string(), Bucket { count: 1, reset_at });
                RateLimitDecision {
                    allowed: true,
                    limit: policy.max,
                    remaining: policy.max.saturating_sub(1),
                    reset_at,
                }
            },
        }
    }

    /// Number of live buckets (including ones not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
