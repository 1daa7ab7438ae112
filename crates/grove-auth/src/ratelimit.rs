//! Fixed-window rate limiting.
//!
//! Counters are keyed by `(scope, subject)`. A subject's first request
//! opens a window; requests past the limit inside the window are denied
//! with the time remaining until reset. When a stored window has ended it
//! is reset in place and the request counts as the first of a new window.
//!
//! The token endpoint keys on `IP:client_id`, never on the client alone:
//! keyed on the client, any caller could exhaust the window for every
//! user of that client.
//!
//! Admission is best-effort under contention: transient over-admission is
//! acceptable, under-admission is not. Dead windows are evicted
//! cooperatively every [`SWEEP_EVERY`] checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Scope for magic-code sends keyed by client IP.
pub const SCOPE_MAGIC_IP: &str = "magic_ip";
/// Scope for magic-code sends keyed by lowercased email.
pub const SCOPE_MAGIC_EMAIL: &str = "magic_email";
/// Scope for the token endpoint, keyed by `IP:client_id`.
pub const SCOPE_TOKEN: &str = "token";
/// Scope for magic-code verification keyed by client IP.
pub const SCOPE_VERIFY: &str = "verify";
/// Scope for admin endpoints keyed by client IP.
pub const SCOPE_ADMIN: &str = "admin";
/// Scope for device-flow initiation keyed by client IP.
pub const SCOPE_DEVICE_INIT: &str = "device_init";
/// Scope for session endpoints keyed by client IP.
pub const SCOPE_SESSION: &str = "session";
/// Scope for revoke-all, with its long window.
pub const SCOPE_SESSION_REVOKE_ALL: &str = "session_revoke_all";

/// Checks between cooperative eviction sweeps.
const SWEEP_EVERY: u64 = 4096;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request is admitted.
    pub allowed: bool,
    /// Requests remaining in the current window after this one.
    pub remaining: u32,
    /// Time until the current window resets.
    pub retry_after: Duration,
}

struct Window {
    count: u32,
    started: Instant,
    length: Duration,
}

/// Fixed-window rate limiter over a concurrent map.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Checks and counts a request for `(scope, subject)`.
    ///
    /// The request is admitted if fewer than `limit` requests have been
    /// counted in the current `window`. Denied requests are not counted
    /// against the window.
    pub fn check(
        &self,
        scope: &str,
        subject: &str,
        limit: u32,
        window: Duration,
    ) -> RateDecision {
        self.maybe_sweep();

        let key = format!("{scope}:{subject}");
        let now = Instant::now();

        let mut entry = self.windows.entry(key).or_insert_with(|| Window {
            count: 0,
            started: now,
            length: window,
        });

        // A finished window resets in place; this request opens the next one.
        if now.duration_since(entry.started) >= entry.length {
            entry.count = 0;
            entry.started = now;
            entry.length = window;
        }

        let reset_in = entry
            .length
            .saturating_sub(now.duration_since(entry.started));

        if entry.count >= limit {
            return RateDecision {
                allowed: false,
                remaining: 0,
                retry_after: reset_in,
            };
        }

        entry.count += 1;
        RateDecision {
            allowed: true,
            remaining: limit - entry.count,
            retry_after: reset_in,
        }
    }

    /// Number of live window entries (for the health endpoint).
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    fn maybe_sweep(&self) {
        let n = self.checks.fetch_add(1, Ordering::Relaxed);
        if n % SWEEP_EVERY != SWEEP_EVERY - 1 {
            return;
        }
        let now = Instant::now();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < w.length);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
