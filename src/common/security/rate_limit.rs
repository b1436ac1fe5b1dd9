//! Sliding-window rate limiting.
//!
//! One [`RateLimiter`] tracks one client (or session); callers decide the
//! granularity by how many instances they create.

use super::audit::{AuditEventKind, AuditLog};
use crate::common::clock::{Clock, SystemClock};
use crate::common::config::SecurityConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Actions left in the current window
    pub remaining: usize,
    /// Seconds until capacity frees up
    pub reset_in: u64,
}

/// Sliding-window limiter allowing `max` actions per `window_ms`.
///
/// Only allowed actions are recorded, so a client hammering a full window
/// does not extend its own lockout.
///
/// # Examples
///
/// ```
/// use narrative_guard::common::security::RateLimiter;
///
/// let limiter = RateLimiter::with_limits(2, 60_000);
/// assert!(limiter.check().allowed);
/// assert!(limiter.check().allowed);
/// assert!(!limiter.check().allowed);
/// ```
pub struct RateLimiter {
    requests: Mutex<VecDeque<i64>>,
    max: usize,
    window_ms: u64,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<AuditLog>>,
}

/// `ceil(ms / 1000)` for non-negative millisecond counts
fn ceil_secs(ms: i64) -> u64 {
    let ms = ms.max(0) as u64;
    ms.div_ceil(1000)
}

impl RateLimiter {
    /// Create a limiter from configuration
    pub fn new(config: &SecurityConfig, clock: Arc<dyn Clock>, audit: Option<Arc<AuditLog>>) -> Self {
        Self {
            requests: Mutex::new(VecDeque::new()),
            max: config.rate_limit_max,
            window_ms: config.rate_limit_window_ms,
            clock,
            audit,
        }
    }

    /// Limiter on the system clock without audit logging
    pub fn with_limits(max: usize, window_ms: u64) -> Self {
        let config = SecurityConfig {
            rate_limit_max: max,
            rate_limit_window_ms: window_ms,
            ..SecurityConfig::default()
        };
        Self::new(&config, Arc::new(SystemClock), None)
    }

    /// Check whether one more action is allowed, recording it if so
    pub fn check(&self) -> RateLimitStatus {
        let now = self.clock.now_millis();
        let window = i64::try_from(self.window_ms).unwrap_or(i64::MAX);

        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);

        // Keep only timestamps inside the window; anything later than `now`
        // means the clock stepped back and would hold a slot indefinitely
        requests.retain(|&t| t <= now && now - t < window);

        if requests.len() >= self.max {
            let oldest = requests.iter().copied().min().unwrap_or(now);
            let reset_in = ceil_secs(window - (now - oldest));
            let request_count = requests.len();
            drop(requests);

            tracing::debug!(
                request_count,
                max = self.max,
                reset_in,
                "Rate limit exceeded"
            );
            if let Some(audit) = &self.audit {
                audit.record(
                    AuditEventKind::RateLimitExceeded,
                    json!({ "requestCount": request_count }),
                );
            }

            return RateLimitStatus {
                allowed: false,
                remaining: 0,
                reset_in,
            };
        }

        requests.push_back(now);

        RateLimitStatus {
            allowed: true,
            remaining: self.max - requests.len(),
            reset_in: ceil_secs(window),
        }
    }

    /// Number of actions recorded in the current window (without evicting)
    pub fn tracked(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forget every recorded action
    pub fn reset(&self) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Configured maximum per window
    pub fn max(&self) -> usize {
        self.max
    }

    /// Configured window length in milliseconds
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max", &self.max)
            .field("window_ms", &self.window_ms)
            .field("tracked", &self.tracked())
            .finish()
    }
}
