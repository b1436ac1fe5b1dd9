/// Helpers for gating front-end actions on the security pipeline
use super::rate_limit::{RateLimitStatus, RateLimiter};

/// Run `f` only if the limiter allows one more action.
///
/// `f` receives the granting status so it can report what is left of the
/// window. On refusal the status is returned so the caller can tell the user
/// how long to wait.
pub fn rate_limited<F, T>(limiter: &RateLimiter, f: F) -> Result<T, RateLimitStatus>
where
    F: FnOnce(RateLimitStatus) -> T,
{
    let status = limiter.check();
    if !status.allowed {
        return Err(status);
    }
    Ok(f(status))
}
