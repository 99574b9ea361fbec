use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rate limit exceeded: {capacity} requests per {window_secs}s, retry in {}s", retry_after_secs(.retry_after))]
pub struct RateLimitExceeded {
    pub capacity: u32,
    pub window_secs: u64,
    /// Time until the bucket resets
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Whole seconds a client should wait, never zero.
    pub fn retry_after_secs(&self) -> u64 {
        retry_after_secs(&self.retry_after)
    }
}

fn retry_after_secs(retry_after: &Duration) -> u64 {
    let secs = retry_after.as_secs();
    let rounded = if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs };
    rounded.max(1)
}
