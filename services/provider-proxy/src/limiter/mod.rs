mod error;
mod memory;

pub use error::RateLimitExceeded;
pub use memory::{InMemoryRateLimiter, RateBucket};

/// Per-client admission budget.
///
/// Callers only ever see `consume`; the bucket table stays private to the
/// implementation so an out-of-process store can replace the in-memory one.
pub trait RateLimiter: Send + Sync {
    /// Take one point from `identity`'s bucket.
    fn consume(&self, identity: &str) -> Result<(), RateLimitExceeded>;
}
