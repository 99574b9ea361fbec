use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{RateLimitExceeded, RateLimiter};

/// Fixed-window counter for one client identity.
#[derive(Debug, Clone)]
pub struct RateBucket {
    pub consumed: u32,
    pub window_start: Instant,
    /// Set once the bucket has been dropped from the table; holders must re-fetch.
    retired: bool,
}

impl RateBucket {
    fn new(now: Instant) -> Self {
        Self {
            consumed: 0,
            window_start: now,
            retired: false,
        }
    }

    fn window_elapsed(&self, window: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= window
    }
}

/// Single-process limiter.
///
/// Each identity's bucket sits behind its own mutex; the map is only locked
/// long enough to look up or insert the bucket handle.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    buckets: Arc<DashMap<String, Arc<Mutex<RateBucket>>>>,
    capacity: u32,
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            capacity,
            window,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of identities currently holding a bucket.
    pub fn tracked_identities(&self) -> usize {
        self.buckets.len()
    }

    pub fn consume_at(&self, identity: &str, now: Instant) -> Result<(), RateLimitExceeded> {
        loop {
            let handle = self.bucket_handle(identity, now);
            let mut bucket = handle.lock().unwrap_or_else(PoisonError::into_inner);

            if bucket.retired {
                continue;
            }

            if bucket.window_elapsed(self.window, now) {
                bucket.consumed = 0;
                bucket.window_start = now;
            }

            if bucket.consumed < self.capacity {
                bucket.consumed += 1;
                return Ok(());
            }

            let reset_at = bucket.window_start + self.window;
            return Err(RateLimitExceeded {
                capacity: self.capacity,
                window_secs: self.window.as_secs(),
                retry_after: reset_at.saturating_duration_since(now),
            });
        }
    }

    /// Drop every bucket whose window has already elapsed.
    pub fn purge_idle(&self) -> usize {
        self.purge_idle_at(Instant::now())
    }

    pub fn purge_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, handle| {
            let mut bucket = handle.lock().unwrap_or_else(PoisonError::into_inner);
            if bucket.window_elapsed(self.window, now) {
                bucket.retired = true;
                false
            } else {
                true
            }
        });
        before.saturating_sub(self.buckets.len())
    }

    /// Periodically purge idle buckets so memory tracks only active clients.
    pub fn start_sweeper(&self) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(limiter.window);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let purged = limiter.purge_idle();
                if purged > 0 {
                    debug!(
                        purged,
                        remaining = limiter.tracked_identities(),
                        "purged idle rate limit buckets"
                    );
                }
            }
        })
    }

    fn bucket_handle(&self, identity: &str, now: Instant) -> Arc<Mutex<RateBucket>> {
        if let Some(existing) = self.buckets.get(identity) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RateBucket::new(now))));
        Arc::clone(entry.value())
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn consume(&self, identity: &str) -> Result<(), RateLimitExceeded> {
        let result = self.consume_at(identity, Instant::now());
        if let Err(ref err) = result {
            warn!(
                identity,
                capacity = err.capacity,
                retry_after_secs = err.retry_after_secs(),
                "rate limit exceeded"
            );
        }
        result
    }
}
