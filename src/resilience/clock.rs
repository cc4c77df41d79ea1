//! Time sources for rate-limit bookkeeping.
//!
//! Admission timestamps are milliseconds since the UNIX epoch so that several
//! processes sharing one [`RateLimitStore`](super::store::RateLimitStore) agree
//! on a common time base.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;
}

/// Epoch-aligned clock that never goes backwards.
///
/// The epoch offset is sampled once; later readings advance with
/// `tokio::time::Instant`, which also makes the clock follow a paused tokio
/// test runtime.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
    origin_ms: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            origin: tokio::time::Instant::now(),
            origin_ms,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin_ms + self.origin.elapsed().as_millis() as u64
    }
}

/// Manually driven clock for deterministic tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert an epoch-millisecond reading into a wall-clock time.
pub fn to_system_time(ms: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(ms)
}
