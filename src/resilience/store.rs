//! Admission bookkeeping for rolling rate windows.
//!
//! [`WindowLog`] is the pure decision core: given the admission history of one
//! window and the current time it answers "when could `weight` more calls be
//! admitted". Stores wrap it with whatever atomicity they can offer.

use crate::{Error, ErrorContext, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Capacity over a rolling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub capacity: u32,
    pub period: Duration,
}

impl Quota {
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self { capacity, period }
    }

    pub fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    pub fn per_hour(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(3600))
    }

    pub fn period_ms(&self) -> u64 {
        self.period.as_millis() as u64
    }
}

/// One quota tracked under a store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub key: String,
    pub quota: Quota,
}

impl RateWindow {
    pub fn new(key: impl Into<String>, quota: Quota) -> Self {
        Self {
            key: key.into(),
            quota,
        }
    }
}

/// Decision returned by [`RateLimitStore::increment_and_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call was recorded in every window.
    Admitted,
    /// Nothing was recorded; retry at this epoch-millisecond time.
    RetryAt(u64),
}

/// Sorted admission timestamps of a single window.
#[derive(Debug, Clone, Default)]
pub struct WindowLog {
    admitted: VecDeque<u64>,
}

impl WindowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget admissions that no longer fall inside `(now - period, now]`.
    pub fn prune(&mut self, now_ms: u64, quota: &Quota) {
        let period = quota.period_ms();
        while let Some(&oldest) = self.admitted.front() {
            if oldest + period <= now_ms {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Earliest time at which `weight` more admissions fit. Expects a pruned log.
    pub fn next_admission(&self, now_ms: u64, quota: &Quota, weight: u32) -> u64 {
        let capacity = quota.capacity as usize;
        let needed = self.admitted.len() + weight as usize;
        if needed <= capacity {
            return now_ms;
        }
        // The (needed - capacity) oldest entries have to expire first.
        let idx = needed - capacity - 1;
        match self.admitted.get(idx) {
            Some(&ts) => (ts + quota.period_ms()).max(now_ms),
            None => now_ms,
        }
    }

    pub fn record(&mut self, now_ms: u64, weight: u32) {
        // Callers may race on clocks from different hosts; keep the log sorted.
        let at = self.admitted.back().map_or(now_ms, |&last| last.max(now_ms));
        for _ in 0..weight {
            self.admitted.push_back(at);
        }
    }

    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.admitted.iter().copied()
    }
}

/// Shared admission state.
///
/// Implementations must make `increment_and_check` atomic: either every window
/// records `weight` admissions or none does. A distributed implementation (for
/// example a Redis script over sorted sets keyed by [`RateWindow::key`]) is the
/// single source of truth for all processes using the same key prefix.
pub trait RateLimitStore: Send + Sync {
    fn increment_and_check(
        &self,
        windows: &[RateWindow],
        weight: u32,
        now_ms: u64,
    ) -> Result<Admission>;

    /// Number of admissions currently inside the window stored under `key`.
    fn admitted(&self, key: &str, quota: &Quota, now_ms: u64) -> Result<usize>;

    fn name(&self) -> &'static str;
}

/// In-process store: a mutex around one [`WindowLog`] per key.
///
/// Sharing one `MemoryStore` (behind an `Arc`) between several clients gives
/// them a common quota, which is also how distributed coordination is simulated
/// in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    logs: Mutex<HashMap<String, WindowLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the raw admission log for `key`.
    pub fn history(&self, key: &str) -> Vec<u64> {
        self.logs
            .lock()
            .map(|logs| logs.get(key).map(|l| l.iter().collect()).unwrap_or_default())
            .unwrap_or_default()
    }
}

fn poisoned() -> Error {
    Error::configuration_with_context(
        "rate limit state lock poisoned",
        ErrorContext::new().with_source("memory_store"),
    )
}

impl RateLimitStore for MemoryStore {
    fn increment_and_check(
        &self,
        windows: &[RateWindow],
        weight: u32,
        now_ms: u64,
    ) -> Result<Admission> {
        let mut logs = self.logs.lock().map_err(|_| poisoned())?;

        let mut retry_at = now_ms;
        for window in windows {
            let log = logs.entry(window.key.clone()).or_default();
            log.prune(now_ms, &window.quota);
            retry_at = retry_at.max(log.next_admission(now_ms, &window.quota, weight));
        }

        if retry_at > now_ms {
            return Ok(Admission::RetryAt(retry_at));
        }

        for window in windows {
            logs.entry(window.key.clone())
                .or_default()
                .record(now_ms, weight);
        }
        Ok(Admission::Admitted)
    }

    fn admitted(&self, key: &str, quota: &Quota, now_ms: u64) -> Result<usize> {
        let mut logs = self.logs.lock().map_err(|_| poisoned())?;
        Ok(match logs.get_mut(key) {
            Some(log) => {
                log.prune(now_ms, quota);
                log.len()
            }
            None => 0,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
