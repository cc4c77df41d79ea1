use super::clock::{to_system_time, Clock, MonotonicClock};
use super::store::{Admission, MemoryStore, Quota, RateLimitStore, RateWindow};
use crate::{Error, ErrorContext, Result};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tracing::info;

/// Invoked with the absolute resume time whenever a call has to wait.
pub type RateLimitCallback = Arc<dyn Fn(SystemTime) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    pub per_minute: Quota,
    pub per_hour: Quota,
    /// Optional extra restriction on top of the published limits.
    pub additional: Option<Quota>,
    /// Prepended to every store key, e.g. to share a Redis db between apps.
    pub key_prefix: String,
}

impl RateLimiterConfig {
    /// Space-Track's published limits: 30 requests per minute, 300 per hour.
    pub fn new() -> Self {
        Self {
            per_minute: Quota::per_minute(30),
            per_hour: Quota::per_hour(300),
            additional: None,
            key_prefix: String::new(),
        }
    }

    pub fn with_per_minute(mut self, capacity: u32) -> Self {
        self.per_minute = Quota::per_minute(capacity);
        self
    }

    pub fn with_per_hour(mut self, capacity: u32) -> Self {
        self.per_hour = Quota::per_hour(capacity);
        self
    }

    pub fn with_windows(mut self, per_minute: Quota, per_hour: Quota) -> Self {
        self.per_minute = per_minute;
        self.per_hour = per_hour;
        self
    }

    pub fn with_additional(mut self, quota: Quota) -> Self {
        self.additional = Some(quota);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn windows(&self) -> Vec<RateWindow> {
        let mut windows = vec![
            RateWindow::new(format!("{}st_req_min", self.key_prefix), self.per_minute),
            RateWindow::new(format!("{}st_req_hr", self.key_prefix), self.per_hour),
        ];
        if let Some(quota) = self.additional {
            windows.push(RateWindow::new(
                format!("{}st_req_custom", self.key_prefix),
                quota,
            ));
        }
        windows
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Dual-window (per-minute and per-hour) admission control.
///
/// A call is admitted only when every window has room; otherwise the caller
/// waits until the furthest-out window reopens. Nothing is recorded while
/// waiting, so abandoning a wait (timeout, dropped future) never consumes a
/// slot.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    windows: Vec<RateWindow>,
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    callback: RwLock<Option<RateLimitCallback>>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        Self::with_store(cfg, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(cfg: RateLimiterConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self::with_store_and_clock(cfg, store, Arc::new(MonotonicClock::new()))
    }

    pub fn with_store_and_clock(
        cfg: RateLimiterConfig,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let windows = cfg.windows();
        Self {
            cfg,
            windows,
            store,
            clock,
            callback: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    pub fn set_callback(&self, callback: Option<RateLimitCallback>) {
        if let Ok(mut slot) = self.callback.write() {
            *slot = callback;
        }
    }

    /// Record `weight` admissions if every window has room.
    pub fn try_acquire(&self, weight: u32) -> Result<Admission> {
        self.check_weight(weight)?;
        let now = self.clock.now_ms();
        self.store.increment_and_check(&self.windows, weight, now)
    }

    /// Acquire one slot, suspending the calling task while the windows are full.
    pub async fn acquire(&self) -> Result<()> {
        self.acquire_weighted(1).await
    }

    pub async fn acquire_weighted(&self, weight: u32) -> Result<()> {
        loop {
            match self.try_acquire(weight)? {
                Admission::Admitted => return Ok(()),
                Admission::RetryAt(at) => {
                    let wait = self.announce_wait(at);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Acquire one slot, sleeping the calling thread while the windows are full.
    pub fn acquire_blocking(&self) -> Result<()> {
        self.acquire_weighted_blocking(1)
    }

    pub fn acquire_weighted_blocking(&self, weight: u32) -> Result<()> {
        loop {
            match self.try_acquire(weight)? {
                Admission::Admitted => return Ok(()),
                Admission::RetryAt(at) => {
                    let wait = self.announce_wait(at);
                    std::thread::sleep(wait);
                }
            }
        }
    }

    /// Wait out one full per-minute period, used after the server reports a
    /// rate violation the local windows did not anticipate.
    pub async fn back_off(&self) {
        let at = self.clock.now_ms() + self.cfg.per_minute.period_ms();
        let wait = self.announce_wait(at);
        tokio::time::sleep(wait).await;
    }

    pub fn back_off_blocking(&self) {
        let at = self.clock.now_ms() + self.cfg.per_minute.period_ms();
        let wait = self.announce_wait(at);
        std::thread::sleep(wait);
    }

    /// Admissions currently counted against the per-minute window.
    pub fn admitted_this_minute(&self) -> Result<usize> {
        let window = &self.windows[0];
        self.store
            .admitted(&window.key, &window.quota, self.clock.now_ms())
    }

    /// Admissions currently counted against the per-hour window.
    pub fn admitted_this_hour(&self) -> Result<usize> {
        let window = &self.windows[1];
        self.store
            .admitted(&window.key, &window.quota, self.clock.now_ms())
    }

    fn check_weight(&self, weight: u32) -> Result<()> {
        let smallest = self
            .windows
            .iter()
            .map(|w| w.quota.capacity)
            .min()
            .unwrap_or(u32::MAX);
        if weight == 0 || weight > smallest {
            return Err(Error::configuration_with_context(
                format!("weight {} can never be admitted (smallest capacity {})", weight, smallest),
                ErrorContext::new()
                    .with_field_path("weight")
                    .with_source("rate_limiter"),
            ));
        }
        Ok(())
    }

    /// Log the wait and notify the callback once; returns how long to sleep.
    fn announce_wait(&self, resume_at_ms: u64) -> Duration {
        let now = self.clock.now_ms();
        let wait = Duration::from_millis(resume_at_ms.saturating_sub(now));
        info!(
            seconds = wait.as_secs_f64().round() as u64,
            store = self.store.name(),
            "Rate limit reached. Sleeping for {} seconds.",
            wait.as_secs_f64().round() as u64
        );
        let callback = self.callback.read().ok().and_then(|slot| slot.clone());
        if let Some(cb) = callback {
            cb(to_system_time(resume_at_ms));
        }
        wait
    }
}
