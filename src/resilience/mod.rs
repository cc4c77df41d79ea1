//! 限流模块：每分钟与每小时双窗口的请求准入控制。
//!
//! # Rate Limiting Module
//!
//! Space-Track throttles API use to 30 requests per minute and 300 per hour.
//! Every outgoing query is gated by a [`RateLimiter`] that enforces both
//! rolling windows at once.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Dual-window limiter with async and blocking waits |
//! | [`store`] | Pure window bookkeeping and the [`RateLimitStore`] seam |
//! | [`clock`] | Epoch-aligned time sources |
//!
//! ## Sharing a quota
//!
//! Several clients (or processes, given a distributed [`RateLimitStore`])
//! share one quota when they use the same store and key prefix:
//!
//! ```rust
//! use spacetrack::resilience::{MemoryStore, RateLimiter, RateLimiterConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let a = RateLimiter::with_store(RateLimiterConfig::new().with_key_prefix("app:"), store.clone());
//! let b = RateLimiter::with_store(RateLimiterConfig::new().with_key_prefix("app:"), store);
//! # let _ = (a, b);
//! ```

pub mod clock;
pub mod rate_limiter;
pub mod store;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use rate_limiter::{RateLimitCallback, RateLimiter, RateLimiterConfig};
pub use store::{Admission, MemoryStore, Quota, RateLimitStore, RateWindow, WindowLog};
