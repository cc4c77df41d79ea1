//! # spacetrack
//!
//! 这是 Space-Track.org REST API 的 Rust 客户端，提供速率受控的同步与异步接口。
//!
//! Rate-governed client for the Space-Track.org REST API, with an async
//! surface built on tokio and a blocking surface for plain threads.
//!
//! ## Overview
//!
//! Space-Track groups its request classes (`gp`, `satcat`, `cdm_public`, ...)
//! into controllers, and describes each class's queryable fields through a
//! `modeldef` endpoint. This crate:
//!
//! - resolves short class names to a controller in a fixed priority order
//! - fetches and memoizes predicate schemas, rejecting unknown keywords before
//!   anything is sent
//! - renders predicate values into Space-Track's operator syntax
//! - enforces the per-minute and per-hour request limits (30 and 300 by
//!   default), optionally through a store shared by several clients
//! - returns responses fully buffered, as a stream of lines, or as 100 KiB
//!   chunks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use spacetrack::{schema::greater_than, Query, SpaceTrackClient};
//!
//! #[tokio::main]
//! async fn main() -> spacetrack::Result<()> {
//!     let client = SpaceTrackClient::builder()
//!         .identity("me@example.com")
//!         .password("secret")
//!         .build()?;
//!
//!     let query = Query::new("gp")
//!         .predicate("epoch", greater_than("now-30"))
//!         .predicate("format", "3le")
//!         .iter_lines();
//!     if let Some(mut lines) = client.generic_request(query).await?.into_lines() {
//!         while let Some(line) = lines.next().await {
//!             println!("{}", line?);
//!         }
//!     }
//!
//!     client.close().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Async and blocking clients, builder, controller proxies |
//! | [`registry`] | Controllers and request-class descriptors |
//! | [`schema`] | Predicates, value syntax, typed result parsing |
//! | [`cache`] | Session and on-disk predicate caches |
//! | [`dispatch`] | I/O-free request planning shared by both clients |
//! | [`pipeline`] | Response classification and shaping |
//! | [`resilience`] | Sliding-window rate limiter and its stores |
//! | [`transport`] | HTTP executor boundary and reqwest implementations |

pub mod cache;
pub mod client;
pub mod dispatch;
pub mod pipeline;
pub mod registry;
pub mod resilience;
pub mod schema;
pub mod transport;

// Re-export main types for convenience
pub use client::{
    BlockingShapedResponse, BlockingSpaceTrackClient, ControllerProxy, ShapedResponse,
    SpaceTrackClient, SpaceTrackClientBuilder,
};
pub use dispatch::{Query, ResponseMode};
pub use pipeline::Shaped;
pub use registry::{ControllerRegistry, RequestClassDescriptor};
pub use resilience::{Quota, RateLimitCallback, RateLimiter, RateLimiterConfig};
pub use schema::{Predicate, PredicateType, PredicateValue, TypedValue, UnknownTypePolicy};
pub use transport::FilePart;

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A pinned, boxed stream of fallible items.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
