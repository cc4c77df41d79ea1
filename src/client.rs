//! Space-Track clients.
//!
//! [`SpaceTrackClient`] suspends the calling task while waiting on the rate
//! limiter or the network; [`BlockingSpaceTrackClient`] blocks the calling
//! thread. Both share the dispatch core, schema caches and limiter design.
//! Implementation details are split into submodules under `src/client/`.

pub mod blocking;
pub mod builder;
mod core;
pub mod execution;
mod preflight;
pub mod proxy;

pub use blocking::{BlockingShapedResponse, BlockingSpaceTrackClient};
pub use builder::{SpaceTrackClientBuilder, DEFAULT_BASE_URL};
pub use execution::{ShapedResponse, SpaceTrackClient};
pub use proxy::ControllerProxy;
