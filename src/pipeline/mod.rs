//! 响应处理模块：状态分类、缓冲/逐行/分块三种响应形态。
//!
//! # Response Pipeline
//!
//! Turns a transport response into what the caller asked for:
//!
//! ```text
//! status + body ──► Outcome ──► Success ──► Buffered ─► Json / Typed / Text / Bytes
//!                     │                 ├─► Lines  ──► LineDecoder  (CRLF -> LF)
//!                     │                 └─► Chunks ──► ChunkAssembler (100 KiB)
//!                     ├─► RateViolation (retried once by the client)
//!                     └─► Failed { status, message }
//! ```
//!
//! The decoders are plain state machines over byte slices; [`response`] wraps
//! them as async streams and blocking iterators. Both release the transport
//! body once it is exhausted, fails, or the consumer is dropped.

pub mod chunks;
pub mod lines;
pub mod response;

pub use chunks::{ChunkAssembler, CONTENT_CHUNK_SIZE};
pub use lines::LineDecoder;
pub use response::{
    chunk_stream, error_message, line_stream, normalize_newlines, shape_buffered, ChunkIter,
    ChunkStream, LineIter, LineStream, Outcome, Shaped,
};
