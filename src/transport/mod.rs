//! HTTP executor boundary.
//!
//! The dispatch engine never talks to reqwest directly: it hands a fully built
//! [`HttpRequest`] to an [`HttpExecutor`] (async) or [`BlockingHttpExecutor`]
//! and gets back a status, headers and a body that can be read in full or
//! consumed incrementally.

pub mod blocking;
pub mod http;

pub use blocking::BlockingHttpTransport;
pub use http::HttpTransport;

use crate::{BoxStream, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::io::Read;
use std::time::Duration;
use url::Url;

/// File attached to a multipart upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub file: Option<FilePart>,
    /// Hint that the caller will consume the body incrementally.
    pub stream: bool,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            form: Vec::new(),
            file: None,
            stream: false,
            timeout: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_form(mut self, form: Vec<(String, String)>) -> Self {
        self.form = form;
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Response from an [`HttpExecutor`]; dropping it releases the connection.
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BoxStream<'static, Bytes>,
}

impl HttpResponse {
    /// Wrap an already buffered body.
    pub fn from_bytes(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: Box::pin(futures::stream::once(async move { Ok(body) })),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Read the remaining body into memory.
    pub async fn bytes(mut self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

/// Blocking counterpart of [`HttpResponse`].
pub struct BlockingHttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl BlockingHttpResponse {
    pub fn from_bytes(status: u16, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: Box::new(std::io::Cursor::new(body)),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn bytes(mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

pub trait BlockingHttpExecutor: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<BlockingHttpResponse>;
}

/// Settings shared by the reqwest-backed transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connect timeout and total deadline of buffered requests. The async
    /// transport also fails a streamed body that pauses this long.
    pub timeout: Duration,
    /// Extra PEM-encoded root certificates.
    pub ca_bundle: Option<Vec<u8>>,
    /// Pre-established `chocolatechip` session cookie.
    pub session_token: Option<String>,
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ca_bundle: None,
            session_token: None,
            max_redirects: 10,
        }
    }
}

pub(crate) const SESSION_COOKIE: &str = "chocolatechip";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No response data for {0:?}")]
    IdleTimeout(Duration),

    #[error("Transport error: {0}")]
    Other(String),
}
