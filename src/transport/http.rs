use super::{HttpExecutor, HttpRequest, HttpResponse, TransportConfig, TransportError, SESSION_COOKIE};
use crate::{BoxStream, Error, ErrorContext, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;

/// Async reqwest transport. Keeps a cookie store so the login session carries
/// over to later requests.
///
/// Buffered requests get a total deadline. Streamed bodies may take as long as
/// they need, but fail once no data arrives for the configured timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(cfg.timeout)
            .cookie_store(true)
            .redirect(Policy::limited(cfg.max_redirects))
            .pool_idle_timeout(Some(std::time::Duration::from_secs(90)));

        if let Some(pem) = &cfg.ca_bundle {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid CA bundle: {}", e),
                    ErrorContext::new()
                        .with_field_path("ca_bundle")
                        .with_source("http_transport"),
                )
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if let Some(headers) = session_headers(cfg)? {
            builder = builder.default_headers(headers);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            timeout: cfg.timeout,
        })
    }

    /// Use a preconfigured client (e.g. with a proxy). It should keep cookies.
    pub fn from_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

/// Fail the body once `idle` passes without a new chunk.
fn idle_limited<S>(body: S, idle: Duration) -> BoxStream<'static, Bytes>
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    Box::pin(futures::stream::unfold(
        Some(Box::pin(body)),
        move |state| async move {
            let mut body = state?;
            match tokio::time::timeout(idle, body.next()).await {
                Ok(Some(item)) => Some((item, Some(body))),
                Ok(None) => None,
                Err(_) => Some((Err(Error::Transport(TransportError::IdleTimeout(idle))), None)),
            }
        },
    ))
}

pub(super) fn session_headers(cfg: &TransportConfig) -> Result<Option<HeaderMap>> {
    let Some(token) = &cfg.session_token else {
        return Ok(None);
    };
    let value = HeaderValue::from_str(&format!("{}={}", SESSION_COOKIE, token)).map_err(|_| {
        Error::configuration_with_context(
            "session token contains invalid header characters",
            ErrorContext::new()
                .with_field_path("session_token")
                .with_source("http_transport"),
        )
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, value);
    Ok(Some(headers))
}

#[async_trait]
impl HttpExecutor for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.url, "space-track request");

        let mut req = self.client.request(request.method, request.url);
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(file) = request.file {
            let mut form = multipart::Form::new().part(
                "file",
                multipart::Part::bytes(file.content.to_vec()).file_name(file.file_name),
            );
            for (k, v) in request.form {
                form = form.text(k, v);
            }
            req = req.multipart(form);
        } else if !request.form.is_empty() {
            req = req.form(&request.form);
        }
        match (request.timeout, request.stream) {
            (Some(timeout), _) => req = req.timeout(timeout),
            (None, false) => req = req.timeout(self.timeout),
            (None, true) => {}
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        let body: BoxStream<'static, Bytes> = if request.stream {
            idle_limited(body, self.timeout)
        } else {
            Box::pin(body)
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
