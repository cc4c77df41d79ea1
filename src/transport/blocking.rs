//! Blocking reqwest transport.
//!
//! `reqwest::blocking` spins up its own runtime; build and drop this transport
//! outside of any async context.

use super::http::session_headers;
use super::{BlockingHttpExecutor, BlockingHttpResponse, HttpRequest, TransportConfig, TransportError};
use crate::{Error, ErrorContext, Result};
use reqwest::blocking::multipart;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;

/// Streamed bodies are only bounded by `Query::timeout`, when set.
pub struct BlockingHttpTransport {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl BlockingHttpTransport {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .connect_timeout(cfg.timeout)
            .cookie_store(true)
            .redirect(Policy::limited(cfg.max_redirects));

        if let Some(pem) = &cfg.ca_bundle {
            let cert = reqwest::Certificate::from_pem(pem).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid CA bundle: {}", e),
                    ErrorContext::new()
                        .with_field_path("ca_bundle")
                        .with_source("blocking_transport"),
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

    pub fn from_client(client: reqwest::blocking::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

impl BlockingHttpExecutor for BlockingHttpTransport {
    fn execute(&self, request: HttpRequest) -> Result<BlockingHttpResponse> {
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
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();

        Ok(BlockingHttpResponse {
            status,
            headers,
            body: Box::new(resp),
        })
    }
}
