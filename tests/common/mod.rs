//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::json;
use spacetrack::transport::{
    BlockingHttpExecutor, BlockingHttpResponse, HttpExecutor, HttpRequest, HttpResponse,
};
use spacetrack::{BlockingSpaceTrackClient, SpaceTrackClient, SpaceTrackClientBuilder};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://st.test/";

#[derive(Clone, Debug)]
pub struct Reply {
    pub status: u16,
    pub parts: Vec<Bytes>,
}

impl Reply {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            parts: vec![body.into()],
        }
    }

    /// A 200 body delivered in the given transport chunks.
    pub fn chunked<I, B>(parts: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            status: 200,
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn rate_violation() -> Self {
        Self::status(500, "You've violated your query rate limit.")
    }

    /// A modeldef response with `(Field, Type)` pairs.
    pub fn modeldef(fields: &[(&str, &str)]) -> Self {
        let data: Vec<_> = fields
            .iter()
            .map(|(name, ty)| json!({"Field": name, "Type": ty, "Null": "NO", "Default": "", "Key": "", "Extra": ""}))
            .collect();
        Self::ok(json!({"controller": "basicspacedata", "data": data}).to_string())
    }
}

/// Replies are matched by path substring; the most recently added matching
/// route wins. A route's last reply repeats forever.
pub struct FakeTransport {
    routes: Mutex<Vec<(String, VecDeque<Reply>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let fake = Self {
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
        };
        fake.route("/ajaxauth/login", [Reply::ok("\"\"")]);
        fake.route("/ajaxauth/logout", [Reply::ok("\"Successfully logged out\"")]);
        fake.route(
            "/modeldef/class/",
            [Reply::modeldef(&[
                ("NORAD_CAT_ID", "int(10) unsigned"),
                ("EPOCH", "datetime"),
                ("OBJECT_NAME", "varchar(25)"),
            ])],
        );
        Arc::new(fake)
    }

    pub fn route<I: IntoIterator<Item = Reply>>(&self, pattern: &str, replies: I) {
        self.routes
            .lock()
            .unwrap()
            .push((pattern.to_string(), replies.into_iter().collect()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.url.path().to_string()).collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.paths().iter().filter(|p| p.contains(pattern)).count()
    }

    fn reply(&self, request: &HttpRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        let path = request.url.path();
        let mut routes = self.routes.lock().unwrap();
        for (pattern, replies) in routes.iter_mut().rev() {
            if path.contains(pattern.as_str()) {
                return if replies.len() > 1 {
                    replies.pop_front().unwrap()
                } else {
                    replies.front().cloned().unwrap()
                };
            }
        }
        Reply::status(404, format!("no route for {}", path))
    }
}

#[async_trait]
impl HttpExecutor for FakeTransport {
    async fn execute(&self, request: HttpRequest) -> spacetrack::Result<HttpResponse> {
        let reply = self.reply(&request);
        let parts: Vec<spacetrack::Result<Bytes>> = reply.parts.into_iter().map(Ok).collect();
        Ok(HttpResponse {
            status: reply.status,
            headers: HeaderMap::new(),
            body: Box::pin(futures::stream::iter(parts)),
        })
    }
}

impl BlockingHttpExecutor for FakeTransport {
    fn execute(&self, request: HttpRequest) -> spacetrack::Result<BlockingHttpResponse> {
        let reply = self.reply(&request);
        Ok(BlockingHttpResponse::from_bytes(
            reply.status,
            HeaderMap::new(),
            reply.parts.concat(),
        ))
    }
}

pub fn builder() -> SpaceTrackClientBuilder {
    SpaceTrackClientBuilder::new()
        .identity("user@example.com")
        .password("hunter2")
        .use_keyring(false)
        .base_url(BASE_URL)
}

pub fn client(fake: &Arc<FakeTransport>) -> SpaceTrackClient {
    builder().transport(fake.clone()).build().unwrap()
}

pub fn blocking_client(fake: &Arc<FakeTransport>) -> BlockingSpaceTrackClient {
    builder()
        .blocking_transport(fake.clone())
        .build_blocking()
        .unwrap()
}

/// A one-shot HTTP server that announces `declared` body bytes, then writes
/// `pieces` pieces of `piece_len` bytes with `gap` before each one. The
/// connection stays open for a while afterwards so a short body stalls.
/// Returns the base URL.
pub fn slow_server(declared: usize, pieces: usize, piece_len: usize, gap: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => head.extend_from_slice(&buf[..n]),
            }
        }
        let header = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
        );
        if stream.write_all(header.as_bytes()).is_err() {
            return;
        }
        for _ in 0..pieces {
            std::thread::sleep(gap);
            if stream.write_all(&vec![b'x'; piece_len]).is_err() {
                return;
            }
        }
        std::thread::sleep(Duration::from_secs(5));
    });
    format!("http://{addr}/")
}
