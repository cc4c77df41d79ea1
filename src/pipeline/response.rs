//! Response classification and shaping.

use super::chunks::ChunkAssembler;
use super::lines::LineDecoder;
use crate::dispatch::RequestPlan;
use crate::schema::{parse_rows, Predicate, TypedRow, UnknownTypePolicy};
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Read;

const RATE_VIOLATION_MARKER: &str = "violated your query rate limit";
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// What a response status and body mean for the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// HTTP 500 carrying Space-Track's query rate limit message. Retried once.
    RateViolation,
    Failed { status: u16, message: String },
}

impl Outcome {
    pub fn classify(status: u16, body: &[u8]) -> Self {
        if (200..300).contains(&status) {
            return Outcome::Success;
        }
        let message = error_message(body);
        if status == 500 && message.contains(RATE_VIOLATION_MARKER) {
            return Outcome::RateViolation;
        }
        Outcome::Failed { status, message }
    }

    pub fn into_error(self) -> Option<Error> {
        match self {
            Outcome::Success => None,
            Outcome::RateViolation => Some(Error::RequestFailed {
                status: 500,
                message: RATE_VIOLATION_MARKER.to_string(),
            }),
            Outcome::Failed { status, message } => Some(Error::RequestFailed { status, message }),
        }
    }
}

/// Space-Track's own error text: the `error` member of a JSON object, else
/// the raw body.
pub fn error_message(body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        if let Some(Value::String(msg)) = map.get("error") {
            if !msg.is_empty() {
                return msg.clone();
            }
        }
    }
    String::from_utf8_lossy(body).trim().to_string()
}

pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// A shaped response; `L` and `C` are the line and chunk sequence types of
/// the driver that produced it.
#[derive(Debug)]
pub enum Shaped<L, C> {
    /// Parsed JSON (no `format` predicate).
    Json(Value),
    /// JSON rows converted with `parse_types`.
    Typed(Vec<TypedRow>),
    /// Text body for an explicit `format`, newlines normalised.
    Text(String),
    /// Binary payload.
    Bytes(Bytes),
    Lines(L),
    Chunks(C),
}

impl<L, C> Shaped<L, C> {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Shaped::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_typed(self) -> Option<Vec<TypedRow>> {
        match self {
            Shaped::Typed(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Shaped::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            Shaped::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_lines(self) -> Option<L> {
        match self {
            Shaped::Lines(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_chunks(self) -> Option<C> {
        match self {
            Shaped::Chunks(c) => Some(c),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shaped::Json(_) => "json",
            Shaped::Typed(_) => "typed",
            Shaped::Text(_) => "text",
            Shaped::Bytes(_) => "bytes",
            Shaped::Lines(_) => "lines",
            Shaped::Chunks(_) => "chunks",
        }
    }
}

/// Shape a fully read body.
///
/// Type parsing runs only for JSON bodies and only when a predicate schema is
/// known; streamed and formatted responses are never parsed.
pub fn shape_buffered<L, C>(
    plan: &RequestPlan,
    body: Bytes,
    predicates: Option<&[Predicate]>,
    policy: UnknownTypePolicy,
) -> Result<Shaped<L, C>> {
    if !plan.decode_text() {
        return Ok(Shaped::Bytes(body));
    }
    if plan.has_format {
        return Ok(Shaped::Text(normalize_newlines(&String::from_utf8_lossy(&body))));
    }
    let data: Value = serde_json::from_slice(&body)?;
    match predicates {
        Some(predicates) if plan.parse_types => {
            parse_rows(data, predicates, policy).map(Shaped::Typed)
        }
        _ => Ok(Shaped::Json(data)),
    }
}

/// Lines of a streamed body, suspending between transport reads.
pub type LineStream = BoxStream<'static, String>;

/// Fixed-size chunks of a streamed body.
pub type ChunkStream = BoxStream<'static, Bytes>;

struct LineState {
    body: Option<BoxStream<'static, Bytes>>,
    decoder: LineDecoder,
    ready: VecDeque<String>,
}

/// The transport body is dropped as soon as it is exhausted or fails.
pub fn line_stream(body: BoxStream<'static, Bytes>) -> LineStream {
    let state = LineState {
        body: Some(body),
        decoder: LineDecoder::new(),
        ready: VecDeque::new(),
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(line) = st.ready.pop_front() {
                return Some((Ok(line), st));
            }
            let body = st.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => match st.decoder.push(&chunk) {
                    Ok(lines) => st.ready.extend(lines),
                    Err(e) => {
                        st.body = None;
                        return Some((Err(e), st));
                    }
                },
                Some(Err(e)) => {
                    st.body = None;
                    return Some((Err(e), st));
                }
                None => {
                    st.body = None;
                    match st.decoder.finish() {
                        Ok(tail) => st.ready.extend(tail),
                        Err(e) => return Some((Err(e), st)),
                    }
                }
            }
        }
    }))
}

struct ChunkState {
    body: Option<BoxStream<'static, Bytes>>,
    assembler: ChunkAssembler,
    ready: VecDeque<Bytes>,
}

pub fn chunk_stream(body: BoxStream<'static, Bytes>, normalize_newlines: bool) -> ChunkStream {
    let state = ChunkState {
        body: Some(body),
        assembler: ChunkAssembler::new(normalize_newlines),
        ready: VecDeque::new(),
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.ready.pop_front() {
                return Some((Ok(chunk), st));
            }
            let body = st.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => st.ready.extend(st.assembler.push(&chunk)),
                Some(Err(e)) => {
                    st.body = None;
                    return Some((Err(e), st));
                }
                None => {
                    st.body = None;
                    st.ready.extend(st.assembler.finish());
                }
            }
        }
    }))
}

/// Blocking line iterator over a response reader.
pub struct LineIter {
    body: Option<Box<dyn Read + Send>>,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    buf: Vec<u8>,
}

impl LineIter {
    pub fn new(body: Box<dyn Read + Send>) -> Self {
        Self {
            body: Some(body),
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            buf: vec![0; READ_BUFFER_SIZE],
        }
    }

    /// Whether the underlying response is still held.
    pub fn is_open(&self) -> bool {
        self.body.is_some()
    }
}

impl Iterator for LineIter {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(line) = self.ready.pop_front() {
                return Some(Ok(line));
            }
            let body = self.body.as_mut()?;
            match body.read(&mut self.buf) {
                Ok(0) => {
                    self.body = None;
                    match self.decoder.finish() {
                        Ok(tail) => self.ready.extend(tail),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Ok(n) => match self.decoder.push(&self.buf[..n]) {
                    Ok(lines) => self.ready.extend(lines),
                    Err(e) => {
                        self.body = None;
                        return Some(Err(e));
                    }
                },
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.body = None;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Blocking chunk iterator over a response reader.
pub struct ChunkIter {
    body: Option<Box<dyn Read + Send>>,
    assembler: ChunkAssembler,
    ready: VecDeque<Bytes>,
    buf: Vec<u8>,
}

impl ChunkIter {
    pub fn new(body: Box<dyn Read + Send>, normalize_newlines: bool) -> Self {
        Self {
            body: Some(body),
            assembler: ChunkAssembler::new(normalize_newlines),
            ready: VecDeque::new(),
            buf: vec![0; READ_BUFFER_SIZE],
        }
    }

    pub fn is_open(&self) -> bool {
        self.body.is_some()
    }
}

impl Iterator for ChunkIter {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chunk) = self.ready.pop_front() {
                return Some(Ok(chunk));
            }
            let body = self.body.as_mut()?;
            match body.read(&mut self.buf) {
                Ok(0) => {
                    self.body = None;
                    self.ready.extend(self.assembler.finish());
                }
                Ok(n) => {
                    let full = self.assembler.push(&self.buf[..n]);
                    self.ready.extend(full);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.body = None;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{plan_request, Query};
    use crate::registry::ControllerRegistry;
    use crate::schema::{PredicateType, TypedValue};
    use std::io::Cursor;
    use url::Url;

    type Buffered = Shaped<(), ()>;

    fn plan(query: Query, controller: Option<&str>, schema: &[Predicate]) -> RequestPlan {
        let base = Url::parse("https://www.space-track.org/").unwrap();
        let desc = ControllerRegistry::spacetrack()
            .resolve(query.class(), controller)
            .unwrap();
        plan_request(&base, desc, &query, schema).unwrap()
    }

    fn body_stream(parts: &[&'static [u8]]) -> BoxStream<'static, Bytes> {
        let items: Vec<Result<Bytes>> = parts.iter().map(|p| Ok(Bytes::from_static(p))).collect();
        Box::pin(stream::iter(items))
    }

    #[test]
    fn classify_outcomes() {
        assert_eq!(Outcome::classify(200, b"[]"), Outcome::Success);
        assert_eq!(
            Outcome::classify(500, b"You've violated your query rate limit."),
            Outcome::RateViolation
        );
        assert_eq!(
            Outcome::classify(500, b"Internal error"),
            Outcome::Failed {
                status: 500,
                message: "Internal error".into()
            }
        );
        assert_eq!(
            Outcome::classify(400, br#"{"error":"bad predicate"}"#),
            Outcome::Failed {
                status: 400,
                message: "bad predicate".into()
            }
        );
    }

    #[test]
    fn format_returns_normalized_text() {
        let p = plan(Query::new("gp").predicate("format", "tle"), None, &[]);
        let shaped: Buffered =
            shape_buffered(&p, Bytes::from_static(b"a\r\nb\r\n"), None, UnknownTypePolicy::default())
                .unwrap();
        assert_eq!(shaped.into_text().unwrap(), "a\nb\n");
    }

    #[test]
    fn binary_class_returns_bytes() {
        let p = plan(Query::new("download"), Some("spephemeris"), &[]);
        let shaped: Buffered = shape_buffered(
            &p,
            Bytes::from_static(b"\x00\r\n"),
            None,
            UnknownTypePolicy::default(),
        )
        .unwrap();
        assert_eq!(shaped.into_bytes().unwrap(), Bytes::from_static(b"\x00\r\n"));
    }

    #[test]
    fn parse_types_applies_to_json_only() {
        let schema = vec![Predicate::new("norad_cat_id", PredicateType::Int)];
        let body = Bytes::from_static(br#"[{"NORAD_CAT_ID":"25544"}]"#);

        let p = plan(Query::new("gp").parse_types(), None, &schema);
        let shaped: Buffered =
            shape_buffered(&p, body.clone(), Some(&schema), UnknownTypePolicy::default()).unwrap();
        assert_eq!(shaped.into_typed().unwrap()[0]["NORAD_CAT_ID"], TypedValue::Int(25544));

        let p = plan(Query::new("gp"), None, &schema);
        let shaped: Buffered =
            shape_buffered(&p, body, Some(&schema), UnknownTypePolicy::default()).unwrap();
        assert_eq!(shaped.kind(), "json");
    }

    #[tokio::test]
    async fn line_stream_joins_split_crlf() {
        let lines: Vec<String> = line_stream(body_stream(&[b"one\r", b"\ntwo\r\nth", b"ree"]))
            .map(|l| l.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn line_stream_stops_after_error() {
        let items: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ok\n")),
            Err(Error::InvalidOptions("boom".into())),
            Ok(Bytes::from_static(b"never\n")),
        ];
        let results: Vec<_> = line_stream(Box::pin(stream::iter(items))).collect().await;
        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn chunk_stream_normalizes_text() {
        let chunks: Vec<Bytes> = chunk_stream(body_stream(&[b"a\r", b"\nb"]), true)
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"a\nb");
    }

    #[test]
    fn blocking_iterators_release_body_on_exhaustion() {
        let mut lines = LineIter::new(Box::new(Cursor::new(b"x\r\ny".to_vec())));
        assert_eq!(lines.next().unwrap().unwrap(), "x");
        assert_eq!(lines.next().unwrap().unwrap(), "y");
        assert!(lines.next().is_none());
        assert!(!lines.is_open());

        let mut chunks = ChunkIter::new(Box::new(Cursor::new(vec![1u8; 10])), false);
        assert_eq!(chunks.next().unwrap().unwrap().len(), 10);
        assert!(chunks.next().is_none());
        assert!(!chunks.is_open());
    }

    #[test]
    fn blocking_lines_reject_binary() {
        let mut lines = LineIter::new(Box::new(Cursor::new(vec![0xff, b'\n'])));
        assert!(matches!(lines.next(), Some(Err(Error::BinaryStream(_)))));
        assert!(lines.next().is_none());
    }
}
