//! Incremental line splitting over arbitrary byte chunks.

use crate::{Error, Result};
use bytes::{Buf, BytesMut};

/// Splits a byte stream into text lines.
///
/// Lines end at `\n`; a `\r` immediately before it is dropped, so CRLF and LF
/// bodies yield the same lines. A final line without terminator is returned by
/// [`finish`](Self::finish). Undecodable bytes fail with
/// [`Error::BinaryStream`].
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: BytesMut,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let mut scan_from = self.buf.len();
        self.buf.extend_from_slice(chunk);
        while let Some(pos) = self.buf[scan_from..].iter().position(|&b| b == b'\n') {
            let end = scan_from + pos;
            let line = self.buf.split_to(end);
            self.buf.advance(1);
            lines.push(decode_line(&line)?);
            scan_from = 0;
        }
        Ok(lines)
    }

    /// Flush the unterminated tail, if any.
    pub fn finish(&mut self) -> Result<Option<String>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let rest = self.buf.split();
        decode_line(&rest).map(Some)
    }
}

fn decode_line(raw: &[u8]) -> Result<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| Error::BinaryStream(format!("response is not valid UTF-8: {}", e)))
}
