//! Fixed-size re-chunking of a response body.

use bytes::{Bytes, BytesMut};

/// Size of the chunks produced in chunk-stream mode.
pub const CONTENT_CHUNK_SIZE: usize = 100 * 1024;

/// Regroups arbitrary transport chunks into fixed-size chunks.
///
/// With `normalize_newlines`, every CRLF becomes LF, including pairs split
/// across transport chunks. Only the final chunk may be shorter than the
/// configured size.
#[derive(Debug)]
pub struct ChunkAssembler {
    size: usize,
    normalize_newlines: bool,
    pending_cr: bool,
    buf: BytesMut,
}

impl ChunkAssembler {
    pub fn new(normalize_newlines: bool) -> Self {
        Self::with_size(CONTENT_CHUNK_SIZE, normalize_newlines)
    }

    pub fn with_size(size: usize, normalize_newlines: bool) -> Self {
        Self {
            size: size.max(1),
            normalize_newlines,
            pending_cr: false,
            buf: BytesMut::with_capacity(size.max(1)),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if self.normalize_newlines {
            self.push_normalized(chunk);
        } else {
            self.buf.extend_from_slice(chunk);
        }
        let mut out = Vec::new();
        while self.buf.len() >= self.size {
            out.push(self.buf.split_to(self.size).freeze());
        }
        out
    }

    /// Remaining bytes, emitted as one final short chunk.
    pub fn finish(&mut self) -> Option<Bytes> {
        if std::mem::take(&mut self.pending_cr) {
            self.buf.extend_from_slice(b"\r");
        }
        if self.buf.is_empty() {
            None
        } else {
            Some(self.buf.split().freeze())
        }
    }

    fn push_normalized(&mut self, chunk: &[u8]) {
        // An empty read says nothing about a pending `\r`.
        if chunk.is_empty() {
            return;
        }
        let mut rest = chunk;
        if std::mem::take(&mut self.pending_cr) && rest.first() != Some(&b'\n') {
            self.buf.extend_from_slice(b"\r");
        }
        while let Some(pos) = rest.iter().position(|&b| b == b'\r') {
            self.buf.extend_from_slice(&rest[..pos]);
            match rest.get(pos + 1) {
                Some(b'\n') => {
                    rest = &rest[pos + 1..];
                }
                Some(_) => {
                    self.buf.extend_from_slice(b"\r");
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.pending_cr = true;
                    rest = &[];
                }
            }
        }
        self.buf.extend_from_slice(rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(body: &[u8], transport_chunk: usize, size: usize, normalize: bool) -> Vec<Bytes> {
        let mut asm = ChunkAssembler::with_size(size, normalize);
        let mut out = Vec::new();
        for chunk in body.chunks(transport_chunk) {
            out.extend(asm.push(chunk));
        }
        out.extend(asm.finish());
        out
    }

    #[test]
    fn fixed_size_chunks() {
        let body = vec![7u8; 250];
        let chunks = assemble(&body, 33, 100, false);
        let sizes: Vec<_> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[test]
    fn binary_bytes_pass_through() {
        let body = b"\r\n\x00\xff\r";
        let joined: Vec<u8> = assemble(body, 2, 4, false).concat();
        assert_eq!(joined, body);
    }

    #[test]
    fn crlf_split_across_chunks_is_normalized() {
        let body = b"line one\r\nline two\r\nthree\r";
        for transport_chunk in [1, 2, 9, 10, 64] {
            let joined: Vec<u8> = assemble(body, transport_chunk, 5, true).concat();
            assert_eq!(joined, b"line one\nline two\nthree\r", "chunk {}", transport_chunk);
        }
    }

    #[test]
    fn empty_chunk_keeps_pending_cr() {
        let mut asm = ChunkAssembler::with_size(100, true);
        let mut out = asm.push(b"a\r");
        out.extend(asm.push(b""));
        out.extend(asm.push(b"\nb"));
        out.extend(asm.finish());
        assert_eq!(out.concat(), b"a\nb");
    }

    #[test]
    fn lone_cr_survives_normalization() {
        let joined: Vec<u8> = assemble(b"a\rb\r\rc", 1, 100, true).concat();
        assert_eq!(joined, b"a\rb\r\rc");
    }

    #[test]
    fn default_size_is_100_kib() {
        let body = vec![b'x'; CONTENT_CHUNK_SIZE + 1];
        let mut asm = ChunkAssembler::new(true);
        let full = asm.push(&body);
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].len(), CONTENT_CHUNK_SIZE);
        assert_eq!(asm.finish().unwrap().len(), 1);
    }
}
