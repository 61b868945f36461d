//! HTTP/1.1 wire implementation of the response sink contract.

use bytes::{BufMut, BytesMut};
use http::StatusCode;

use crate::protocol::ResponseSink;

/// Buffers the pieces a [`crate::protocol::Response`] writes and assembles
/// them into HTTP/1.1 bytes on `end`: status line, headers, a derived
/// `content-length`, then the body.
#[derive(Debug)]
pub struct WireSink {
    headers: Vec<(String, String)>,
    code: u16,
    body: String,
    bytes: BytesMut,
}

impl WireSink {
    pub fn new() -> Self {
        Self { headers: Vec::new(), code: 200, body: String::new(), bytes: BytesMut::new() }
    }

    /// The assembled wire bytes; empty until `end` has been called.
    pub fn into_bytes(self) -> BytesMut {
        self.bytes
    }
}

impl Default for WireSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseSink for WireSink {
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn write_head(&mut self, code: u16) {
        self.code = code;
    }

    fn write(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }

    fn end(&mut self) {
        let reason = StatusCode::from_u16(self.code).ok().and_then(|status| status.canonical_reason()).unwrap_or("Unknown");

        let mut bytes = BytesMut::with_capacity(128 + self.body.len());
        bytes.put_slice(b"HTTP/1.1 ");
        bytes.put_slice(self.code.to_string().as_bytes());
        bytes.put_slice(b" ");
        bytes.put_slice(reason.as_bytes());
        bytes.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            bytes.put_slice(name.as_bytes());
            bytes.put_slice(b": ");
            bytes.put_slice(value.as_bytes());
            bytes.put_slice(b"\r\n");
        }
        bytes.put_slice(b"content-length: ");
        bytes.put_slice(self.body.len().to_string().as_bytes());
        bytes.put_slice(b"\r\n\r\n");
        bytes.put_slice(self.body.as_bytes());

        self.bytes = bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_status_line_headers_and_body() {
        let mut sink = WireSink::new();
        sink.set_header("Content-type", "text/plain");
        sink.write_head(200);
        sink.write("hello");
        sink.end();

        let bytes = sink.into_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text, "HTTP/1.1 200 OK\r\nContent-type: text/plain\r\ncontent-length: 5\r\n\r\nhello");
    }

    #[test]
    fn unknown_status_code_gets_placeholder_reason() {
        let mut sink = WireSink::new();
        sink.write_head(799);
        sink.end();

        let bytes = sink.into_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 799 Unknown\r\n"), "{text}");
    }

    #[test]
    fn empty_body_still_carries_content_length() {
        let mut sink = WireSink::new();
        sink.write_head(204);
        sink.end();

        let bytes = sink.into_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(text, "HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n");
    }
}
