use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use crate::http::request::Headers;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("header block exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },
    #[error("header terminator not received yet")]
    Incomplete,
    #[error("malformed request line")]
    InvalidRequestLine,
}

/// The three fields of an HTTP request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

/// Collects request bytes until the header block is complete.
///
/// Reads may split the request anywhere; the accumulator only looks at the
/// header block once the blank line after it has arrived. Bytes past the
/// terminator are the start of the body and are handed out by
/// [`extract_body_prefix`](Self::extract_body_prefix).
#[derive(Debug)]
pub struct RequestAccumulator {
    buffer: BytesMut,
    headers_end: Option<usize>,
    request_line: Option<RequestLine>,
    max_header_bytes: usize,
}

impl RequestAccumulator {
    pub fn new(max_header_bytes: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            headers_end: None,
            request_line: None,
            max_header_bytes,
        }
    }

    /// Appends freshly read bytes.
    ///
    /// Fails once the header block grows past the configured cap without a
    /// terminator in sight.
    pub fn feed(&mut self, data: &[u8]) -> Result<(), ParseError> {
        // The terminator may straddle the previous read.
        let scan_from = self.buffer.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        self.buffer.extend_from_slice(data);

        if self.headers_end.is_none() {
            self.headers_end = find_headers_end(&self.buffer[scan_from..]).map(|pos| scan_from + pos);
        }

        let header_len = self.headers_end.unwrap_or(self.buffer.len());
        if header_len > self.max_header_bytes {
            return Err(ParseError::HeadersTooLarge {
                limit: self.max_header_bytes,
            });
        }

        Ok(())
    }

    pub fn header_boundary_reached(&self) -> bool {
        self.headers_end.is_some()
    }

    /// Parses the request line.
    ///
    /// Parsing happens once; later calls return the cached result. Method and
    /// version are upper-cased, a missing version becomes an empty string.
    pub fn parse_request_line(&mut self) -> Result<&RequestLine, ParseError> {
        if self.request_line.is_none() {
            let block = self.header_block()?;
            let first = block.split("\r\n").next().unwrap_or_default();
            let mut parts = first.split_whitespace();

            let method = parts.next().ok_or(ParseError::InvalidRequestLine)?;
            let uri = parts.next().ok_or(ParseError::InvalidRequestLine)?;
            let version = parts.next().unwrap_or_default();

            self.request_line = Some(RequestLine {
                method: method.to_ascii_uppercase(),
                uri: uri.to_string(),
                version: version.to_ascii_uppercase(),
            });
        }

        self.request_line.as_ref().ok_or(ParseError::InvalidRequestLine)
    }

    /// Parses the header lines following the request line.
    pub fn parse_headers(&self) -> Result<Headers, ParseError> {
        let block = self.header_block()?;
        let mut headers = Headers::new();

        for line in block.split("\r\n").skip(1) {
            if line.is_empty() {
                continue;
            }

            match line.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => {
                    headers.insert(key.trim(), value.trim());
                }
                _ => debug!(line, "Ignoring malformed header line"),
            }
        }

        Ok(headers)
    }

    /// Takes the body bytes that arrived after the header terminator.
    ///
    /// The returned bytes are removed from the buffer, so a second call only
    /// yields what was fed in between.
    pub fn extract_body_prefix(&mut self) -> Bytes {
        match self.headers_end {
            Some(end) => self.buffer.split_off(end + HEADER_TERMINATOR.len()).freeze(),
            None => Bytes::new(),
        }
    }

    fn header_block(&self) -> Result<String, ParseError> {
        let end = self.headers_end.ok_or(ParseError::Incomplete)?;
        Ok(String::from_utf8_lossy(&self.buffer[..end]).into_owned())
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let mut acc = RequestAccumulator::new(8192);
        acc.feed(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();

        assert!(acc.header_boundary_reached());
        assert_eq!(acc.parse_request_line().unwrap().uri, "/");
        assert_eq!(acc.parse_headers().unwrap().get("Host"), Some("example.com"));
        assert!(acc.extract_body_prefix().is_empty());
    }

    #[test]
    fn terminator_split_across_reads() {
        let mut acc = RequestAccumulator::new(8192);
        acc.feed(b"GET / HTTP/1.1\r\n\r").unwrap();
        assert!(!acc.header_boundary_reached());
        acc.feed(b"\n").unwrap();
        assert!(acc.header_boundary_reached());
    }
}
