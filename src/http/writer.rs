use std::time::SystemTime;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::{Response, is_framing_header};

const HTTP_VERSION: &str = "HTTP/1.1";
const DEFAULT_CONTENT_TYPE: &str = "Content-Type: text/html\r\n";

/// Value of the `Server` header.
pub const SERVER_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Frames a response using the current time for the `Date` header.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    serialize_response_at(resp, SystemTime::now())
}

/// Frames a response in the fixed header order every reply uses:
/// status line, `Date`, the extra header block (or the default
/// `Content-Type`), `Server`, `Content-Length`, `Connection: close`.
pub fn serialize_response_at(resp: &Response, now: SystemTime) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    buf.extend_from_slice(b"Date: ");
    buf.extend_from_slice(httpdate::fmt_http_date(now).as_bytes());
    buf.extend_from_slice(b"\r\n");

    let extra = extra_header_lines(&resp.extra_headers);
    if extra.is_empty() {
        buf.extend_from_slice(DEFAULT_CONTENT_TYPE.as_bytes());
    } else {
        for line in extra {
            buf.extend_from_slice(line.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }

    let framing = format!(
        "Server: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        SERVER_NAME,
        resp.body.len()
    );
    buf.extend_from_slice(framing.as_bytes());

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// Lines of a caller-supplied header block, minus blank lines and any
/// framing header the writer emits itself.
fn extra_header_lines(block: &str) -> Vec<&str> {
    block
        .lines()
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let name = line.split_once(':').map_or(*line, |(name, _)| name);
            !is_framing_header(name.trim())
        })
        .collect()
}

/// Writes one serialized response, tracking partial writes.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    pub async fn write_to_stream<W>(&mut self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while self.written < self.buffer.len() {
            let n = stream.write(&self.buffer[self.written..]).await?;

            if n == 0 {
                return Err(anyhow::anyhow!("connection closed while writing"));
            }

            self.written += n;
        }

        stream.flush().await?;
        Ok(())
    }
}
