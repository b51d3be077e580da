use crate::http::status::StatusCode;

/// A response document ready to be framed and written to a client.
///
/// `extra_headers` is a raw header block. When non-empty it replaces the
/// default `Content-Type: text/html` line; the engine adds the framing
/// headers (`Date`, `Server`, `Content-Length`, `Connection`) and the blank
/// line itself, dropping any the block already carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// Raw header lines, without the terminating blank line
    pub extra_headers: String,
    /// Response body as bytes
    pub body: Vec<u8>,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use httpd::http::response::ResponseBuilder;
/// # use httpd::http::status::StatusCode;
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.extra_headers, "Content-Type: application/json\r\n");
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl ResponseBuilder {
    pub fn new(status: impl Into<StatusCode>) -> Self {
        Self {
            status: status.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Adds or replaces a header. Names compare case-insensitively.
    ///
    /// Framing headers are owned by the engine and silently dropped here.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if is_framing_header(&key) {
            return self;
        }

        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the final Response, rendering headers in insertion order.
    pub fn build(self) -> Response {
        let extra_headers = self
            .headers
            .iter()
            .map(|(k, v)| format!("{}: {}\r\n", k, v))
            .collect();

        Response {
            status: self.status,
            extra_headers,
            body: self.body,
        }
    }
}

impl Response {
    /// A response with the default header block and an empty body.
    pub fn new(status: impl Into<StatusCode>) -> Self {
        Self {
            status: status.into(),
            extra_headers: String::new(),
            body: Vec::new(),
        }
    }

    /// Creates the response shape used by the paging contract.
    pub fn page(body: impl Into<Vec<u8>>, status: u16, extra_headers: impl Into<String>) -> Self {
        Self {
            status: StatusCode::from_u16(status),
            extra_headers: extra_headers.into(),
            body: body.into(),
        }
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK).with_body(body)
    }

    /// 404 with an empty body, used when no provider claims a request.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_extra_headers(mut self, extra_headers: impl Into<String>) -> Self {
        self.extra_headers = extra_headers.into();
        self
    }
}

pub(crate) fn is_framing_header(name: &str) -> bool {
    ["Date", "Server", "Content-Length", "Connection"]
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}
