use std::collections::HashMap;
use std::fmt;

/// Opaque identity of an accepted connection.
///
/// Carried by every [`Request`] so a response can be routed back to the
/// connection it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request headers with case-insensitive lookup.
///
/// Names are matched ignoring ASCII case. The spelling of the most recent
/// insert is kept for display, and the last value wins on duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: HashMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, replacing any earlier value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    /// Retrieves a header value by name, ignoring case.
    ///
    /// ```
    /// # use httpd::http::request::Headers;
    /// let mut headers = Headers::new();
    /// headers.insert("Content-Type", "text/plain");
    /// assert_eq!(headers.get("content-type"), Some("text/plain"));
    /// ```
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// The declared body length.
    ///
    /// Returns `None` when the header is missing or is not a non-negative
    /// integer, so `-5` and `ten` are both "no usable length".
    pub fn content_length(&self) -> Option<usize> {
        let value = self.get("Content-Length")?.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        value.parse::<usize>().ok()
    }
}

/// A fully parsed HTTP request, handed to content providers.
///
/// Method and version are upper-cased by the parser; the target URI is kept
/// exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method, e.g. `GET`
    pub method: String,
    /// Request target exactly as sent, e.g. `/stats?full=1`
    pub uri: String,
    /// Protocol version, e.g. `HTTP/1.1`
    pub version: String,
    pub headers: Headers,
    /// Request body, empty unless a length was declared
    pub body: Vec<u8>,
    /// Connection the request arrived on
    pub connection: ConnectionId,
}

impl Request {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.content_length()
    }
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<String>,
    uri: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Vec<u8>,
    connection: ConnectionId,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            uri: None,
            version: None,
            headers: Headers::new(),
            body: Vec::new(),
            connection: ConnectionId::new(0),
        }
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into().to_ascii_uppercase());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into().to_ascii_uppercase());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn connection(mut self, connection: ConnectionId) -> Self {
        self.connection = connection;
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            uri: self.uri.ok_or("uri missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
            connection: self.connection,
        })
    }
}
