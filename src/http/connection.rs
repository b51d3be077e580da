use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::Limits;
use crate::http::dispatch::{Dispatcher, Outcome, PendingPage};
use crate::http::index::IndexDocument;
use crate::http::parser::{ParseError, RequestAccumulator, RequestLine};
use crate::http::request::{ConnectionId, Headers, Request};
use crate::http::response::Response;
use crate::http::status::StatusCode;

const SUPPORTED_VERSIONS: [&str; 2] = ["HTTP/1.0", "HTTP/1.1"];

/// Lifecycle of a single connection. States only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Held by the listening socket; accepted connections never use it.
    Listening,
    AwaitingRequest,
    ReceivingBody,
    SendingResponse,
}

/// What the caller should do after feeding bytes.
#[derive(Debug)]
pub enum Progress {
    /// Keep reading.
    Pending,
    /// Write this response and close.
    Respond(Response),
    /// A provider will page later; wait for it, then write and close.
    Deferred(PendingPage),
    /// A response has already been produced; further input is ignored.
    Finished,
}

#[derive(Debug)]
struct RequestHead {
    line: RequestLine,
    headers: Headers,
}

/// Protocol state machine for one accepted connection.
///
/// Holds no socket: the session driver feeds it bytes as they arrive and
/// acts on the returned [`Progress`].
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    accumulator: RequestAccumulator,
    head: Option<RequestHead>,
    declared_length: usize,
    body: Vec<u8>,
    max_body_bytes: usize,
    index: Arc<IndexDocument>,
    dispatcher: Arc<Dispatcher>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        index: Arc<IndexDocument>,
        dispatcher: Arc<Dispatcher>,
        limits: &Limits,
    ) -> Self {
        Self {
            id,
            state: ConnectionState::AwaitingRequest,
            accumulator: RequestAccumulator::new(limits.max_header_bytes),
            head: None,
            declared_length: 0,
            body: Vec::new(),
            max_body_bytes: limits.max_body_bytes,
            index,
            dispatcher,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn declared_length(&self) -> usize {
        self.declared_length
    }

    /// Processes one read worth of bytes, in arrival order.
    pub fn feed(&mut self, data: &[u8]) -> Progress {
        match self.state {
            ConnectionState::AwaitingRequest => self.on_request_bytes(data),
            ConnectionState::ReceivingBody => {
                self.body.extend_from_slice(data);
                self.check_body_complete()
            }
            ConnectionState::Listening | ConnectionState::SendingResponse => Progress::Finished,
        }
    }

    /// The read deadline for the current phase expired.
    pub fn timed_out(&mut self) -> Progress {
        if self.state >= ConnectionState::SendingResponse {
            return Progress::Finished;
        }

        warn!(connection = %self.id, state = ?self.state, "Timed out waiting for request data");
        self.respond(Response::new(StatusCode::REQUEST_TIMEOUT))
    }

    fn on_request_bytes(&mut self, data: &[u8]) -> Progress {
        if let Err(e) = self.accumulator.feed(data) {
            warn!(connection = %self.id, error = %e, "Rejecting request");
            return self.respond(Response::bad_request());
        }

        if !self.accumulator.header_boundary_reached() {
            return Progress::Pending;
        }

        let line = match self.accumulator.parse_request_line() {
            Ok(line) => line.clone(),
            Err(e) => return self.reject(e),
        };
        let headers = match self.accumulator.parse_headers() {
            Ok(headers) => headers,
            Err(e) => return self.reject(e),
        };

        debug!(
            connection = %self.id,
            method = %line.method,
            uri = %line.uri,
            version = %line.version,
            "Request head received"
        );

        let expects_body = line.method == "POST";
        let declared = headers.content_length();
        self.head = Some(RequestHead { line, headers });

        if !expects_body {
            return self.finish();
        }

        match declared {
            None => {
                warn!(connection = %self.id, "POST without a usable Content-Length");
                self.respond(Response::bad_request())
            }
            Some(length) if length > self.max_body_bytes => {
                warn!(
                    connection = %self.id,
                    length,
                    limit = self.max_body_bytes,
                    "Declared body exceeds limit"
                );
                self.respond(Response::new(StatusCode::REQUEST_ENTITY_TOO_LARGE))
            }
            Some(length) => {
                self.declared_length = length;
                self.body = self.accumulator.extract_body_prefix().to_vec();
                self.advance(ConnectionState::ReceivingBody);
                self.check_body_complete()
            }
        }
    }

    fn check_body_complete(&mut self) -> Progress {
        if self.body.len() < self.declared_length {
            return Progress::Pending;
        }

        // No pipelining: anything past the declared length is dropped.
        self.body.truncate(self.declared_length);
        self.finish()
    }

    /// Request is complete; pick the response source.
    fn finish(&mut self) -> Progress {
        let Some(RequestHead { line, headers }) = self.head.take() else {
            return self.respond(Response::internal_error());
        };

        if !SUPPORTED_VERSIONS.contains(&line.version.as_str()) {
            warn!(connection = %self.id, version = %line.version, "Unsupported protocol version");
            return self.respond(Response::new(StatusCode::HTTP_VERSION_NOT_SUPPORTED));
        }

        if line.method == "GET" && line.uri == "/" {
            return self.respond(Response::ok(self.index.contents()));
        }

        let request = Request {
            method: line.method,
            uri: line.uri,
            version: line.version,
            headers,
            body: std::mem::take(&mut self.body),
            connection: self.id,
        };

        self.advance(ConnectionState::SendingResponse);
        match self.dispatcher.dispatch(request) {
            Outcome::Page(response) => Progress::Respond(response),
            Outcome::Deferred(pending) => Progress::Deferred(pending),
            Outcome::Unclaimed => Progress::Respond(Response::not_found()),
        }
    }

    fn reject(&mut self, error: ParseError) -> Progress {
        warn!(connection = %self.id, error = %error, "Malformed request");
        self.respond(Response::bad_request())
    }

    fn respond(&mut self, response: Response) -> Progress {
        self.advance(ConnectionState::SendingResponse);
        Progress::Respond(response)
    }

    fn advance(&mut self, next: ConnectionState) {
        debug_assert!(next > self.state, "connection state must only advance");
        trace!(connection = %self.id, from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }
}
