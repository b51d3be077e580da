//! HTTP/1.x protocol engine.
//!
//! Every connection serves exactly one request and is then closed.
//!
//! # Architecture
//!
//! - **`parser`**: accumulates request bytes and parses the request head
//! - **`connection`**: the per-connection state machine, free of I/O
//! - **`dispatch`**: hands finished requests to content providers
//! - **`request`** / **`response`**: the values passed in and out
//! - **`status`**: status code reason phrases
//! - **`writer`**: frames and writes a response
//! - **`index`**: the static document served at `/`
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌──────────────────┐
//!        │ AwaitingRequest  │ ← Accumulate until the blank line
//!        └──────┬───────────┘
//!               │ POST with Content-Length
//!               ▼
//!        ┌──────────────────┐
//!        │  ReceivingBody   │ ← Accumulate until declared length
//!        └──────┬───────────┘
//!               │ Request complete (or rejected)
//!               ▼
//!        ┌──────────────────┐
//!        │ SendingResponse  │ ← Write once, then close
//!        └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use httpd::config::Limits;
//! use httpd::http::connection::{Connection, Progress};
//! use httpd::http::dispatch::Dispatcher;
//! use httpd::http::index::IndexDocument;
//! use httpd::http::request::ConnectionId;
//!
//! let index = Arc::new(IndexDocument::from_bytes("index.html", "<h1>hi</h1>"));
//! let mut conn = Connection::new(
//!     ConnectionId::new(1),
//!     index,
//!     Arc::new(Dispatcher::new()),
//!     &Limits::default(),
//! );
//!
//! assert!(matches!(conn.feed(b"GET / HTTP/1.1\r\n"), Progress::Pending));
//! match conn.feed(b"\r\n") {
//!     Progress::Respond(response) => assert_eq!(response.body, b"<h1>hi</h1>"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod connection;
pub mod dispatch;
pub mod index;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod writer;
