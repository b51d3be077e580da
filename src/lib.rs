//! httpd - embeddable HTTP/1.x server engine
//!
//! Incremental request parsing, a one-request-per-connection state machine
//! and a hand-off to pluggable content providers.

pub mod auth;
pub mod config;
pub mod http;
pub mod server;
