//! End-to-end behaviour of the session driver over in-memory streams.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use httpd::config::Limits;
use httpd::http::connection::Connection;
use httpd::http::dispatch::{Claim, ConnectionHandle, ContentProvider, Dispatcher};
use httpd::http::index::IndexDocument;
use httpd::http::request::{ConnectionId, Request};
use httpd::http::response::Response;
use httpd::server::session::Session;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

const INDEX: &str = "<h1>Welcome</h1>";

struct Echo {
    calls: AtomicUsize,
}

impl ContentProvider for Echo {
    fn on_request(&self, request: &Request, _handle: ConnectionHandle) -> Claim {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.uri == "/echo" {
            Claim::Page(Response::page(request.body.clone(), 200, "Content-Type: text/plain\r\n"))
        } else {
            Claim::Unclaimed
        }
    }
}

/// Pages from a background task after a short delay.
struct Later;

impl ContentProvider for Later {
    fn on_request(&self, request: &Request, handle: ConnectionHandle) -> Claim {
        if request.uri != "/later" {
            return Claim::Unclaimed;
        }

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.page("late page", 200, "").unwrap();
        });
        Claim::Deferred
    }
}

/// Claims, then loses the handle.
struct Forgetful;

impl ContentProvider for Forgetful {
    fn on_request(&self, _request: &Request, _handle: ConnectionHandle) -> Claim {
        Claim::Deferred
    }
}

fn start(dispatcher: Dispatcher, limits: Limits) -> (DuplexStream, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let conn = Connection::new(
        ConnectionId::new(1),
        Arc::new(IndexDocument::from_bytes("index.html", INDEX)),
        Arc::new(dispatcher),
        &limits,
    );
    let task = tokio::spawn(Session::new(server, conn, limits).run());
    (client, task)
}

async fn read_response(client: &mut DuplexStream) -> String {
    let mut out = Vec::new();
    client.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

fn echo() -> (Arc<Echo>, Dispatcher) {
    let provider = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(provider.clone());
    (provider, dispatcher)
}

#[tokio::test]
async fn test_session_serves_index() {
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\nDate: "));
    assert!(raw.contains("\r\nContent-Type: text/html\r\n"));
    assert!(raw.contains(&format!("\r\nContent-Length: {}\r\n", INDEX.len())));
    assert!(raw.contains("\r\nConnection: close\r\n\r\n"));
    assert!(raw.ends_with(INDEX));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_post_in_pieces() {
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"POST /echo HT").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    client.write_all(b"TP/1.1\r\nContent-Length: 11\r\n\r\nhello").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    client.write_all(b" world").await.unwrap();

    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.contains("\r\nContent-Type: text/plain\r\n"));
    assert!(raw.contains("\r\nContent-Length: 11\r\n"));
    assert!(raw.ends_with("\r\n\r\nhello world"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_unclaimed_404() {
    let (_, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"GET /missing HTTP/1.0\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(raw.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
}

#[tokio::test]
async fn test_session_post_without_length_is_400() {
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"POST /echo HTTP/1.1\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(raw.ends_with("Content-Length: 0\r\nConnection: close\r\n\r\n"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_bad_version_is_505() {
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"GET /echo HTTP/0.9\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 505 HTTP Version Not Supported\r\n"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_hang_up_sends_nothing() {
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 50\r\n\r\npartial").await.unwrap();
    client.shutdown().await.unwrap();

    task.await.unwrap().unwrap();
    let raw = read_response(&mut client).await;

    assert!(raw.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_header_timeout_is_408() {
    let limits = Limits {
        header_timeout_secs: 1,
        ..Limits::default()
    };
    let (_, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, limits);

    client.write_all(b"GET /echo HTTP/1.1\r\n").await.unwrap();

    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
}

#[tokio::test]
async fn test_session_body_timeout_is_408() {
    let limits = Limits {
        header_timeout_secs: 120,
        body_timeout_secs: 1,
        ..Limits::default()
    };
    let (provider, dispatcher) = echo();
    let (mut client, task) = start(dispatcher, limits);

    let started = std::time::Instant::now();
    client.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc").await.unwrap();

    let raw = tokio::time::timeout(Duration::from_secs(10), read_response(&mut client))
        .await
        .expect("body deadline should apply, not the header deadline");
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 408 Request Timeout\r\n"));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_session_deferred_page() {
    let dispatcher = Dispatcher::new().with_provider(Later);
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"GET /later HTTP/1.1\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(raw.ends_with("\r\n\r\nlate page"));
}

#[tokio::test]
async fn test_session_dropped_handle_is_500() {
    let dispatcher = Dispatcher::new().with_provider(Forgetful);
    let (mut client, task) = start(dispatcher, Limits::default());

    client.write_all(b"GET /anything HTTP/1.1\r\n\r\n").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
}

#[tokio::test]
async fn test_first_claiming_provider_wins() {
    let first = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let second = Arc::new(Echo {
        calls: AtomicUsize::new(0),
    });
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(first.clone());
    dispatcher.register(second.clone());
    assert_eq!(dispatcher.provider_count(), 2);

    let (mut client, task) = start(dispatcher, Limits::default());
    client.write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 2\r\n\r\nok").await.unwrap();
    let raw = read_response(&mut client).await;
    task.await.unwrap().unwrap();

    assert!(raw.ends_with("\r\n\r\nok"));
    assert_eq!(first.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.calls.load(Ordering::SeqCst), 0);
}
