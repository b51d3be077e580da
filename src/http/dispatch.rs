//! Hand-off between parsed requests and content providers.
//!
//! A provider sees each request at most once and answers with a [`Claim`]:
//! a page right away, a promise to page later through the
//! [`ConnectionHandle`] it was given, or no interest at all. Providers are
//! asked in registration order and the first claim wins.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::http::request::{ConnectionId, Request};
use crate::http::response::Response;
use crate::http::status::StatusCode;

/// A provider's answer to an incoming request.
#[derive(Debug)]
pub enum Claim {
    /// The provider produced the page immediately.
    Page(Response),
    /// The provider kept the handle and will page through it.
    Deferred,
    /// Not handled by this provider.
    Unclaimed,
}

/// Something that turns requests into response documents.
///
/// Implemented for plain closures, so
/// `|req: &Request, _handle| Claim::Page(Response::ok("hi"))` is a provider.
pub trait ContentProvider: Send + Sync {
    fn on_request(&self, request: &Request, handle: ConnectionHandle) -> Claim;
}

impl<F> ContentProvider for F
where
    F: Fn(&Request, ConnectionHandle) -> Claim + Send + Sync,
{
    fn on_request(&self, request: &Request, handle: ConnectionHandle) -> Claim {
        self(request, handle)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("connection {0} is gone")]
    ConnectionGone(ConnectionId),
}

/// Reverse reference to the connection a request came from.
///
/// Paging consumes the handle: each connection receives one page.
#[derive(Debug)]
pub struct ConnectionHandle {
    connection: ConnectionId,
    tx: oneshot::Sender<Response>,
}

impl ConnectionHandle {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Delivers a page to the connection.
    ///
    /// A non-empty `extra_headers` block replaces the default
    /// `Content-Type` line.
    pub fn page(
        self,
        body: impl Into<Vec<u8>>,
        status: u16,
        extra_headers: impl Into<String>,
    ) -> Result<(), PageError> {
        self.send(Response::page(body, status, extra_headers))
    }

    pub fn send(self, response: Response) -> Result<(), PageError> {
        self.tx
            .send(response)
            .map_err(|_| PageError::ConnectionGone(self.connection))
    }
}

/// A page a provider promised to deliver later.
#[derive(Debug)]
pub struct PendingPage {
    connection: ConnectionId,
    rx: oneshot::Receiver<Response>,
}

impl PendingPage {
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Returns the page if it has already been delivered.
    pub fn try_take(&mut self) -> Option<Response> {
        self.rx.try_recv().ok()
    }

    /// Waits for the provider to page.
    ///
    /// A provider that drops its handle yields a 500, one that stays silent
    /// past `limit` yields a 504.
    pub async fn wait(self, limit: Duration) -> Response {
        match tokio::time::timeout(limit, self.rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                warn!(connection = %self.connection, "Provider dropped the connection without paging");
                Response::internal_error()
            }
            Err(_) => {
                warn!(connection = %self.connection, ?limit, "Provider did not page in time");
                Response::new(StatusCode::GATEWAY_TIMEOUT)
            }
        }
    }
}

/// What the bridge made of a request.
#[derive(Debug)]
pub enum Outcome {
    Page(Response),
    Deferred(PendingPage),
    Unclaimed,
}

/// Routes parsed requests to registered content providers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    providers: Vec<Arc<dyn ContentProvider>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn ContentProvider>) {
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: impl ContentProvider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Runs one round of provider notification for `request`.
    pub fn dispatch(&self, request: Request) -> Outcome {
        let connection = request.connection;

        for provider in &self.providers {
            let (tx, rx) = oneshot::channel();
            let handle = ConnectionHandle { connection, tx };

            match provider.on_request(&request, handle) {
                Claim::Page(response) => return Outcome::Page(response),
                Claim::Deferred => return Outcome::Deferred(PendingPage { connection, rx }),
                Claim::Unclaimed => continue,
            }
        }

        debug!(connection = %connection, uri = %request.uri, "No provider claimed request");
        Outcome::Unclaimed
    }
}
