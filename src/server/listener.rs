use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::config::{Limits, ListenerConfig};
use crate::http::connection::Connection;
use crate::http::dispatch::Dispatcher;
use crate::http::index::IndexDocument;
use crate::http::request::ConnectionId;
use crate::server::session::Session;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum BindError {
    #[error("can't read index file {}: {}", .path.display(), .source)]
    IndexMissing { path: PathBuf, source: io::Error },
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
}

/// A bound listening socket plus everything its connections share.
pub struct Listener {
    inner: TcpListener,
    config: ListenerConfig,
    limits: Limits,
    index: Arc<IndexDocument>,
    dispatcher: Arc<Dispatcher>,
    next_id: AtomicU64,
}

impl Listener {
    /// Loads the index document, then binds the configured address.
    pub async fn bind(
        config: &ListenerConfig,
        limits: Limits,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Self, BindError> {
        let index = IndexDocument::load(&config.index)
            .await
            .map_err(|source| BindError::IndexMissing {
                path: config.index.clone(),
                source,
            })?;

        let addr = config.bind_addr();
        let inner = TcpListener::bind(&addr)
            .await
            .map_err(|source| BindError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(host = %config.host, %addr, index = %config.index.display(), "Listening");

        Ok(Self {
            inner,
            config: config.clone(),
            limits,
            index: Arc::new(index),
            dispatcher,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Waits for the next client and pairs it with a fresh connection.
    pub async fn accept(&self) -> io::Result<Session<TcpStream>> {
        let (socket, peer) = self.inner.accept().await?;
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        info!(connection = %id, %peer, "Accepted connection");

        let conn = Connection::new(
            id,
            Arc::clone(&self.index),
            Arc::clone(&self.dispatcher),
            &self.limits,
        );
        Ok(Session::new(socket, conn, self.limits.clone()))
    }

    /// Accepts forever, one task per connection.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            let session = match self.accept().await {
                Ok(session) => session,
                Err(e) => {
                    warn!(host = %self.config.host, error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            tokio::spawn(async move {
                let id = session.connection().id();
                if let Err(e) = session.run().await {
                    debug!(connection = %id, error = %e, "Connection error");
                }
            });
        }
    }
}
