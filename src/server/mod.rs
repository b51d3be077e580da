//! Listening sockets and per-connection session tasks.

pub mod listener;
pub mod session;

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::error;

use crate::config::Config;
use crate::http::dispatch::Dispatcher;
use listener::Listener;

/// Binds every configured listener.
///
/// A listener that fails to start is logged and skipped; the others are
/// returned ready to run.
pub async fn bind_all(cfg: &Config, dispatcher: Arc<Dispatcher>) -> Vec<Listener> {
    let mut listeners = Vec::with_capacity(cfg.listeners.len());

    for entry in &cfg.listeners {
        match Listener::bind(entry, cfg.limits.clone(), Arc::clone(&dispatcher)).await {
            Ok(listener) => listeners.push(listener),
            Err(e) => error!(host = %entry.host, port = entry.port, error = %e, "Listener failed to start"),
        }
    }

    listeners
}

/// Runs all listeners until one of them stops.
pub async fn run_all(listeners: Vec<Listener>) -> anyhow::Result<()> {
    let mut tasks = JoinSet::new();
    for listener in listeners {
        tasks.spawn(listener.run());
    }

    match tasks.join_next().await {
        Some(res) => res?,
        None => Ok(()),
    }
}
