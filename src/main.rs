use std::sync::Arc;

use httpd::config::Config;
use httpd::http::dispatch::Dispatcher;
use httpd::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    // No providers are built in: everything except `/` is a 404.
    let dispatcher = Arc::new(Dispatcher::new());

    let listeners = server::bind_all(&cfg, dispatcher).await;
    if listeners.is_empty() {
        anyhow::bail!("no listener could be started");
    }

    tokio::select! {
        res = server::run_all(listeners) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
