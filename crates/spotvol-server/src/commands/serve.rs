use std::env;
use std::sync::Arc;
use std::time::Duration;

use spotvol_core::PriceService;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::driver;
use crate::error::ServerError;
use crate::routes;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;

pub async fn run(args: &ServeArgs, service: Arc<PriceService>) -> Result<(), ServerError> {
    let host = args
        .host
        .clone()
        .or_else(|| env::var("API_HOST").ok().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| String::from(DEFAULT_HOST));
    let port = args
        .port
        .or_else(|| env::var("API_PORT").ok().and_then(|value| value.trim().parse().ok()))
        .unwrap_or(DEFAULT_PORT);

    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!(address = %listener.local_addr()?, "listening");

    let driver = if args.no_refresh {
        None
    } else {
        let period = Duration::from_secs(args.refresh_secs);
        let ttl = service.cache().ttl().await;
        if period < ttl {
            warn!(
                period_secs = period.as_secs(),
                ttl_secs = ttl.as_secs(),
                "refresh period is shorter than the cache TTL; some ticks will be cache hits"
            );
        }
        Some(driver::spawn_refresh_loop(Arc::clone(&service), period))
    };

    axum::serve(listener, routes::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = driver {
        handle.abort();
    }
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
