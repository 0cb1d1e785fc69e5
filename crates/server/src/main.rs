mod bootstrap;
mod health;
mod recommendations;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use carely_core::config::{AppConfig, LoadOptions};
use carely_db::RecommendationCache;
use tokio::sync::Notify;
use tracing::{error, info, warn};

fn init_logging(config: &AppConfig) {
    use carely_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging depends on the loaded config, so load it first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if let Some(cache) = app.cache.clone() {
        spawn_cache_purge(cache, Duration::from_secs(app.config.cache.ttl_secs.max(1)));
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "carely-server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let signalled = Arc::clone(&shutdown);
    let router = app.router();
    let server = async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                wait_for_shutdown().await;
                signalled.notify_one();
            })
            .await
    };

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not drain in time"
            );
        }
    }

    info!(event_name = "system.server.stopped", correlation_id = "shutdown", "carely-server stopped");
    app.db_pool.close().await;
    Ok(())
}

fn spawn_cache_purge(cache: Arc<dyn RecommendationCache>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match cache.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(
                    event_name = "recommend.cache.purged",
                    correlation_id = "maintenance",
                    purged,
                    "expired cache entries removed"
                ),
                Err(error) => warn!(
                    event_name = "recommend.cache.purge_failed",
                    correlation_id = "maintenance",
                    error = %error,
                    "cache purge failed"
                ),
            }
        }
    });
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "shutdown requested");
}
