//! `storefront serve`: run the HTTP service until Ctrl+C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::load_config;
use crate::config::LoggingConfig;
use crate::http::{self, AppState};

pub async fn execute(config_path: Option<&Path>, bind_override: Option<&str>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(bind) = bind_override {
        config.server.bind = bind.to_string();
    }

    init_stdout_logging(&config.logging);

    let validation = config.validate().context("Invalid configuration")?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let metrics = match http::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed; /metrics disabled");
            None
        },
    };

    let state = AppState::from_config(&config, metrics)?;
    let app = http::router(state, &config);

    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "storefront listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Initialize stdout logging with tracing-subscriber.
///
/// `RUST_LOG` wins over `logging.filter`; the default is `info`.
fn init_stdout_logging(logging: &LoggingConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(logging.filter.as_deref().unwrap_or("info"))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
