use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod config;
pub mod context;
pub mod csrf;
pub mod error;
pub mod routes;

use config::Config;
use context::AppContext;

/// Run the gate service until Ctrl-C
///
/// Configuration problems (missing or short CSRF_SECRET) abort startup
/// before the listener is bound.
pub async fn run() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Refusing to start: invalid configuration");
            return Err(e);
        }
    };

    let app_context = Arc::new(
        AppContext::new(config.clone()).context("Failed to initialize CSRF gate")?,
    );

    tracing::info!(
        exempt_paths = app_context.gate.exemptions().len(),
        token_ttl_secs = config.csrf.token_ttl_secs,
        posture_override = config.csrf.bypass.allow_query_override,
        "CSRF gate initialized"
    );
    if config.csrf.bypass.allow_query_override {
        tracing::warn!(
            "CSRF_ALLOW_POSTURE_OVERRIDE is set: ?runtime_env=development can enable bypass \
             in debug builds"
        );
    }

    let app = routes::create_router(app_context, Router::new());

    let bind_address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!("CSRF gate listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("Shutdown signal received. Shutting down...");
        })
        .await?;

    Ok(())
}
