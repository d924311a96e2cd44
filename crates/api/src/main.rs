use std::sync::Arc;

use anyhow::Context;

use haven_api::app::{self, AppServices, Backends};
use haven_api::config::AppConfig;
use haven_infra::workers::{CleanerConfig, ExpiryCleaner, SessionSweeper, Sweeper, TokenSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    haven_observability::init(config.log_format);

    let backends = Backends::postgres(&config.database)
        .await
        .context("failed to initialise storage")?;

    let sweepers: Vec<Arc<dyn Sweeper>> = vec![
        Arc::new(TokenSweeper(backends.tokens.clone())),
        Arc::new(SessionSweeper(backends.sessions.clone())),
    ];
    let cleaner = ExpiryCleaner::spawn(
        CleanerConfig::with_interval(config.token_cleanup_interval),
        sweepers,
    );

    let codec = config.session.codec().context("invalid session keys")?;
    let services = AppServices::new(
        &backends,
        codec,
        config.session.cookie_options(),
        config.request_timeout,
    );
    let router = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind 0.0.0.0:{}", config.port))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cleaner.shutdown().await;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
