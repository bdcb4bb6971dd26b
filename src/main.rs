//! Seismic dashboard backend — binary entrypoint.
//! Boots the Axum HTTP server, wiring the pipeline routes and `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use sismo_watch::api::{create_router, AppState};
use sismo_watch::ingest::config::load_config_default;
use sismo_watch::ingest::providers::GaelProvider;
use sismo_watch::metrics::Metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    sismo_watch::init_tracing();

    let cfg = load_config_default().context("loading configuration")?;
    let metrics = Metrics::init().context("installing prometheus recorder")?;

    let source = GaelProvider::from_url(cfg.endpoint.clone(), cfg.timeout())
        .context("building http client")?;
    let state = AppState::new(
        Arc::new(source),
        cfg.default_filter(),
        cfg.aggregate_options()?,
    );
    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    tracing::info!(
        addr = %cfg.bind_addr,
        endpoint = %cfg.endpoint,
        timezone = %cfg.timezone,
        "sismo-watch listening"
    );
    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
