use std::sync::Arc;

use anyhow::{Context, Result};
use facematch_core::{Gallery, OnnxBackend};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod error;
mod http;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("loading configuration")?;
    tracing::info!(?config, "facematchd starting");

    // One backend per engine thread; ONNX sessions are not shared.
    let mut backends = (0..config.workers)
        .map(|_| OnnxBackend::load(&config.model_dir))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;

    let scanner = backends.first_mut().context("no engine workers configured")?;
    let gallery = Gallery::scan(&config.gallery_dir, scanner, config.gallery_options())
        .with_context(|| format!("building gallery from {}", config.gallery_dir.display()))?;
    if gallery.is_empty() {
        tracing::warn!(dir = %config.gallery_dir.display(), "gallery is empty; every face will be reported as unknown");
    }

    let gallery = Arc::new(gallery);
    let strategy = config.match_strategy.build(config.match_threshold);
    let engine = engine::spawn_engine(backends, Arc::clone(&gallery), Arc::clone(&strategy))?;

    let state = http::AppState {
        engine,
        gallery,
        strategy: strategy.name(),
    };
    let app = http::router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(addr = %config.bind, strategy = strategy.name(), "facematchd ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    tracing::info!("facematchd shutting down");
    Ok(())
}
