//! gzip-asset-server binary

use anyhow::Result;
use clap::Parser;
use gzip_asset_server::config::ServerConfig;
use gzip_asset_server::{AccessLogLayer, CompressionLayer, EmbeddedAssets, app, server};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.log_level()?)?;

    let compression = CompressionLayer::new()
        .compressible_types(config.compressible_types()?)
        .pool(Arc::new(config.encoder_pool()));
    let service = app(EmbeddedAssets, compression, AccessLogLayer::new());

    let listener = server::bind(config.listen).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    server::serve(listener, service, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn init_tracing(level: tracing::Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter(std::env::var("RUST_LOG").ok().as_deref(), level))
        .try_init()?;

    Ok(())
}

/// `RUST_LOG` directives win; `level` applies only when they are absent or invalid.
fn env_filter(directives: Option<&str>, level: tracing::Level) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}
