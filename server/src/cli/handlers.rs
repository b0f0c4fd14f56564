// server/src/cli/handlers.rs
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use lib::config::{load_ledger_config, LedgerConfig, DEFAULT_METRICS_FILE};
use lib::metrics::{MetricsRecorder, MetricsReport};
use log::{info, warn};

use crate::api::{routes, AppState};

fn load_config(path: Option<&Path>) -> Result<LedgerConfig> {
    let path = match path {
        Some(p) => Some(p.to_str().ok_or_else(|| anyhow!("Config path {} is not valid UTF-8", p.display()))?),
        None => None,
    };
    load_ledger_config(path)
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to set up SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received SIGINT, shutting down gracefully...");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, shutting down gracefully...");
    }
}

/// Serves the API until a shutdown signal, then persists metrics and the store.
pub async fn handle_serve(config_path: Option<PathBuf>, port: Option<u16>, host: Option<String>) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.host))?;
    let addr = SocketAddr::new(ip, config.server.port);

    let state = AppState::from_config(&config)
        .await
        .map_err(|e| anyhow!("Failed to initialise services: {}", e))?;

    let (bound, server) = warp::serve(routes(state.clone()))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API listening on {} (chain configured: {})", bound, state.chain_configured);

    server.await;

    state
        .shutdown()
        .await
        .map_err(|e| anyhow!("Failed to persist state on shutdown: {}", e))?;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves which metrics file a report reads: the explicit one, else the
/// configured one, else the default location.
pub fn report_path(metrics_file: Option<PathBuf>, config: &LedgerConfig) -> PathBuf {
    metrics_file
        .or_else(|| config.metrics.file.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_METRICS_FILE))
}

pub fn build_report(path: &Path) -> Result<MetricsReport> {
    if !path.exists() {
        return Err(anyhow!("No metrics file found at {}", path.display()));
    }
    let series = MetricsRecorder::load_series(path)
        .map_err(|e| anyhow!("Failed to read metrics from {}: {}", path.display(), e))?;
    Ok(MetricsReport::from_series(&series))
}

pub fn handle_report(metrics_file: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = match (&metrics_file, config_path.as_deref()) {
        (Some(_), None) => LedgerConfig::default(),
        (_, path) => load_config(path)?,
    };
    let path = report_path(metrics_file, &config);
    let report = build_report(&path)?;
    println!();
    println!("{}", report);
    Ok(())
}
