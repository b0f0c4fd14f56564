// server/src/api/app_state.rs
use std::sync::Arc;

use lib::chain::{ChainAuthority, DisabledChainAuthority, RegistryClient};
use lib::config::LedgerConfig;
use lib::metrics::MetricsRecorder;
use lib::pinning::{ContentPinner, DisabledPinner, PinataClient};
use lib::storage_engine::{create_storage, RequestStore};
use lib::{AuthorizationService, RequestService};
use log::{info, warn};
use models::errors::LedgerResult;

/// Everything a route handler needs. Cloned into every filter; all members
/// are shared handles.
#[derive(Debug, Clone)]
pub struct AppState {
    pub requests: RequestService,
    pub authorization: AuthorizationService,
    pub metrics: Arc<MetricsRecorder>,
    pub store: Arc<dyn RequestStore>,
    pub chain_configured: bool,
}

impl AppState {
    pub fn new(
        config: &LedgerConfig,
        store: Arc<dyn RequestStore>,
        pinner: Arc<dyn ContentPinner>,
        chain: Arc<dyn ChainAuthority>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let requests = RequestService::new(store.clone(), pinner, chain.clone(), metrics.clone())
            .with_doctor_verification(config.chain.verify_doctor_registration);
        let authorization = AuthorizationService::new(store.clone(), chain)
            .with_max_concurrent_checks(config.authorization.max_concurrent_checks);
        AppState {
            requests,
            authorization,
            metrics,
            store,
            chain_configured: config.chain.is_configured(),
        }
    }

    /// Builds the store, the external clients and the metrics recorder
    /// described by `config`. Missing pinning or chain settings leave the
    /// service up with a disabled client in their place.
    pub async fn from_config(config: &LedgerConfig) -> LedgerResult<Self> {
        let store = create_storage(&config.storage).await?;

        let pinner: Arc<dyn ContentPinner> = match config.pinning.ensure_configured() {
            Ok(()) => Arc::new(PinataClient::new(&config.pinning)?),
            Err(e) => {
                warn!("Content pinning disabled: {}", e);
                Arc::new(DisabledPinner::new(e.to_string()))
            }
        };

        let chain: Arc<dyn ChainAuthority> = if config.chain.is_configured() {
            let client = RegistryClient::new(&config.chain)?;
            info!("Using prescription registry {}", client.registry());
            Arc::new(client)
        } else {
            warn!("Chain authority disabled, missing {}", config.chain.missing_keys().join(", "));
            Arc::new(DisabledChainAuthority::new(&config.chain))
        };
        if config.chain.verify_doctor_registration && !config.chain.is_configured() {
            warn!("verify_doctor_registration is set but no chain is configured; every create will fail");
        }

        let metrics = Arc::new(MetricsRecorder::from_config(&config.metrics)?);
        Ok(AppState::new(config, store, pinner, chain, metrics))
    }

    /// Persists what is still in memory. Called once the listener has stopped.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        let metrics = Arc::clone(&self.metrics);
        tokio::task::spawn_blocking(move || metrics.close()).await??;
        self.store.flush().await?;
        info!("Metrics and {} store flushed", self.store.get_type());
        Ok(())
    }
}
