// lib/src/pinning/pinata_client.rs
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use models::errors::{LedgerError, LedgerResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::PinningConfig;
use crate::pinning::content_pinner::{build_gateway_url, ContentPinner, PinReceipt};

#[derive(Debug, Deserialize)]
struct PinJsonResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: Option<String>,
}

/// Pins JSON documents through Pinata's `pinJSONToIPFS` endpoint.
#[derive(Clone)]
pub struct PinataClient {
    http: Client,
    endpoint: String,
    jwt: String,
    gateway: String,
}

impl fmt::Debug for PinataClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinataClient")
            .field("endpoint", &self.endpoint)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

impl PinataClient {
    pub fn new(config: &PinningConfig) -> LedgerResult<Self> {
        config.ensure_configured()?;
        let jwt = config.jwt.clone().unwrap_or_default();
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        info!("Pinata client targeting {}", config.endpoint);
        Ok(PinataClient {
            http,
            endpoint: config.endpoint.clone(),
            jwt,
            gateway: config.gateway.clone(),
        })
    }
}

#[async_trait]
impl ContentPinner for PinataClient {
    async fn pin(&self, content: &Value, name: &str) -> LedgerResult<PinReceipt> {
        let body = json!({
            "pinataContent": content,
            "pinataMetadata": { "name": name },
        });
        debug!("Pinning {} to {}", name, self.endpoint);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.jwt)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let detail = if error_body.is_empty() { "Unknown error".to_string() } else { error_body };
            error!("Pinata rejected {}: {}", name, status);
            return Err(LedgerError::Dependency(format!(
                "Pinata pinJSON failed ({}): {}",
                status.as_u16(),
                detail
            )));
        }

        let parsed: PinJsonResponse = response.json().await?;
        let ipfs_hash = parsed
            .ipfs_hash
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LedgerError::Dependency("Pinata response did not include IpfsHash".into()))?;
        let metadata_uri = build_gateway_url(&self.gateway, &ipfs_hash);
        Ok(PinReceipt { ipfs_hash, metadata_uri })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use warp::Filter;

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    fn spawn_pinata(status: u16, reply: &'static str) -> (SocketAddr, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let route = warp::post()
            .and(warp::path!("pinning" / "pinJSONToIPFS"))
            .and(warp::header::optional::<String>("authorization"))
            .and(warp::body::json())
            .map(move |auth: Option<String>, body: Value| {
                sink.lock().unwrap().push((auth, body));
                warp::reply::with_status(reply, warp::http::StatusCode::from_u16(status).unwrap())
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, captured)
    }

    /// Answers every pin only after `delay`.
    fn spawn_slow_pinata(delay: Duration) -> SocketAddr {
        let route = warp::post()
            .and(warp::path!("pinning" / "pinJSONToIPFS"))
            .and_then(move || async move {
                tokio::time::sleep(delay).await;
                Ok::<_, warp::Rejection>(warp::reply::json(&json!({ "IpfsHash": "QmLate" })))
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn client_with_timeout(addr: SocketAddr, gateway: &str, timeout_ms: u64) -> PinataClient {
        PinataClient::new(&PinningConfig {
            jwt: Some("test-jwt".into()),
            gateway: gateway.into(),
            endpoint: format!("http://{}/pinning/pinJSONToIPFS", addr),
            timeout_ms,
        })
        .unwrap()
    }

    fn client_for(addr: SocketAddr, gateway: &str) -> PinataClient {
        client_with_timeout(addr, gateway, 2_000)
    }

    #[test]
    fn requires_jwt() {
        assert!(matches!(PinataClient::new(&PinningConfig::default()), Err(LedgerError::Configuration(_))));
    }

    #[tokio::test]
    async fn pins_with_bearer_token_and_builds_gateway_uri() {
        let (addr, captured) = spawn_pinata(200, r#"{"IpfsHash":"Qm123","PinSize":10}"#);
        let client = client_for(addr, "https://gateway.pinata.cloud/ipfs/");

        let receipt = client.pin(&json!({"title": "Rx1"}), "prescription-0xabc-1").await.unwrap();
        assert_eq!(receipt.ipfs_hash, "Qm123");
        assert_eq!(receipt.metadata_uri, "https://gateway.pinata.cloud/ipfs/Qm123");

        let calls = captured.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.as_deref(), Some("Bearer test-jwt"));
        assert_eq!(calls[0].1["pinataContent"]["title"], "Rx1");
        assert_eq!(calls[0].1["pinataMetadata"]["name"], "prescription-0xabc-1");
    }

    #[tokio::test]
    async fn non_success_status_is_a_dependency_error() {
        let (addr, _) = spawn_pinata(401, "");
        let err = client_for(addr, "").pin(&json!({}), "n").await.unwrap_err();
        assert!(err.is_dependency_failure());
        assert!(err.to_string().contains("Pinata pinJSON failed (401): Unknown error"));
    }

    #[tokio::test]
    async fn slow_pinata_times_out_as_dependency_failure() {
        let addr = spawn_slow_pinata(Duration::from_secs(3));
        let client = client_with_timeout(addr, "", 200);

        let started = std::time::Instant::now();
        let err = client.pin(&json!({"title": "Rx1"}), "n").await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_dependency_failure());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn debug_output_hides_jwt() {
        let client = client_with_timeout(SocketAddr::from(([127, 0, 0, 1], 9)), "", 200);
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("test-jwt"));
        assert!(rendered.contains("PinataClient"));
    }

    #[tokio::test]
    async fn missing_hash_is_a_dependency_error() {
        let (addr, _) = spawn_pinata(200, r#"{"PinSize":10}"#);
        let err = client_for(addr, "").pin(&json!({}), "n").await.unwrap_err();
        assert!(matches!(err, LedgerError::Dependency(_)));
    }
}
