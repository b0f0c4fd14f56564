// lib/src/pinning/content_pinner.rs
use std::fmt::Debug;

use async_trait::async_trait;
use models::errors::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Content identifier plus a URI a client can resolve it through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinReceipt {
    pub ipfs_hash: String,
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
}

/// Content-addressed storage for prescription documents.
#[async_trait]
pub trait ContentPinner: Send + Sync + Debug {
    async fn pin(&self, content: &Value, name: &str) -> LedgerResult<PinReceipt>;
}

/// Stand-in used when no pinning credentials are configured.
#[derive(Debug, Clone)]
pub struct DisabledPinner {
    reason: String,
}

impl DisabledPinner {
    pub fn new(reason: impl Into<String>) -> Self {
        DisabledPinner { reason: reason.into() }
    }
}

#[async_trait]
impl ContentPinner for DisabledPinner {
    async fn pin(&self, _content: &Value, _name: &str) -> LedgerResult<PinReceipt> {
        Err(LedgerError::Dependency(format!("Pinning unavailable: {}", self.reason)))
    }
}

/// Builds a gateway URL for `cid`, making sure the `/ipfs` segment appears
/// exactly once. A blank gateway yields an `ipfs://` URI.
pub fn build_gateway_url(gateway: &str, cid: &str) -> String {
    let base = gateway.trim();
    if base.is_empty() {
        return format!("ipfs://{}", cid);
    }
    let base = base.strip_suffix('/').unwrap_or(base);
    let lower = base.to_ascii_lowercase();
    if lower.ends_with("/ipfs") || lower.contains("/ipfs/") {
        format!("{}/{}", base, cid)
    } else {
        format!("{}/ipfs/{}", base, cid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_urls() {
        assert_eq!(build_gateway_url("", "Qm1"), "ipfs://Qm1");
        assert_eq!(build_gateway_url("   ", "Qm1"), "ipfs://Qm1");
        assert_eq!(build_gateway_url("https://gateway.pinata.cloud/ipfs/", "Qm1"), "https://gateway.pinata.cloud/ipfs/Qm1");
        assert_eq!(build_gateway_url("https://gw.example/IPFS", "Qm1"), "https://gw.example/IPFS/Qm1");
        assert_eq!(build_gateway_url("https://gw.example/ipfs/sub", "Qm1"), "https://gw.example/ipfs/sub/Qm1");
        assert_eq!(build_gateway_url("https://gw.example/", "Qm1"), "https://gw.example/ipfs/Qm1");
    }

    #[tokio::test]
    async fn disabled_pinner_is_a_dependency_failure() {
        let err = DisabledPinner::new("Missing PINATA_JWT")
            .pin(&serde_json::json!({}), "x")
            .await
            .unwrap_err();
        assert!(err.is_dependency_failure());
        assert_eq!(err.to_string(), "Upstream dependency failed: Pinning unavailable: Missing PINATA_JWT");
    }
}
