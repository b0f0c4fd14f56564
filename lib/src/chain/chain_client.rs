// lib/src/chain/chain_client.rs
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use models::errors::{LedgerError, LedgerResult};
use models::{Address, PrescriptionId, PrescriptionRecord};
use reqwest::Client;
use serde_json::{json, Value};

use crate::chain::abi;
use crate::config::ChainConfig;

/// Outcome of a permissioned read. `Unauthorized` is an expected answer, not
/// a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainRead<T> {
    Found(T),
    Unauthorized,
}

/// Read-only view of the prescription registry contract.
#[async_trait]
pub trait ChainAuthority: Send + Sync + Debug {
    /// Reads the canonical record as `viewer`; the contract enforces access.
    async fn get_prescription(
        &self,
        id: PrescriptionId,
        viewer: &Address,
    ) -> LedgerResult<ChainRead<PrescriptionRecord>>;

    async fn can_view(&self, id: PrescriptionId, viewer: &Address) -> LedgerResult<bool>;

    async fn is_doctor(&self, address: &Address) -> LedgerResult<bool>;
}

#[derive(Debug)]
enum CallOutcome {
    Returned(Vec<u8>),
    Reverted { message: String, data: Option<Vec<u8>> },
}

impl CallOutcome {
    fn is_unauthorized_viewer(&self) -> bool {
        match self {
            CallOutcome::Returned(_) => false,
            CallOutcome::Reverted { message, data } => {
                message.contains("UnauthorizedViewer")
                    || data.as_deref().map_or(false, abi::is_unauthorized_viewer_revert)
            }
        }
    }

    fn into_returned(self, method: &str) -> LedgerResult<Vec<u8>> {
        match self {
            CallOutcome::Returned(data) => Ok(data),
            CallOutcome::Reverted { message, data } => {
                let reason = data.as_deref().and_then(abi::decode_revert_reason).unwrap_or(message);
                Err(LedgerError::Dependency(format!("{} reverted: {}", method, reason)))
            }
        }
    }
}

fn revert_data(value: Option<&Value>) -> Option<Vec<u8>> {
    match value? {
        Value::String(s) => abi::from_hex(s).ok(),
        Value::Object(map) => revert_data(map.get("data")),
        _ => None,
    }
}

/// JSON-RPC client for the registry, built once at startup.
#[derive(Debug)]
pub struct RegistryClient {
    http: Client,
    rpc_url: String,
    registry: Address,
    next_id: AtomicU64,
}

impl RegistryClient {
    pub fn new(config: &ChainConfig) -> LedgerResult<Self> {
        config.ensure_configured()?;
        let rpc_url = config.rpc_url.clone().unwrap_or_default();
        let registry = config
            .registry_address
            .as_deref()
            .and_then(|a| Address::parse(a).ok())
            .ok_or_else(|| LedgerError::Configuration("Invalid PRESCRIPTION_REGISTRY_ADDRESS".into()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(RegistryClient { http, rpc_url, registry, next_id: AtomicU64::new(1) })
    }

    pub fn registry(&self) -> &Address {
        &self.registry
    }

    async fn eth_call(&self, from: Option<&Address>, data: Vec<u8>) -> LedgerResult<CallOutcome> {
        let mut call = json!({ "to": self.registry.as_str(), "data": abi::to_hex(&data) });
        if let Some(from) = from {
            call["from"] = json!(from.as_str());
        }
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "eth_call",
            "params": [call, "latest"],
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
        });

        let response = self.http.post(&self.rpc_url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Chain RPC answered HTTP {}", status);
            return Err(LedgerError::Dependency(format!("Chain RPC returned HTTP {}", status.as_u16())));
        }
        let body: Value = response.json().await?;

        if let Some(error) = body.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("execution reverted")
                .to_string();
            debug!("eth_call reverted: {}", message);
            return Ok(CallOutcome::Reverted { message, data: revert_data(error.get("data")) });
        }

        let result = body
            .get("result")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Dependency("Chain RPC response missing result".into()))?;
        Ok(CallOutcome::Returned(abi::from_hex(result)?))
    }
}

#[async_trait]
impl ChainAuthority for RegistryClient {
    async fn get_prescription(
        &self,
        id: PrescriptionId,
        viewer: &Address,
    ) -> LedgerResult<ChainRead<PrescriptionRecord>> {
        let outcome = self.eth_call(Some(viewer), abi::get_prescription_call(id)).await?;
        if outcome.is_unauthorized_viewer() {
            debug!("Registry denied prescription {} to {}", id, viewer);
            return Ok(ChainRead::Unauthorized);
        }
        let data = outcome.into_returned("getPrescription")?;
        Ok(ChainRead::Found(abi::decode_prescription(&data)?))
    }

    async fn can_view(&self, id: PrescriptionId, viewer: &Address) -> LedgerResult<bool> {
        let data = self
            .eth_call(None, abi::can_view_call(id, viewer)?)
            .await?
            .into_returned("canView")?;
        abi::decode_bool(&data)
    }

    async fn is_doctor(&self, address: &Address) -> LedgerResult<bool> {
        let data = self
            .eth_call(None, abi::is_doctor_call(address)?)
            .await?
            .into_returned("isDoctor")?;
        abi::decode_bool(&data)
    }
}

/// Stand-in used when the registry connection is not configured. Every call
/// fails with the configuration error naming the missing keys.
#[derive(Debug, Clone)]
pub struct DisabledChainAuthority {
    config: ChainConfig,
}

impl DisabledChainAuthority {
    pub fn new(config: &ChainConfig) -> Self {
        DisabledChainAuthority { config: config.clone() }
    }

    fn unavailable(&self) -> LedgerError {
        match self.config.ensure_configured() {
            Err(e) => e,
            Ok(()) => LedgerError::Configuration("Chain authority disabled".into()),
        }
    }
}

#[async_trait]
impl ChainAuthority for DisabledChainAuthority {
    async fn get_prescription(&self, _: PrescriptionId, _: &Address) -> LedgerResult<ChainRead<PrescriptionRecord>> {
        Err(self.unavailable())
    }

    async fn can_view(&self, _: PrescriptionId, _: &Address) -> LedgerResult<bool> {
        Err(self.unavailable())
    }

    async fn is_doctor(&self, _: &Address) -> LedgerResult<bool> {
        Err(self.unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::test_encoding::{encode_prescription, encode_revert};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use warp::Filter;

    const DOCTOR: &str = "0x1111111111111111111111111111111111111111";
    const PATIENT: &str = "0x2222222222222222222222222222222222222222";
    const STRANGER: &str = "0x3333333333333333333333333333333333333333";
    const REGISTRY: &str = "0x9999999999999999999999999999999999999999";

    type Calls = Arc<Mutex<Vec<Value>>>;

    /// Fake node: `getPrescription` reverts for STRANGER, `canView` is true
    /// only for the patient, `isDoctor` is true only for the doctor.
    fn spawn_node() -> (SocketAddr, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let route = warp::post().and(warp::body::json()).map(move |req: Value| {
            sink.lock().unwrap().push(req.clone());
            let call = &req["params"][0];
            let data = abi::from_hex(call["data"].as_str().unwrap()).unwrap();
            let id = req["id"].clone();
            let sel = &data[..4];
            let reply = if sel == abi::selector(abi::GET_PRESCRIPTION) {
                if call["from"] == STRANGER {
                    json!({"jsonrpc": "2.0", "id": id, "error": {
                        "code": 3,
                        "message": "execution reverted",
                        "data": abi::to_hex(&abi::selector("UnauthorizedViewer(uint256,address)"))
                    }})
                } else if abi::decode_u64(&data[4..36]).unwrap() == 404 {
                    json!({"jsonrpc": "2.0", "id": id, "error": {
                        "code": 3,
                        "message": "execution reverted",
                        "data": abi::to_hex(&encode_revert("PrescriptionNotFound"))
                    }})
                } else {
                    let record = PrescriptionRecord {
                        doctor: Address::parse(DOCTOR).unwrap(),
                        patient: Address::parse(PATIENT).unwrap(),
                        metadata_uri: "ipfs://Qm123".into(),
                        created_at: 1_700_000_000,
                    };
                    json!({"jsonrpc": "2.0", "id": id, "result": abi::to_hex(&encode_prescription(&record))})
                }
            } else if sel == abi::selector(abi::CAN_VIEW) {
                let viewer = abi::decode_address(&data[36..68]).unwrap();
                let allowed = viewer.as_str() == PATIENT;
                json!({"jsonrpc": "2.0", "id": id, "result": abi::to_hex(&abi::encode_u64(allowed as u64))})
            } else {
                let who = abi::decode_address(&data[4..36]).unwrap();
                let doctor = who.as_str() == DOCTOR;
                json!({"jsonrpc": "2.0", "id": id, "result": abi::to_hex(&abi::encode_u64(doctor as u64))})
            };
            warp::reply::json(&reply)
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        (addr, calls)
    }

    /// Node that answers every call only after `delay`.
    fn spawn_slow_node(delay: Duration) -> SocketAddr {
        let route = warp::post().and_then(move || async move {
            tokio::time::sleep(delay).await;
            Ok::<_, warp::Rejection>(warp::reply::json(&json!({"jsonrpc": "2.0", "id": 1, "result": "0x"})))
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    fn client_with_timeout(addr: SocketAddr, timeout_ms: u64) -> RegistryClient {
        RegistryClient::new(&ChainConfig {
            rpc_url: Some(format!("http://{}", addr)),
            registry_address: Some(REGISTRY.into()),
            timeout_ms,
            verify_doctor_registration: false,
        })
        .unwrap()
    }

    fn client(addr: SocketAddr) -> RegistryClient {
        client_with_timeout(addr, 2_000)
    }

    fn id(n: u64) -> PrescriptionId {
        PrescriptionId::new(n).unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    #[tokio::test]
    async fn permissioned_read_is_sent_from_the_viewer() {
        let (node, calls) = spawn_node();
        let read = client(node).get_prescription(id(7), &addr(PATIENT)).await.unwrap();
        match read {
            ChainRead::Found(record) => {
                assert_eq!(record.doctor.as_str(), DOCTOR);
                assert_eq!(record.metadata_uri, "ipfs://Qm123");
            }
            ChainRead::Unauthorized => panic!("expected record"),
        }
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0]["method"], "eth_call");
        assert_eq!(calls[0]["params"][0]["from"], PATIENT);
        assert_eq!(calls[0]["params"][0]["to"], REGISTRY);
        assert_eq!(calls[0]["params"][1], "latest");
    }

    #[tokio::test]
    async fn unauthorized_viewer_revert_is_not_an_error() {
        let (node, _) = spawn_node();
        let read = client(node).get_prescription(id(7), &addr(STRANGER)).await.unwrap();
        assert_eq!(read, ChainRead::Unauthorized);
    }

    #[tokio::test]
    async fn other_reverts_are_dependency_failures() {
        let (node, _) = spawn_node();
        let err = client(node).get_prescription(id(404), &addr(PATIENT)).await.unwrap_err();
        assert!(err.is_dependency_failure());
        assert!(err.to_string().contains("PrescriptionNotFound"));
    }

    #[tokio::test]
    async fn predicates_decode_bools() {
        let (node, _) = spawn_node();
        let client = client(node);
        assert!(client.can_view(id(7), &addr(PATIENT)).await.unwrap());
        assert!(!client.can_view(id(7), &addr(STRANGER)).await.unwrap());
        assert!(client.is_doctor(&addr(DOCTOR)).await.unwrap());
        assert!(!client.is_doctor(&addr(STRANGER)).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_node_is_a_dependency_failure() {
        let client = client(SocketAddr::from(([127, 0, 0, 1], 1)));
        let err = client.can_view(id(1), &addr(PATIENT)).await.unwrap_err();
        assert!(err.is_dependency_failure());
    }

    #[tokio::test]
    async fn disabled_authority_names_missing_keys() {
        let disabled = DisabledChainAuthority::new(&ChainConfig::default());
        let err = disabled.is_doctor(&addr(DOCTOR)).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::Configuration("Missing blockchain config: RPC_URL, PRESCRIPTION_REGISTRY_ADDRESS".into())
        );
        assert!(RegistryClient::new(&ChainConfig::default()).is_err());
    }

    #[tokio::test]
    async fn slow_node_times_out_as_dependency_failure() {
        let node = spawn_slow_node(Duration::from_secs(3));
        let client = client_with_timeout(node, 200);

        let started = std::time::Instant::now();
        let err = client.can_view(id(7), &addr(PATIENT)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_dependency_failure());

        let err = client.get_prescription(id(7), &addr(PATIENT)).await.unwrap_err();
        assert!(err.is_dependency_failure());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
