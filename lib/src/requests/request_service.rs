// lib/src/requests/request_service.rs
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};
use models::errors::{LedgerError, LedgerResult, ValidationError};
use models::{Address, ChainEvidence, NewRequest, Request, RequestDetails, RequestId, AccessPayload, Role};
use serde_json::json;

use crate::chain::ChainAuthority;
use crate::metrics::{MetricsRecorder, PINATA_UPLOAD_MS};
use crate::pinning::ContentPinner;
use crate::requests::request_types::{CreateRequest, CreateRequestBody};
use crate::storage_engine::RequestStore;

/// Drives requests from creation to their terminal state.
///
/// Holds no request state of its own: every operation reads the store afresh.
#[derive(Debug, Clone)]
pub struct RequestService {
    store: Arc<dyn RequestStore>,
    pinner: Arc<dyn ContentPinner>,
    chain: Arc<dyn ChainAuthority>,
    metrics: Arc<MetricsRecorder>,
    verify_doctor_registration: bool,
}

impl RequestService {
    pub fn new(
        store: Arc<dyn RequestStore>,
        pinner: Arc<dyn ContentPinner>,
        chain: Arc<dyn ChainAuthority>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        RequestService { store, pinner, chain, metrics, verify_doctor_registration: false }
    }

    /// Require `isDoctor(doctor)` on the registry before accepting a request.
    pub fn with_doctor_verification(mut self, enabled: bool) -> Self {
        self.verify_doctor_registration = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Validates, pins prescription content, then persists a pending request.
    /// Nothing is written when any step fails.
    pub async fn create_request(&self, input: CreateRequest) -> LedgerResult<Request> {
        let CreateRequest { doctor_address, patient_address, body } = input;

        match &body {
            CreateRequestBody::Prescription { payload, .. } => payload.validate()?,
            CreateRequestBody::Access { reason } if reason.trim().is_empty() => {
                return Err(ValidationError::MissingReason.into());
            }
            CreateRequestBody::Access { .. } => {}
        }

        if self.verify_doctor_registration && !self.chain.is_doctor(&doctor_address).await? {
            warn!("Rejecting request from unregistered doctor {}", doctor_address);
            return Err(LedgerError::unauthorized(format!("{} is not a registered doctor", doctor_address)));
        }

        let details = match body {
            CreateRequestBody::Prescription { payload, doctor_authorization } => {
                let payload = payload.normalized();
                let now = Utc::now();
                let envelope = json!({
                    "doctor": doctor_address,
                    "patient": patient_address,
                    "payload": payload,
                    "createdAt": now.to_rfc3339(),
                });
                let name = format!("prescription-{}-{}", patient_address, now.timestamp_millis());

                let started = Instant::now();
                let receipt = self.pinner.pin(&envelope, &name).await.map_err(|e| {
                    warn!("Pinning {} failed: {}", name, e);
                    e
                })?;
                self.metrics.record(PINATA_UPLOAD_MS, started.elapsed().as_secs_f64() * 1000.0);
                debug!("Pinned {} as {}", name, receipt.ipfs_hash);

                RequestDetails::Prescription {
                    payload,
                    ipfs_hash: receipt.ipfs_hash,
                    metadata_uri: receipt.metadata_uri,
                    doctor_authorization,
                    prescription_id: None,
                }
            }
            CreateRequestBody::Access { reason } => RequestDetails::Access {
                payload: AccessPayload { reason: reason.trim().to_string() },
            },
        };

        let record = self
            .store
            .create(NewRequest { doctor_address, patient_address, details })
            .await?;
        info!(
            "Created {} request {} from {} for {}",
            record.kind(),
            record.id,
            record.doctor_address,
            record.patient_address
        );
        Ok(record)
    }

    /// Requests where `address` is the doctor, the patient, or either.
    pub async fn list_requests(&self, address: &Address, role: Option<Role>) -> LedgerResult<Vec<Request>> {
        let mut requests = self.store.list().await?;
        requests.retain(|r| r.involves(address, role));
        Ok(requests)
    }

    /// Moves a pending request to its terminal state using the patient's
    /// on-chain evidence. A request that is already terminal comes back
    /// unchanged and the evidence is not looked at.
    pub async fn complete_request(
        &self,
        id: &RequestId,
        approver: &Address,
        evidence: &ChainEvidence,
    ) -> LedgerResult<Request> {
        let request = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("Request not found"))?;

        if &request.patient_address != approver {
            warn!("{} tried to approve request {} addressed to {}", approver, id, request.patient_address);
            return Err(LedgerError::unauthorized("Only the target patient can approve this request"));
        }

        if request.is_terminal() {
            debug!("Request {} already {:?}, returning stored record", id, request.status);
            return Ok(request);
        }

        let patch = evidence.to_patch(request.kind(), Utc::now())?;
        let updated = self
            .store
            .update(id, patch)
            .await?
            .ok_or_else(|| LedgerError::not_found("Request not found"))?;
        info!("Request {} is now {:?}", id, updated.status);
        Ok(updated)
    }
}
