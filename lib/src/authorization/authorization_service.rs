// lib/src/authorization/authorization_service.rs
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info};
use models::errors::{LedgerError, LedgerResult};
use models::{Address, PatientRecord, PrescriptionId, PrescriptionRecord, Request};

use crate::chain::{ChainAuthority, ChainRead};
use crate::config::DEFAULT_MAX_CONCURRENT_CHECKS;
use crate::storage_engine::RequestStore;

/// Result of a single-record read performed as the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAccess {
    Allowed(PrescriptionRecord),
    Denied,
}

/// Decides which prescription records a viewer may see. Nothing is cached:
/// grants on the registry can change at any time.
#[derive(Debug, Clone)]
pub struct AuthorizationService {
    store: Arc<dyn RequestStore>,
    chain: Arc<dyn ChainAuthority>,
    max_concurrent_checks: usize,
}

impl AuthorizationService {
    pub fn new(store: Arc<dyn RequestStore>, chain: Arc<dyn ChainAuthority>) -> Self {
        AuthorizationService { store, chain, max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS }
    }

    pub fn with_max_concurrent_checks(mut self, limit: usize) -> Self {
        self.max_concurrent_checks = limit.max(1);
        self
    }

    pub async fn can_view_prescription(&self, id: PrescriptionId, viewer: &Address) -> LedgerResult<bool> {
        self.chain.can_view(id, viewer).await
    }

    async fn may_view(&self, request: &Request, viewer: &Address) -> LedgerResult<bool> {
        if &request.patient_address == viewer || &request.doctor_address == viewer {
            return Ok(true);
        }
        match request.prescription_id() {
            Some(id) => self.chain.can_view(id, viewer).await,
            None => Ok(false),
        }
    }

    /// Recorded prescriptions of `patient` that `viewer` may see, in store
    /// order. Registry checks run concurrently; any failed check fails the
    /// whole call.
    pub async fn resolve_patient_records(
        &self,
        patient: &Address,
        viewer: &Address,
    ) -> LedgerResult<Vec<PatientRecord>> {
        let recorded = self.store.list_recorded_prescriptions(patient).await?;
        let candidates = recorded.len();

        let visible: Vec<Option<Request>> = stream::iter(recorded)
            .map(|request| async move {
                let allowed = self.may_view(&request, viewer).await?;
                Ok::<_, LedgerError>(allowed.then_some(request))
            })
            .buffered(self.max_concurrent_checks)
            .try_collect()
            .await?;

        let records: Vec<PatientRecord> = visible
            .iter()
            .flatten()
            .filter_map(PatientRecord::from_request)
            .collect();
        debug!("{} of {} records of {} visible to {}", records.len(), candidates, patient, viewer);
        Ok(records)
    }

    /// Reads the canonical record as `viewer`. A refusal by the registry is
    /// `Denied`; other failures propagate.
    pub async fn fetch_single_record(&self, id: PrescriptionId, viewer: &Address) -> LedgerResult<RecordAccess> {
        match self.chain.get_prescription(id, viewer).await? {
            ChainRead::Found(record) => Ok(RecordAccess::Allowed(record)),
            ChainRead::Unauthorized => {
                info!("Viewer {} denied prescription {}", viewer, id);
                Ok(RecordAccess::Denied)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_engine::InMemoryStorage;
    use crate::test_support::*;
    use chrono::Utc;
    use models::{PrescriptionId, RequestPatch, RequestStatus, TxHash};
    use std::time::Duration;

    async fn recorded_store(ids: &[u64]) -> Arc<InMemoryStorage> {
        let store = Arc::new(InMemoryStorage::new());
        for id in ids {
            let created = store.create(new_prescription(DOCTOR, PATIENT, &format!("Rx{}", id))).await.unwrap();
            let patch = RequestPatch::Record {
                prescription_id: PrescriptionId::new(*id).unwrap(),
                transaction_hash: TxHash::parse(&tx_hash('a')).unwrap(),
                recorded_at: Utc::now(),
            };
            store.update(&created.id, patch).await.unwrap();
        }
        // pending and access requests never show up
        store.create(new_prescription(DOCTOR, PATIENT, "draft")).await.unwrap();
        store.create(new_access(DOCTOR, PATIENT, "consult")).await.unwrap();
        store
    }

    fn ids(records: &[PatientRecord]) -> Vec<u64> {
        records.iter().filter_map(|r| r.prescription_id.map(|id| id.get())).collect()
    }

    #[tokio::test]
    async fn parties_see_everything_without_chain_calls() {
        let store = recorded_store(&[1, 2, 3]).await;
        let chain = Arc::new(StaticChainAuthority::new());
        let service = AuthorizationService::new(store, chain.clone());

        let as_patient = service.resolve_patient_records(&address(PATIENT), &address(PATIENT)).await.unwrap();
        let as_doctor = service.resolve_patient_records(&address(PATIENT), &address(DOCTOR)).await.unwrap();
        assert_eq!(ids(&as_patient), vec![1, 2, 3]);
        assert_eq!(ids(&as_doctor), vec![1, 2, 3]);
        assert_eq!(chain.can_view_calls(), 0);
    }

    #[tokio::test]
    async fn third_party_sees_only_granted_records_in_order() {
        let store = recorded_store(&[1, 2, 3, 4]).await;
        let chain = Arc::new(
            StaticChainAuthority::new()
                .grant(1, STRANGER)
                .grant(3, STRANGER)
                .grant(4, STRANGER)
                .with_delay(1, Duration::from_millis(60))
                .with_delay(3, Duration::from_millis(20)),
        );
        let service = AuthorizationService::new(store, chain.clone()).with_max_concurrent_checks(4);

        let visible = service.resolve_patient_records(&address(PATIENT), &address(STRANGER)).await.unwrap();
        assert_eq!(ids(&visible), vec![1, 3, 4]);
        assert_eq!(chain.can_view_calls(), 4);
        assert!(visible.iter().all(|r| r.patient_address.as_str() == PATIENT));
    }

    #[tokio::test]
    async fn recorded_without_chain_id_is_hidden_from_third_parties() {
        let mut request = models::Request::from_new(
            new_prescription(DOCTOR, PATIENT, "legacy"),
            models::RequestId::new_v4(),
            Utc::now(),
        );
        request.status = RequestStatus::Recorded;
        let store = Arc::new(InMemoryStorage::with_requests(vec![request]));
        let chain = Arc::new(StaticChainAuthority::new());
        let service = AuthorizationService::new(store, chain.clone());

        assert!(service.resolve_patient_records(&address(PATIENT), &address(STRANGER)).await.unwrap().is_empty());
        assert_eq!(service.resolve_patient_records(&address(PATIENT), &address(PATIENT)).await.unwrap().len(), 1);
        assert_eq!(chain.can_view_calls(), 0);
    }

    #[tokio::test]
    async fn chain_failure_propagates() {
        let store = recorded_store(&[1]).await;
        let service = AuthorizationService::new(store, Arc::new(StaticChainAuthority::new().failing()));
        let err = service.resolve_patient_records(&address(PATIENT), &address(STRANGER)).await.unwrap_err();
        assert!(err.is_dependency_failure());
    }

    #[tokio::test]
    async fn can_view_is_asked_every_time() {
        let chain = Arc::new(StaticChainAuthority::new().grant(9, STRANGER));
        let service = AuthorizationService::new(Arc::new(InMemoryStorage::new()), chain.clone());
        let id = PrescriptionId::new(9).unwrap();
        assert!(service.can_view_prescription(id, &address(STRANGER)).await.unwrap());
        assert!(service.can_view_prescription(id, &address(STRANGER)).await.unwrap());
        assert!(!service.can_view_prescription(id, &address(PATIENT)).await.unwrap());
        assert_eq!(chain.can_view_calls(), 3);
    }

    #[tokio::test]
    async fn single_record_fetch_maps_refusal_to_denied() {
        let chain = Arc::new(StaticChainAuthority::new().with_record(7, DOCTOR, PATIENT, "ipfs://Qm123"));
        let service = AuthorizationService::new(Arc::new(InMemoryStorage::new()), chain);
        let id = PrescriptionId::new(7).unwrap();

        match service.fetch_single_record(id, &address(PATIENT)).await.unwrap() {
            RecordAccess::Allowed(record) => assert_eq!(record.metadata_uri, "ipfs://Qm123"),
            RecordAccess::Denied => panic!("patient must be allowed"),
        }
        assert_eq!(service.fetch_single_record(id, &address(STRANGER)).await.unwrap(), RecordAccess::Denied);
        let missing = service.fetch_single_record(PrescriptionId::new(8).unwrap(), &address(PATIENT)).await;
        assert!(missing.unwrap_err().is_dependency_failure());
    }
}
