// lib/src/storage_engine/storage_engine.rs
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::Utc;
use models::errors::LedgerResult;
use models::{Address, NewRequest, Request, RequestId, RequestPatch};

/// Durable request log keyed by request id.
///
/// Implementations own the persisted records. Every call reads current state,
/// and `create`/`update` are single read-modify-write steps that readers never
/// observe half-applied.
#[async_trait]
pub trait RequestStore: Send + Sync + Debug {
    /// Assigns id and timestamps, appends and returns the stored record.
    async fn create(&self, new_request: NewRequest) -> LedgerResult<Request>;

    async fn get(&self, id: &RequestId) -> LedgerResult<Option<Request>>;

    /// All records in insertion order.
    async fn list(&self) -> LedgerResult<Vec<Request>>;

    /// Applies `patch` and returns the resulting record, or `None` when the id
    /// is unknown. A terminal record is returned unchanged.
    async fn update(&self, id: &RequestId, patch: RequestPatch) -> LedgerResult<Option<Request>>;

    async fn flush(&self) -> LedgerResult<()>;

    /// Recorded prescriptions addressed to `patient`, in insertion order.
    async fn list_recorded_prescriptions(&self, patient: &Address) -> LedgerResult<Vec<Request>> {
        let mut requests = self.list().await?;
        requests.retain(|r| r.is_recorded_prescription_of(patient));
        Ok(requests)
    }

    fn get_type(&self) -> &'static str;
}

pub(crate) fn new_record(new_request: NewRequest) -> Request {
    Request::from_new(new_request, RequestId::new_v4(), Utc::now())
}

/// Patches `record` in place. Returns whether anything changed.
pub(crate) fn patch_record(record: &mut Request, patch: RequestPatch) -> LedgerResult<bool> {
    Ok(record.apply_patch(patch, Utc::now())?)
}
