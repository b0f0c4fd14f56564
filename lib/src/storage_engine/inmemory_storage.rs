// lib/src/storage_engine/inmemory_storage.rs
use async_trait::async_trait;
use log::debug;
use models::errors::LedgerResult;
use models::{NewRequest, Request, RequestId, RequestPatch};
use tokio::sync::RwLock;

use crate::storage_engine::storage_engine::{new_record, patch_record, RequestStore};

/// Volatile store, used by tests and by `engine: in_memory`.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    requests: RwLock<Vec<Request>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    pub fn with_requests(requests: Vec<Request>) -> Self {
        InMemoryStorage { requests: RwLock::new(requests) }
    }
}

#[async_trait]
impl RequestStore for InMemoryStorage {
    async fn create(&self, new_request: NewRequest) -> LedgerResult<Request> {
        let record = new_record(new_request);
        self.requests.write().await.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &RequestId) -> LedgerResult<Option<Request>> {
        let requests = self.requests.read().await;
        Ok(requests.iter().find(|r| &r.id == id).cloned())
    }

    async fn list(&self) -> LedgerResult<Vec<Request>> {
        Ok(self.requests.read().await.clone())
    }

    async fn update(&self, id: &RequestId, patch: RequestPatch) -> LedgerResult<Option<Request>> {
        let mut requests = self.requests.write().await;
        let Some(record) = requests.iter_mut().find(|r| &r.id == id) else {
            return Ok(None);
        };
        if !patch_record(record, patch)? {
            debug!("Request {} already terminal, update skipped", id);
        }
        Ok(Some(record.clone()))
    }

    async fn flush(&self) -> LedgerResult<()> {
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "in_memory"
    }
}
