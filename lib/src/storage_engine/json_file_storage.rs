// lib/src/storage_engine/json_file_storage.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use models::errors::{LedgerError, LedgerResult};
use models::{NewRequest, Request, RequestId, RequestPatch};
use tokio::fs;
use tokio::sync::Mutex as TokioMutex;

use crate::storage_engine::storage_engine::{new_record, patch_record, RequestStore};

/// Stores every request as one pretty-printed JSON array.
///
/// The file is re-read on every call. Writers hold `write_lock` across the
/// whole read-modify-write and replace the file through a rename, so readers
/// see either the old or the new array.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: TokioMutex<()>,
}

impl JsonFileStorage {
    pub async fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let storage = JsonFileStorage { path: path.into(), write_lock: TokioMutex::new(()) };
        storage.ensure_file().await?;
        info!("Using JSON request store at {:?}", storage.path);
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_file(&self) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        if fs::metadata(&self.path).await.is_err() {
            debug!("Creating empty request store at {:?}", self.path);
            self.write_all(&[]).await?;
        }
        Ok(())
    }

    async fn read_all(&self) -> LedgerResult<Vec<Request>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            LedgerError::Storage(format!("Corrupt request store {}: {}", self.path.display(), e))
        })
    }

    async fn write_all(&self, requests: &[Request]) -> LedgerResult<()> {
        let json = serde_json::to_string_pretty(requests)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RequestStore for JsonFileStorage {
    async fn create(&self, new_request: NewRequest) -> LedgerResult<Request> {
        let _guard = self.write_lock.lock().await;
        let mut requests = self.read_all().await?;
        let record = new_record(new_request);
        requests.push(record.clone());
        self.write_all(&requests).await?;
        Ok(record)
    }

    async fn get(&self, id: &RequestId) -> LedgerResult<Option<Request>> {
        Ok(self.read_all().await?.into_iter().find(|r| &r.id == id))
    }

    async fn list(&self) -> LedgerResult<Vec<Request>> {
        self.read_all().await
    }

    async fn update(&self, id: &RequestId, patch: RequestPatch) -> LedgerResult<Option<Request>> {
        let _guard = self.write_lock.lock().await;
        let mut requests = self.read_all().await?;
        let Some(index) = requests.iter().position(|r| &r.id == id) else {
            return Ok(None);
        };
        if patch_record(&mut requests[index], patch)? {
            self.write_all(&requests).await?;
        } else {
            debug!("Request {} already terminal, update skipped", id);
        }
        Ok(Some(requests.swap_remove(index)))
    }

    async fn flush(&self) -> LedgerResult<()> {
        // Every write already lands on disk.
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "json_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_access, new_prescription, race_mixed_writes, tx_hash, DOCTOR, PATIENT};
    use std::sync::Arc;
    use chrono::Utc;
    use models::{PrescriptionId, RequestStatus, TxHash};
    use tempfile::TempDir;

    async fn store_in(dir: &TempDir) -> JsonFileStorage {
        JsonFileStorage::new(dir.path().join("data").join("requests.json")).await.unwrap()
    }

    #[tokio::test]
    async fn creates_empty_array_file_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.trim(), "[]");
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let created = {
            let store = store_in(&dir).await;
            store.create(new_prescription(DOCTOR, PATIENT, "Rx1")).await.unwrap()
        };
        let reopened = store_in(&dir).await;
        assert_eq!(reopened.get(&created.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn persisted_layout_uses_wire_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.create(new_prescription(DOCTOR, PATIENT, "Rx1")).await.unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let first = &raw[0];
        assert_eq!(first["kind"], "prescription");
        assert_eq!(first["status"], "pending");
        assert_eq!(first["doctorAddress"], DOCTOR);
        assert_eq!(first["ipfsHash"], "Qm123");
        assert!(first.get("metadataURI").is_some());
        assert!(first.get("prescriptionId").is_none());
    }

    #[tokio::test]
    async fn update_records_prescription_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let rx = store.create(new_prescription(DOCTOR, PATIENT, "Rx1")).await.unwrap();
        let access = store.create(new_access(DOCTOR, PATIENT, "consult")).await.unwrap();

        let patch = RequestPatch::Record {
            prescription_id: PrescriptionId::new(7).unwrap(),
            transaction_hash: TxHash::parse(&tx_hash('a')).unwrap(),
            recorded_at: Utc::now(),
        };
        let updated = store.update(&rx.id, patch).await.unwrap().unwrap();
        assert_eq!(updated.status, RequestStatus::Recorded);

        let listed = store.list().await.unwrap();
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![rx.id, access.id]);
        assert_eq!(listed[0], updated);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(store.list().await, Err(LedgerError::Storage(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_updates_and_lists_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn RequestStore> = Arc::new(store_in(&dir).await);
        let granted = race_mixed_writes(Arc::clone(&store), 16).await;

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 32);
        let granted_now: Vec<_> =
            listed.iter().filter(|r| r.status == RequestStatus::Granted).map(|r| r.id).collect();
        // Seeded requests come first and were the only ones granted.
        assert_eq!(granted_now, granted);
        assert_eq!(listed[..16].iter().map(|r| r.id).collect::<Vec<_>>(), granted);
    }
}
