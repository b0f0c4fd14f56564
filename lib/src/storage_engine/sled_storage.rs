// lib/src/storage_engine/sled_storage.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info};
use models::errors::{LedgerError, LedgerResult};
use models::{NewRequest, Request, RequestId, RequestPatch};
use sled::{Db, Tree};
use tokio::sync::Mutex as TokioMutex;

use crate::storage_engine::storage_engine::{new_record, patch_record, RequestStore};

const RECORDS_TREE: &str = "requests";
const SEQUENCE_TREE: &str = "request_sequence";

/// Sled-backed store. Records live in `requests` keyed by sequence number, so
/// a tree scan yields insertion order; `request_sequence` maps id to sequence.
#[derive(Debug)]
pub struct SledStorage {
    path: PathBuf,
    db: Db,
    records: Tree,
    sequence: Tree,
    write_lock: TokioMutex<()>,
}

fn serialize_request(request: &Request) -> LedgerResult<Vec<u8>> {
    Ok(serde_json::to_vec(request)?)
}

fn deserialize_request(bytes: &[u8]) -> LedgerResult<Request> {
    serde_json::from_slice(bytes).map_err(|e| LedgerError::Storage(format!("Corrupt sled record: {}", e)))
}

impl SledStorage {
    pub async fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        info!("Opening sled request store at {:?}", path);
        let open_path = path.clone();
        let db = tokio::task::spawn_blocking(move || {
            if let Some(parent) = open_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            sled::Config::new().path(&open_path).open().map_err(LedgerError::from)
        })
        .await??;
        let records = db.open_tree(RECORDS_TREE)?;
        let sequence = db.open_tree(SEQUENCE_TREE)?;
        Ok(SledStorage { path, db, records, sequence, write_lock: TokioMutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sequence_of(&self, id: &RequestId) -> LedgerResult<Option<sled::IVec>> {
        Ok(self.sequence.get(id.as_bytes())?)
    }
}

#[async_trait]
impl RequestStore for SledStorage {
    async fn create(&self, new_request: NewRequest) -> LedgerResult<Request> {
        let _guard = self.write_lock.lock().await;
        let record = new_record(new_request);
        let seq = self.db.generate_id()?.to_be_bytes();
        self.records.insert(seq, serialize_request(&record)?)?;
        self.sequence.insert(record.id.as_bytes(), &seq[..])?;
        self.db.flush_async().await?;
        debug!("Stored request {} at sequence {:?}", record.id, seq);
        Ok(record)
    }

    async fn get(&self, id: &RequestId) -> LedgerResult<Option<Request>> {
        let Some(seq) = self.sequence_of(id)? else {
            return Ok(None);
        };
        self.records.get(seq)?.map(|bytes| deserialize_request(&bytes)).transpose()
    }

    async fn list(&self) -> LedgerResult<Vec<Request>> {
        self.records
            .iter()
            .values()
            .map(|value| deserialize_request(&value?))
            .collect()
    }

    async fn update(&self, id: &RequestId, patch: RequestPatch) -> LedgerResult<Option<Request>> {
        let _guard = self.write_lock.lock().await;
        let Some(seq) = self.sequence_of(id)? else {
            return Ok(None);
        };
        let Some(bytes) = self.records.get(&seq)? else {
            return Ok(None);
        };
        let mut record = deserialize_request(&bytes)?;
        if patch_record(&mut record, patch)? {
            self.records.insert(seq, serialize_request(&record)?)?;
            self.db.flush_async().await?;
        } else {
            debug!("Request {} already terminal, update skipped", id);
        }
        Ok(Some(record))
    }

    async fn flush(&self) -> LedgerResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }
}
