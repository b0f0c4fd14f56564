// lib/src/test_support.rs
//! Fixtures and in-process doubles for the chain authority and the pinner.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use models::errors::{LedgerError, LedgerResult};
use models::{
    AccessPayload, Address, NewRequest, PrescriptionId, PrescriptionPayload, PrescriptionRecord, RequestDetails,
    RequestId, RequestPatch, TxHash,
};
use serde_json::Value;

use crate::chain::{ChainAuthority, ChainRead};
use crate::pinning::{build_gateway_url, ContentPinner, PinReceipt};
use crate::storage_engine::RequestStore;

pub const DOCTOR: &str = "0x1111111111111111111111111111111111111111";
pub const PATIENT: &str = "0x2222222222222222222222222222222222222222";
pub const STRANGER: &str = "0x3333333333333333333333333333333333333333";
pub const TEST_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

pub fn address(value: &str) -> Address {
    Address::parse(value).unwrap()
}

pub fn tx_hash(fill: char) -> String {
    format!("0x{}", fill.to_string().repeat(64))
}

pub fn new_prescription(doctor: &str, patient: &str, title: &str) -> NewRequest {
    NewRequest {
        doctor_address: address(doctor),
        patient_address: address(patient),
        details: RequestDetails::Prescription {
            payload: PrescriptionPayload::titled(title),
            ipfs_hash: "Qm123".into(),
            metadata_uri: build_gateway_url(TEST_GATEWAY, "Qm123"),
            doctor_authorization: None,
            prescription_id: None,
        },
    }
}

pub fn new_access(doctor: &str, patient: &str, reason: &str) -> NewRequest {
    NewRequest {
        doctor_address: address(doctor),
        patient_address: address(patient),
        details: RequestDetails::Access { payload: AccessPayload { reason: reason.into() } },
    }
}

/// Seeds `n` access requests, then races `n` grants of those requests against
/// `n` fresh creates and `n` lists on a shared store. Returns the granted ids.
pub async fn race_mixed_writes(store: Arc<dyn RequestStore>, n: usize) -> Vec<RequestId> {
    let mut seeded = Vec::with_capacity(n);
    for i in 0..n {
        seeded.push(store.create(new_access(DOCTOR, PATIENT, &format!("seed {}", i))).await.unwrap().id);
    }

    let mut tasks = Vec::new();
    for (i, id) in seeded.iter().copied().enumerate() {
        let updater = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let patch = RequestPatch::Grant {
                transaction_hash: TxHash::parse(&tx_hash('a')).unwrap(),
                recorded_at: Utc::now(),
            };
            assert!(updater.update(&id, patch).await.unwrap().is_some());
        }));
        let creator = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            creator.create(new_access(DOCTOR, PATIENT, &format!("late {}", i))).await.unwrap();
        }));
        let reader = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let listed = reader.list().await.unwrap();
            assert!(listed.len() >= n);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    seeded
}

/// Pinner that answers with a fixed hash, or always fails.
#[derive(Debug)]
pub struct StaticPinner {
    hash: String,
    failure: Option<String>,
    pinned: Mutex<Vec<(String, Value)>>,
}

impl StaticPinner {
    pub fn new(hash: &str) -> Self {
        StaticPinner { hash: hash.into(), failure: None, pinned: Mutex::new(Vec::new()) }
    }

    pub fn failing(message: &str) -> Self {
        StaticPinner { hash: String::new(), failure: Some(message.into()), pinned: Mutex::new(Vec::new()) }
    }

    /// Name and content of every pin attempt.
    pub fn pinned(&self) -> Vec<(String, Value)> {
        self.pinned.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.pinned.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentPinner for StaticPinner {
    async fn pin(&self, content: &Value, name: &str) -> LedgerResult<PinReceipt> {
        self.pinned.lock().unwrap().push((name.to_string(), content.clone()));
        if let Some(message) = &self.failure {
            return Err(LedgerError::Dependency(message.clone()));
        }
        Ok(PinReceipt { ipfs_hash: self.hash.clone(), metadata_uri: build_gateway_url(TEST_GATEWAY, &self.hash) })
    }
}

/// Registry double. Parties of a record and explicitly granted viewers may
/// read it; `can_view` answers only from the explicit grants.
#[derive(Debug, Default)]
pub struct StaticChainAuthority {
    records: HashMap<u64, PrescriptionRecord>,
    grants: HashSet<(u64, Address)>,
    doctors: HashSet<Address>,
    delays: HashMap<u64, Duration>,
    failing: bool,
    can_view_calls: AtomicUsize,
    get_calls: AtomicUsize,
    is_doctor_calls: AtomicUsize,
}

impl StaticChainAuthority {
    pub fn new() -> Self {
        StaticChainAuthority::default()
    }

    pub fn with_record(mut self, id: u64, doctor: &str, patient: &str, metadata_uri: &str) -> Self {
        self.records.insert(
            id,
            PrescriptionRecord {
                doctor: address(doctor),
                patient: address(patient),
                metadata_uri: metadata_uri.into(),
                created_at: 1_700_000_000,
            },
        );
        self
    }

    pub fn grant(mut self, id: u64, viewer: &str) -> Self {
        self.grants.insert((id, address(viewer)));
        self
    }

    pub fn with_doctor(mut self, doctor: &str) -> Self {
        self.doctors.insert(address(doctor));
        self
    }

    /// Makes `can_view` for `id` answer after `delay`.
    pub fn with_delay(mut self, id: u64, delay: Duration) -> Self {
        self.delays.insert(id, delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn can_view_calls(&self) -> usize {
        self.can_view_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn is_doctor_calls(&self) -> usize {
        self.is_doctor_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> LedgerResult<()> {
        if self.failing {
            return Err(LedgerError::Dependency("chain node unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainAuthority for StaticChainAuthority {
    async fn get_prescription(
        &self,
        id: PrescriptionId,
        viewer: &Address,
    ) -> LedgerResult<ChainRead<PrescriptionRecord>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let record = self
            .records
            .get(&id.get())
            .ok_or_else(|| LedgerError::Dependency(format!("getPrescription reverted: PrescriptionNotFound({})", id)))?;
        let allowed = &record.doctor == viewer
            || &record.patient == viewer
            || self.grants.contains(&(id.get(), viewer.clone()));
        Ok(if allowed { ChainRead::Found(record.clone()) } else { ChainRead::Unauthorized })
    }

    async fn can_view(&self, id: PrescriptionId, viewer: &Address) -> LedgerResult<bool> {
        self.can_view_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&id.get()) {
            tokio::time::sleep(*delay).await;
        }
        self.check()?;
        Ok(self.grants.contains(&(id.get(), viewer.clone())))
    }

    async fn is_doctor(&self, address: &Address) -> LedgerResult<bool> {
        self.is_doctor_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.doctors.contains(address))
    }
}
