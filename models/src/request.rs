// models/src/request.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::{Address, PrescriptionId, RequestId, TxHash};
use crate::medical::PrescriptionPayload;

const SIGNATURE_HEX_LEN: usize = 130;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Prescription,
    Access,
}

impl RequestKind {
    pub fn parse(value: &str) -> ValidationResult<Self> {
        match value {
            "prescription" => Ok(RequestKind::Prescription),
            "access" => Ok(RequestKind::Access),
            _ => Err(ValidationError::UnsupportedKind),
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Prescription => write!(f, "prescription"),
            RequestKind::Access => write!(f, "access"),
        }
    }
}

/// Lifecycle state. `Recorded` is reachable only by prescriptions, `Granted`
/// only by access requests; both are terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Recorded,
    Granted,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Recorded | RequestStatus::Granted)
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        RequestStatus::Pending
    }
}

/// Which side of a request an address is matched against when listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    /// Unknown roles are ignored rather than rejected.
    pub fn parse_lenient(value: Option<&str>) -> Option<Role> {
        match value {
            Some("doctor") => Some(Role::Doctor),
            Some("patient") => Some(Role::Patient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPayload {
    pub reason: String,
}

/// Doctor-signed approval bundle that the patient later submits on-chain
/// when finalizing. Only its shape is checked here; the contract verifies the
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAuthorization {
    pub doctor_signature: String,
    /// Decimal digits. May exceed u64 on-chain, so kept as text.
    pub nonce: String,
    /// Unix seconds.
    pub valid_until: i64,
}

fn json_digits(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| v.to_string()),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => Some(s.clone()),
        _ => None,
    }
}

impl DoctorAuthorization {
    /// Builds the bundle from raw request fields. All three absent yields
    /// `None`; a partial bundle is rejected.
    pub fn from_parts(
        signature: Option<&Value>,
        nonce: Option<&Value>,
        valid_until: Option<&Value>,
        now: DateTime<Utc>,
    ) -> ValidationResult<Option<Self>> {
        let absent = |v: Option<&Value>| v.map_or(true, Value::is_null);
        if absent(signature) && absent(nonce) && absent(valid_until) {
            return Ok(None);
        }

        let doctor_signature = signature
            .and_then(Value::as_str)
            .filter(|s| {
                s.strip_prefix("0x").map_or(false, |d| {
                    d.len() == SIGNATURE_HEX_LEN && d.bytes().all(|b| b.is_ascii_hexdigit())
                })
            })
            .ok_or_else(|| ValidationError::InvalidDoctorAuthorization("doctorSignature".into()))?
            .to_ascii_lowercase();

        let nonce = nonce
            .and_then(json_digits)
            .ok_or_else(|| ValidationError::InvalidDoctorAuthorization("nonce".into()))?;

        let valid_until = valid_until
            .and_then(json_digits)
            .and_then(|d| d.parse::<i64>().ok())
            .ok_or_else(|| ValidationError::InvalidDoctorAuthorization("validUntil".into()))?;
        if valid_until < now.timestamp() {
            return Err(ValidationError::InvalidDoctorAuthorization("validUntil (expired)".into()));
        }

        Ok(Some(DoctorAuthorization { doctor_signature, nonce, valid_until }))
    }
}

/// Kind-specific part of a request. Fields of one kind cannot appear on the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestDetails {
    Prescription {
        payload: PrescriptionPayload,
        #[serde(rename = "ipfsHash")]
        ipfs_hash: String,
        #[serde(rename = "metadataURI")]
        metadata_uri: String,
        #[serde(rename = "doctorAuthorization", default, skip_serializing_if = "Option::is_none")]
        doctor_authorization: Option<DoctorAuthorization>,
        #[serde(rename = "prescriptionId", default, skip_serializing_if = "Option::is_none")]
        prescription_id: Option<PrescriptionId>,
    },
    Access {
        payload: AccessPayload,
    },
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestDetails::Prescription { .. } => RequestKind::Prescription,
            RequestDetails::Access { .. } => RequestKind::Access,
        }
    }
}

/// Input to the store's `create`; the store assigns id, status and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub doctor_address: Address,
    pub patient_address: Address,
    pub details: RequestDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    pub doctor_address: Address,
    pub patient_address: Address,
    #[serde(flatten)]
    pub details: RequestDetails,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Request {
    pub fn from_new(new: NewRequest, id: RequestId, now: DateTime<Utc>) -> Self {
        Request {
            id,
            doctor_address: new.doctor_address,
            patient_address: new.patient_address,
            details: new.details,
            status: RequestStatus::Pending,
            transaction_hash: None,
            created_at: now,
            updated_at: now,
            recorded_at: None,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.details.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn prescription_id(&self) -> Option<PrescriptionId> {
        match &self.details {
            RequestDetails::Prescription { prescription_id, .. } => *prescription_id,
            RequestDetails::Access { .. } => None,
        }
    }

    pub fn metadata_uri(&self) -> Option<&str> {
        match &self.details {
            RequestDetails::Prescription { metadata_uri, .. } => Some(metadata_uri),
            RequestDetails::Access { .. } => None,
        }
    }

    /// Whether `address` appears on the side(s) selected by `role`.
    pub fn involves(&self, address: &Address, role: Option<Role>) -> bool {
        match role {
            Some(Role::Doctor) => &self.doctor_address == address,
            Some(Role::Patient) => &self.patient_address == address,
            None => &self.doctor_address == address || &self.patient_address == address,
        }
    }

    pub fn is_recorded_prescription_of(&self, patient: &Address) -> bool {
        self.kind() == RequestKind::Prescription
            && self.status == RequestStatus::Recorded
            && &self.patient_address == patient
    }

    /// Applies a terminal transition. Returns `Ok(false)` when the record is
    /// already terminal, leaving it untouched, so that racing approvals keep
    /// the first one's evidence.
    pub fn apply_patch(&mut self, patch: RequestPatch, now: DateTime<Utc>) -> ValidationResult<bool> {
        if self.is_terminal() {
            return Ok(false);
        }
        match (&mut self.details, patch) {
            (
                RequestDetails::Prescription { prescription_id, .. },
                RequestPatch::Record { prescription_id: id, transaction_hash, recorded_at },
            ) => {
                *prescription_id = Some(id);
                self.status = RequestStatus::Recorded;
                self.transaction_hash = Some(transaction_hash);
                self.recorded_at = Some(recorded_at);
            }
            (RequestDetails::Access { .. }, RequestPatch::Grant { transaction_hash, recorded_at }) => {
                self.status = RequestStatus::Granted;
                self.transaction_hash = Some(transaction_hash);
                self.recorded_at = Some(recorded_at);
            }
            (details, patch) => {
                return Err(ValidationError::KindMismatch {
                    kind: details.kind().to_string(),
                    patch: patch.kind().to_string(),
                });
            }
        }
        self.updated_at = now;
        Ok(true)
    }
}

/// Partial update applied by the store in a single read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPatch {
    Record {
        prescription_id: PrescriptionId,
        transaction_hash: TxHash,
        recorded_at: DateTime<Utc>,
    },
    Grant {
        transaction_hash: TxHash,
        recorded_at: DateTime<Utc>,
    },
}

impl RequestPatch {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPatch::Record { .. } => RequestKind::Prescription,
            RequestPatch::Grant { .. } => RequestKind::Access,
        }
    }
}

/// On-chain evidence supplied by the approving patient. Kept loosely typed
/// so that a replay against a terminal request is accepted without looking
/// at it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEvidence {
    #[serde(default)]
    pub transaction_hash: Option<Value>,
    #[serde(default)]
    pub prescription_id: Option<Value>,
}

impl ChainEvidence {
    pub fn new(transaction_hash: &str, prescription_id: Option<u64>) -> Self {
        ChainEvidence {
            transaction_hash: Some(Value::String(transaction_hash.to_string())),
            prescription_id: prescription_id.map(Value::from),
        }
    }

    fn tx_hash(&self) -> ValidationResult<TxHash> {
        match self.transaction_hash.as_ref() {
            Some(Value::String(s)) => TxHash::parse(s),
            Some(_) => Err(ValidationError::InvalidTransactionHash("transactionHash".into())),
            None => Err(ValidationError::MissingEvidence("Missing transaction hash".into())),
        }
    }

    pub fn to_patch(&self, kind: RequestKind, now: DateTime<Utc>) -> ValidationResult<RequestPatch> {
        match kind {
            RequestKind::Prescription => {
                let (Some(id), Some(_)) = (self.prescription_id.as_ref(), self.transaction_hash.as_ref()) else {
                    return Err(ValidationError::MissingEvidence(
                        "Missing chain metadata for prescription".into(),
                    ));
                };
                Ok(RequestPatch::Record {
                    prescription_id: PrescriptionId::from_json(id)?,
                    transaction_hash: self.tx_hash()?,
                    recorded_at: now,
                })
            }
            RequestKind::Access => {
                if self.transaction_hash.is_none() {
                    return Err(ValidationError::MissingEvidence(
                        "Missing transaction hash for access request".into(),
                    ));
                }
                Ok(RequestPatch::Grant {
                    transaction_hash: self.tx_hash()?,
                    recorded_at: now,
                })
            }
        }
    }
}

/// Read-side projection of a recorded prescription returned to viewers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub id: RequestId,
    pub prescription_id: Option<PrescriptionId>,
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
    pub payload: PrescriptionPayload,
    pub doctor_address: Address,
    pub patient_address: Address,
    pub recorded_at: Option<DateTime<Utc>>,
    pub transaction_hash: Option<TxHash>,
}

impl PatientRecord {
    pub fn from_request(request: &Request) -> Option<Self> {
        match &request.details {
            RequestDetails::Prescription { payload, metadata_uri, prescription_id, .. } => Some(PatientRecord {
                id: request.id,
                prescription_id: *prescription_id,
                metadata_uri: metadata_uri.clone(),
                payload: payload.clone(),
                doctor_address: request.doctor_address.clone(),
                patient_address: request.patient_address.clone(),
                recorded_at: request.recorded_at,
                transaction_hash: request.transaction_hash.clone(),
            }),
            RequestDetails::Access { .. } => None,
        }
    }
}
