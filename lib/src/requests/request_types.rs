// lib/src/requests/request_types.rs
use chrono::{DateTime, Utc};
use models::errors::{ValidationError, ValidationResult};
use models::{Address, DoctorAuthorization, PrescriptionPayload, RequestKind};
use serde_json::Value;

/// Kind-specific input to `RequestService::create_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateRequestBody {
    Prescription {
        payload: PrescriptionPayload,
        doctor_authorization: Option<DoctorAuthorization>,
    },
    Access {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateRequest {
    pub doctor_address: Address,
    pub patient_address: Address,
    pub body: CreateRequestBody,
}

impl CreateRequest {
    pub fn prescription(doctor: Address, patient: Address, payload: PrescriptionPayload) -> Self {
        CreateRequest {
            doctor_address: doctor,
            patient_address: patient,
            body: CreateRequestBody::Prescription { payload, doctor_authorization: None },
        }
    }

    pub fn access(doctor: Address, patient: Address, reason: &str) -> Self {
        CreateRequest {
            doctor_address: doctor,
            patient_address: patient,
            body: CreateRequestBody::Access { reason: reason.to_string() },
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self.body {
            CreateRequestBody::Prescription { .. } => RequestKind::Prescription,
            CreateRequestBody::Access { .. } => RequestKind::Access,
        }
    }

    /// Parses a JSON request body sent by `doctor`.
    ///
    /// Checks run in a fixed order: kind, patientAddress, then the
    /// kind-specific fields.
    pub fn from_json(doctor: Address, body: &Value, now: DateTime<Utc>) -> ValidationResult<Self> {
        let Some(fields) = body.as_object() else {
            return Err(ValidationError::UnsupportedKind);
        };
        let kind = fields
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(ValidationError::UnsupportedKind)
            .and_then(RequestKind::parse)?;

        let patient_address = fields
            .get("patientAddress")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::InvalidAddress("patientAddress".into()))
            .and_then(|s| Address::parse_field(s, "patientAddress"))?;

        let body = match kind {
            RequestKind::Prescription => {
                let payload = parse_payload(fields.get("payload"))?;
                let doctor_authorization = DoctorAuthorization::from_parts(
                    fields.get("doctorSignature"),
                    fields.get("nonce"),
                    fields.get("validUntil"),
                    now,
                )?;
                CreateRequestBody::Prescription { payload, doctor_authorization }
            }
            RequestKind::Access => {
                let reason = fields
                    .get("reason")
                    .and_then(Value::as_str)
                    .filter(|r| !r.trim().is_empty())
                    .ok_or(ValidationError::MissingReason)?;
                CreateRequestBody::Access { reason: reason.to_string() }
            }
        };

        Ok(CreateRequest { doctor_address: doctor, patient_address, body })
    }
}

fn parse_payload(value: Option<&Value>) -> ValidationResult<PrescriptionPayload> {
    let Some(object) = value.filter(|v| v.is_object()) else {
        return Err(ValidationError::MissingPayload);
    };
    let has_title = object
        .get("title")
        .and_then(Value::as_str)
        .map_or(false, |t| !t.trim().is_empty());
    if !has_title {
        return Err(ValidationError::MissingTitle);
    }
    serde_json::from_value(object.clone()).map_err(|e| ValidationError::MalformedBody(e.to_string()))
}
