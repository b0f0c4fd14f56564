// models/src/medical/prescription.rs
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::Address;
use crate::medical::MedicationEntry;

/// Clinical document a doctor drafts for a patient. Pinned to content storage
/// before the request is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub medications: Vec<MedicationEntry>,
}

impl PrescriptionPayload {
    pub fn titled(title: &str) -> Self {
        PrescriptionPayload {
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> ValidationResult<()> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        Ok(())
    }

    /// Trimmed copy without blank medication lines.
    pub fn normalized(&self) -> Self {
        PrescriptionPayload {
            title: self.title.trim().to_string(),
            summary: self.summary.trim().to_string(),
            notes: self.notes.trim().to_string(),
            medications: self
                .medications
                .iter()
                .filter(|m| !m.is_blank())
                .map(MedicationEntry::trimmed)
                .collect(),
        }
    }
}

/// Canonical prescription as held by the chain authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRecord {
    pub doctor: Address,
    pub patient: Address,
    #[serde(rename = "metadataURI")]
    pub metadata_uri: String,
    /// Unix seconds, as stamped by the contract.
    pub created_at: u64,
}
