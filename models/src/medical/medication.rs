// models/src/medical/medication.rs
use serde::{Deserialize, Serialize};

/// One line of a prescription: what to take, how much, and when.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub schedule: String,
}

impl MedicationEntry {
    pub fn new(name: &str, dosage: &str, schedule: &str) -> Self {
        MedicationEntry {
            name: name.to_string(),
            dosage: dosage.to_string(),
            schedule: schedule.to_string(),
        }
    }

    /// Trims every field in place.
    pub fn trimmed(&self) -> Self {
        MedicationEntry {
            name: self.name.trim().to_string(),
            dosage: self.dosage.trim().to_string(),
            schedule: self.schedule.trim().to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.dosage.trim().is_empty() && self.schedule.trim().is_empty()
    }
}
