// models/src/medical/mod.rs
pub mod medication;
pub mod prescription;

pub use medication::MedicationEntry;
pub use prescription::{PrescriptionPayload, PrescriptionRecord};
