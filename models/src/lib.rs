// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod errors;
pub mod identifiers;
pub mod request;

// Declare the 'medical' sub-module
pub mod medical;

// Re-export common core types for convenience when other crates use 'models::*'
pub use errors::{LedgerError, LedgerResult, ValidationError, ValidationResult};
pub use identifiers::{Address, PrescriptionId, RequestId, TxHash};
pub use medical::{MedicationEntry, PrescriptionPayload, PrescriptionRecord};
pub use request::{
    AccessPayload, ChainEvidence, DoctorAuthorization, NewRequest, PatientRecord, Request,
    RequestDetails, RequestKind, RequestPatch, RequestStatus, Role,
};
