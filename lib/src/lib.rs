// lib/src/lib.rs
// Engines and services of the prescription ledger coordinator.

pub mod authorization;
pub mod chain;
pub mod config;
pub mod metrics;
pub mod pinning;
pub mod requests;
pub mod storage_engine;

#[cfg(any(test, feature = "test-suite"))]
pub mod test_support;

pub use models::errors::{LedgerError, LedgerResult, ValidationError};

pub use crate::authorization::{AuthorizationService, RecordAccess};
pub use crate::chain::{ChainAuthority, ChainRead, DisabledChainAuthority, RegistryClient};
pub use crate::config::{load_ledger_config, LedgerConfig, StorageEngineType};
pub use crate::metrics::{MetricsRecorder, MetricsReport};
pub use crate::pinning::{ContentPinner, DisabledPinner, PinReceipt, PinataClient};
pub use crate::requests::{CreateRequest, CreateRequestBody, RequestService};
pub use crate::storage_engine::{create_storage, RequestStore};
