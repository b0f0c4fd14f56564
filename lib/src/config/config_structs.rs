// lib/src/config/config_structs.rs
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use models::errors::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

use crate::config::config_constants::*;

/// Top-level service configuration. Every section falls back to defaults
/// when omitted from the YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub pinning: PinningConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
    pub authorization: AuthorizationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Connection to the prescription registry contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub registry_address: Option<String>,
    pub timeout_ms: u64,
    /// Ask the registry `isDoctor(doctor)` before accepting a new request.
    pub verify_doctor_registration: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            rpc_url: None,
            registry_address: None,
            timeout_ms: DEFAULT_CHAIN_TIMEOUT_MS,
            verify_doctor_registration: false,
        }
    }
}

impl ChainConfig {
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.rpc_url.is_none() {
            missing.push(ENV_RPC_URL);
        }
        if self.registry_address.is_none() {
            missing.push(ENV_REGISTRY_ADDRESS);
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing_keys().is_empty()
    }

    pub fn ensure_configured(&self) -> LedgerResult<()> {
        let missing = self.missing_keys();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Configuration(format!("Missing blockchain config: {}", missing.join(", "))))
        }
    }
}

/// `Debug` never prints the JWT so the config can be logged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinningConfig {
    pub jwt: Option<String>,
    pub gateway: String,
    pub endpoint: String,
    pub timeout_ms: u64,
}

impl Default for PinningConfig {
    fn default() -> Self {
        PinningConfig {
            jwt: None,
            gateway: DEFAULT_PINATA_GATEWAY.to_string(),
            endpoint: DEFAULT_PINATA_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_PINNING_TIMEOUT_MS,
        }
    }
}

impl fmt::Debug for PinningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinningConfig")
            .field("jwt", &self.jwt.as_ref().map(|_| "<redacted>"))
            .field("gateway", &self.gateway)
            .field("endpoint", &self.endpoint)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl PinningConfig {
    pub fn ensure_configured(&self) -> LedgerResult<()> {
        if self.jwt.is_none() {
            return Err(LedgerError::Configuration(format!("Missing {}", ENV_PINATA_JWT)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageEngineType {
    #[serde(alias = "json", alias = "jsonfile")]
    JsonFile,
    Sled,
    #[serde(alias = "inmemory", alias = "memory")]
    InMemory,
}

impl Default for StorageEngineType {
    fn default() -> Self {
        StorageEngineType::JsonFile
    }
}

impl FromStr for StorageEngineType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json_file" | "jsonfile" | "json" => Ok(StorageEngineType::JsonFile),
            "sled" => Ok(StorageEngineType::Sled),
            "in_memory" | "inmemory" | "memory" => Ok(StorageEngineType::InMemory),
            other => Err(LedgerError::Configuration(format!("Unknown storage engine: {}", other))),
        }
    }
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngineType::JsonFile => write!(f, "json_file"),
            StorageEngineType::Sled => write!(f, "sled"),
            StorageEngineType::InMemory => write!(f, "in_memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub engine: StorageEngineType,
    pub data_directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            engine: StorageEngineType::default(),
            data_directory: PathBuf::from(DEFAULT_DATA_DIRECTORY),
        }
    }
}

impl StorageConfig {
    pub fn json_file_path(&self) -> PathBuf {
        self.data_directory.join(REQUESTS_JSON_FILE_NAME)
    }

    pub fn sled_path(&self) -> PathBuf {
        self.data_directory.join(REQUESTS_SLED_DIRECTORY_NAME)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub file: Option<PathBuf>,
    /// Flush to disk every N recorded samples. 0 flushes only on close.
    pub flush_interval_records: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            file: Some(PathBuf::from(DEFAULT_METRICS_FILE)),
            flush_interval_records: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub max_concurrent_checks: usize,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        AuthorizationConfig {
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}
