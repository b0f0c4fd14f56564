// lib/src/config/config_constants.rs

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_CONFIG_PATH_RELATIVE: &str = "./config/medledger.yaml";
pub const DEFAULT_CONFIG_HOME_DIRECTORY: &str = ".medledger";
pub const DEFAULT_CONFIG_FILE_NAME: &str = "medledger.yaml";

pub const DEFAULT_DATA_DIRECTORY: &str = "./data";
pub const REQUESTS_JSON_FILE_NAME: &str = "requests.json";
pub const REQUESTS_SLED_DIRECTORY_NAME: &str = "requests_sled";
pub const DEFAULT_METRICS_FILE: &str = "./metrics/data.json";

pub const DEFAULT_PINATA_ENDPOINT: &str = "https://api.pinata.cloud/pinning/pinJSONToIPFS";
pub const DEFAULT_PINATA_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";
pub const DEFAULT_PINNING_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_CHAIN_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 8;

// Environment overrides
pub const ENV_PORT: &str = "PORT";
pub const ENV_HOST: &str = "HOST";
pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_REGISTRY_ADDRESS: &str = "PRESCRIPTION_REGISTRY_ADDRESS";
pub const ENV_PINATA_JWT: &str = "PINATA_JWT";
pub const ENV_PINATA_GATEWAY: &str = "PINATA_GATEWAY";
pub const ENV_STORAGE_ENGINE: &str = "MEDLEDGER_STORAGE_ENGINE";
pub const ENV_DATA_DIR: &str = "MEDLEDGER_DATA_DIR";
pub const ENV_METRICS_FILE: &str = "MEDLEDGER_METRICS_FILE";
