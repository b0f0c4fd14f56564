// lib/src/config/config_helpers.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use serde_yaml2 as serde_yaml;

use crate::config::config_constants::*;
use crate::config::config_structs::*;

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LedgerConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(LedgerConfig::default());
        }
        serde_yaml::from_str(content).map_err(|e| anyhow!("Failed to parse config YAML: {:?}", e))
    }

    /// Applies environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_with(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup. Blank values count as unset.
    pub fn apply_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));

        if let Some(raw) = get(ENV_PORT) {
            match raw.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => {
                    warn!("Ignoring unparseable {}={:?}, using default port {}", ENV_PORT, raw, DEFAULT_PORT);
                    self.server.port = DEFAULT_PORT;
                }
            }
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(url) = get(ENV_RPC_URL) {
            self.chain.rpc_url = Some(url);
        }
        if let Some(address) = get(ENV_REGISTRY_ADDRESS) {
            self.chain.registry_address = Some(address);
        }
        if let Some(jwt) = get(ENV_PINATA_JWT) {
            self.pinning.jwt = Some(jwt);
        }
        if let Some(gateway) = get(ENV_PINATA_GATEWAY) {
            self.pinning.gateway = gateway;
        }
        if let Some(engine) = get(ENV_STORAGE_ENGINE) {
            match engine.parse::<StorageEngineType>() {
                Ok(engine) => self.storage.engine = engine,
                Err(e) => warn!("Ignoring {}: {}", ENV_STORAGE_ENGINE, e),
            }
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            self.storage.data_directory = PathBuf::from(dir);
        }
        if let Some(file) = get(ENV_METRICS_FILE) {
            self.metrics.file = Some(PathBuf::from(file));
        }

        // Blank strings in the YAML file are treated like missing keys too.
        self.chain.rpc_url = non_blank(self.chain.rpc_url.take());
        self.chain.registry_address = non_blank(self.chain.registry_address.take());
        self.pinning.jwt = non_blank(self.pinning.jwt.take());
    }
}

/// Candidate config locations, in lookup order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_PATH_RELATIVE)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(DEFAULT_CONFIG_HOME_DIRECTORY).join(DEFAULT_CONFIG_FILE_NAME));
    }
    paths
}

fn read_config_file(path: &Path) -> Result<LedgerConfig> {
    let canonical_path = fs::canonicalize(path)
        .with_context(|| format!("Failed to canonicalize config path {}", path.display()))?;
    let content = fs::read_to_string(&canonical_path)
        .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;
    let config = LedgerConfig::from_yaml_str(&content).map_err(|e| {
        error!("YAML parsing error at {:?}: {}", canonical_path, e);
        anyhow!("Failed to parse config YAML: {}", canonical_path.display())
    })?;
    debug!("Parsed config from {}: {:?}", canonical_path.display(), config);
    Ok(config)
}

/// Loads the service configuration, then applies environment overrides.
///
/// An explicit path must exist. Without one, the default locations are tried
/// and defaults are used when none is present.
pub fn load_ledger_config(config_file_path: Option<&str>) -> Result<LedgerConfig> {
    let mut config = match config_file_path {
        Some(path) => {
            info!("Loading config from {}", path);
            read_config_file(Path::new(path))?
        }
        None => match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => {
                info!("Loading config from {:?}", path);
                read_config_file(&path)?
            }
            None => {
                warn!("No config file found. Using default config.");
                LedgerConfig::default()
            }
        },
    };
    config.apply_env_overrides();
    info!(
        "Config loaded: port={}, storage={}, chain configured={}, pinning configured={}",
        config.server.port,
        config.storage.engine,
        config.chain.is_configured(),
        config.pinning.jwt.is_some()
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.pinning.gateway, "https://gateway.pinata.cloud/ipfs/");
        assert_eq!(config.storage.engine, StorageEngineType::JsonFile);
        assert!(!config.chain.is_configured());
        assert!(config.pinning.ensure_configured().is_err());
    }

    #[test]
    fn parses_partial_yaml() {
        let yaml = "server:\n  port: 5050\nstorage:\n  engine: sled\n  data_directory: /tmp/medledger\n";
        let config = LedgerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.port, 5050);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.storage.engine, StorageEngineType::Sled);
        assert_eq!(config.storage.json_file_path(), PathBuf::from("/tmp/medledger/requests.json"));
        assert_eq!(config.chain.timeout_ms, DEFAULT_CHAIN_TIMEOUT_MS);
    }

    #[test]
    fn env_overrides_take_precedence_and_ignore_blanks() {
        let mut config = LedgerConfig::default();
        config.apply_overrides_with(lookup(&[
            ("PORT", "8081"),
            ("RPC_URL", "http://localhost:8545"),
            ("PRESCRIPTION_REGISTRY_ADDRESS", "   "),
            ("PINATA_JWT", "jwt-token"),
            ("MEDLEDGER_STORAGE_ENGINE", "memory"),
        ]));
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.chain.rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(config.chain.registry_address, None);
        assert_eq!(config.chain.missing_keys(), vec![ENV_REGISTRY_ADDRESS]);
        assert!(config.pinning.ensure_configured().is_ok());
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
    }

    #[test]
    fn unparseable_port_falls_back_to_default() {
        let mut config = LedgerConfig::default();
        config.server.port = 9999;
        config.apply_overrides_with(lookup(&[("PORT", "not-a-port")]));
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn chain_config_reports_missing_keys() {
        let err = ChainConfig::default().ensure_configured().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing blockchain config: RPC_URL, PRESCRIPTION_REGISTRY_ADDRESS"
        );
    }

    #[test]
    fn explicit_missing_config_file_is_an_error() {
        assert!(load_ledger_config(Some("/definitely/not/here/medledger.yaml")).is_err());
    }

    #[test]
    fn config_file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medledger.yaml");
        fs::write(&path, "server:\n  port: 4100\nchain:\n  verify_doctor_registration: true\n").unwrap();
        let loaded = read_config_file(&path).unwrap();
        assert_eq!(loaded.server.port, 4100);
        assert!(loaded.chain.verify_doctor_registration);
    }

    #[test]
    fn debug_output_hides_pinning_jwt() {
        let yaml = "pinning:\n  jwt: SUPERSECRETJWT\n";
        let config = LedgerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.pinning.jwt.as_deref(), Some("SUPERSECRETJWT"));

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("SUPERSECRETJWT"));
        assert!(rendered.contains("jwt: Some(\"<redacted>\")"));
        assert!(!format!("{:?}", LedgerConfig::default()).contains("<redacted>"));
    }
}
