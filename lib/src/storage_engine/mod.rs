// lib/src/storage_engine/mod.rs
// Declares the request store engines and the factory that picks one from config.

use std::sync::Arc;

use log::{debug, error, info};
use models::errors::LedgerResult;

use crate::config::{StorageConfig, StorageEngineType};

pub mod inmemory_storage;
pub mod json_file_storage;
pub mod sled_storage;
pub mod storage_engine;

pub use inmemory_storage::InMemoryStorage;
pub use json_file_storage::JsonFileStorage;
pub use sled_storage::SledStorage;
pub use storage_engine::RequestStore;

pub async fn create_storage(config: &StorageConfig) -> LedgerResult<Arc<dyn RequestStore>> {
    debug!("Creating storage with config: {:?}", config);

    let storage: Arc<dyn RequestStore> = match config.engine {
        StorageEngineType::InMemory => Arc::new(InMemoryStorage::new()),
        StorageEngineType::JsonFile => match JsonFileStorage::new(config.json_file_path()).await {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                error!("Failed to create JSON file storage: {}", e);
                return Err(e);
            }
        },
        StorageEngineType::Sled => match SledStorage::new(config.sled_path()).await {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                error!("Failed to create sled storage: {}", e);
                return Err(e);
            }
        },
    };
    info!("Created {} request store", storage.get_type());
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_honours_engine_selection() {
        let dir = tempfile::tempdir().unwrap();
        for (engine, expected) in [
            (StorageEngineType::InMemory, "in_memory"),
            (StorageEngineType::JsonFile, "json_file"),
            (StorageEngineType::Sled, "sled"),
        ] {
            let config = StorageConfig { engine, data_directory: dir.path().to_path_buf() };
            let store = create_storage(&config).await.unwrap();
            assert_eq!(store.get_type(), expected);
        }
        assert!(dir.path().join("requests.json").exists());
    }
}
