pub mod memory;
pub mod sqlite;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use std::sync::Arc;

use coordinator_core::{
    config::{StorageConfig, StorageType},
    traits::DocumentStore,
    CoordinatorResult,
};
use tracing::info;

pub struct StoreFactory;

impl StoreFactory {
    pub async fn create(config: &StorageConfig) -> CoordinatorResult<Arc<dyn DocumentStore>> {
        match config.r#type {
            StorageType::Memory => {
                info!("Using in-memory document store");
                Ok(Arc::new(InMemoryDocumentStore::new()))
            }
            StorageType::Sqlite => Ok(Arc::new(SqliteDocumentStore::new(config).await?)),
        }
    }
}
