use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use coordinator_core::{
    config::{RegistryConfig, RegistryType},
    models::{object_types, Document, DocumentKey, DocumentQuery, ProcessInfo, GLOBAL_SITE},
    traits::{DocumentStore, ProcessRegistry},
    CoordinatorResult,
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 固定成员的进程注册表
///
/// 成员只随 `register`/`unregister` 变化，没有心跳过期。
#[derive(Debug, Default)]
pub struct StaticProcessRegistry {
    members: RwLock<BTreeSet<String>>,
}

impl StaticProcessRegistry {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: RwLock::new(members.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl ProcessRegistry for StaticProcessRegistry {
    async fn register(&self, info: &ProcessInfo) -> CoordinatorResult<()> {
        self.members.write().await.insert(info.id.clone());
        Ok(())
    }

    async fn unregister(&self, process_id: &str) -> CoordinatorResult<()> {
        self.members.write().await.remove(process_id);
        Ok(())
    }

    async fn active_processes(&self) -> CoordinatorResult<BTreeSet<String>> {
        Ok(self.members.read().await.clone())
    }
}

/// 基于共享存储心跳的进程注册表
///
/// 每个进程周期性写入一条 `server_registration` 文档；
/// 心跳超过 TTL 未刷新的进程不再视为活跃。
pub struct StoreProcessRegistry {
    store: Arc<dyn DocumentStore>,
    ttl: chrono::Duration,
}

impl StoreProcessRegistry {
    pub fn new(store: Arc<dyn DocumentStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(30)),
        }
    }
}

#[async_trait]
impl ProcessRegistry for StoreProcessRegistry {
    async fn register(&self, info: &ProcessInfo) -> CoordinatorResult<()> {
        let mut info = info.clone();
        info.last_heartbeat = Utc::now();
        let document = Document::new(
            object_types::SERVER_REGISTRATION,
            &info.id,
            GLOBAL_SITE,
            serde_json::to_value(&info)?,
        );
        self.store.save(document).await?;
        debug!("Heartbeat recorded for process {}", info.id);
        Ok(())
    }

    async fn unregister(&self, process_id: &str) -> CoordinatorResult<()> {
        self.store
            .purge(&DocumentKey::global(object_types::SERVER_REGISTRATION, process_id))
            .await?;
        Ok(())
    }

    async fn active_processes(&self) -> CoordinatorResult<BTreeSet<String>> {
        let now = Utc::now();
        let documents = self
            .store
            .find(&DocumentQuery::of_type(object_types::SERVER_REGISTRATION))
            .await?;

        let mut active = BTreeSet::new();
        for document in documents {
            match serde_json::from_value::<ProcessInfo>(document.body) {
                Ok(info) if info.is_alive(self.ttl, now) => {
                    active.insert(info.id);
                }
                Ok(info) => debug!("Process {} heartbeat expired", info.id),
                Err(e) => warn!("Ignoring malformed registration {}: {}", document.key, e),
            }
        }
        Ok(active)
    }
}

pub struct RegistryFactory;

impl RegistryFactory {
    pub fn create(
        config: &RegistryConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Arc<dyn ProcessRegistry> {
        match config.r#type {
            RegistryType::Static => Arc::new(StaticProcessRegistry::default()),
            RegistryType::Store => Arc::new(StoreProcessRegistry::new(
                store,
                Duration::from_secs(config.ttl_seconds),
            )),
        }
    }
}
