use std::sync::Arc;
use std::time::Duration;

use coordinator_core::{
    config::{TransportConfig, TransportType},
    traits::{CommandTransport, DocumentStore},
    CoordinatorError, CoordinatorResult,
};
use tracing::{debug, info};

use super::{InMemoryCommandBroker, RedisCommandBroker, StoragePollingCommandBroker};

pub struct TransportFactory;

impl TransportFactory {
    /// 按配置创建命令传输；存储轮询后端复用给定的文档存储
    pub async fn create(
        config: &TransportConfig,
        store: Arc<dyn DocumentStore>,
    ) -> CoordinatorResult<Arc<dyn CommandTransport>> {
        debug!("Creating command transport with type: {:?}", config.r#type);

        match config.r#type {
            TransportType::InMemory => {
                info!("Initializing in-memory command broker");
                Ok(Arc::new(InMemoryCommandBroker::default()))
            }
            TransportType::Redis => {
                info!("Initializing Redis command broker");
                let redis = config.redis.as_ref().ok_or_else(|| {
                    CoordinatorError::Configuration(
                        "Redis传输配置缺失：需要提供redis配置段".to_string(),
                    )
                })?;
                let broker = RedisCommandBroker::new(redis, &config.channel).await?;
                Ok(Arc::new(broker))
            }
            TransportType::StoragePolling => {
                info!("Initializing storage polling command broker");
                Ok(Arc::new(StoragePollingCommandBroker::new(
                    store,
                    Duration::from_millis(config.poll_interval_ms),
                    Duration::from_secs(config.envelope_ttl_seconds),
                )))
            }
        }
    }
}
