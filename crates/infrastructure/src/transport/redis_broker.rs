use std::time::Duration;

use async_trait::async_trait;
use coordinator_core::{
    config::RedisConfig,
    models::Envelope,
    traits::{CommandTransport, EnvelopeStream},
    CoordinatorError, CoordinatorResult,
};
use futures::StreamExt;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, error, warn};

/// Redis Pub/Sub 命令代理
///
/// 发布使用 `ConnectionManager`，断线后自动重连；每个订阅者独占一个 Pub/Sub 连接。
/// Redis Pub/Sub 不保存离线消息，订阅之前发布的命令不会被收到。
pub struct RedisCommandBroker {
    client: Client,
    publisher: ConnectionManager,
    channel: String,
}

impl RedisCommandBroker {
    pub async fn new(config: &RedisConfig, channel: &str) -> CoordinatorResult<Self> {
        let client = Client::open(config.build_url()).map_err(|e| {
            CoordinatorError::Transport(format!("Failed to create Redis client: {e}"))
        })?;

        let publisher = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_seconds),
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            CoordinatorError::Transport(format!(
                "Redis连接超时: {}:{}",
                config.host, config.port
            ))
        })?
        .map_err(|e| CoordinatorError::Transport(format!("Failed to connect to Redis: {e}")))?;

        debug!(
            "Successfully connected to Redis at {}:{} (channel {})",
            config.host, config.port, channel
        );

        Ok(Self {
            client,
            publisher,
            channel: channel.to_string(),
        })
    }
}

#[async_trait]
impl CommandTransport for RedisCommandBroker {
    async fn publish(&self, envelope: &Envelope) -> CoordinatorResult<()> {
        let payload = envelope.serialize()?;
        let mut conn = self.publisher.clone();
        let receivers: i64 = conn
            .publish(&self.channel, payload)
            .await
            .map_err(|e| {
                error!("Redis publish failed: {}", e);
                CoordinatorError::Transport(format!("Redis publish failed: {e}"))
            })?;

        debug!(
            "Published {} {} to {} subscribers",
            envelope.kind_str(),
            envelope.id(),
            receivers
        );
        Ok(())
    }

    async fn subscribe(&self, subscriber_id: &str) -> CoordinatorResult<EnvelopeStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| CoordinatorError::Transport(format!("Redis pubsub connect failed: {e}")))?;
        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| CoordinatorError::Transport(format!("Redis subscribe failed: {e}")))?;

        debug!("Subscriber {} attached to Redis channel {}", subscriber_id, self.channel);

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Discarding non-text Redis payload: {}", e);
                    return None;
                }
            };
            match Envelope::deserialize(&payload) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    warn!("Discarding malformed envelope: {}", e);
                    None
                }
            }
        });

        Ok(stream.boxed())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
